#![no_main]

use libfuzzer_sys::fuzz_target;
use paw_syntax::scanner::Scanner;
use paw_syntax::token::Token;

fuzz_target!(|data: &[u8]| {
    let mut src = data;
    let mut s = Scanner::new(&mut src, Box::new(|_, _, msg| {
        // error messages never start with '/'; that byte marks comments
        assert!(!msg.starts_with('/') || msg.len() >= 2);
    }), 0);

    let max_steps = data.len().saturating_mul(4) + 64;
    let mut steps = 0usize;
    let mut prev = (1u32, 0u32);

    loop {
        s.next();
        if s.token() == Token::EOF {
            break;
        }

        let pos = (s.line(), s.col());
        assert!(pos.0 >= 1 && pos.1 >= 1);
        assert!(pos >= prev, "token position moved backwards");
        prev = pos;

        steps += 1;
        assert!(steps <= max_steps, "scanner made no progress");
    }
});
