#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let s = String::from_utf8_lossy(data);
    // must never panic; diagnostics and partial trees are fine
    let _ = paw_syntax::parse_str("fuzz.paw", &s, |_| {});
});
