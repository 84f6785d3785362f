use std::env;
use std::process;

fn main() {
    let path = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("usage: pawdump <file.paw>");
        process::exit(2);
    });

    let src = std::fs::read_to_string(&path).expect("read file");

    let mut errors = 0usize;
    let parsed = paw_syntax::parse_str(&path, &src, |err| {
        eprintln!("{err}");
        errors += 1;
    });

    match parsed {
        Ok(file) => {
            println!("{file:#?}");
            println!("// ---- reprinted ----");
            let mut out = std::io::stdout();
            if let Err(err) = paw_syntax::fprint(&mut out, &file, paw_syntax::Form::Default) {
                eprintln!("print failed: {err}");
                process::exit(1);
            }
            println!();
            if errors > 0 {
                eprintln!("{errors} error(s)");
                process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("parse failed: {err}");
            process::exit(1);
        }
    }
}
