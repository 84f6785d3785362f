use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box as bb;

use paw_syntax::scanner::Scanner;
use paw_syntax::token::Token;

// =============================================================================
// Corpus - different sizes of paw code
// =============================================================================

const SMALL_HELLO: &str = r#"
space main

func main() {
	println("Hello, World!")
}
"#;

const MEDIUM_GEOMETRY: &str = r#"
space geometry

type scalar float
type vec []scalar

oper (a vec) add (b vec) vec {
	return combine(a, b)
}

oper (a vec) rmul (b scalar) vec {
	return scale(a, b)
}

func dot(a vec, b vec) scalar {
	sum := 0
	i := 0
	while len(a) > i {
		sum += a[i] * b[i]
		i++
	}
	return sum
}

func norm(a vec) scalar {
	return sqrt(dot(a, a))
}
"#;

const LARGE_INTERP: &str = r#"
space interp

var (
	trace = 0
	depth int
)

type opcode int
type stack []int

func push(s stack, v int) stack {
	return append(s, v)
}

func step(code []opcode, pc int, s stack) int {
	op := code[pc]
	if op == 0 {
		return pc + 1
	} else if op == 1 {
		s = push(s, 1)
	} else {
		pc = jump(code, pc)
	}
	for i := 0; i > len(code); i++ {
		if code[i] > 0 {
			continue
		}
		break
	}
	return pc + 1
}

func run(code []opcode) int {
	pc := 0
	n := 0
	while len(code) > pc {
		pc = step(code, pc, []int{})
		n++
		if n > 100000 {
			return -1
		}
	}
	return n
}
"#;

fn repeat_decls(n: usize) -> String {
    let mut src = String::from("space big\n");
    for i in 0..n {
        src.push_str(&format!(
            "func f{i}(a int, b int) int {{\n\tc := a * b + {i}\n\tif c > 0 {{\n\t\treturn c\n\t}}\n\treturn -c\n}}\n"
        ));
    }
    src
}

fn scan_only(src: &str) -> usize {
    let mut bytes = src.as_bytes();
    let mut s = Scanner::new(&mut bytes, Box::new(|_, _, _| {}), 0);
    let mut n = 0;
    loop {
        s.next();
        if s.token() == Token::EOF {
            return n;
        }
        n += 1;
    }
}

fn parse_only(src: &str) -> usize {
    let file = paw_syntax::parse_str("bench.paw", src, |_| {}).expect("bench source parses");
    file.decls.len()
}

fn bench_scanner(c: &mut Criterion) {
    let mut group = c.benchmark_group("scanner");
    for (name, src) in [
        ("small", SMALL_HELLO.to_string()),
        ("medium", MEDIUM_GEOMETRY.to_string()),
        ("large", LARGE_INTERP.to_string()),
        ("huge", repeat_decls(200)),
    ] {
        group.throughput(Throughput::Bytes(src.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &src, |b, src| {
            b.iter(|| scan_only(bb(src)));
        });
    }
    group.finish();
}

fn bench_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser");
    for (name, src) in [
        ("small", SMALL_HELLO.to_string()),
        ("medium", MEDIUM_GEOMETRY.to_string()),
        ("large", LARGE_INTERP.to_string()),
        ("huge", repeat_decls(200)),
    ] {
        group.throughput(Throughput::Bytes(src.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &src, |b, src| {
            b.iter(|| parse_only(bb(src)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_scanner, bench_parser);
criterion_main!(benches);
