//! Scanner throughput benchmarks. Run with `cargo bench --package tansy-lex`.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tansy_lex::{Scanner, TokenKind};

fn token_count(source: &str) -> usize {
    let mut scanner = Scanner::new(source, 1);
    let mut count = 0;
    loop {
        let token = scanner.scan_token();
        count += 1;
        if token.kind == TokenKind::Eof {
            break;
        }
    }
    count
}

fn bench_scanner_keywords(c: &mut Criterion) {
    let mut group = c.benchmark_group("scanner");

    let source = "var x = 42; fn add(a, b) { return a + b; } print add(x, 1);";
    group.throughput(Throughput::Bytes(source.len() as u64));

    group.bench_function("simple_decl", |b| b.iter(|| token_count(black_box("var x = 42;"))));
    group.bench_function("function_with_call", |b| b.iter(|| token_count(black_box(source))));

    group.finish();
}

fn bench_scanner_strings(c: &mut Criterion) {
    let mut group = c.benchmark_group("scanner_strings");

    group.bench_function("short_string", |b| b.iter(|| token_count(black_box("var s = \"hello\";"))));

    let long = "var s = \"This is a longer string with several words in it for benchmarking.\";";
    group.bench_function("long_string", |b| b.iter(|| token_count(black_box(long))));

    group.finish();
}

fn bench_scanner_numbers(c: &mut Criterion) {
    let mut group = c.benchmark_group("scanner_numbers");

    group.bench_function("integer", |b| b.iter(|| token_count(black_box("var x = 123456;"))));
    group.bench_function("float", |b| b.iter(|| token_count(black_box("var x = 3.14159;"))));

    group.finish();
}

fn bench_scanner_program(c: &mut Criterion) {
    let mut group = c.benchmark_group("scanner_program");

    let source = r#"
        fn fib(n) {
            if (n < 2) { return n; }
            return fib(n - 1) + fib(n - 2);
        }
        var i = 0;
        for (i = 0; i < 10; i = i + 1) {
            print fib(i);
        }
    "#;
    group.throughput(Throughput::Bytes(source.len() as u64));
    group.bench_function("fib_loop", |b| b.iter(|| token_count(black_box(source))));

    group.finish();
}

criterion_group!(
    benches,
    bench_scanner_keywords,
    bench_scanner_strings,
    bench_scanner_numbers,
    bench_scanner_program
);
criterion_main!(benches);
