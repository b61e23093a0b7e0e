//! Interpreter throughput benchmarks. Run with `cargo bench --package tansy-runtime`.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tansy_runtime::interpret;

fn run(source: &str) {
    let result = interpret(black_box(source), 1);
    assert_eq!(result, tansy_runtime::InterpretResult::Ok);
}

fn bench_arithmetic_loop(c: &mut Criterion) {
    let source = r#"
        var sum = 0;
        for (var i = 0; i < 1000; i = i + 1) {
            sum = sum + i * 2 - 1;
        }
    "#;
    c.bench_function("arithmetic_loop", |b| b.iter(|| run(source)));
}

fn bench_recursive_fibonacci(c: &mut Criterion) {
    let source = r#"
        fun fib(n) {
            if (n < 2) { return n; }
            return fib(n - 1) + fib(n - 2);
        }
        fib(15);
    "#;
    c.bench_function("recursive_fibonacci", |b| b.iter(|| run(source)));
}

fn bench_string_concatenation(c: &mut Criterion) {
    let source = r#"
        var s = "";
        for (var i = 0; i < 200; i = i + 1) {
            s = s + "x";
        }
    "#;
    c.bench_function("string_concatenation", |b| b.iter(|| run(source)));
}

criterion_group!(benches, bench_arithmetic_loop, bench_recursive_fibonacci, bench_string_concatenation);
criterion_main!(benches);
