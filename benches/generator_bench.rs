use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use opgen::emit::emit_all;
use opgen::ops::{IntAdder, MultiAdder, SumOfProducts};
use opgen::*;

// Generation scenarios at the default target (400 MHz, pipelined).

fn generate(kind: &dyn Schedulable) -> GenerationContext {
    let mut ctx = GenerationContext::new(GenerationConfig::default());
    if let Err(e) = ctx.generate(kind) {
        panic!("bench scenario failed: {}", e);
    }
    ctx
}

// KPI: schedule + finalize latency for representative operators.
fn bench_kpi_generate_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("kpi/generate_latency");
    let scenarios: [(&str, Box<dyn Schedulable>); 3] = [
        ("int_adder_128", Box::new(IntAdder { width: 128 })),
        (
            "multi_adder_8x32",
            Box::new(MultiAdder {
                width: 32,
                count: 8,
            }),
        ),
        (
            "sum_of_products_4x16",
            Box::new(SumOfProducts {
                width: 16,
                count: 4,
            }),
        ),
    ];

    for (name, kind) in &scenarios {
        group.bench_with_input(BenchmarkId::from_parameter(name), kind, |b, kind| {
            b.iter(|| black_box(generate(kind.as_ref())));
        });
    }

    group.finish();
}

// KPI: Verilog emission latency for an already generated context.
fn bench_kpi_emit_latency(c: &mut Criterion) {
    let ctx = generate(&SumOfProducts {
        width: 16,
        count: 4,
    });
    c.bench_function("kpi/emit_latency/sum_of_products_4x16", |b| {
        b.iter(|| black_box(emit_all(black_box(&ctx))))
    });
}

// KPI: retiming cost vs rake length (each extra operand adds a delay chain).
fn bench_kpi_rake_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("kpi/rake_scaling");

    for count in [2_u32, 8, 32, 128] {
        let kind = MultiAdder { width: 32, count };
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}operands", count)),
            &kind,
            |b, kind| {
                b.iter(|| black_box(generate(black_box(kind))));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_kpi_generate_latency,
    bench_kpi_emit_latency,
    bench_kpi_rake_scaling,
);
criterion_main!(benches);
