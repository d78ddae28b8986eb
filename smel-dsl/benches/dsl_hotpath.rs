use criterion::{black_box, criterion_group, criterion_main, Criterion};
use smel_dsl::{parse, pretty_print};
use smel_test_utils::fixtures::PERSON_SCRIPT;

fn bench_parse(c: &mut Criterion) {
    c.bench_function("dsl/parse_person", |b| {
        b.iter(|| {
            let migration = parse(black_box(PERSON_SCRIPT)).expect("parse script");
            black_box(migration.operations.len());
        });
    });
}

fn bench_round_trip(c: &mut Criterion) {
    let migration = parse(PERSON_SCRIPT).expect("parse script");
    c.bench_function("dsl/pretty_print_person", |b| {
        b.iter(|| {
            let printed = pretty_print(black_box(&migration));
            black_box(printed.len());
        });
    });
}

criterion_group!(benches, bench_parse, bench_round_trip);
criterion_main!(benches);
