use litemapping_core::{
    Coercer, Condition, ConditionLink, QueryArgument, RawCell, Schema, TypeRegistry, Value,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn bench_schema(registry: &TypeRegistry) -> Schema {
    Schema::builder::<Option<i64>>(registry, "id")
        .autoincrement()
        .column::<String>("name")
        .column::<i32>("age")
        .column::<f64>("score")
        .column::<bool>("active")
        .column::<Option<Vec<u8>>>("avatar")
        .build()
        .expect("build schema")
}

fn bench_query_compile(c: &mut Criterion) {
    let registry = TypeRegistry::new();
    let schema = bench_schema(&registry);
    let query = QueryArgument::new()
        .set_conditions(
            vec![
                Condition::ge("age", 18),
                Condition::ne("name", "anonymous"),
                Condition::lt("score", 99.5),
            ],
            ConditionLink::And,
        )
        .set_order_by_reverse("score", true)
        .set_page_and_size(3, 50);

    c.bench_function("query/compile", |b| {
        b.iter(|| {
            let compiled = black_box(&query).compile(&schema).expect("compile query");
            black_box(compiled.limit);
        });
    });
}

fn bench_coercion(c: &mut Criterion) {
    let registry = TypeRegistry::new();
    let schema = bench_schema(&registry);
    let coercer = Coercer::new(&schema);
    let value = Value::Text("a reasonably sized name".to_string());
    let cell = RawCell::Text("true".to_string());

    c.bench_function("coerce/to_storage", |b| {
        b.iter(|| black_box(coercer.to_storage_value("name", black_box(&value))))
    });
    c.bench_function("coerce/from_storage", |b| {
        b.iter(|| black_box(coercer.from_storage_value("active", black_box(&cell))))
    });
}

criterion_group!(benches, bench_query_compile, bench_coercion);
criterion_main!(benches);
