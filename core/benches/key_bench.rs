use criterion::{criterion_group, criterion_main, Criterion};
use routecache::key::{route_key, KeyOptions};
use routecache::RouteIndex;

fn bench_route_key(c: &mut Criterion) {
    let opts = KeyOptions { culture_in_path: true };
    c.bench_function("route_key_absolute", |b| {
        b.iter(|| route_key(1059, "https://www.example.com/fr-fr/Products/Widgets/Blue-Widget/?ref=nav", &opts))
    });
    c.bench_function("route_key_relative", |b| b.iter(|| route_key(1059, "/products/widgets/blue-widget/", &opts)));
}

fn bench_lookup(c: &mut Criterion) {
    let mut index = RouteIndex::new();
    index.insert("1059", 1059, false);
    for section in 0..50u32 {
        index.insert(&format!("1059/s{section}"), section, false);
        for page in 0..100u32 {
            index.insert(&format!("1059/s{section}/p{page}"), 10_000 + section * 100 + page, false);
        }
    }
    c.bench_function("lookup_exact", |b| b.iter(|| index.lookup("1059/s49/p99", false)));
    c.bench_function("lookup_compat", |b| b.iter(|| index.lookup("1059/s49/p99", true)));
}

criterion_group!(benches, bench_route_key, bench_lookup);
criterion_main!(benches);
