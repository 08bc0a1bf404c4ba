use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use fieldops_core::{CountryId, ProductId, RegionId, StoreId};
use fieldops_inventory::{
    allocate, AllocationRequest, SourcingContext, SourcingPolicy, Store, StoreQuantity,
};

/// A product stocked across `n` stores spread over 4 regions and 2 countries,
/// with every fifth store country-level and every seventh inactive.
fn stock_records(n: i64) -> Vec<StoreQuantity> {
    (1..=n)
        .map(|i| StoreQuantity {
            store: Store {
                id: StoreId::from_db(i),
                name: format!("Store {i}"),
                region_id: if i % 5 == 0 {
                    None
                } else {
                    Some(RegionId::from_db(1 + i % 4))
                },
                country_id: CountryId::from_db(1 + i % 2),
                active: i % 7 != 0,
            },
            quantity: Some((i * 37) % 120),
        })
        .collect()
}

fn bench_allocate_by_store_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate");
    let ctx = SourcingContext {
        region_id: RegionId::from_db(2),
        country_id: CountryId::from_db(1),
    };
    let request = AllocationRequest {
        product_id: ProductId::from_db(1),
        product_name: "Bench Product".to_string(),
        quantity: 40,
    };

    for stores in [8_i64, 64, 512] {
        let records = stock_records(stores);
        group.throughput(Throughput::Elements(stores as u64));

        for (label, policy) in [
            ("region_then_country", SourcingPolicy::RegionThenCountry),
            ("country_only", SourcingPolicy::CountryOnly),
        ] {
            group.bench_with_input(BenchmarkId::new(label, stores), &records, |b, records| {
                b.iter(|| {
                    let _ = black_box(allocate(
                        black_box(&request),
                        black_box(records),
                        &ctx,
                        policy,
                    ));
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_allocate_by_store_count);
criterion_main!(benches);
