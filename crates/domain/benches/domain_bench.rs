use common::{Money, TableNumber, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{AddItem, CatalogService, CreateProduct, OrderService, RemoveItem};
use store::{InMemoryStore, Product};

fn seeded() -> (tokio::runtime::Runtime, OrderService<InMemoryStore>, Product) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let catalog = CatalogService::new(store.clone());
    let product = rt.block_on(async {
        catalog
            .create_product(CreateProduct::new(
                "Burger",
                "Bench burger",
                Money::from_cents(500),
            ))
            .await
            .unwrap()
    });
    (rt, OrderService::new(store), product)
}

fn bench_create_product(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/create_product", |b| {
        b.iter(|| {
            rt.block_on(async {
                let catalog = CatalogService::new(InMemoryStore::new());
                catalog
                    .create_product(CreateProduct::new("Fries", "", Money::from_cents(200)))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_add_item(c: &mut Criterion) {
    let (rt, service, product) = seeded();
    let cmd = AddItem::new(UserId::new(1), product.id, 1, TableNumber::new(1));

    c.bench_function("domain/add_item", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.add_item(cmd).await.unwrap();
            });
        });
    });
}

fn bench_add_remove_cycle(c: &mut Criterion) {
    let (rt, service, product) = seeded();
    let cmd = AddItem::new(UserId::new(1), product.id, 2, TableNumber::new(1));

    c.bench_function("domain/add_remove_cycle", |b| {
        b.iter(|| {
            rt.block_on(async {
                let item = service.add_item(cmd).await.unwrap();
                service.remove_item(RemoveItem::new(item.id)).await.unwrap();
            });
        });
    });
}

fn bench_list_orders(c: &mut Criterion) {
    let (rt, service, product) = seeded();

    // Pre-populate: 50 tables with 4 items each
    rt.block_on(async {
        for table in 1..=50 {
            for user in 1..=4 {
                let cmd = AddItem::new(UserId::new(user), product.id, 1, TableNumber::new(table));
                service.add_item(cmd).await.unwrap();
            }
        }
    });

    c.bench_function("domain/list_50_orders", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.list_orders().await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_create_product,
    bench_add_item,
    bench_add_remove_cycle,
    bench_list_orders,
);
criterion_main!(benches);
