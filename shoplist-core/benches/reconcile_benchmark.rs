use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shoplist_core::{reduce, ItemSnapshot, ListEvent, ListSlug, ListSnapshot, UserIdentity};

fn list_of(n: u64) -> ListSnapshot {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let user = UserIdentity::new("u1", "Jane");
    let items = (0..n)
        .map(|id| ItemSnapshot::new(id, format!("item-{id}"), base + Duration::seconds(id as i64), user.clone()))
        .collect();
    ListSnapshot::new(ListSlug::parse("bench").unwrap(), items)
}

fn bench_complete_resort(c: &mut Criterion) {
    let snapshot = list_of(1_000);
    let target = snapshot.get(500).cloned().unwrap();
    let event = ListEvent::item_completed(
        snapshot.slug().clone(),
        target.completed(Utc::now(), UserIdentity::new("u2", "Bob")),
    );

    // Every completion re-sorts the whole list.
    c.bench_function("complete_resort_1k", |b| {
        b.iter(|| black_box(reduce(snapshot.clone(), black_box(&event))))
    });
}

fn bench_add_prepend(c: &mut Criterion) {
    let snapshot = list_of(1_000);
    let added = ItemSnapshot::new(5_000, "Coffee", Utc::now(), UserIdentity::new("u1", "Jane"));
    let event = ListEvent::items_added(snapshot.slug().clone(), vec![added]);

    c.bench_function("add_prepend_1k", |b| {
        b.iter(|| black_box(reduce(snapshot.clone(), black_box(&event))))
    });
}

fn bench_delete(c: &mut Criterion) {
    let snapshot = list_of(1_000);
    let event = ListEvent::item_deleted(snapshot.slug().clone(), 999);

    c.bench_function("delete_1k", |b| {
        b.iter(|| black_box(reduce(snapshot.clone(), black_box(&event))))
    });
}

criterion_group!(benches, bench_complete_resort, bench_add_prepend, bench_delete);
criterion_main!(benches);
