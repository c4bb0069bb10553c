use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use price_notifier::subscribers::PassThroughObserver;
use price_notifier::{NotifierConfig, Price, PriceNotifier, SubscriberHandle, Symbol};
use std::time::Duration;

fn create_bench_notifier(subscribers: usize) -> (PriceNotifier, Symbol) {
    let notifier = PriceNotifier::new(NotifierConfig::default()).unwrap();
    let symbol = Symbol::parse("AAPL").unwrap();
    notifier.add_instrument(symbol.clone(), Price::from(100)).unwrap();

    for i in 0..subscribers {
        let handle = SubscriberHandle::new(format!("observer-{i}"), PassThroughObserver::new());
        notifier.register(&symbol, &handle).unwrap();
    }
    (notifier, symbol)
}

fn bench_update_no_subscribers(c: &mut Criterion) {
    let (notifier, symbol) = create_bench_notifier(0);
    let mut step = 0u32;

    c.bench_function("update_no_subscribers", |b| {
        b.iter(|| {
            step = step.wrapping_add(1);
            black_box(notifier.update_price(&symbol, Price::from(100 + step % 50))).unwrap();
        });
    });
}

fn bench_update_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_fanout");

    for subscribers in [1usize, 8, 64] {
        let (notifier, symbol) = create_bench_notifier(subscribers);
        let mut step = 0u32;

        group.bench_with_input(BenchmarkId::from_parameter(subscribers), &subscribers, |b, _| {
            b.iter(|| {
                step = step.wrapping_add(1);
                black_box(notifier.update_price(&symbol, Price::from(100 + step % 50))).unwrap();
                notifier.wait_idle(Duration::from_secs(5));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_update_no_subscribers, bench_update_fanout);
criterion_main!(benches);
