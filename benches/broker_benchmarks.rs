use std::hint::black_box;

use chatcore::{
    delivery_channel, Broker, BrokerConfig, DeliveryReceiver, InMemoryHistory, Message,
    MessageHistory,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
}

/// Публикация в очередь, которую никто не читает: чистая стоимость шлюза,
/// включая отказ `QueueFull`.
fn bench_publish_gateway(c: &mut Criterion) {
    let parent = CancellationToken::new();
    let broker = Broker::with_config(
        &parent,
        BrokerConfig {
            queue_capacity: 1_024,
        },
    );

    c.bench_function("publish_gateway_saturated", |b| {
        b.iter(|| {
            let _ = black_box(broker.publish(Message::direct("a", "b", "x")));
        })
    });
}

/// Публикация и доставка одному получателю.
fn bench_unicast_roundtrip(c: &mut Criterion) {
    let rt = runtime();
    let parent = CancellationToken::new();
    let broker = rt.block_on(async {
        let broker = Broker::new(&parent);
        broker.run();
        broker.wait().await;
        broker
    });
    let (tx, rx) = delivery_channel(1);
    assert!(broker.register_user("b", tx).is_none());
    let rx = tokio::sync::Mutex::new(rx);

    c.bench_function("unicast_roundtrip", |b| {
        b.to_async(&rt).iter(|| async {
            broker
                .publish(Message::direct("a", "b", "x"))
                .expect("queue has room");
            black_box(rx.lock().await.recv().await);
        })
    });

    parent.cancel();
}

/// Broadcast на N получателей: доставка у последнего получателя.
fn bench_broadcast_fanout(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("broadcast_fanout");

    for users in [1usize, 10, 100] {
        let parent = CancellationToken::new();
        let broker = rt.block_on(async {
            let broker = Broker::new(&parent);
            broker.run();
            broker
        });
        let mut receivers: Vec<DeliveryReceiver> = (0..users)
            .map(|i| {
                let (tx, rx) = delivery_channel(1);
                assert!(broker.register_user(&format!("user-{i}"), tx).is_none());
                rx
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(users), &users, |b, _| {
            b.iter(|| {
                broker
                    .publish(Message::broadcast("user-0", "x"))
                    .expect("queue has room");
                rt.block_on(async {
                    for rx in receivers.iter_mut() {
                        black_box(rx.recv().await);
                    }
                });
            })
        });

        parent.cancel();
    }
    group.finish();
}

fn bench_history(c: &mut Criterion) {
    let history = InMemoryHistory::with_max_entries(10_000);
    for i in 0..10_000 {
        let sender = if i % 10 == 0 { "alice" } else { "bob" };
        history
            .append(Message::broadcast(sender, i.to_string()))
            .expect("in-memory append");
    }

    c.bench_function("history_append_with_eviction", |b| {
        b.iter(|| black_box(history.append(Message::broadcast("carol", "x"))))
    });
    c.bench_function("history_query_by_sender", |b| {
        b.iter(|| black_box(history.query(Some("alice"))))
    });
}

criterion_group!(
    benches,
    bench_publish_gateway,
    bench_unicast_roundtrip,
    bench_broadcast_fanout,
    bench_history
);
criterion_main!(benches);
