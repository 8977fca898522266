use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use livewatch::{LiveList, PollResult, ReconcilePolicy, Reconciler, StreamEntry};

const CHANNELS: usize = 512;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn poll(now: DateTime<Utc>, title_suffix: &str) -> PollResult {
    let entries = (0..CHANNELS)
        .map(|i| {
            StreamEntry::new("twitch", format!("v{i}"), format!("c{i}"), now)
                .with_channel(format!("Stream {i}{title_suffix}"), "Some Game")
        })
        .collect();
    PollResult::new("twitch", entries, (0..CHANNELS).map(|i| format!("c{i}")))
}

fn seeded() -> Reconciler {
    let mut reconciler = Reconciler::new(LiveList::new(), ReconcilePolicy::default());
    reconciler.reconcile(poll(at(0), ""), at(0)).unwrap();
    reconciler
}

fn bench_steady_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");
    group.throughput(Throughput::Elements(CHANNELS as u64));

    group.bench_function("steady_state", |b| {
        b.iter_batched(
            || (seeded(), poll(at(60), "")),
            |(mut reconciler, poll)| black_box(reconciler.reconcile(poll, at(60)).unwrap()),
            BatchSize::LargeInput,
        );
    });

    group.bench_function("all_titles_changed", |b| {
        b.iter_batched(
            || (seeded(), poll(at(60), " (new)")),
            |(mut reconciler, poll)| black_box(reconciler.reconcile(poll, at(60)).unwrap()),
            BatchSize::LargeInput,
        );
    });

    group.bench_function("all_offline", |b| {
        b.iter_batched(
            || {
                let empty = PollResult::new("twitch", Vec::new(), (0..CHANNELS).map(|i| format!("c{i}")));
                (seeded(), empty)
            },
            |(mut reconciler, poll)| black_box(reconciler.reconcile(poll, at(60) + Duration::seconds(1)).unwrap()),
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_steady_state);
criterion_main!(benches);
