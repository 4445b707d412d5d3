//! Criterion benchmarks for the per-frame decision path.

use std::time::{Duration, Instant};

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use facegate::audit::MemoryAuditSink;
use facegate::config::FileConfig;
use facegate::control::AccessStateMachine;
use facegate::notify::NotificationSink;
use facegate::perception::{DemoSource, FrameSize, PerceptionEvent, PerceptionSource};
use facegate::relay::RelayChannel;

const FRAME_INTERVAL: Duration = Duration::from_millis(30);

fn machine(config: &FileConfig) -> AccessStateMachine {
    AccessStateMachine::new(
        config.access.clone(),
        RelayChannel::virtual_mode(&config.relay),
        Box::new(MemoryAuditSink::new()),
        NotificationSink::disabled(),
    )
}

fn demo_cycle(config: &FileConfig) -> Vec<PerceptionEvent> {
    let sizing = DemoSource::new(&config.access, FRAME_INTERVAL, Duration::ZERO);
    let cycle = FRAME_INTERVAL * sizing.cycle_len() as u32;
    let mut source = DemoSource::new(&config.access, FRAME_INTERVAL, cycle);

    let mut events = Vec::new();
    while let Ok(Some(event)) = source.next_event() {
        events.push(event);
    }
    events
}

fn bench_tick_empty_scene(c: &mut Criterion) {
    let config = FileConfig::default();
    let mut machine = machine(&config);
    let event = PerceptionEvent::absent(FrameSize::default());
    let mut now = Instant::now();

    c.bench_function("tick_empty_scene", |b| {
        b.iter(|| {
            now += FRAME_INTERVAL;
            machine.tick_at(black_box(&event), now)
        })
    });
}

fn bench_demo_cycle(c: &mut Criterion) {
    let config = FileConfig::default();
    let events = demo_cycle(&config);

    c.bench_function("demo_cycle", |b| {
        b.iter_batched(
            || machine(&config),
            |mut machine| {
                let mut now = Instant::now();
                for event in &events {
                    now += FRAME_INTERVAL;
                    black_box(machine.tick_at(event, now));
                }
                machine.stats()
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_tick_empty_scene, bench_demo_cycle);
criterion_main!(benches);
