use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kaizenizer::event::{Event, EventKind, Stage};
use kaizenizer::generator::{Generator, GeneratorKind, GeneratorOptions};

const ISSUES: usize = 500;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
}

/// A month of activity: every issue walks backlog -> wip -> done -> resolved,
/// interleaved so events stay in ascending time order.
fn build_events() -> Vec<Event> {
    const WALK: [(Option<Stage>, Option<Stage>); 4] = [
        (None, Some(Stage::Backlog)),
        (Some(Stage::Backlog), Some(Stage::Wip)),
        (Some(Stage::Wip), Some(Stage::Done)),
        (Some(Stage::Done), Some(Stage::Resolved)),
    ];
    const TYPES: [&str; 4] = ["product", "bug", "technical", "ops"];
    const SEGMENTS: [&str; 3] = ["tribe_core", "tribe_data", "tribe_none"];

    let mut events = Vec::with_capacity(ISSUES * WALK.len());
    let mut minutes = 0i64;
    for (step, (from, to)) in WALK.iter().enumerate() {
        for i in 0..ISSUES {
            minutes += 21;
            events.push(Event {
                time: t0() + Duration::minutes(minutes),
                kind: EventKind::StatusChanged,
                issue_key: format!("JT-{i}"),
                issue_type: TYPES[i % TYPES.len()].to_string(),
                segment: SEGMENTS[(i + step) % SEGMENTS.len()].to_string(),
                from: *from,
                to: *to,
                issue_created_at: t0() - Duration::days((i % 60) as i64),
            });
        }
    }
    events
}

fn run_generator(kind: GeneratorKind, events: &[Event]) -> usize {
    let mut generator = Generator::new(kind, &GeneratorOptions::default());
    let mut out = Vec::new();
    let mut emitted = 0;
    for event in events {
        generator.process(event, &mut out).expect("ordered events");
        emitted += out.len();
        out.clear();
    }
    generator.finish(&mut out);
    emitted + out.len()
}

fn bench_generators(c: &mut Criterion) {
    let events = build_events();

    for kind in [
        GeneratorKind::LeadTime,
        GeneratorKind::CycleTime,
        GeneratorKind::Counters,
        GeneratorKind::IssuesAge,
        GeneratorKind::LeadAndCycleTime,
    ] {
        c.bench_function(&format!("generator/{}", kind.as_str()), |b| {
            b.iter(|| black_box(run_generator(kind, black_box(&events))))
        });
    }
}

criterion_group!(benches, bench_generators);
criterion_main!(benches);
