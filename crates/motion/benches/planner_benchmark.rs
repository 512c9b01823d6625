use criterion::{black_box, criterion_group, criterion_main, Criterion};
use motion::{MachineConfig, Planner, AXES};

fn polyline_target(i: usize) -> [f32; AXES] {
    // A gentle arc approximated by short chords: the worst case for the
    // look-ahead, since every commit replans the whole chain.
    let angle = i as f32 * 0.05;
    let mut t = [0.0; AXES];
    t[0] = 50.0 * angle.cos();
    t[1] = 50.0 * angle.sin();
    t
}

fn benchmark_lookahead(c: &mut Criterion) {
    let config = MachineConfig::default();

    c.bench_function("plan_20_chord_lookahead", |b| {
        b.iter(|| {
            let mut planner = Planner::new();
            planner.set_position(polyline_target(0));
            for i in 1..=20 {
                planner
                    .plan_line(black_box(polyline_target(i)), 0.002, false, &config)
                    .unwrap();
            }
            black_box(planner.queued_blocks().count())
        })
    });

    c.bench_function("plan_single_long_move", |b| {
        b.iter(|| {
            let mut planner = Planner::new();
            let mut target = [0.0; AXES];
            target[0] = 150.0;
            target[1] = 50.0;
            target[2] = 20.0;
            planner
                .plan_line(black_box(target), 0.01, false, &config)
                .unwrap();
            black_box(planner.queued_blocks().next().unwrap().head_length)
        })
    });
}

criterion_group!(benches, benchmark_lookahead);
criterion_main!(benches);
