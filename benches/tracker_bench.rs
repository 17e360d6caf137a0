//! Micro-benchmark for the cost/register-pressure tracker's
//! `schedule`/`unschedule` pair — the enumerator's hottest path, called
//! on the order of billions of times over a real compilation.

use bb_scheduler::bench_support::CostTracker;
use bb_scheduler::{MachineModel, NodeIndex, RegRef, RegisterBank, SpillCostFunction};
use cranelift_entity::EntityRef;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn fixture() -> (MachineModel, RegisterBank, Vec<RegRef>) {
    let mut m = MachineModel::new(4);
    let gpr = m.add_register_type("gpr", 16);
    let fpr = m.add_register_type("fpr", 8);

    let mut bank = RegisterBank::new(&m);
    let mut regs = Vec::new();
    {
        let file = bank.file_mut(gpr);
        for _ in 0..32 {
            let id = file.add_register(2, None);
            regs.push(RegRef { reg_type: gpr, id });
        }
    }
    {
        let file = bank.file_mut(fpr);
        for _ in 0..16 {
            let id = file.add_register(2, None);
            regs.push(RegRef { reg_type: fpr, id });
        }
    }
    (m, bank, regs)
}

fn schedule_unschedule_round_trip(c: &mut Criterion) {
    let (m, bank, regs) = fixture();

    c.bench_function("tracker schedule/unschedule round trip", |b| {
        b.iter(|| {
            let mut tracker = CostTracker::new(&m, &bank, SpillCostFunction::PeakPlusAvg);
            for (i, chunk) in regs.chunks(2).enumerate() {
                let defs = &chunk[..1.min(chunk.len())];
                let uses: Vec<RegRef> = if i == 0 { Vec::new() } else { chunk[1..].to_vec() };
                let snapshot = tracker.snapshot();
                tracker.schedule(NodeIndex::new(i), &uses, defs);
                black_box(tracker.spill_cost(regs.len()));
                tracker.unschedule(&uses, defs, &snapshot);
            }
        });
    });
}

fn spill_cost_query(c: &mut Criterion) {
    let (m, bank, regs) = fixture();
    let mut tracker = CostTracker::new(&m, &bank, SpillCostFunction::Sum);
    for (i, chunk) in regs.chunks(2).enumerate() {
        let defs = &chunk[..1.min(chunk.len())];
        tracker.schedule(NodeIndex::new(i), &[], defs);
    }

    c.bench_function("tracker spill_cost query", |b| {
        b.iter(|| black_box(tracker.spill_cost(regs.len())));
    });
}

criterion_group!(benches, schedule_unschedule_round_trip, spill_cost_query);
criterion_main!(benches);
