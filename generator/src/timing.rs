// timing.rs — Mermaid Gantt timing chart of finalized operator schedules
//
// Renders every committed operator, leaves first, as one Gantt section. The
// time axis is the pipeline cycle: each assignment occupies the cycle it is
// computed in and each instance spans from its input cycle to the cycle its
// outputs become valid.
//
// Preconditions: operators in the context are finalized.
// Postconditions: returns a valid Mermaid Gantt chart string.
// Failure modes: none (pure string formatting; open operators are skipped).
// Side effects: none.

use std::fmt::Write;

use crate::context::GenerationContext;
use crate::finalize::Schedule;
use crate::operator::Operator;

/// Emit the schedules of every committed operator as a Mermaid Gantt chart.
pub fn emit_timing_chart(ctx: &GenerationContext) -> String {
    let mut buf = String::new();
    let _ = writeln!(buf, "gantt");
    let _ = writeln!(
        buf,
        "    title Operator schedules ({} MHz)",
        ctx.config().frequency_mhz
    );
    let _ = writeln!(buf, "    dateFormat x");
    let _ = writeln!(buf, "    axisFormat %Q");

    for handle in ctx.emission_order() {
        let Some(op) = ctx.operator(handle) else {
            continue;
        };
        if let Some(schedule) = op.schedule() {
            emit_operator_section(&mut buf, op, schedule);
        }
    }
    buf
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn emit_operator_section(buf: &mut String, op: &Operator, schedule: &Schedule) {
    let prefix = sanitize(op.name());
    let _ = writeln!(buf);
    let _ = writeln!(
        buf,
        "    section {} (depth {}, {} regs)",
        op.name(),
        schedule.depth,
        schedule.register_count
    );

    let mut task_index = 0usize;
    for slice in &schedule.cycles {
        let start = u64::from(slice.cycle);
        for assign in &slice.assigns {
            let label = sanitize(&op.signals().get(assign.target).name);
            let _ = writeln!(
                buf,
                "    {} :{}_{}, {}, {}",
                label,
                prefix,
                task_index,
                start,
                start + 1
            );
            task_index += 1;
        }
        for id in &slice.instances {
            let inst = &op.instances()[id.index()];
            // Zero-depth instances still get a visible bar.
            let end = u64::from(inst.output_cycle()).max(start + 1);
            let _ = writeln!(
                buf,
                "    {} [{}] :{}_{}, {}, {}",
                sanitize(&inst.name),
                sanitize(&inst.interface.name),
                prefix,
                task_index,
                start,
                end
            );
            task_index += 1;
        }
    }
}

/// Mermaid Gantt uses `:` as the task/metadata separator and `#`/`;` as
/// comment and statement markers.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ':' | '#' | ';' => '_',
            c => c,
        })
        .collect()
}

// ── Tests ───────────────────────────────────────────────────────────────────
