// finalize.rs — Pipeline finalizer: depth, output realignment, schedule projection
//
// Finalization runs once per operator, last. It brings every primary output
// to the common terminal cycle, then projects the already-resolved state into
// a per-cycle `Schedule` (assignments, instances, register loads). It makes no
// scheduling decision of its own beyond the realignment chains.
//
// Preconditions: the operator is Open.
// Postconditions: the operator is Finalized; depth = max over output cycles
//                 and instance output cycles (0 without outputs); every
//                 output is valid at depth.
// Failure modes: OperatorClosed when already finalized; DuplicateSignal when a
//                realignment net or stage name is taken.
// Side effects: info log of the final report; warn log per unused instance
//               output.

use log::{info, warn};

use crate::diag::GenResult;
use crate::diag::ScheduleError;
use crate::id::{InstanceId, SignalId};
use crate::instance::Instance;
use crate::operator::{Operator, OperatorState};
use crate::signal::{Driver, RegisterMode, SignalDecl, SignalRole};

// ── Schedule projection ─────────────────────────────────────────────────────

/// Right-hand side of a continuous assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignSource {
    Expr(String),
    Signal(SignalId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: SignalId,
    pub source: AssignSource,
}

/// One register of a delay chain, loaded from `source` on each clock edge.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterLoad {
    pub target: SignalId,
    pub source: SignalId,
    pub mode: RegisterMode,
}

/// An output brought forward to the terminal cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Realignment {
    pub output: SignalId,
    /// Internal net `<output>_d0` holding the value at its own cycle.
    pub base: SignalId,
    /// Last stage, valid at the terminal cycle; drives the port.
    pub last: SignalId,
}

/// Everything happening in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleSlice {
    pub cycle: u32,
    /// Highest critical path the cursor recorded in this cycle.
    pub peak_critical_path: f64,
    pub assigns: Vec<Assignment>,
    /// Instances whose inputs are sampled in this cycle.
    pub instances: Vec<InstanceId>,
    /// Stages whose value becomes valid in this cycle.
    pub registers: Vec<RegisterLoad>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub depth: u32,
    /// True when the module needs clock and reset.
    pub sequential: bool,
    pub cycles: Vec<CycleSlice>,
    pub realigned: Vec<Realignment>,
    pub register_count: usize,
    /// Exported delay of each primary output, in output order.
    pub output_delays: Vec<f64>,
}

impl Schedule {
    pub fn registers(&self) -> impl Iterator<Item = &RegisterLoad> {
        self.cycles.iter().flat_map(|c| c.registers.iter())
    }

    pub fn assigns(&self) -> impl Iterator<Item = &Assignment> {
        self.cycles.iter().flat_map(|c| c.assigns.iter())
    }
}

// ── Finalization ────────────────────────────────────────────────────────────

impl Operator {
    /// Freeze the operator: realign outputs, compute the pipeline depth and
    /// project the schedule.
    pub fn finalize(&mut self) -> GenResult<()> {
        let call = "finalize()";
        self.ensure_open(call)?;

        // Outputs are exposed no earlier than any instance completes, so a
        // parent is never shallower than its sub-operators.
        let depth = if self.outputs.is_empty() {
            0
        } else {
            self.outputs
                .iter()
                .map(|out| self.signals.get(out.signal).cycle)
                .chain(self.instances.iter().map(Instance::output_cycle))
                .max()
                .unwrap_or(0)
        };

        let mut realigned = Vec::new();
        let mut output_delays = Vec::with_capacity(self.outputs.len());
        for out in self.outputs.clone() {
            let sig = self.signals.get(out.signal).clone();
            if sig.cycle == depth {
                output_delays.push(out.delay);
                continue;
            }
            let base = self
                .signals
                .declare(SignalDecl {
                    name: format!("{}_d0", sig.name),
                    role: SignalRole::Internal,
                    mode: sig.mode,
                    width: sig.width,
                    cycle: sig.cycle,
                    driver: sig.driver.clone(),
                })
                .map_err(|kind| self.error(call, kind))?;
            self.chains.set_stem(base, sig.name.clone());
            let last = self
                .chains
                .resolve(&mut self.signals, base, depth)
                .map_err(|kind| self.error(call, kind))?;
            realigned.push(Realignment {
                output: out.signal,
                base,
                last,
            });
            output_delays.push(0.0);
        }

        let schedule = self.project(depth, realigned, output_delays)?;
        self.warn_unused_outputs();
        info!(
            "{}: pipeline depth {}, {} registers, {} instances",
            self.name,
            schedule.depth,
            schedule.register_count,
            self.instances.len()
        );
        self.state = OperatorState::Finalized(schedule);
        Ok(())
    }

    fn project(
        &self,
        depth: u32,
        realigned: Vec<Realignment>,
        output_delays: Vec<f64>,
    ) -> GenResult<Schedule> {
        let last_cycle = self
            .signals
            .iter()
            .map(|s| s.cycle)
            .chain(self.instances.iter().map(|i| i.input_cycle))
            .chain(std::iter::once(depth))
            .max()
            .unwrap_or(0);
        let peaks = self.cursor.peaks();
        let mut cycles: Vec<CycleSlice> = (0..=last_cycle)
            .map(|cycle| CycleSlice {
                cycle,
                peak_critical_path: peaks.get(&cycle).copied().unwrap_or(0.0),
                assigns: Vec::new(),
                instances: Vec::new(),
                registers: Vec::new(),
            })
            .collect();

        for sig in self.signals.iter() {
            let at = sig.cycle as usize;
            match (&sig.role, &sig.driver) {
                (SignalRole::Input, _) | (_, Driver::Port) | (_, Driver::Instance { .. }) => {}
                (SignalRole::Output, Driver::Expr(expr)) => {
                    match realigned.iter().find(|r| r.output == sig.id) {
                        Some(r) => cycles[depth as usize].assigns.push(Assignment {
                            target: sig.id,
                            source: AssignSource::Signal(r.last),
                        }),
                        None => cycles[at].assigns.push(Assignment {
                            target: sig.id,
                            source: AssignSource::Expr(expr.clone()),
                        }),
                    }
                }
                (_, Driver::Expr(expr)) => cycles[at].assigns.push(Assignment {
                    target: sig.id,
                    source: AssignSource::Expr(expr.clone()),
                }),
                (_, Driver::Stage { base, depth: k }) => {
                    let source = if *k == 1 {
                        *base
                    } else {
                        self.chains.stages(*base)[*k as usize - 2]
                    };
                    cycles[at].registers.push(RegisterLoad {
                        target: sig.id,
                        source,
                        mode: sig.mode,
                    });
                }
            }
        }
        for inst in &self.instances {
            cycles[inst.input_cycle as usize].instances.push(inst.id);
        }

        for cycle in &cycles {
            if cycle.peak_critical_path > self.cursor.period() && self.cursor.is_pipelined() {
                return Err(self.error(
                    "finalize()",
                    ScheduleError::UnreachableTiming {
                        delay: cycle.peak_critical_path,
                        period: self.cursor.period(),
                    },
                ));
            }
        }

        let register_count = self.chains.register_count();
        let sequential = register_count > 0
            || depth > 0
            || self.instances.iter().any(|i| i.interface.sequential);
        Ok(Schedule {
            depth,
            sequential,
            cycles,
            realigned,
            register_count,
            output_delays,
        })
    }

    fn warn_unused_outputs(&self) {
        for inst in &self.instances {
            for (formal, signal) in &inst.outputs {
                if let Some(id) = signal {
                    if !self.consumed.contains(id) {
                        warn!(
                            "{}: output {} of instance {} is never used",
                            self.name,
                            formal,
                            inst.name
                        );
                    }
                }
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
