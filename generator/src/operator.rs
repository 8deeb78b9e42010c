// operator.rs — One operator under construction: the client-facing engine API
//
// An operator owns its signal table, schedule cursor, delay chains and
// instances. Client code (an operator kind implementing `Schedulable`) drives
// it with straight-line calls: declare values, accrue delays, consume earlier
// values, move the cursor, and instantiate finalized sub-operators. The
// engine only inserts delay stages; it never reorders client calls.
//
// Idiom: accrue the delay of an operation, consume its operands, then declare
// its result. Accruing first lets an implicit cut move the operation into the
// next cycle before its operands are aligned.
//
// Preconditions: created by `GenerationContext::create_operator`.
// Postconditions: once finalized, every mutating call fails with
//                 OperatorClosed and the schedule is frozen.
// Failure modes: every ScheduleError kind, wrapped in GenerationError with the
//                operator name and the failing call.
// Side effects: debug logging of implicit cuts and instances.

use std::collections::HashSet;
use std::rc::Rc;

use log::debug;

use crate::context::GenerationContext;
use crate::cursor::{Accrual, ScheduleCursor};
use crate::delay::DelayChains;
use crate::diag::{GenResult, GenerationError, PortDirection, ScheduleError};
use crate::finalize::Schedule;
use crate::id::{next_index, InstanceId, OperatorHandle, SignalId};
use crate::instance::{Actual, InputSource, Instance, Interface, PortInfo, PortMap};
use crate::signal::{
    Driver, FpField, RegisterMode, Signal, SignalDecl, SignalRole, SignalTable, Width,
};
use crate::target::Target;

/// A primary output and the combinational delay it leaves the module with.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPort {
    pub signal: SignalId,
    pub delay: f64,
}

#[derive(Debug, Clone)]
pub(crate) enum OperatorState {
    Open,
    Finalized(Schedule),
}

pub struct Operator {
    pub(crate) handle: OperatorHandle,
    pub(crate) name: String,
    pub(crate) target: Rc<dyn Target>,
    pub(crate) signals: SignalTable,
    pub(crate) cursor: ScheduleCursor,
    pub(crate) chains: DelayChains,
    pub(crate) inputs: Vec<SignalId>,
    pub(crate) outputs: Vec<OutputPort>,
    pub(crate) instances: Vec<Instance>,
    /// Signals read by a consume or an instance input, before alignment.
    pub(crate) consumed: HashSet<SignalId>,
    pub(crate) state: OperatorState,
}

impl std::fmt::Debug for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operator")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("signals", &self.signals.len())
            .field("cycle", &self.cursor.cycle())
            .field("finalized", &self.is_finalized())
            .finish()
    }
}

impl Operator {
    pub(crate) fn new(handle: OperatorHandle, name: String, target: Rc<dyn Target>) -> Self {
        let cursor = ScheduleCursor::new(target.period_ns(), target.is_pipelined());
        Self {
            handle,
            name,
            target,
            signals: SignalTable::new(),
            cursor,
            chains: DelayChains::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            instances: Vec::new(),
            consumed: HashSet::new(),
            state: OperatorState::Open,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> OperatorHandle {
        self.handle
    }

    pub fn target(&self) -> &dyn Target {
        self.target.as_ref()
    }

    pub fn signals(&self) -> &SignalTable {
        &self.signals
    }

    pub fn signal(&self, name: &str) -> Option<&Signal> {
        self.signals.lookup(name).ok()
    }

    pub fn chains(&self) -> &DelayChains {
        &self.chains
    }

    pub fn inputs(&self) -> &[SignalId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputPort] {
        &self.outputs
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn current_cycle(&self) -> u32 {
        self.cursor.cycle()
    }

    pub fn critical_path(&self) -> f64 {
        self.cursor.critical_path()
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.state, OperatorState::Finalized(_))
    }

    /// The frozen schedule, once finalized.
    pub fn schedule(&self) -> Option<&Schedule> {
        match &self.state {
            OperatorState::Finalized(schedule) => Some(schedule),
            OperatorState::Open => None,
        }
    }

    pub fn depth(&self) -> Option<u32> {
        self.schedule().map(|s| s.depth)
    }

    /// Ports, depth and output delays as seen by a parent.
    pub fn interface(&self) -> Option<Interface> {
        let schedule = self.schedule()?;
        let port = |id: SignalId, delay: f64| {
            let sig = self.signals.get(id);
            PortInfo {
                name: sig.name.clone(),
                width: sig.width,
                delay,
            }
        };
        Some(Interface {
            name: self.name.clone(),
            inputs: self.inputs.iter().map(|&id| port(id, 0.0)).collect(),
            outputs: self
                .outputs
                .iter()
                .zip(&schedule.output_delays)
                .map(|(out, &delay)| port(out.signal, delay))
                .collect(),
            depth: schedule.depth,
            sequential: schedule.sequential,
        })
    }

    // ── Declarations ────────────────────────────────────────────────────

    pub fn add_input(&mut self, name: &str, width: impl Into<Width>) -> GenResult<()> {
        let call = format!("add_input({:?})", name);
        self.ensure_open(&call)?;
        let id = self.allocate(name, SignalRole::Input, width.into(), Driver::Port, &call)?;
        self.inputs.push(id);
        Ok(())
    }

    pub fn add_fp_input(&mut self, name: &str, we: u32, wf: u32) -> GenResult<()> {
        self.add_input(name, Width::Float { we, wf })
    }

    /// Declare an internal value computed by `expr` at the current cycle.
    pub fn declare(
        &mut self,
        name: &str,
        width: impl Into<Width>,
        expr: impl Into<String>,
    ) -> GenResult<()> {
        self.declare_with_mode(name, width, RegisterMode::Combinational, expr)
    }

    /// Like `declare`, selecting the register flavor of the value's delay
    /// stages.
    pub fn declare_with_mode(
        &mut self,
        name: &str,
        width: impl Into<Width>,
        mode: RegisterMode,
        expr: impl Into<String>,
    ) -> GenResult<()> {
        let call = format!("declare({:?})", name);
        self.ensure_open(&call)?;
        let decl = SignalDecl {
            name: name.to_string(),
            role: SignalRole::Internal,
            mode,
            width: width.into(),
            cycle: self.cursor.cycle(),
            driver: Driver::Expr(expr.into()),
        };
        self.signals
            .declare(decl)
            .map_err(|kind| self.error(&call, kind))?;
        Ok(())
    }

    /// Declare a primary output driven by `expr` at the current cycle. The
    /// current critical path becomes the output's exported delay.
    pub fn declare_output(
        &mut self,
        name: &str,
        width: impl Into<Width>,
        expr: impl Into<String>,
    ) -> GenResult<()> {
        let call = format!("declare_output({:?})", name);
        self.ensure_open(&call)?;
        let id = self.allocate(
            name,
            SignalRole::Output,
            width.into(),
            Driver::Expr(expr.into()),
            &call,
        )?;
        self.outputs.push(OutputPort {
            signal: id,
            delay: self.cursor.critical_path(),
        });
        Ok(())
    }

    pub fn declare_fp_output(
        &mut self,
        name: &str,
        we: u32,
        wf: u32,
        expr: impl Into<String>,
    ) -> GenResult<()> {
        self.declare_output(name, Width::Float { we, wf }, expr)
    }

    fn allocate(
        &mut self,
        name: &str,
        role: SignalRole,
        width: Width,
        driver: Driver,
        call: &str,
    ) -> GenResult<SignalId> {
        let decl = SignalDecl {
            name: name.to_string(),
            role,
            mode: RegisterMode::Combinational,
            width,
            cycle: self.cursor.cycle(),
            driver,
        };
        self.signals
            .declare(decl)
            .map_err(|kind| self.error(call, kind))
    }

    // ── Consumption ─────────────────────────────────────────────────────

    /// Read `name` at the current cycle, returning the identifier that
    /// carries its value there (the signal itself or one of its delay
    /// stages).
    pub fn consume(&mut self, name: &str) -> GenResult<String> {
        let call = format!("consume({:?})", name);
        self.ensure_open(&call)?;
        let id = self.resolve_readable(name, self.cursor.cycle(), &call)?;
        Ok(self.signals.get(id).name.clone())
    }

    /// Read one field of a floating-point signal, as `ident[hi:lo]`.
    pub fn consume_field(&mut self, name: &str, field: FpField) -> GenResult<String> {
        let call = format!("consume_field({:?}, {})", name, field.name());
        self.ensure_open(&call)?;
        let width = self
            .signals
            .lookup(name)
            .map_err(|kind| self.error(&call, kind))?
            .width;
        let Some((hi, lo)) = width.field_range(field) else {
            return Err(self.error(
                &call,
                ScheduleError::InvalidField {
                    name: name.to_string(),
                    field: field.name(),
                },
            ));
        };
        let id = self.resolve_readable(name, self.cursor.cycle(), &call)?;
        let ident = &self.signals.get(id).name;
        Ok(if hi == lo {
            format!("{}[{}]", ident, hi)
        } else {
            format!("{}[{}:{}]", ident, hi, lo)
        })
    }

    fn resolve_readable(&mut self, name: &str, cycle: u32, call: &str) -> GenResult<SignalId> {
        let sig = self
            .signals
            .lookup(name)
            .map_err(|kind| self.error(call, kind))?;
        if sig.role == SignalRole::Output {
            return Err(self.error(
                call,
                ScheduleError::OutputNotReadable {
                    name: name.to_string(),
                },
            ));
        }
        let id = sig.id;
        let resolved = self
            .chains
            .resolve(&mut self.signals, id, cycle)
            .map_err(|kind| self.error(call, kind))?;
        self.consumed.insert(id);
        Ok(resolved)
    }

    // ── Cursor ──────────────────────────────────────────────────────────

    pub fn set_cycle(&mut self, cycle: u32) -> GenResult<()> {
        self.ensure_open(&format!("set_cycle({})", cycle))?;
        self.cursor.set_cycle(cycle);
        Ok(())
    }

    /// Explicit pipeline boundary.
    pub fn advance_cycle(&mut self) -> GenResult<()> {
        self.ensure_open("advance_cycle()")?;
        self.cursor
            .advance_cycle()
            .map_err(|kind| self.error("advance_cycle()", kind))
    }

    /// Account `delay` ns of combinational work, inserting a pipeline
    /// boundary first when it does not fit in the current cycle.
    pub fn accrue(&mut self, delay: f64) -> GenResult<()> {
        let call = format!("accrue({:.3})", delay);
        self.ensure_open(&call)?;
        let from = self.cursor.cycle();
        match self.cursor.accrue(delay) {
            Ok(Accrual::Cut) => {
                debug!(
                    "{}: implicit cut {} -> {} for {:.3}ns",
                    self.name,
                    from,
                    self.cursor.cycle(),
                    delay
                );
                Ok(())
            }
            Ok(Accrual::Fitted) => Ok(()),
            Err(kind) => Err(self.error(&call, kind)),
        }
    }

    pub fn set_critical_path(&mut self, delay: f64) -> GenResult<()> {
        let call = format!("set_critical_path({:.3})", delay);
        self.ensure_open(&call)?;
        self.cursor
            .set_critical_path(delay)
            .map_err(|kind| self.error(&call, kind))
    }

    /// Move the cursor to the cycle of `name`, forward or backward.
    pub fn jump_to_signal(&mut self, name: &str) -> GenResult<()> {
        let call = format!("jump_to_signal({:?})", name);
        self.ensure_open(&call)?;
        let cycle = self
            .signals
            .lookup(name)
            .map_err(|kind| self.error(&call, kind))?
            .cycle;
        self.cursor.jump_to(cycle);
        Ok(())
    }

    /// Move the cursor forward to the cycle of `name` if it is later.
    pub fn join_signal(&mut self, name: &str) -> GenResult<()> {
        let call = format!("join_signal({:?})", name);
        self.ensure_open(&call)?;
        let cycle = self
            .signals
            .lookup(name)
            .map_err(|kind| self.error(&call, kind))?
            .cycle;
        self.cursor.join(cycle);
        Ok(())
    }

    // ── Composition ─────────────────────────────────────────────────────

    /// Instantiate the finalized operator `sub` as `inst_name`, sampling its
    /// inputs at the current cycle. Bound outputs become new signals valid
    /// at the current cycle plus the sub-operator's depth, and their output
    /// delays become arrival floors of that cycle.
    pub fn instantiate(
        &mut self,
        ctx: &GenerationContext,
        sub: OperatorHandle,
        inst_name: &str,
        ports: &PortMap,
    ) -> GenResult<()> {
        let call = format!("instantiate({:?})", inst_name);
        self.ensure_open(&call)?;
        if self.instances.iter().any(|i| i.name == inst_name) {
            return Err(self.error(
                &call,
                ScheduleError::DuplicateInstance {
                    name: inst_name.to_string(),
                },
            ));
        }
        let lookup = if sub == self.handle {
            Err(ScheduleError::UnfinalizedSubOperator {
                name: self.name.clone(),
            })
        } else {
            ctx.interface(sub)
        };
        let interface = lookup.map_err(|kind| self.error(&call, kind))?;
        check_port_map(&interface, ports).map_err(|kind| self.error(&call, kind))?;

        let id = next_index("instance", self.instances.len())
            .map(InstanceId)
            .map_err(|kind| self.error(&call, kind))?;
        let input_cycle = self.cursor.cycle();
        let output_cycle = input_cycle.checked_add(interface.depth).ok_or_else(|| {
            self.error(
                &call,
                ScheduleError::CycleOverflow {
                    cycle: input_cycle,
                    offset: interface.depth,
                },
            )
        })?;
        let mut inputs = Vec::with_capacity(interface.inputs.len());
        for formal in &interface.inputs {
            let source = ports
                .inputs()
                .iter()
                .find(|(f, _)| *f == formal.name)
                .map(|(_, src)| src);
            let actual = match source {
                Some(InputSource::Signal(name)) => {
                    let found = self
                        .signals
                        .lookup(name)
                        .map_err(|kind| self.error(&call, kind))?
                        .width;
                    if found.bits() != formal.width.bits() {
                        return Err(self.error(
                            &call,
                            ScheduleError::WidthMismatch {
                                formal: formal.name.clone(),
                                actual: name.clone(),
                                expected: formal.width.bits(),
                                found: found.bits(),
                            },
                        ));
                    }
                    Actual::Signal(self.resolve_readable(name, input_cycle, &call)?)
                }
                Some(InputSource::Constant(value)) => Actual::Constant(value.clone()),
                None => {
                    return Err(self.error(
                        &call,
                        ScheduleError::UnboundPort {
                            operator: interface.name.clone(),
                            formal: formal.name.clone(),
                        },
                    ))
                }
            };
            inputs.push((formal.name.clone(), actual));
        }

        let mut outputs = Vec::with_capacity(interface.outputs.len());
        for formal in &interface.outputs {
            let bound = ports
                .outputs()
                .iter()
                .find(|(f, _)| *f == formal.name)
                .map(|(_, actual)| actual);
            let signal = match bound {
                Some(actual) => {
                    let decl = SignalDecl {
                        name: actual.clone(),
                        role: SignalRole::Internal,
                        mode: RegisterMode::Combinational,
                        width: formal.width,
                        cycle: output_cycle,
                        driver: Driver::Instance {
                            instance: id,
                            formal: formal.name.clone(),
                        },
                    };
                    let signal = self
                        .signals
                        .declare(decl)
                        .map_err(|kind| self.error(&call, kind))?;
                    self.cursor
                        .add_arrival(output_cycle, formal.delay)
                        .map_err(|kind| self.error(&call, kind))?;
                    Some(signal)
                }
                None => None,
            };
            outputs.push((formal.name.clone(), signal));
        }

        debug!(
            "{}: instance {} of {} at cycle {}, outputs at cycle {}",
            self.name, inst_name, interface.name, input_cycle, output_cycle
        );
        self.instances.push(Instance {
            id,
            name: inst_name.to_string(),
            sub,
            interface,
            input_cycle,
            output_cycle,
            inputs,
            outputs,
        });
        Ok(())
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    pub(crate) fn ensure_open(&self, call: &str) -> GenResult<()> {
        match self.state {
            OperatorState::Open => Ok(()),
            OperatorState::Finalized(_) => Err(self.error(
                call,
                ScheduleError::OperatorClosed {
                    operator: self.name.clone(),
                },
            )),
        }
    }

    pub(crate) fn error(&self, call: &str, kind: ScheduleError) -> GenerationError {
        GenerationError::new(self.name.clone(), call, kind)
    }
}

/// Check that a port map names only existing formals, binds each once and
/// leaves no input unbound.
fn check_port_map(interface: &Interface, ports: &PortMap) -> Result<(), ScheduleError> {
    let mut seen = HashSet::new();
    for (formal, _) in ports.inputs() {
        if interface.input(formal).is_none() {
            return Err(ScheduleError::UnknownPort {
                operator: interface.name.clone(),
                direction: PortDirection::Input,
                formal: formal.clone(),
            });
        }
        if !seen.insert(formal.as_str()) {
            return Err(ScheduleError::PortAlreadyBound {
                formal: formal.clone(),
            });
        }
    }
    for (formal, _) in ports.outputs() {
        if interface.output(formal).is_none() {
            return Err(ScheduleError::UnknownPort {
                operator: interface.name.clone(),
                direction: PortDirection::Output,
                formal: formal.clone(),
            });
        }
        if !seen.insert(formal.as_str()) {
            return Err(ScheduleError::PortAlreadyBound {
                formal: formal.clone(),
            });
        }
    }
    for formal in &interface.inputs {
        if !seen.contains(formal.name.as_str()) {
            return Err(ScheduleError::UnboundPort {
                operator: interface.name.clone(),
                formal: formal.name.clone(),
            });
        }
    }
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────────────
