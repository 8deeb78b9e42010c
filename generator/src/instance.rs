// instance.rs — Sub-operator interfaces, port maps and recorded instances
//
// A finalized operator exports an `Interface`: its ports, widths, pipeline
// depth and the delay of each output. A parent describes how to wire one copy
// of it with a `PortMap`, and `Operator::instantiate` turns the pair into an
// `Instance` whose output signals are stamped at input cycle + depth.
//
// Preconditions: none (data only; binding happens in operator.rs).
// Postconditions: an Instance's output cycle is never below its input cycle.
// Failure modes: none.
// Side effects: none.

use crate::id::{InstanceId, OperatorHandle, SignalId};
use crate::signal::Width;

// ── Interface of a finalized operator ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct PortInfo {
    pub name: String,
    pub width: Width,
    /// Combinational delay after the last register, exported to parents.
    /// Always 0 for inputs.
    pub delay: f64,
}

/// What a parent needs to know to instantiate an operator.
#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub name: String,
    pub inputs: Vec<PortInfo>,
    pub outputs: Vec<PortInfo>,
    pub depth: u32,
    /// Whether the module has clock and reset ports.
    pub sequential: bool,
}

impl Interface {
    pub fn input(&self, formal: &str) -> Option<&PortInfo> {
        self.inputs.iter().find(|p| p.name == formal)
    }

    pub fn output(&self, formal: &str) -> Option<&PortInfo> {
        self.outputs.iter().find(|p| p.name == formal)
    }
}

// ── Port maps ───────────────────────────────────────────────────────────────

/// Right-hand side of an input binding, as written by the parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Signal(String),
    /// Verbatim constant text, e.g. `8'd3`.
    Constant(String),
}

/// Formal -> actual bindings for one instantiation.
///
/// ```
/// use opgen::instance::PortMap;
/// let ports = PortMap::new()
///     .input("X", "X0")
///     .constant("Cin", "1'b0")
///     .output("R", "P0");
/// assert_eq!(ports.inputs().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortMap {
    inputs: Vec<(String, InputSource)>,
    outputs: Vec<(String, String)>,
}

impl PortMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind formal input `formal` to the parent signal `actual`.
    pub fn input(mut self, formal: &str, actual: &str) -> Self {
        self.inputs
            .push((formal.to_string(), InputSource::Signal(actual.to_string())));
        self
    }

    /// Tie formal input `formal` to a constant.
    pub fn constant(mut self, formal: &str, value: &str) -> Self {
        self.inputs
            .push((formal.to_string(), InputSource::Constant(value.to_string())));
        self
    }

    /// Bind formal output `formal` to a new parent signal named `actual`.
    pub fn output(mut self, formal: &str, actual: &str) -> Self {
        self.outputs.push((formal.to_string(), actual.to_string()));
        self
    }

    pub fn inputs(&self) -> &[(String, InputSource)] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[(String, String)] {
        &self.outputs
    }
}

// ── Recorded instances ──────────────────────────────────────────────────────

/// A resolved input connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Actual {
    /// Parent signal already aligned to the input cycle.
    Signal(SignalId),
    Constant(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub id: InstanceId,
    pub name: String,
    pub sub: OperatorHandle,
    /// Snapshot of the sub-operator's interface at instantiation.
    pub interface: Interface,
    pub input_cycle: u32,
    /// `input_cycle` plus the sub-operator's depth, checked for overflow when
    /// the instance was created.
    pub output_cycle: u32,
    /// In interface order.
    pub inputs: Vec<(String, Actual)>,
    /// In interface order; `None` leaves the formal open.
    pub outputs: Vec<(String, Option<SignalId>)>,
}

impl Instance {
    /// Cycle at which every output of the instance is valid.
    pub fn output_cycle(&self) -> u32 {
        self.output_cycle
    }
}
