// signal.rs — Signals and the per-operator signal table
//
// A signal is a named value produced exactly once in an operator's dataflow
// description. The table allocates signals in declaration order, rejects
// duplicate names and answers lookups; it never reorders or merges entries.
//
// Preconditions: none.
// Postconditions: every allocated signal keeps its id, name and cycle forever.
// Failure modes: DuplicateSignal on re-declaration, UnknownSignal on lookup miss.
// Side effects: none.

use std::collections::HashMap;
use std::fmt;

use crate::diag::ScheduleError;
use crate::id::{next_index, InstanceId, SignalId};

// ── Widths ──────────────────────────────────────────────────────────────────

/// Bit width of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    /// Plain bit vector.
    Bits(u32),
    /// Floating-point word: 2 exception bits, 1 sign bit, `we` exponent bits
    /// and `wf` fraction bits, most significant first.
    Float { we: u32, wf: u32 },
}

/// Sub-field of a floating-point word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpField {
    Exception,
    Sign,
    Exponent,
    Fraction,
}

impl FpField {
    pub fn name(self) -> &'static str {
        match self {
            FpField::Exception => "exception",
            FpField::Sign => "sign",
            FpField::Exponent => "exponent",
            FpField::Fraction => "fraction",
        }
    }
}

impl Width {
    /// Total number of bits.
    pub fn bits(self) -> u32 {
        match self {
            Width::Bits(n) => n,
            Width::Float { we, wf } => 3 + we + wf,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Width::Float { .. })
    }

    /// Inclusive `(high, low)` bit range of a floating-point field, or `None`
    /// for plain bit vectors.
    pub fn field_range(self, field: FpField) -> Option<(u32, u32)> {
        let Width::Float { we, wf } = self else {
            return None;
        };
        Some(match field {
            FpField::Exception => (we + wf + 2, we + wf + 1),
            FpField::Sign => (we + wf, we + wf),
            FpField::Exponent => ((we + wf).saturating_sub(1), wf),
            FpField::Fraction => (wf.saturating_sub(1), 0),
        })
    }
}

impl From<u32> for Width {
    fn from(bits: u32) -> Self {
        Width::Bits(bits)
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Width::Bits(n) => write!(f, "{}", n),
            Width::Float { we, wf } => write!(f, "fp({},{})", we, wf),
        }
    }
}

// ── Signal attributes ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalRole {
    Input,
    Output,
    Internal,
}

/// How the registers materialized for a signal are clocked.
///
/// A base signal is always driven combinationally; its mode selects the
/// flavor of the delay-chain stages created for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegisterMode {
    Combinational,
    Registered,
    RegisteredAsyncReset,
    RegisteredSyncReset,
}

impl RegisterMode {
    /// Mode of a delay stage created from a signal with this mode.
    pub fn stage_mode(self) -> RegisterMode {
        match self {
            RegisterMode::Combinational | RegisterMode::Registered => RegisterMode::Registered,
            other => other,
        }
    }

    pub fn is_registered(self) -> bool {
        !matches!(self, RegisterMode::Combinational)
    }
}

/// What produces a signal's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Driver {
    /// Primary input port.
    Port,
    /// Opaque defining expression, emitted verbatim.
    Expr(String),
    /// Formal output of a sub-operator instance.
    Instance { instance: InstanceId, formal: String },
    /// Stage `depth` (1-based) of the delay chain of `base`.
    Stage { base: SignalId, depth: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub id: SignalId,
    pub name: String,
    pub role: SignalRole,
    pub mode: RegisterMode,
    pub width: Width,
    /// Cycle at which the value becomes valid. Never changes.
    pub cycle: u32,
    pub driver: Driver,
}

impl Signal {
    pub fn is_stage(&self) -> bool {
        matches!(self.driver, Driver::Stage { .. })
    }
}

/// Parameters of a new signal, minus its id.
#[derive(Debug, Clone)]
pub struct SignalDecl {
    pub name: String,
    pub role: SignalRole,
    pub mode: RegisterMode,
    pub width: Width,
    pub cycle: u32,
    pub driver: Driver,
}

// ── Signal table ────────────────────────────────────────────────────────────

/// Declaration-ordered arena of an operator's signals.
#[derive(Debug, Default, Clone)]
pub struct SignalTable {
    signals: Vec<Signal>,
    by_name: HashMap<String, SignalId>,
}

impl SignalTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a signal. Fails if the name is already taken.
    pub fn declare(&mut self, decl: SignalDecl) -> Result<SignalId, ScheduleError> {
        if self.by_name.contains_key(&decl.name) {
            return Err(ScheduleError::DuplicateSignal { name: decl.name });
        }
        let id = SignalId(next_index("signal", self.signals.len())?);
        self.by_name.insert(decl.name.clone(), id);
        self.signals.push(Signal {
            id,
            name: decl.name,
            role: decl.role,
            mode: decl.mode,
            width: decl.width,
            cycle: decl.cycle,
            driver: decl.driver,
        });
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Result<&Signal, ScheduleError> {
        self.by_name
            .get(name)
            .map(|id| &self.signals[id.index()])
            .ok_or_else(|| ScheduleError::UnknownSignal {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Signal by id. Ids are only minted by this table, so the index is valid.
    pub fn get(&self, id: SignalId) -> &Signal {
        &self.signals[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
