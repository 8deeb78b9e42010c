// diag.rs — Error kinds and diagnostic codes for operator generation
//
// Every failure of the scheduling engine is one `ScheduleError` kind with a
// stable code. Operator-level entry points wrap the kind into a
// `GenerationError` naming the operator and the call that failed, which is
// what a generation run reports before aborting the batch.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use thiserror::Error;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0101`).
///
/// Once assigned, a code keeps its meaning; new kinds get new codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    // Signal table
    pub const E0101: DiagCode = DiagCode("E0101"); // duplicate signal
    pub const E0102: DiagCode = DiagCode("E0102"); // unknown signal
    pub const E0103: DiagCode = DiagCode("E0103"); // output is write-only
    pub const E0104: DiagCode = DiagCode("E0104"); // field of a non-FP signal

    // Scheduling
    pub const E0201: DiagCode = DiagCode("E0201"); // backward reference
    pub const E0202: DiagCode = DiagCode("E0202"); // unreachable timing
    pub const E0203: DiagCode = DiagCode("E0203"); // operator closed
    pub const E0204: DiagCode = DiagCode("E0204"); // cycle counter overflow

    // Composition
    pub const E0301: DiagCode = DiagCode("E0301"); // unfinalized sub-operator
    pub const E0302: DiagCode = DiagCode("E0302"); // unknown port
    pub const E0303: DiagCode = DiagCode("E0303"); // unbound input port
    pub const E0304: DiagCode = DiagCode("E0304"); // port bound twice
    pub const E0305: DiagCode = DiagCode("E0305"); // width mismatch
    pub const E0306: DiagCode = DiagCode("E0306"); // duplicate instance
    pub const E0307: DiagCode = DiagCode("E0307"); // duplicate operator

    // Capacity
    pub const E0401: DiagCode = DiagCode("E0401"); // arena index space exhausted
}

// ── Error kinds ──────────────────────────────────────────────────────────

/// Direction of a sub-operator port, used in binding errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => write!(f, "input"),
            PortDirection::Output => write!(f, "output"),
        }
    }
}

/// One unrecoverable failure of the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("signal '{name}' is already declared")]
    DuplicateSignal { name: String },

    #[error("signal '{name}' is not declared")]
    UnknownSignal { name: String },

    #[error("signal '{name}' is declared at cycle {declared} but used at cycle {requested}")]
    BackwardReference {
        name: String,
        declared: u32,
        requested: u32,
    },

    #[error("operator '{operator}' is finalized and cannot be modified")]
    OperatorClosed { operator: String },

    #[error("delay {delay}ns cannot fit in a {period}ns clock period")]
    UnreachableTiming { delay: f64, period: f64 },

    #[error("sub-operator '{name}' has no finalized schedule")]
    UnfinalizedSubOperator { name: String },

    #[error("primary output '{name}' is write-only")]
    OutputNotReadable { name: String },

    #[error("signal '{name}' is not floating-point and has no {field} field")]
    InvalidField { name: String, field: &'static str },

    #[error("'{operator}' has no {direction} port '{formal}'")]
    UnknownPort {
        operator: String,
        direction: PortDirection,
        formal: String,
    },

    #[error("input port '{formal}' of '{operator}' is not bound")]
    UnboundPort { operator: String, formal: String },

    #[error("port '{formal}' is bound more than once")]
    PortAlreadyBound { formal: String },

    #[error("port '{formal}' is {expected} bits wide but '{actual}' is {found} bits")]
    WidthMismatch {
        formal: String,
        actual: String,
        expected: u32,
        found: u32,
    },

    #[error("instance '{name}' already exists")]
    DuplicateInstance { name: String },

    #[error("operator '{name}' is already registered")]
    DuplicateOperator { name: String },

    #[error("cycle {cycle} + {offset} does not fit the cycle counter")]
    CycleOverflow { cycle: u32, offset: u32 },

    #[error("no {arena} index left after {len} entries")]
    ArenaExhausted { arena: &'static str, len: usize },
}

impl ScheduleError {
    /// Stable diagnostic code of this kind.
    pub fn code(&self) -> DiagCode {
        match self {
            ScheduleError::DuplicateSignal { .. } => codes::E0101,
            ScheduleError::UnknownSignal { .. } => codes::E0102,
            ScheduleError::OutputNotReadable { .. } => codes::E0103,
            ScheduleError::InvalidField { .. } => codes::E0104,
            ScheduleError::BackwardReference { .. } => codes::E0201,
            ScheduleError::UnreachableTiming { .. } => codes::E0202,
            ScheduleError::OperatorClosed { .. } => codes::E0203,
            ScheduleError::UnfinalizedSubOperator { .. } => codes::E0301,
            ScheduleError::UnknownPort { .. } => codes::E0302,
            ScheduleError::UnboundPort { .. } => codes::E0303,
            ScheduleError::PortAlreadyBound { .. } => codes::E0304,
            ScheduleError::WidthMismatch { .. } => codes::E0305,
            ScheduleError::DuplicateInstance { .. } => codes::E0306,
            ScheduleError::DuplicateOperator { .. } => codes::E0307,
            ScheduleError::CycleOverflow { .. } => codes::E0204,
            ScheduleError::ArenaExhausted { .. } => codes::E0401,
        }
    }
}

// ── Generation error ─────────────────────────────────────────────────────

/// A `ScheduleError` attributed to the operator and call that raised it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("error[{}]: in operator '{operator}', {call}: {kind}", .kind.code())]
pub struct GenerationError {
    pub operator: String,
    pub call: String,
    #[source]
    pub kind: ScheduleError,
}

impl GenerationError {
    pub fn new(operator: impl Into<String>, call: impl Into<String>, kind: ScheduleError) -> Self {
        Self {
            operator: operator.into(),
            call: call.into(),
            kind,
        }
    }

    pub fn code(&self) -> DiagCode {
        self.kind.code()
    }
}

pub type GenResult<T> = Result<T, GenerationError>;
