// id.rs — Arena indices for operators, signals and instances
//
// Every operator lives in the GenerationContext arena and every signal or
// instance lives in its owning operator's tables. Cross references are plain
// indices allocated in declaration order, never pointers, so the whole run is
// deterministic and trivially movable.

use std::fmt;

use crate::diag::ScheduleError;

/// Index of an operator in the generation arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperatorHandle(pub u32);

/// Index of a signal inside its owning operator's signal table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(pub u32);

/// Index of a sub-operator instance inside its parent operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u32);

impl OperatorHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl SignalId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl InstanceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for OperatorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sig#{}", self.0)
    }
}

/// Converts an arena length into the next index. Fails once the `u32` index
/// space is used up; indices are never reused or aliased.
pub(crate) fn next_index(arena: &'static str, len: usize) -> Result<u32, ScheduleError> {
    u32::try_from(len).map_err(|_| ScheduleError::ArenaExhausted { arena, len })
}
