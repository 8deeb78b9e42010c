// delay.rs — Delay-chain resolver: aligns a value with a later consuming cycle
//
// Consuming a signal declared at cycle d from cycle c > d needs c - d
// pass-through registers. Stages are shared per root signal: stage k of root
// `x` is named `x_d<k>`, valid at cycle d + k, forwards stage k - 1 (or `x`
// itself) and is created once, on the first request that reaches it. Requests
// for a stage signal are redirected to its root so stages never nest.
//
// Preconditions: `base` was allocated by the same `SignalTable`.
// Postconditions: for a root declared at d, exactly max(c) - d stages exist,
//                 where max(c) ranges over every cycle it was requested at.
// Failure modes: BackwardReference when c < d; DuplicateSignal when a stage
//                name is already taken by a user signal.
// Side effects: allocates stage signals in the table; logs stage creation.

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::diag::ScheduleError;
use crate::id::SignalId;
use crate::signal::{Driver, SignalDecl, SignalRole, SignalTable};

/// Memoized delay stages of an operator.
#[derive(Debug, Default, Clone)]
pub struct DelayChains {
    /// Root signal -> stages 1..=n, in order.
    stages: HashMap<SignalId, Vec<SignalId>>,
    /// (root, target cycle) -> signal answering that request.
    memo: BTreeMap<(SignalId, u32), SignalId>,
    /// Name stem used for stages of a root, when it differs from its name.
    stems: HashMap<SignalId, String>,
}

impl DelayChains {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the stages of `root` `<stem>_d<k>` instead of `<root>_d<k>`.
    pub fn set_stem(&mut self, root: SignalId, stem: impl Into<String>) {
        self.stems.insert(root, stem.into());
    }

    /// Stages created so far for `root`, shallowest first.
    pub fn stages(&self, root: SignalId) -> &[SignalId] {
        self.stages.get(&root).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The chain answering a request for `root` at `cycle`, if one was made.
    pub fn chain(&self, table: &SignalTable, root: SignalId, cycle: u32) -> Option<&[SignalId]> {
        self.memo.get(&(root, cycle))?;
        let gap = cycle.checked_sub(table.get(root).cycle)? as usize;
        self.stages(root).get(..gap)
    }

    /// Every (root, target cycle) pair requested so far, in order.
    pub fn requests(&self) -> impl Iterator<Item = (SignalId, u32)> + '_ {
        self.memo.keys().copied()
    }

    /// Total number of stage registers.
    pub fn register_count(&self) -> usize {
        self.stages.values().map(Vec::len).sum()
    }

    /// Return the signal carrying `id`'s value at `cycle`, creating missing
    /// stages on the way.
    pub fn resolve(
        &mut self,
        table: &mut SignalTable,
        id: SignalId,
        cycle: u32,
    ) -> Result<SignalId, ScheduleError> {
        let sig = table.get(id);
        if cycle < sig.cycle {
            return Err(ScheduleError::BackwardReference {
                name: sig.name.clone(),
                declared: sig.cycle,
                requested: cycle,
            });
        }
        if cycle == sig.cycle {
            return Ok(id);
        }
        let root = match sig.driver {
            Driver::Stage { base, .. } => base,
            _ => id,
        };
        if let Some(&hit) = self.memo.get(&(root, cycle)) {
            return Ok(hit);
        }

        let base = table.get(root).clone();
        let gap = cycle - base.cycle;
        let stem = self
            .stems
            .get(&root)
            .cloned()
            .unwrap_or_else(|| base.name.clone());
        let have = self.stages(root).len() as u32;
        for depth in have + 1..=gap {
            let stage = table.declare(SignalDecl {
                name: format!("{}_d{}", stem, depth),
                role: SignalRole::Internal,
                mode: base.mode.stage_mode(),
                width: base.width,
                cycle: base.cycle + depth,
                driver: Driver::Stage { base: root, depth },
            })?;
            debug!(
                "delay stage {}_d{} for '{}' (cycle {})",
                stem,
                depth,
                base.name,
                base.cycle + depth
            );
            self.stages.entry(root).or_default().push(stage);
        }

        let hit = self.stages(root)[gap as usize - 1];
        self.memo.insert((root, cycle), hit);
        Ok(hit)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{RegisterMode, Width};

    fn table_with(name: &str, cycle: u32, mode: RegisterMode) -> (SignalTable, SignalId) {
        let mut table = SignalTable::new();
        let id = table
            .declare(SignalDecl {
                name: name.to_string(),
                role: SignalRole::Internal,
                mode,
                width: Width::Bits(8),
                cycle,
                driver: Driver::Expr("a + b".to_string()),
            })
            .unwrap();
        (table, id)
    }

    #[test]
    fn same_cycle_needs_no_register() {
        let (mut table, x) = table_with("x", 2, RegisterMode::Combinational);
        let mut chains = DelayChains::new();
        assert_eq!(chains.resolve(&mut table, x, 2).unwrap(), x);
        assert_eq!(chains.register_count(), 0);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn gap_creates_exactly_that_many_stages() {
        let (mut table, x) = table_with("x", 1, RegisterMode::Combinational);
        let mut chains = DelayChains::new();
        let last = chains.resolve(&mut table, x, 4).unwrap();
        let sig = table.get(last);
        assert_eq!(sig.name, "x_d3");
        assert_eq!(sig.cycle, 4);
        assert_eq!(sig.mode, RegisterMode::Registered);
        assert_eq!(chains.register_count(), 3);
        let names: Vec<&str> = chains
            .chain(&table, x, 4)
            .unwrap()
            .iter()
            .map(|s| table.get(*s).name.as_str())
            .collect();
        assert_eq!(names, vec!["x_d1", "x_d2", "x_d3"]);
    }

    #[test]
    fn repeated_request_is_memoized() {
        let (mut table, x) = table_with("x", 0, RegisterMode::Combinational);
        let mut chains = DelayChains::new();
        let a = chains.resolve(&mut table, x, 2).unwrap();
        let b = chains.resolve(&mut table, x, 2).unwrap();
        assert_eq!(a, b);
        assert_eq!(chains.register_count(), 2);
    }

    #[test]
    fn shorter_request_reuses_existing_stages() {
        let (mut table, x) = table_with("x", 0, RegisterMode::Combinational);
        let mut chains = DelayChains::new();
        chains.resolve(&mut table, x, 3).unwrap();
        let mid = chains.resolve(&mut table, x, 1).unwrap();
        assert_eq!(table.get(mid).name, "x_d1");
        assert_eq!(chains.register_count(), 3);
        assert_eq!(chains.requests().count(), 2);
    }

    #[test]
    fn stage_requests_redirect_to_root() {
        let (mut table, x) = table_with("x", 0, RegisterMode::Combinational);
        let mut chains = DelayChains::new();
        let d1 = chains.resolve(&mut table, x, 1).unwrap();
        let d2 = chains.resolve(&mut table, d1, 2).unwrap();
        assert_eq!(table.get(d2).name, "x_d2");
        assert!(!table.contains("x_d1_d1"));
    }

    #[test]
    fn backward_request_fails() {
        let (mut table, z) = table_with("z", 1, RegisterMode::Combinational);
        let mut chains = DelayChains::new();
        let err = chains.resolve(&mut table, z, 0).unwrap_err();
        assert_eq!(
            err,
            ScheduleError::BackwardReference {
                name: "z".to_string(),
                declared: 1,
                requested: 0,
            }
        );
    }

    #[test]
    fn reset_flavor_is_inherited_by_stages() {
        let (mut table, x) = table_with("x", 0, RegisterMode::RegisteredAsyncReset);
        let mut chains = DelayChains::new();
        let s = chains.resolve(&mut table, x, 1).unwrap();
        assert_eq!(table.get(s).mode, RegisterMode::RegisteredAsyncReset);
    }

    #[test]
    fn stem_overrides_stage_names() {
        let (mut table, r0) = table_with("R_d0", 0, RegisterMode::Combinational);
        let mut chains = DelayChains::new();
        chains.set_stem(r0, "R");
        let s = chains.resolve(&mut table, r0, 2).unwrap();
        assert_eq!(table.get(s).name, "R_d2");
    }

    #[test]
    fn stage_name_collision_is_reported() {
        let (mut table, x) = table_with("x", 0, RegisterMode::Combinational);
        table
            .declare(SignalDecl {
                name: "x_d1".to_string(),
                role: SignalRole::Internal,
                mode: RegisterMode::Combinational,
                width: Width::Bits(8),
                cycle: 0,
                driver: Driver::Expr("0".to_string()),
            })
            .unwrap();
        let mut chains = DelayChains::new();
        assert!(matches!(
            chains.resolve(&mut table, x, 1),
            Err(ScheduleError::DuplicateSignal { .. })
        ));
    }
}
