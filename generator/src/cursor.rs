// cursor.rs — Schedule cursor: current cycle and critical-path bookkeeping
//
// The cursor is the single mutable scheduling state of an operator. Explicit
// cuts come from the client; implicit cuts come from `accrue`, which splits any
// run of combinational work that would exceed the clock period. This is the
// automatic-retiming trigger.
//
// Carry-over policy: when `accrue(d)` forces a cut, the full delay `d` is
// charged to the new cycle. A delay longer than the whole period can never be
// placed and fails with UnreachableTiming.
//
// Arrival floors: a sub-operator output lands in its cycle `delay` ns after
// the clock edge. `add_arrival` records that as a floor for the cycle, and the
// critical path never drops below it however the cursor gets there (join,
// jump, set_cycle, advance or an implicit cut). The floor is charged whether
// or not the value is read in that cycle.
//
// Preconditions: `period` is positive and finite (validated by config).
// Postconditions: the critical path of any cycle never exceeds `period` when
//                 the target is pipelined.
// Failure modes: UnreachableTiming, CycleOverflow.
// Side effects: none.

use std::collections::BTreeMap;

use crate::diag::ScheduleError;

/// What `accrue` did with a delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accrual {
    /// The delay fit in the current cycle.
    Fitted,
    /// A register boundary was inserted first; the delay opens the new cycle.
    Cut,
}

#[derive(Debug, Clone)]
pub struct ScheduleCursor {
    cycle: u32,
    critical_path: f64,
    period: f64,
    pipelined: bool,
    /// Highest critical path observed in each cycle, for reporting and checks.
    peaks: BTreeMap<u32, f64>,
    /// Latest arrival of a sub-operator output, per cycle.
    floors: BTreeMap<u32, f64>,
}

impl ScheduleCursor {
    pub fn new(period: f64, pipelined: bool) -> Self {
        Self {
            cycle: 0,
            critical_path: 0.0,
            period,
            pipelined,
            peaks: BTreeMap::new(),
            floors: BTreeMap::new(),
        }
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    pub fn critical_path(&self) -> f64 {
        self.critical_path
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn is_pipelined(&self) -> bool {
        self.pipelined
    }

    /// Peak critical path recorded per cycle.
    pub fn peaks(&self) -> &BTreeMap<u32, f64> {
        &self.peaks
    }

    /// Arrival floor of `cycle`, 0 when nothing arrives late in it.
    pub fn floor(&self, cycle: u32) -> f64 {
        self.floors.get(&cycle).copied().unwrap_or(0.0)
    }

    /// Move to cycle `n`; the critical path restarts at the cycle's floor.
    pub fn set_cycle(&mut self, n: u32) {
        self.cycle = n;
        self.critical_path = self.floor(n);
        if self.critical_path > 0.0 {
            self.record_peak();
        }
    }

    /// Explicit pipeline boundary, taken unconditionally.
    pub fn advance_cycle(&mut self) -> Result<(), ScheduleError> {
        let next = self
            .cycle
            .checked_add(1)
            .ok_or(ScheduleError::CycleOverflow {
                cycle: self.cycle,
                offset: 1,
            })?;
        self.set_cycle(next);
        Ok(())
    }

    /// Record a value that becomes valid `arrival` ns into `cycle`. Work
    /// scheduled in that cycle starts no earlier than the arrival.
    pub fn add_arrival(&mut self, cycle: u32, arrival: f64) -> Result<(), ScheduleError> {
        if !arrival.is_finite() || arrival < 0.0 || (self.pipelined && arrival > self.period) {
            return Err(self.unreachable(arrival));
        }
        let floor = self.floors.entry(cycle).or_insert(0.0);
        if arrival > *floor {
            *floor = arrival;
        }
        if cycle == self.cycle && arrival > self.critical_path {
            self.critical_path = arrival;
            self.record_peak();
        }
        Ok(())
    }

    /// Move to `cycle`, keeping the critical path if the cycle is unchanged.
    pub fn jump_to(&mut self, cycle: u32) {
        if cycle != self.cycle {
            self.set_cycle(cycle);
        }
    }

    /// Move forward to `cycle` if it is later; never moves backward.
    pub fn join(&mut self, cycle: u32) {
        if cycle > self.cycle {
            self.set_cycle(cycle);
        }
    }

    /// Account `delay` of combinational work, cutting first if it would not
    /// fit in what remains of the current cycle.
    pub fn accrue(&mut self, delay: f64) -> Result<Accrual, ScheduleError> {
        if !delay.is_finite() || delay < 0.0 {
            return Err(self.unreachable(delay));
        }
        if !self.pipelined {
            self.critical_path += delay;
            self.record_peak();
            return Ok(Accrual::Fitted);
        }
        if delay > self.period {
            return Err(self.unreachable(delay));
        }
        if self.critical_path + delay > self.period {
            // Skip cycles whose arrival floor leaves no room for `delay`.
            let mut next = self.cycle;
            loop {
                next = next.checked_add(1).ok_or(ScheduleError::CycleOverflow {
                    cycle: next,
                    offset: 1,
                })?;
                if self.floor(next) + delay <= self.period {
                    break;
                }
            }
            self.set_cycle(next);
            self.critical_path += delay;
            self.record_peak();
            return Ok(Accrual::Cut);
        }
        self.critical_path += delay;
        self.record_peak();
        Ok(Accrual::Fitted)
    }

    /// Override the critical path of the current cycle. It is never set below
    /// the cycle's arrival floor.
    pub fn set_critical_path(&mut self, delay: f64) -> Result<(), ScheduleError> {
        if !delay.is_finite() || delay < 0.0 || (self.pipelined && delay > self.period) {
            return Err(self.unreachable(delay));
        }
        self.critical_path = delay.max(self.floor(self.cycle));
        self.record_peak();
        Ok(())
    }

    fn record_peak(&mut self) {
        let peak = self.peaks.entry(self.cycle).or_insert(0.0);
        if self.critical_path > *peak {
            *peak = self.critical_path;
        }
    }

    fn unreachable(&self, delay: f64) -> ScheduleError {
        ScheduleError::UnreachableTiming {
            delay,
            period: self.period,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
