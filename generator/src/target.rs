// target.rs — Timing model of the target device
//
// Operator kinds never hard-code delays: they ask the target how long a
// primitive takes and feed the answer to `Operator::accrue`. The engine only
// reads the clock period and whether pipelining is enabled.

use crate::config::{GenerationConfig, TargetParams};

/// Delay-cost model consumed by the scheduler and by operator kinds.
/// All delays are in nanoseconds.
pub trait Target {
    fn frequency_hz(&self) -> f64;

    fn period_ns(&self) -> f64 {
        1e9 / self.frequency_hz()
    }

    /// Whether implicit cuts are allowed.
    fn is_pipelined(&self) -> bool;

    fn lut_delay(&self) -> f64;

    /// Ripple-carry addition of `width` bits.
    fn adder_delay(&self, width: u32) -> f64;

    /// Routing delay of a net driving `fanout` loads.
    fn local_wire_delay(&self, fanout: u32) -> f64;

    fn lut_inputs(&self) -> u32;
}

/// Target built from configuration parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericTarget {
    frequency_mhz: f64,
    pipelined: bool,
    params: TargetParams,
}

impl GenericTarget {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            frequency_mhz: config.frequency_mhz,
            pipelined: config.pipelined,
            params: config.target.clone(),
        }
    }
}

impl Target for GenericTarget {
    fn frequency_hz(&self) -> f64 {
        self.frequency_mhz * 1e6
    }

    fn is_pipelined(&self) -> bool {
        self.pipelined
    }

    fn lut_delay(&self) -> f64 {
        self.params.lut_delay_ns
    }

    fn adder_delay(&self, width: u32) -> f64 {
        self.params.adder_base_ns
            + f64::from(width.saturating_sub(1)) * self.params.carry_per_bit_ns
    }

    fn local_wire_delay(&self, fanout: u32) -> f64 {
        let doublings = if fanout <= 1 {
            0
        } else {
            32 - (fanout - 1).leading_zeros()
        };
        self.params.local_wire_delay_ns + f64::from(doublings) * self.params.fanout_delay_ns
    }

    fn lut_inputs(&self) -> u32 {
        self.params.lut_inputs
    }
}
