// config.rs — Generation configuration: clock, pipelining and device delays
//
// Loaded from a JSON file (every field optional, unknown keys rejected) and
// then overridden from the command line. The value is threaded through the
// GenerationContext; nothing reads configuration from globals.
//
// Preconditions: none.
// Postconditions: a `GenerationConfig` returned by `load`/`validate` has a
//                 positive frequency and positive, finite delays.
// Failure modes: ConfigError::{Io, Parse, Invalid}.
// Side effects: `load` reads one file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Primitive delays of the target device, in nanoseconds.
///
/// Defaults approximate a Virtex-5 class FPGA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetParams {
    pub lut_delay_ns: f64,
    /// Fixed part of a ripple-carry adder (LUT, carry entry and exit).
    pub adder_base_ns: f64,
    /// Per-bit carry propagation.
    pub carry_per_bit_ns: f64,
    pub local_wire_delay_ns: f64,
    /// Extra wire delay per doubling of fanout.
    pub fanout_delay_ns: f64,
    pub lut_inputs: u32,
}

impl Default for TargetParams {
    fn default() -> Self {
        Self {
            lut_delay_ns: 0.086,
            adder_base_ns: 0.691,
            carry_per_bit_ns: 0.023,
            local_wire_delay_ns: 0.436,
            fanout_delay_ns: 0.1,
            lut_inputs: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    pub frequency_mhz: f64,
    /// When false, operators are purely combinational unless the client
    /// inserts explicit cycle boundaries.
    pub pipelined: bool,
    pub target: TargetParams,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            frequency_mhz: 400.0,
            pipelined: true,
            target: TargetParams::default(),
        }
    }
}

impl GenerationConfig {
    /// Read and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: GenerationConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.frequency_mhz.is_finite() && self.frequency_mhz > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "frequency_mhz must be positive, got {}",
                self.frequency_mhz
            )));
        }
        let t = &self.target;
        let delays = [
            ("lut_delay_ns", t.lut_delay_ns),
            ("adder_base_ns", t.adder_base_ns),
            ("carry_per_bit_ns", t.carry_per_bit_ns),
            ("local_wire_delay_ns", t.local_wire_delay_ns),
            ("fanout_delay_ns", t.fanout_delay_ns),
        ];
        for (name, value) in delays {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "target.{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if t.lut_inputs < 2 {
            return Err(ConfigError::Invalid(format!(
                "target.lut_inputs must be at least 2, got {}",
                t.lut_inputs
            )));
        }
        Ok(())
    }

    /// Clock period in nanoseconds.
    pub fn period_ns(&self) -> f64 {
        1000.0 / self.frequency_mhz
    }
}
