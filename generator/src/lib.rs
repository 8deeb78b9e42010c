// opgen — pipelined arithmetic-operator generator
//
// Library root. Leaves first: signal table, schedule cursor, delay chains,
// composition, finalizer; then the generation context, emission and the
// demonstration operator kinds.

pub mod config;
pub mod context;
pub mod cursor;
pub mod delay;
pub mod diag;
pub mod emit;
pub mod finalize;
pub mod id;
pub mod instance;
pub mod operator;
pub mod ops;
pub mod signal;
pub mod target;
pub mod timing;
pub mod vir;

pub use config::GenerationConfig;
pub use context::{GenerationContext, Schedulable};
pub use diag::{GenResult, GenerationError, ScheduleError};
pub use emit::Emittable;
pub use instance::PortMap;
pub use operator::Operator;
pub use signal::{FpField, RegisterMode, Width};
