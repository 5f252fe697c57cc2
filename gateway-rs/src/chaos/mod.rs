//! Per-inbox fault injection.
//!
//! Chaos behavior is configured on each inbox and evaluated at the DATA
//! boundary. The engine returns a sum type rather than throwing: `Error`
//! and `Drop` short-circuit as typed errors, `Delay` and `Blackhole` are
//! outcomes the orchestrator applies once the message has otherwise been
//! processed.

pub mod engine;
pub mod greylist;
pub mod types;

pub use engine::{ChaosContext, ChaosEngine};
pub use greylist::{GreylistDecision, GreylistState};
pub use types::{ChaosAction, ChaosConfig, ChaosEntry, ChaosOutcome, ChaosTrigger};
