//! Runtime glue that wires configuration, progress rendering, telemetry, and
//! the batch executor state machine.

pub mod config;
pub mod executor;
pub mod failure;
pub mod progress;
pub mod telemetry;
