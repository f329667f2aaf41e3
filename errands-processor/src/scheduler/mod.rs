//! Scheduler layer for the processor
//!
//! This layer decides when to ask the errands service for work and hands
//! each claimed errand to exactly one idle worker. It owns the control loop,
//! the fixed set of workers, and their lifecycle.

mod backoff;
pub mod processor;
mod worker;

pub use processor::Processor;
