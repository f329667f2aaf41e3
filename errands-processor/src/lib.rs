//! Errands Processor
//!
//! A polling worker pool for the errands queue service.
//!
//! Architecture:
//! - Configuration: topic, concurrency, poll interval, handler timeout, fetch backoff
//! - Queue: the three calls the pool needs from the service ([`ErrandQueue`])
//! - Handler: user code that executes one errand ([`Handler`])
//! - Scheduler: the control loop and its fixed set of workers ([`Processor`])
//!
//! The control loop wakes on a fixed interval, and when a worker is idle and
//! the pool is not paused it claims one errand and hands it to that worker.
//! Workers run the handler and report completion or failure back to the
//! service.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use errands_client::ErrandsClient;
//! use errands_processor::{Processor, handler_fn};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Arc::new(ErrandsClient::new("http://localhost:5555"));
//!     let handler = Arc::new(handler_fn(|errand| {
//!         println!("processing {}", errand.id);
//!         Ok(Default::default())
//!     }));
//!
//!     let processor = Processor::new(client, "echo", 2, handler)?;
//!     tokio::signal::ctrl_c().await?;
//!     processor.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod queue;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use config::ProcessorConfig;
pub use error::ProcessorError;
pub use handler::{FnHandler, Handler, handler_fn};
pub use queue::ErrandQueue;
pub use scheduler::Processor;

pub use errands_core::domain::errand::{Errand, ResultMap};
