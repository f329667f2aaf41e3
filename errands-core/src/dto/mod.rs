//! Data Transfer Objects for talking to the errands service
//!
//! Every response from the service is wrapped in an envelope carrying a
//! `results` field and a textual `status`.

pub mod errand;
pub mod pipeline;
