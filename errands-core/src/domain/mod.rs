//! Core domain types
//!
//! These types mirror the records owned by the remote errands service.
//! The client side only ever holds transient copies of them.

pub mod errand;
