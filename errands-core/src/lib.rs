//! Errands Core
//!
//! Core types shared by the errands client, processor and CLI.
//!
//! This crate contains:
//! - Domain types: errands as the queue service stores them
//! - DTOs: request and response envelopes exchanged with the service

pub mod domain;
pub mod dto;
