//! Eczacı AI client core
//!
//! Session management with two persistence tiers and a single-flight chat
//! conversation against the Eczacı AI answering service.

pub mod app;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod messages;
pub mod runtime;
pub mod state_machine;
pub mod storage;
