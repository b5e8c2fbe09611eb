//! Domain layer containing event types and shared primitives.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (events, correlation, timestamps, errors)
//! - `agent` - Events published by the agent workflow

pub mod agent;
pub mod foundation;
