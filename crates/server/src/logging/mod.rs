//! Structured logging helpers.

pub mod wide_events;
