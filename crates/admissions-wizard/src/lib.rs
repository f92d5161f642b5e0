//! Registration wizard core for the admissions mobile client.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
