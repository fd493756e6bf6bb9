// src/exec/mod.rs

//! Process execution layer.
//!
//! Runs admitted commands with `tokio::process::Command`: interpolated
//! argv, event environment variables, and the declaring user's credentials.
//! Admission enforces the concurrency cap and the per-rule self-trigger
//! interlock.

pub mod executor;

pub use executor::Executor;
