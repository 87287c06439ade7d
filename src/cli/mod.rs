//! Handles Command Line Interface (CLI) related functionalities.
//!
//! Includes the clap command definitions and dispatch (`commands`) and the per-invocation
//! identity resolution with its interactive onboarding prompt (`onboard`).

mod commands;
pub mod onboard;

pub use commands::*;
