//! # Stakelock Library
//!
//! This library exposes the Stakelock host modules for testing and integration.
//!
//! The binary uses these modules through the `main.rs` entry point.

pub mod cli;

// Re-export stakelock_core for convenience
pub use stakelock_core;
