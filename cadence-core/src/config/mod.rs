//! Configuration types
//!
//! Board-agnostic runtime configuration. Capacities that size static
//! storage are compile-time constants; everything else is a plain
//! `Copy` struct with defaults matching the reference hardware.

pub mod types;

pub use types::*;
