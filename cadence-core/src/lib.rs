//! Board-agnostic runtime core for the Cadence handheld
//!
//! This crate contains everything between the hardware traits and the
//! applications:
//!
//! - Interrupt-driven I2C transaction queue
//! - Frame scheduler running the update/tick/wait/draw/render cycle
//! - Application lifecycle state machine
//! - FPS and per-phase timing
//! - Runtime configuration types

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

mod fmt;

pub mod app;
pub mod bus;
pub mod config;
pub mod state;
pub mod timing;
