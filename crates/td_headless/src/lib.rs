//! Headless lane-defense runner for controllers and CI verification.
//!
//! This crate runs the simulation without graphics:
//!
//! - **Play sessions**: a controller drives one game via JSON commands on
//!   stdin, with responses and events on stdout
//! - **Advisor bridge**: the opponent's round plan comes from an external
//!   program, with the local fallback wave when it fails
//! - **Batch runs**: many unattended games in parallel for balance testing
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from controller (place, enqueue, tick, etc.)
//! - **stdout**: Responses and events (JSON)
//! - **stderr**: Debug logs (human-readable)
//!
//! See the [`protocol`] module for the full command and response formats.
//!
//! # Example
//!
//! ```bash
//! # Run interactively
//! echo '{"cmd":"state"}' | cargo run -p td_headless -- play
//!
//! # Run a batch
//! cargo run -p td_headless -- batch --count 200
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod advisor;
pub mod batch;
pub mod clock;
pub mod game_runner;
pub mod protocol;
pub mod rules_loader;
pub mod session;
pub mod store;
