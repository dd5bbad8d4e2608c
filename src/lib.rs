//! # Match-3 Engine Library
//!
//! This library provides the board engine and cascade orchestration for a
//! match-3 puzzle game: swap two adjacent tokens, clear every run of three or
//! more same-colored tokens, let the rest fall, refill, and repeat until the
//! board settles.
//!
//! It is used by two binaries:
//! - `play`: Interactive gameplay via the command line.
//! - `cascade_sim`: Plays random swaps on many seeded boards and reports
//!   score and cascade statistics.
//!
//! ## Modules
//! - `engine`: Tokens, positions and the `Grid` with all board mechanics
//!   (match detection, clearing, gravity, refill, swapping, generation).
//! - `session`: The `Session` orchestrator that turns selections into timed
//!   swaps, cascades and reversals.
//! - `scheduler`: The `Scheduler` trait and the virtual-clock scheduler the
//!   session paces itself with.
//! - `config`: Session configuration and animation timings.
//! - `error`: Error types.
//! - `utils`: Parsing grids from text, useful for tests and fixtures.

pub mod config;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod session;
pub mod utils;
