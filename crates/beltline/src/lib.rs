//! # Beltline
//!
//! The simulation crate: game systems, phase-ordered dispatch and the
//! tick loop, built on `beltline_core`.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          GameLoop                                │
//! │                                                                  │
//! │   World ──signals──> SystemManager ──TickContext──> GameSystem   │
//! │     │                     │                            │         │
//! │     └──signals──> ActivityTracker <───ReportSender─────┘         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `system`: the `GameSystem` trait and update phases
//! - `system_manager`: per-system registries and dispatch
//! - `tick`: fixed-timestep pacing
//! - `game_loop`: ownership and per-tick orchestration

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod game_loop;
pub mod system;
pub mod system_manager;
pub mod tick;

pub use beltline_core as core;

pub use game_loop::{GameLoop, TickStats, TickStatsAccumulator};
pub use system::{GameSystem, SystemError, SystemPhase, SystemResult, TickContext};
pub use system_manager::{DispatchStats, SystemManager};
pub use tick::{TickClock, TickTimings};
