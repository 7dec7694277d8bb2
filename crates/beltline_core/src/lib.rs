//! # Beltline Core
//!
//! Entity-activity tracking for a tile-based factory simulation:
//! - Component-filtered entity registries kept consistent against
//!   lifecycle signals and bulk edits
//! - Per-kind activity containers so idle machines cost nothing per tick
//! - A dependency graph that wakes blocked entities when their blocker
//!   changes and idles the ones that stay blocked
//!
//! ## Data Flow
//!
//! ```text
//! World ──signals──> FilteredRegistry ──membership──> ActivityContainer
//!                                                        ^
//! systems ──reports──> DependencyGraph ──wake / idle─────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use beltline_core::{ActivityConfig, ActivityTracker, ComponentKind, World};
//!
//! let mut world = World::new(1024);
//! let mut tracker = ActivityTracker::new(ActivityConfig::default(), &world);
//!
//! let acceptor = world.spawn(&[ComponentKind::ItemAcceptor]);
//! tracker.update(&world);
//! assert_eq!(tracker.active_entities(ComponentKind::ItemAcceptor), &[acceptor]);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod activity;
pub mod config;
pub mod ecs;
pub mod error;
pub mod filter;
pub mod signal;

pub use activity::{
    ActivityContainer, ActivityStats, ActivityTracker, AggregateId, DependencyGraph, DrainStats,
    Report, ReportSender, Subject,
};
pub use config::{ActivityConfig, DispatchConfig, SimulationConfig};
pub use ecs::{
    ComponentKind, ComponentMask, EntityId, EntityRecord, Handle, HandleSet, Signature, World,
};
pub use error::{CoreError, CoreResult};
pub use filter::{FilteredRegistry, MembershipChange, MembershipObserver, PumpStats};
pub use signal::{Signal, SignalBus, SignalSubscription};
