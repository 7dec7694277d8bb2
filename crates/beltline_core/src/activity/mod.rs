//! # Activity Tracking
//!
//! Turns "N entities of this kind" into "K <= N entities that actually
//! need work this tick".
//!
//! - [`ActivityContainer`]: active partition with queued transitions
//! - [`DependencyGraph`]: blocker/dependent edges and idle scheduling
//! - [`ActivityTracker`]: one container per tracked kind, fed by filtered
//!   registries, plus the graph and the report queue

mod container;
mod dependency;
mod report;
mod subject;
mod tracker;

pub use container::{ActivityContainer, DrainStats};
pub use dependency::DependencyGraph;
pub use report::{Report, ReportSender};
pub use subject::{AggregateId, Subject};
pub use tracker::{ActivityStats, ActivityTracker};
