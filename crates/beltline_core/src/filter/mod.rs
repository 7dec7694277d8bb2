//! # Filtered Registries
//!
//! Signature-filtered entity sets driven by lifecycle signals.

mod registry;

pub use registry::{FilteredRegistry, MembershipChange, MembershipObserver, PumpStats};
