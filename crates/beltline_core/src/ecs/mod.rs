//! # Entity Layer
//!
//! The minimal entity model the activity core runs against.
//!
//! ## Design Philosophy
//!
//! - Entity IDs are slot indices with generation counters
//! - Entities carry a component mask, never component payloads
//! - Membership sets are bitsets over slots, so iteration order is stable

mod component;
mod entity;
mod handle_set;
mod world;

pub use component::{ComponentKind, ComponentMask, Signature};
pub use entity::{EntityId, EntityRecord};
pub use handle_set::{Handle, HandleIter, HandleSet};
pub use world::World;
