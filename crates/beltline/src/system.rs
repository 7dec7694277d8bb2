//! # Game Systems
//!
//! A system is one per-kind update routine (belts, miners, ejectors, ...).
//! Variants implement [`GameSystem`] and are chosen when the simulation is
//! composed; the dispatcher only sees the trait.
//!
//! ## Contract
//!
//! - `signature` declares which entities the system is interested in; the
//!   dispatcher keeps a filtered registry for it and calls `on_register` /
//!   `on_unregister` as membership changes
//! - `update` runs once per tick with read-only access to the world and
//!   the activity tracker; state changes go out through `ctx.reports`
//! - `parallel_safe` systems may share their phase with other parallel
//!   systems on the rayon pool

use beltline_core::{
    ActivityTracker, ComponentKind, ComponentMask, EntityId, ReportSender, Signature, World,
};
use thiserror::Error;

/// Fixed update order. Acceptors see the previous tick's ejector output
/// before belts advance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SystemPhase {
    /// Item acceptors.
    ItemAcceptor,
    /// Belts and belt paths.
    Belt,
    /// Miners.
    Miner,
    /// Storages.
    Storage,
    /// Item processors.
    ItemProcessor,
    /// Item ejectors.
    ItemEjector,
    /// Map and aggregate systems.
    Map,
    /// Wires and logic.
    Wiring,
}

impl SystemPhase {
    /// Every phase, in execution order.
    pub const ORDER: [Self; 8] = [
        Self::ItemAcceptor,
        Self::Belt,
        Self::Miner,
        Self::Storage,
        Self::ItemProcessor,
        Self::ItemEjector,
        Self::Map,
        Self::Wiring,
    ];
}

/// Errors a system can return from `update`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SystemError {
    /// An entity the system processes is in a state it cannot handle.
    #[error("entity {entity} in unexpected state: {reason}")]
    InvalidState {
        /// The offending entity.
        entity: EntityId,
        /// What was wrong.
        reason: String,
    },

    /// Generic failure.
    #[error("{0}")]
    Failed(String),

    /// The update panicked; the payload message if it was a string.
    #[error("system panicked: {0}")]
    Panicked(String),
}

/// Result type for system updates.
pub type SystemResult = Result<(), SystemError>;

/// Everything a system may look at during its update.
pub struct TickContext<'a> {
    /// Current frame number.
    pub frame: u64,
    /// The world, read-only.
    pub world: &'a World,
    /// Entities matching the system's signature, in slot order.
    pub matched: &'a [EntityId],
    /// Activity state as of the start of this tick.
    pub activity: &'a ActivityTracker,
    /// Outbound state changes, applied at the start of the next tick.
    pub reports: &'a ReportSender,
}

impl TickContext<'_> {
    /// Active entities of `kind`. Falls back to nothing for untracked kinds.
    #[inline]
    #[must_use]
    pub fn active(&self, kind: ComponentKind) -> &[EntityId] {
        self.activity.active_entities(kind)
    }
}

/// A per-tick update routine.
pub trait GameSystem: Send {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Phase the system runs in.
    fn phase(&self) -> SystemPhase;

    /// Required components, or `None` for systems that filter nothing.
    fn signature(&self) -> Option<Signature> {
        None
    }

    /// Whether the system may run concurrently with others of its phase.
    fn parallel_safe(&self) -> bool {
        false
    }

    /// Whether an entity with `components` belongs to this system.
    fn matches(&self, components: ComponentMask) -> bool {
        self.signature().map_or(true, |signature| signature.matches(components))
    }

    /// Called when an entity starts matching.
    fn on_register(&mut self, _entity: EntityId) {}

    /// Called when an entity stops matching or is destroyed.
    fn on_unregister(&mut self, _entity: EntityId) {}

    /// Runs one tick.
    ///
    /// # Errors
    ///
    /// Errors are logged by the dispatcher; they never stop the tick.
    fn update(&mut self, ctx: &TickContext<'_>) -> SystemResult;
}
