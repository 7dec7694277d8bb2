//! # Component Kinds & Signatures
//!
//! The core never looks at component payloads, only at which kinds an
//! entity holds. Each kind owns one bit of a 64-bit [`ComponentMask`].
//! A [`Signature`] is the list of kinds a filtered registry requires.

use serde::{Deserialize, Serialize};

/// Every component kind known to the simulation.
///
/// The discriminant is the bit position in [`ComponentMask`] and must stay
/// below 64.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ComponentKind {
    /// Accepts items from belts or ejectors.
    ItemAcceptor = 0,
    /// Pushes items into a neighbouring acceptor.
    ItemEjector = 1,
    /// Transforms input items into output items.
    ItemProcessor = 2,
    /// Buffers items.
    Storage = 3,
    /// Tunnel entrance or exit.
    UndergroundBelt = 4,
    /// Single conveyor tile; grouped into belt paths.
    Belt = 5,
    /// Extracts resources from the tile below.
    Miner = 6,
    /// Placement and rotation on the map grid.
    StaticMapEntity = 7,
    /// Delivery target.
    Hub = 8,
    /// Wire connection points.
    WiredPins = 9,
    /// Wire segment.
    Wire = 10,
    /// Player-toggled signal source.
    Lever = 11,
    /// Boolean logic gate.
    LogicGate = 12,
    /// Fixed signal source.
    ConstantSignal = 13,
    /// Signal display.
    Display = 14,
    /// Item filter.
    Filter = 15,
    /// Signal-driven item source.
    ItemProducer = 16,
    /// Belt throughput reader.
    BeltReader = 17,
}

impl ComponentKind {
    /// All kinds, in discriminant order.
    pub const ALL: [Self; 18] = [
        Self::ItemAcceptor,
        Self::ItemEjector,
        Self::ItemProcessor,
        Self::Storage,
        Self::UndergroundBelt,
        Self::Belt,
        Self::Miner,
        Self::StaticMapEntity,
        Self::Hub,
        Self::WiredPins,
        Self::Wire,
        Self::Lever,
        Self::LogicGate,
        Self::ConstantSignal,
        Self::Display,
        Self::Filter,
        Self::ItemProducer,
        Self::BeltReader,
    ];

    /// Bit position of this kind.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Single-bit mask for this kind.
    #[inline]
    #[must_use]
    pub const fn bit(self) -> u64 {
        1u64 << self.id()
    }
}

/// Bitmask of the component kinds an entity holds (up to 64 kinds).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ComponentMask(u64);

impl ComponentMask {
    /// No components.
    pub const EMPTY: Self = Self(0);

    /// Builds a mask from a list of kinds. Duplicates are harmless.
    #[must_use]
    pub const fn from_kinds(kinds: &[ComponentKind]) -> Self {
        let mut bits = 0u64;
        let mut i = 0;
        while i < kinds.len() {
            bits |= kinds[i].bit();
            i += 1;
        }
        Self(bits)
    }

    /// Raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Checks whether `kind` is present.
    #[inline]
    #[must_use]
    pub const fn contains(self, kind: ComponentKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Checks whether every bit of `other` is present.
    #[inline]
    #[must_use]
    pub const fn contains_all(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Adds a kind. Returns false if it was already present.
    #[inline]
    pub fn insert(&mut self, kind: ComponentKind) -> bool {
        let had = self.contains(kind);
        self.0 |= kind.bit();
        !had
    }

    /// Removes a kind. Returns false if it was absent.
    #[inline]
    pub fn remove(&mut self, kind: ComponentKind) -> bool {
        let had = self.contains(kind);
        self.0 &= !kind.bit();
        had
    }

    /// Checks if no kind is present.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates over the kinds present, in discriminant order.
    pub fn iter(self) -> impl Iterator<Item = ComponentKind> {
        ComponentKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

/// Required-component signature of a filtered registry.
///
/// Keeps the declared order (first occurrence wins on duplicates) for
/// diagnostics and precomputes the mask used for matching. Immutable once
/// built.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    kinds: Vec<ComponentKind>,
    mask: ComponentMask,
}

impl Signature {
    /// Creates a signature from the required kinds.
    ///
    /// # Arguments
    ///
    /// * `kinds` - Required kinds in declaration order
    #[must_use]
    pub fn new(kinds: &[ComponentKind]) -> Self {
        let mut ordered = Vec::with_capacity(kinds.len());
        for kind in kinds {
            if !ordered.contains(kind) {
                ordered.push(*kind);
            }
        }
        Self {
            mask: ComponentMask::from_kinds(&ordered),
            kinds: ordered,
        }
    }

    /// Signature requiring a single kind.
    #[must_use]
    pub fn single(kind: ComponentKind) -> Self {
        Self::new(&[kind])
    }

    /// The required kinds in declaration order.
    #[inline]
    #[must_use]
    pub fn kinds(&self) -> &[ComponentKind] {
        &self.kinds
    }

    /// Precomputed mask of the required kinds.
    #[inline]
    #[must_use]
    pub const fn mask(&self) -> ComponentMask {
        self.mask
    }

    /// True iff `components` holds every required kind.
    ///
    /// An empty signature matches everything.
    #[inline]
    #[must_use]
    pub const fn matches(&self, components: ComponentMask) -> bool {
        components.contains_all(self.mask)
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for (i, kind) in self.kinds.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{kind:?}")?;
        }
        f.write_str("]")
    }
}
