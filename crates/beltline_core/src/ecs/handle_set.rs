//! # Handle Sets
//!
//! Canonical membership representation for everything keyed by a
//! generational handle: one bit per slot plus the generation that owns it.
//!
//! ```text
//! bits:        [0b0000_0101, 0b1000_0000, ...]   (64 slots per word)
//! generations: [  3, _, 1, _, ... ]              (valid where bit = 1)
//! ```
//!
//! Membership checks are O(1) and reject stale handles. Iteration walks
//! set bits with `trailing_zeros`, so it is always in slot order and
//! skips empty regions. Ordered arrays elsewhere are derived from here.

use std::marker::PhantomData;

use super::entity::EntityId;

/// A generational handle that can be stored in a [`HandleSet`].
pub trait Handle: Copy + Eq + std::fmt::Debug {
    /// Slot index.
    fn slot(self) -> u32;
    /// Generation of the slot this handle was issued for.
    fn generation(self) -> u32;
    /// Rebuilds a handle from its parts.
    fn from_parts(slot: u32, generation: u32) -> Self;
}

impl Handle for EntityId {
    #[inline]
    fn slot(self) -> u32 {
        self.index()
    }

    #[inline]
    fn generation(self) -> u32 {
        EntityId::generation(self)
    }

    #[inline]
    fn from_parts(slot: u32, generation: u32) -> Self {
        Self::new(slot, generation)
    }
}

/// Bitset of generational handles.
#[derive(Clone, Debug)]
pub struct HandleSet<H: Handle> {
    /// 1 = slot is a member. 64 slots per u64.
    bits: Vec<u64>,
    /// Generation of the member in each slot.
    generations: Vec<u32>,
    /// Cached member count.
    len: usize,
    _marker: PhantomData<H>,
}

impl<H: Handle> HandleSet<H> {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bits: Vec::new(),
            generations: Vec::new(),
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Creates an empty set with room for `capacity` slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bits: vec![0u64; capacity.div_ceil(64)],
            generations: vec![0u32; capacity],
            len: 0,
            _marker: PhantomData,
        }
    }

    #[inline]
    fn locate(slot: u32) -> (usize, u64) {
        let slot = slot as usize;
        (slot / 64, 1u64 << (slot % 64))
    }

    #[inline]
    fn occupied(&self, slot: u32) -> bool {
        let (word, mask) = Self::locate(slot);
        self.bits.get(word).is_some_and(|w| w & mask != 0)
    }

    fn grow_to(&mut self, slot: u32) {
        let slot = slot as usize;
        let words = (slot + 1).div_ceil(64);
        if self.bits.len() < words {
            self.bits.resize(words, 0);
        }
        if self.generations.len() <= slot {
            self.generations.resize(slot + 1, 0);
        }
    }

    /// Inserts a handle.
    ///
    /// A stale handle occupying the same slot is replaced.
    ///
    /// # Returns
    ///
    /// `true` if the handle was not already a member.
    ///
    /// # Performance
    ///
    /// O(1) amortized.
    pub fn insert(&mut self, handle: H) -> bool {
        let slot = handle.slot();
        if self.occupied(slot) {
            let current = &mut self.generations[slot as usize];
            if *current == handle.generation() {
                return false;
            }
            *current = handle.generation();
            return true;
        }
        self.grow_to(slot);
        let (word, mask) = Self::locate(slot);
        self.bits[word] |= mask;
        self.generations[slot as usize] = handle.generation();
        self.len += 1;
        true
    }

    /// Removes a handle.
    ///
    /// # Returns
    ///
    /// `true` if the handle was a member. Stale handles are never members.
    pub fn remove(&mut self, handle: H) -> bool {
        if !self.contains(handle) {
            return false;
        }
        let (word, mask) = Self::locate(handle.slot());
        self.bits[word] &= !mask;
        self.len -= 1;
        true
    }

    /// Checks membership, including the generation.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: H) -> bool {
        self.occupied(handle.slot())
            && self.generations[handle.slot() as usize] == handle.generation()
    }

    /// Number of members.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Checks if the set is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Removes every member. Keeps the allocation.
    pub fn clear(&mut self) {
        for word in &mut self.bits {
            *word = 0;
        }
        self.len = 0;
    }

    /// Keeps only the members for which `keep` returns true.
    ///
    /// # Returns
    ///
    /// The removed members, in slot order.
    pub fn retain(&mut self, mut keep: impl FnMut(H) -> bool) -> Vec<H> {
        let doomed: Vec<H> = self.iter().filter(|h| !keep(*h)).collect();
        for handle in &doomed {
            self.remove(*handle);
        }
        doomed
    }

    /// Iterates over members in slot order.
    pub fn iter(&self) -> HandleIter<'_, H> {
        HandleIter {
            bits: &self.bits,
            generations: &self.generations,
            word_idx: 0,
            current_word: self.bits.first().copied().unwrap_or(0),
            _marker: PhantomData,
        }
    }
}

impl<H: Handle> Default for HandleSet<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Handle> FromIterator<H> for HandleSet<H> {
    fn from_iter<T: IntoIterator<Item = H>>(iter: T) -> Self {
        let mut set = Self::new();
        for handle in iter {
            set.insert(handle);
        }
        set
    }
}

impl<'a, H: Handle> IntoIterator for &'a HandleSet<H> {
    type Item = H;
    type IntoIter = HandleIter<'a, H>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the members of a [`HandleSet`], in slot order.
pub struct HandleIter<'a, H: Handle> {
    bits: &'a [u64],
    generations: &'a [u32],
    word_idx: usize,
    current_word: u64,
    _marker: PhantomData<H>,
}

impl<H: Handle> Iterator for HandleIter<'_, H> {
    type Item = H;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit = self.current_word.trailing_zeros() as usize;
                let slot = self.word_idx * 64 + bit;

                // Clear lowest set bit
                self.current_word &= self.current_word - 1;

                #[allow(clippy::cast_possible_truncation)]
                return Some(H::from_parts(slot as u32, self.generations[slot]));
            }

            self.word_idx += 1;
            if self.word_idx >= self.bits.len() {
                return None;
            }
            self.current_word = self.bits[self.word_idx];
        }
    }
}
