//! # Dependency Graph & Idle Scheduler
//!
//! Records "dependent cannot progress until blocker changes" edges and
//! idles dependents that stay blocked for too long.
//!
//! ```text
//!                report_blocked              sweep_idle (> threshold)
//!   Active ───────────────────────> Waiting ─────────────────────────> Idled
//!     ^                               │                                  │
//!     └──────── resolve(blocker) ─────┴──────────────────────────────────┘
//! ```
//!
//! ## Invariants
//!
//! - A subject is waiting or idled iff it has at least one edge as dependent
//! - Resolving a blocker removes its edges immediately and wakes its direct
//!   dependents only (one hop)
//! - A woken dependent keeps its edges to other blockers and restarts
//!   waiting at zero frames
//!
//! Self-edges (`x -> x`) model "blocked on my own external condition".

use std::collections::{HashMap, HashSet};

use super::subject::Subject;

/// Blocker/dependent edges plus idle bookkeeping.
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    /// blocker -> dependents, in report order.
    dependents: HashMap<Subject, Vec<Subject>>,
    /// dependent -> blockers, in report order.
    blockers: HashMap<Subject, Vec<Subject>>,
    /// Waiting dependents and their consecutive unresolved frames.
    waiting: HashMap<Subject, u32>,
    /// Dependents moved out of per-tick processing.
    idled: HashSet<Subject>,
    edge_count: usize,
}

impl DependencyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the edge `blocker -> dependent`.
    ///
    /// Ignored when either subject fails `exists`. Re-reporting an existing
    /// edge is a no-op. A dependent without edges starts waiting at zero
    /// frames.
    ///
    /// # Returns
    ///
    /// `true` if a new edge was recorded.
    pub fn report_blocked(
        &mut self,
        dependent: Subject,
        blocker: Subject,
        exists: impl Fn(Subject) -> bool,
    ) -> bool {
        if !exists(dependent) || !exists(blocker) {
            tracing::trace!(%dependent, %blocker, "blocked report for unknown subject ignored");
            return false;
        }

        let blocked_on = self.blockers.entry(dependent).or_default();
        if blocked_on.contains(&blocker) {
            return false;
        }
        let first_edge = blocked_on.is_empty();
        blocked_on.push(blocker);
        self.dependents.entry(blocker).or_default().push(dependent);
        self.edge_count += 1;

        if first_edge && !self.idled.contains(&dependent) {
            self.waiting.insert(dependent, 0);
        }
        true
    }

    /// Resolves every edge keyed by `blocker`.
    ///
    /// # Returns
    ///
    /// The dependents that must be scheduled for reactivation. Empty when
    /// `blocker` blocks nothing.
    ///
    /// Each woken dependent leaves the idled set. One that still waits on
    /// other blockers restarts waiting at zero frames.
    ///
    /// # Performance
    ///
    /// O(out-degree of `blocker` + their in-degrees).
    pub fn resolve(&mut self, blocker: Subject) -> Vec<Subject> {
        let Some(woken) = self.dependents.remove(&blocker) else {
            return Vec::new();
        };
        for dependent in &woken {
            self.edge_count -= 1;
            self.idled.remove(dependent);
            let still_blocked = match self.blockers.get_mut(dependent) {
                Some(blocked_on) => {
                    blocked_on.retain(|b| *b != blocker);
                    !blocked_on.is_empty()
                }
                None => false,
            };
            if still_blocked {
                self.waiting.insert(*dependent, 0);
            } else {
                self.blockers.remove(dependent);
                self.waiting.remove(dependent);
            }
        }
        tracing::trace!(%blocker, woken = woken.len(), "blocker resolved");
        woken
    }

    /// Moves an idled subject back to waiting at zero frames.
    ///
    /// Used when a subject is reactivated by something other than a
    /// resolution, so a later sweep can idle it again.
    ///
    /// # Returns
    ///
    /// `true` if `subject` was idled.
    pub fn rewait(&mut self, subject: Subject) -> bool {
        if !self.idled.remove(&subject) {
            return false;
        }
        self.waiting.insert(subject, 0);
        true
    }

    /// Removes every edge where `dependent` waits, and its idle state.
    fn detach_dependent(&mut self, dependent: Subject) {
        if let Some(blocked_on) = self.blockers.remove(&dependent) {
            for blocker in blocked_on {
                self.edge_count -= 1;
                if let Some(list) = self.dependents.get_mut(&blocker) {
                    list.retain(|d| *d != dependent);
                    if list.is_empty() {
                        self.dependents.remove(&blocker);
                    }
                }
            }
        }
        self.waiting.remove(&dependent);
        self.idled.remove(&dependent);
    }

    /// Advances every waiting counter by one frame.
    ///
    /// A subject whose counter exceeds `threshold` moves to the idled set.
    /// With `threshold = n`, a subject blocked for `n` sweeps stays active
    /// and is idled on sweep `n + 1`.
    ///
    /// # Returns
    ///
    /// Subjects idled by this sweep, sorted.
    pub fn sweep_idle(&mut self, threshold: u32) -> Vec<Subject> {
        let mut newly_idled = Vec::new();
        for (subject, frames) in &mut self.waiting {
            *frames = frames.saturating_add(1);
            if *frames > threshold {
                newly_idled.push(*subject);
            }
        }
        for subject in &newly_idled {
            self.waiting.remove(subject);
            self.idled.insert(*subject);
        }
        newly_idled.sort_unstable();
        if !newly_idled.is_empty() {
            tracing::debug!(count = newly_idled.len(), threshold, "subjects idled");
        }
        newly_idled
    }

    /// Drops a subject from the graph entirely.
    ///
    /// Its dependents are woken as if it had resolved, and edges where it
    /// is the dependent are removed.
    ///
    /// # Returns
    ///
    /// The woken dependents, excluding `subject` itself.
    pub fn remove_subject(&mut self, subject: Subject) -> Vec<Subject> {
        let mut woken = self.resolve(subject);
        woken.retain(|d| *d != subject);
        self.detach_dependent(subject);
        woken
    }

    /// Severs edges that reference subjects failing `exists`.
    ///
    /// Registration and edges move in lockstep, so anything found here is
    /// corruption: it is logged and repaired, never propagated.
    ///
    /// # Returns
    ///
    /// Surviving dependents woken because their blocker vanished.
    pub fn sever_dangling(&mut self, exists: impl Fn(Subject) -> bool) -> Vec<Subject> {
        let mut dangling: Vec<Subject> = self
            .dependents
            .keys()
            .chain(self.blockers.keys())
            .copied()
            .filter(|subject| !exists(*subject))
            .collect();
        if dangling.is_empty() {
            return Vec::new();
        }
        dangling.sort_unstable();
        dangling.dedup();

        let edges_before = self.edge_count;
        let mut woken = Vec::new();
        for subject in &dangling {
            woken.extend(self.remove_subject(*subject));
        }
        woken.retain(|subject| exists(*subject));
        woken.sort_unstable();
        woken.dedup();

        tracing::warn!(
            subjects = dangling.len(),
            edges = edges_before - self.edge_count,
            "severed dangling dependency edges"
        );
        woken
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Dependents currently blocked on `blocker`, in report order.
    #[must_use]
    pub fn dependents_of(&self, blocker: Subject) -> &[Subject] {
        self.dependents.get(&blocker).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Blockers `dependent` currently waits on, in report order.
    #[must_use]
    pub fn blockers_of(&self, dependent: Subject) -> &[Subject] {
        self.blockers.get(&dependent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `subject` is blocked but not yet idled.
    #[inline]
    #[must_use]
    pub fn is_waiting(&self, subject: Subject) -> bool {
        self.waiting.contains_key(&subject)
    }

    /// Whether `subject` was idled by a sweep.
    #[inline]
    #[must_use]
    pub fn is_idled(&self, subject: Subject) -> bool {
        self.idled.contains(&subject)
    }

    /// Consecutive unresolved frames of a waiting subject.
    #[inline]
    #[must_use]
    pub fn idle_frames(&self, subject: Subject) -> Option<u32> {
        self.waiting.get(&subject).copied()
    }

    /// Number of recorded edges.
    #[inline]
    #[must_use]
    pub const fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Number of waiting subjects.
    #[inline]
    #[must_use]
    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    /// Number of idled subjects.
    #[inline]
    #[must_use]
    pub fn idled_count(&self) -> usize {
        self.idled.len()
    }
}
