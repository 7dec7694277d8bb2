//! # Activity Tracker
//!
//! Decides, once per tick, which subjects of each tracked component kind
//! must run.
//!
//! ```text
//! update(world):
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. MEMBERSHIP                                                       │
//! │    └─ pump per-kind registries: joins activate, leaves deactivate;  │
//! │       an entity leaving every registry is dropped from the graph,   │
//! │       an idled entity that joins again goes back to waiting         │
//! │ 2. REPORTS                                                          │
//! │    └─ apply reports queued through ReportSender                     │
//! │ 3. MAINTENANCE                                                      │
//! │    └─ every `sweep_interval_frames` started frames, sever dangling  │
//! │ 4. IDLE SWEEP                                                       │
//! │    └─ subjects blocked past the threshold are deactivated           │
//! │ 5. DRAIN                                                            │
//! │    └─ every container applies its queues (activation wins)          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `report_*` methods apply immediately; use them when holding the
//! tracker mutably, and a [`ReportSender`] otherwise.

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::container::ActivityContainer;
use super::dependency::DependencyGraph;
use super::report::{Report, ReportSender};
use super::subject::{AggregateId, Subject};
use crate::config::ActivityConfig;
use crate::ecs::{ComponentKind, EntityId, HandleSet, Signature, World};
use crate::filter::{FilteredRegistry, MembershipChange};
use crate::signal::{Signal, SignalSubscription};

/// Counters from one [`ActivityTracker::update`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActivityStats {
    /// Entities matched across all tracked kinds (counted once per kind).
    pub matched: usize,
    /// Active entities across all tracked kinds (counted once per kind).
    pub active: usize,
    /// Active aggregates.
    pub active_aggregates: usize,
    /// Registered aggregates.
    pub aggregates: usize,
    /// Subjects blocked but not yet idled.
    pub waiting: usize,
    /// Subjects idled.
    pub idled: usize,
    /// Recorded dependency edges.
    pub edges: usize,
    /// Queued reports applied this update.
    pub reports_applied: usize,
    /// Subjects idled this update.
    pub newly_idled: usize,
}

struct KindTrack {
    kind: ComponentKind,
    registry: FilteredRegistry,
    container: ActivityContainer<EntityId>,
}

/// Read-only membership view used as the graph's existence predicate.
struct Presence<'a> {
    kinds: &'a [KindTrack],
    aggregates: &'a HandleSet<AggregateId>,
}

impl Presence<'_> {
    fn contains(&self, subject: Subject) -> bool {
        match subject {
            Subject::Entity(entity) => self.kinds.iter().any(|t| t.registry.contains(entity)),
            Subject::Aggregate(aggregate) => self.aggregates.contains(aggregate),
        }
    }
}

/// Per-kind activity containers plus the dependency graph.
pub struct ActivityTracker {
    config: ActivityConfig,
    kinds: Vec<KindTrack>,
    aggregates: HandleSet<AggregateId>,
    aggregate_container: ActivityContainer<AggregateId>,
    graph: DependencyGraph,
    report_tx: Sender<Report>,
    report_rx: Receiver<Report>,
    frames: SignalSubscription,
    frames_since_sweep: u64,
}

impl ActivityTracker {
    /// Creates a tracker for `config.tracked_kinds`.
    ///
    /// Entities already in `world` are registered and start active.
    #[must_use]
    pub fn new(config: ActivityConfig, world: &World) -> Self {
        let mut kinds = Vec::with_capacity(config.tracked_kinds.len());
        for &kind in &config.tracked_kinds {
            if kinds.iter().any(|t: &KindTrack| t.kind == kind) {
                continue;
            }
            let mut registry = FilteredRegistry::new(Signature::single(kind), world.signals());
            let mut changes = Vec::new();
            registry.rescan(world, &mut changes);

            let mut container = ActivityContainer::new();
            for change in changes {
                if let MembershipChange::Registered(entity) = change {
                    container.queue_activate(entity);
                }
            }
            container.drain(|entity| registry.contains(entity));
            kinds.push(KindTrack {
                kind,
                registry,
                container,
            });
        }

        let (report_tx, report_rx) = unbounded();
        tracing::info!(
            kinds = kinds.len(),
            idle_after_frames = config.idle_after_frames,
            "activity tracker created"
        );

        Self {
            config,
            kinds,
            aggregates: HandleSet::new(),
            aggregate_container: ActivityContainer::new(),
            graph: DependencyGraph::new(),
            report_tx,
            report_rx,
            frames: world.signals().subscribe(),
            frames_since_sweep: 0,
        }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &ActivityConfig {
        &self.config
    }

    /// Handle for queueing reports from code without `&mut` access.
    #[must_use]
    pub fn report_sender(&self) -> ReportSender {
        ReportSender::new(self.report_tx.clone())
    }

    fn track(&self, kind: ComponentKind) -> Option<&KindTrack> {
        self.kinds.iter().find(|t| t.kind == kind)
    }

    fn presence(&self) -> Presence<'_> {
        Presence {
            kinds: &self.kinds,
            aggregates: &self.aggregates,
        }
    }

    /// Whether `subject` is currently known to the tracker.
    #[must_use]
    pub fn contains(&self, subject: Subject) -> bool {
        self.presence().contains(subject)
    }

    // =========================================================================
    // Activity queues
    // =========================================================================

    /// Queues `subject` for activation in every container holding it.
    pub fn queue_activate(&mut self, subject: Subject) {
        match subject {
            Subject::Entity(entity) => {
                for track in &mut self.kinds {
                    if track.registry.contains(entity) {
                        track.container.queue_activate(entity);
                    }
                }
            }
            Subject::Aggregate(aggregate) => {
                if self.aggregates.contains(aggregate) {
                    self.aggregate_container.queue_activate(aggregate);
                }
            }
        }
    }

    /// Queues `subject` for deactivation in every container holding it.
    pub fn queue_deactivate(&mut self, subject: Subject) {
        match subject {
            Subject::Entity(entity) => {
                for track in &mut self.kinds {
                    if track.container.is_active(entity) || track.registry.contains(entity) {
                        track.container.queue_deactivate(entity);
                    }
                }
            }
            Subject::Aggregate(aggregate) => {
                self.aggregate_container.queue_deactivate(aggregate);
            }
        }
    }

    fn block(&mut self, dependent: Subject, blocker: Subject) {
        let presence = Presence {
            kinds: &self.kinds,
            aggregates: &self.aggregates,
        };
        self.graph
            .report_blocked(dependent, blocker, |subject| presence.contains(subject));
    }

    fn wake(&mut self, blocker: Subject) {
        for dependent in self.graph.resolve(blocker) {
            self.queue_activate(dependent);
        }
    }

    // =========================================================================
    // Outbound reports
    // =========================================================================

    /// Applies one report.
    pub fn apply(&mut self, report: Report) {
        match report {
            Report::Full { subject, target } => {
                self.block(subject, subject);
                if let Some(target) = target {
                    self.block(subject, target);
                }
            }
            Report::Empty { subject } => self.block(subject, subject),
            Report::Blocked { dependent, blocker } => self.block(dependent, blocker),
            Report::Resolved { subject, target } => {
                if let Some(target) = target {
                    self.wake(target);
                }
                self.wake(subject);
            }
            Report::Accepted { entity } => self.wake(entity.into()),
            Report::Ejected { entity, target } => {
                self.wake(entity.into());
                if let Some(target) = target {
                    self.wake(target);
                }
            }
        }
    }

    /// `subject` is full: blocked on itself, and on `target` if given.
    pub fn report_full(&mut self, subject: impl Into<Subject>, target: Option<Subject>) {
        self.apply(Report::Full {
            subject: subject.into(),
            target,
        });
    }

    /// `subject` is empty: blocked on itself.
    pub fn report_empty(&mut self, subject: impl Into<Subject>) {
        self.apply(Report::Empty {
            subject: subject.into(),
        });
    }

    /// `dependent` waits on `blocker`.
    pub fn report_blocked(&mut self, dependent: impl Into<Subject>, blocker: impl Into<Subject>) {
        self.apply(Report::Blocked {
            dependent: dependent.into(),
            blocker: blocker.into(),
        });
    }

    /// `subject` (and `target`) stopped blocking; wakes their dependents.
    pub fn report_resolved(&mut self, subject: impl Into<Subject>, target: Option<Subject>) {
        self.apply(Report::Resolved {
            subject: subject.into(),
            target,
        });
    }

    /// An acceptor took an item.
    pub fn report_accepted(&mut self, entity: EntityId) {
        self.apply(Report::Accepted { entity });
    }

    /// An ejector handed an item to `target`.
    pub fn report_ejected(&mut self, entity: EntityId, target: Option<Subject>) {
        self.apply(Report::Ejected { entity, target });
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    /// Starts tracking an aggregate. It becomes active on the next update.
    pub fn add_aggregate(&mut self, aggregate: AggregateId) -> bool {
        if !self.aggregates.insert(aggregate) {
            return false;
        }
        self.aggregate_container.queue_activate(aggregate);
        true
    }

    /// Stops tracking an aggregate and drops its edges.
    pub fn remove_aggregate(&mut self, aggregate: AggregateId) -> bool {
        if !self.aggregates.remove(aggregate) {
            return false;
        }
        self.aggregate_container.queue_deactivate(aggregate);
        for dependent in self.graph.remove_subject(aggregate.into()) {
            self.queue_activate(dependent);
        }
        true
    }

    /// Whether `aggregate` is tracked.
    #[inline]
    #[must_use]
    pub fn contains_aggregate(&self, aggregate: AggregateId) -> bool {
        self.aggregates.contains(aggregate)
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Runs one tick of activity bookkeeping.
    pub fn update(&mut self, world: &World) -> ActivityStats {
        let mut stats = ActivityStats::default();

        // 1. Membership
        let mut joined = Vec::new();
        let mut departed = Vec::new();
        for track in &mut self.kinds {
            let mut changes = Vec::new();
            track.registry.pump(world, &mut changes);
            for change in changes {
                match change {
                    MembershipChange::Registered(entity) => {
                        track.container.queue_activate(entity);
                        joined.push(entity);
                    }
                    MembershipChange::Unregistered(entity) => {
                        track.container.queue_deactivate(entity);
                        departed.push(entity);
                    }
                }
            }
            track.registry.snapshot();
        }
        for entity in joined {
            if self.graph.rewait(entity.into()) {
                self.queue_activate(entity.into());
            }
        }
        for entity in departed {
            if self.contains(entity.into()) {
                continue;
            }
            for dependent in self.graph.remove_subject(entity.into()) {
                self.queue_activate(dependent);
            }
        }

        // 2. Reports
        let reports: Vec<Report> = self.report_rx.try_iter().collect();
        stats.reports_applied = reports.len();
        for report in reports {
            self.apply(report);
        }

        // 3. Maintenance
        let started = self
            .frames
            .drain()
            .filter(|signal| matches!(signal, Signal::FrameStarted(_)))
            .count() as u64;
        self.frames_since_sweep += started;
        let interval = self.config.sweep_interval_frames;
        if interval > 0 && self.frames_since_sweep >= interval {
            self.frames_since_sweep = 0;
            let presence = Presence {
                kinds: &self.kinds,
                aggregates: &self.aggregates,
            };
            let woken = self.graph.sever_dangling(|subject| presence.contains(subject));
            for dependent in woken {
                self.queue_activate(dependent);
            }
        }

        // 4. Idle sweep
        let idled = self.graph.sweep_idle(self.config.idle_after_frames);
        stats.newly_idled = idled.len();
        for subject in idled {
            self.queue_deactivate(subject);
        }

        // 5. Drain
        for KindTrack {
            registry,
            container,
            ..
        } in &mut self.kinds
        {
            container.drain(|entity| registry.contains(entity));
            stats.matched += registry.len();
            stats.active += container.len();
        }
        let aggregates = &self.aggregates;
        self.aggregate_container
            .drain(|aggregate| aggregates.contains(aggregate));

        stats.active_aggregates = self.aggregate_container.len();
        stats.aggregates = self.aggregates.len();
        stats.waiting = self.graph.waiting_count();
        stats.idled = self.graph.idled_count();
        stats.edges = self.graph.edge_count();
        tracing::trace!(?stats, "activity updated");
        stats
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Active entities of `kind`, in slot order. Empty for untracked kinds.
    #[must_use]
    pub fn active_entities(&self, kind: ComponentKind) -> &[EntityId] {
        self.track(kind).map(|t| t.container.active()).unwrap_or(&[])
    }

    /// Entities matching `kind`, active or not. Empty for untracked kinds.
    #[must_use]
    pub fn matched_entities(&self, kind: ComponentKind) -> &[EntityId] {
        self.track(kind).map(|t| t.registry.cached_snapshot()).unwrap_or(&[])
    }

    /// Active aggregates, in slot order.
    #[must_use]
    pub fn active_aggregates(&self) -> &[AggregateId] {
        self.aggregate_container.active()
    }

    /// Whether `subject` is active in at least one container.
    #[must_use]
    pub fn is_active(&self, subject: Subject) -> bool {
        match subject {
            Subject::Entity(entity) => self.kinds.iter().any(|t| t.container.is_active(entity)),
            Subject::Aggregate(aggregate) => self.aggregate_container.is_active(aggregate),
        }
    }

    /// Kinds with their own container, in configuration order.
    pub fn tracked_kinds(&self) -> impl Iterator<Item = ComponentKind> + '_ {
        self.kinds.iter().map(|t| t.kind)
    }

    /// The dependency graph.
    #[inline]
    #[must_use]
    pub const fn graph(&self) -> &DependencyGraph {
        &self.graph
    }
}

impl std::fmt::Debug for ActivityTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityTracker")
            .field("kinds", &self.kinds.iter().map(|t| t.kind).collect::<Vec<_>>())
            .field("aggregates", &self.aggregates.len())
            .field("edges", &self.graph.edge_count())
            .finish_non_exhaustive()
    }
}
