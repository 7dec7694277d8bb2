//! # Activity Reports
//!
//! State changes that component kinds send into the dependency graph.
//! Systems running concurrently cannot borrow the tracker mutably, so they
//! queue reports through a [`ReportSender`]; the tracker applies them at
//! the start of its next update.

use crossbeam_channel::Sender;

use super::subject::Subject;
use crate::ecs::EntityId;

/// One outbound state change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Report {
    /// `subject` is full; blocked on itself and on `target` if known.
    Full {
        /// The reporting subject.
        subject: Subject,
        /// Downstream acceptor that has to take an item first.
        target: Option<Subject>,
    },
    /// `subject` is empty; blocked on itself.
    Empty {
        /// The reporting subject.
        subject: Subject,
    },
    /// `dependent` cannot progress until `blocker` changes.
    Blocked {
        /// The waiting subject.
        dependent: Subject,
        /// The subject it waits on.
        blocker: Subject,
    },
    /// `subject` (and `target`, if any) are no longer blocking.
    Resolved {
        /// The reporting subject.
        subject: Subject,
        /// Acceptor whose state changed along with it.
        target: Option<Subject>,
    },
    /// An acceptor took an item.
    Accepted {
        /// The acceptor.
        entity: EntityId,
    },
    /// An ejector handed an item to `target`.
    Ejected {
        /// The ejector.
        entity: EntityId,
        /// The receiving subject.
        target: Option<Subject>,
    },
}

/// Cloneable, thread-safe handle for queueing reports.
#[derive(Clone, Debug)]
pub struct ReportSender {
    sender: Sender<Report>,
}

impl ReportSender {
    pub(crate) const fn new(sender: Sender<Report>) -> Self {
        Self { sender }
    }

    /// Queues a raw report.
    ///
    /// Reports sent after the tracker is dropped are discarded.
    #[inline]
    pub fn send(&self, report: Report) {
        if self.sender.send(report).is_err() {
            tracing::trace!(?report, "activity tracker gone, report discarded");
        }
    }

    /// Queues [`Report::Full`].
    pub fn full(&self, subject: impl Into<Subject>, target: Option<Subject>) {
        self.send(Report::Full {
            subject: subject.into(),
            target,
        });
    }

    /// Queues [`Report::Empty`].
    pub fn empty(&self, subject: impl Into<Subject>) {
        self.send(Report::Empty {
            subject: subject.into(),
        });
    }

    /// Queues [`Report::Blocked`].
    pub fn blocked(&self, dependent: impl Into<Subject>, blocker: impl Into<Subject>) {
        self.send(Report::Blocked {
            dependent: dependent.into(),
            blocker: blocker.into(),
        });
    }

    /// Queues [`Report::Resolved`].
    pub fn resolved(&self, subject: impl Into<Subject>, target: Option<Subject>) {
        self.send(Report::Resolved {
            subject: subject.into(),
            target,
        });
    }

    /// Queues [`Report::Accepted`].
    pub fn accepted(&self, entity: EntityId) {
        self.send(Report::Accepted { entity });
    }

    /// Queues [`Report::Ejected`].
    pub fn ejected(&self, entity: EntityId, target: Option<Subject>) {
        self.send(Report::Ejected { entity, target });
    }
}
