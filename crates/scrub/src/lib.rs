//! Render-artifact scrubber.
//!
//! Some decoders inject their own "restricted/limited permissions" notices
//! into the display tree even though the content itself rendered fine after
//! raw-byte re-ingestion. This crate finds those notices by phrase match and
//! takes them out, along with any foreign embedded element, which is never
//! legitimate output of the page renderer.
//!
//! A pass never raises: a failed match is a no-op, and the scrubber must not
//! be able to crash the viewer.

use doc_model::{NodeContent, NodeId, ViewerTree};
use std::time::Duration;
use vellum_scheduler::CancellationToken;

/// Fixed phrase set. Matching is a case-insensitive substring test against
/// the concatenated subtree text of each node.
pub const RESTRICTED_PHRASES: [&str; 5] = [
    "permission",
    "limited",
    "view permissions",
    "this file has limited",
    "may not have access",
];

/// Offsets from activation at which follow-up passes run, catching nodes
/// inserted asynchronously after the first pass.
pub const SCRUB_RETRY_OFFSETS: [Duration; 4] = [
    Duration::from_millis(50),
    Duration::from_millis(100),
    Duration::from_millis(200),
    Duration::from_millis(500),
];

/// Hard lifetime of the revision watch. After this much wall time from
/// activation the watch is force-disconnected regardless of activity,
/// trading completeness for bounded resource use.
pub const WATCH_LIFETIME: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrubOutcome {
    pub hidden: usize,
    pub removed: usize,
    pub embeds_removed: usize,
}

impl ScrubOutcome {
    pub fn is_noop(&self) -> bool {
        self.hidden == 0 && self.removed == 0 && self.embeds_removed == 0
    }
}

pub fn matches_restricted_phrase(text: &str) -> bool {
    let lowered = text.to_lowercase();
    RESTRICTED_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

/// One scrub pass over both roots of the tree.
///
/// Matching nodes are hidden through every redundant channel first and then
/// removed; the redundancy survives a partially applied removal. Embedded
/// nodes go unconditionally, regardless of their text.
pub fn run_pass(tree: &mut ViewerTree) -> ScrubOutcome {
    let mut matched: Vec<NodeId> = Vec::new();
    let mut embeds: Vec<NodeId> = Vec::new();

    for root in [tree.content(), tree.chrome()] {
        for node in root.descendants() {
            match node.content() {
                NodeContent::Embedded(_) => embeds.push(node.id()),
                _ => {
                    let text = node.subtree_text();
                    if !text.trim().is_empty() && matches_restricted_phrase(&text) {
                        matched.push(node.id());
                    }
                }
            }
        }
    }

    let mut outcome = ScrubOutcome::default();

    for id in matched {
        if tree.hide(id) {
            outcome.hidden += 1;
        }
        // Removing an ancestor earlier in the list can have taken this node
        // with it; remove() is then a no-op.
        if tree.remove(id) {
            outcome.removed += 1;
        }
    }

    for id in embeds {
        if tree.remove(id) {
            outcome.embeds_removed += 1;
        }
    }

    if !outcome.is_noop() {
        log::debug!(
            "scrub pass: hid {}, removed {}, dropped {} embedded",
            outcome.hidden,
            outcome.removed,
            outcome.embeds_removed
        );
    }

    outcome
}

/// Scrub lifecycle for one viewer session.
///
/// `activate` runs the immediate pass and arms the revision watch; the owner
/// schedules the [`SCRUB_RETRY_OFFSETS`] follow-ups through its timer queue
/// and calls [`run_scheduled_pass`] when they fire. [`observe`] is the watch:
/// it re-runs the pass whenever the tree revision moved, until the hard
/// [`WATCH_LIFETIME`] deadline disconnects it.
///
/// [`run_scheduled_pass`]: ScrubState::run_scheduled_pass
/// [`observe`]: ScrubState::observe
#[derive(Debug)]
pub struct ScrubState {
    active: bool,
    watch_deadline: Option<Duration>,
    last_seen_revision: u64,
    token: CancellationToken,
}

impl Default for ScrubState {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrubState {
    pub fn new() -> Self {
        Self {
            active: false,
            watch_deadline: None,
            last_seen_revision: 0,
            token: CancellationToken::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn watch_active(&self) -> bool {
        self.watch_deadline.is_some()
    }

    /// Token deferred scrub work should check before touching the tree.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Arm the scrubber: immediate pass now, watch until `now + WATCH_LIFETIME`.
    pub fn activate(&mut self, now: Duration, tree: &mut ViewerTree) -> ScrubOutcome {
        self.active = true;
        self.token = CancellationToken::new();
        self.watch_deadline = Some(now + WATCH_LIFETIME);

        let outcome = run_pass(tree);
        self.last_seen_revision = tree.revision();
        outcome
    }

    /// A retry-offset pass. No-op once the session is torn down.
    pub fn run_scheduled_pass(&mut self, tree: &mut ViewerTree) -> ScrubOutcome {
        if !self.active || self.token.is_cancelled() {
            return ScrubOutcome::default();
        }

        let outcome = run_pass(tree);
        self.last_seen_revision = tree.revision();
        outcome
    }

    /// The revision watch. The deadline is checked before any work, so the
    /// watch disconnects on schedule even under continuous mutation.
    pub fn observe(&mut self, now: Duration, tree: &mut ViewerTree) -> ScrubOutcome {
        let Some(deadline) = self.watch_deadline else {
            return ScrubOutcome::default();
        };

        if self.token.is_cancelled() {
            self.watch_deadline = None;
            return ScrubOutcome::default();
        }

        if now >= deadline {
            self.watch_deadline = None;
            log::debug!("scrub watch disconnected at {:?}", now);
            return ScrubOutcome::default();
        }

        if tree.revision() == self.last_seen_revision {
            return ScrubOutcome::default();
        }

        let outcome = run_pass(tree);
        // Record the post-pass revision so the pass's own mutations do not
        // retrigger the watch.
        self.last_seen_revision = tree.revision();
        outcome
    }

    /// Synchronous teardown: cancels the token and drops the watch. Idempotent.
    pub fn cancel(&mut self) {
        self.token.cancel();
        self.active = false;
        self.watch_deadline = None;
    }
}
