//! Per-logical-message reassembly state and the registry holding it.

use std::{
    collections::{BTreeMap, HashMap},
    time::{Duration, Instant},
};

use tracing::{debug, warn};

use super::{Progress, ReassemblyFailure};
use crate::protocol::PeerId;

/// Registry key: the logical id, scoped by sender on the multi-client role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PartialKey {
    pub(crate) sender: Option<PeerId>,
    pub(crate) logical_id: u32,
}

/// Outcome of feeding one slice to a [`PartialMessage`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SliceOutcome {
    /// The ordinal was new; completion state unchanged.
    Stored,
    /// The ordinal was new and completed the message.
    Completed,
    /// The ordinal was already stored (retransmit); bytes overwritten,
    /// nothing counted, no progress raised.
    Duplicate,
    /// The message was already complete; the slice is a no-op.
    AlreadyComplete,
}

/// Accumulating state for one split payload.
///
/// State machine: *Created* (first begin or slice observed) → *Accumulating*
/// → *Complete* (terminal). Completion is `distinct stored >= declared` and
/// is re-checked on every insertion because the begin-descriptor races with
/// the slices and may arrive last.
#[derive(Debug)]
pub(crate) struct PartialMessage {
    logical_id: u32,
    sender: Option<PeerId>,
    /// Slice count from the begin-descriptor; `None` until it arrives.
    declared: Option<u32>,
    /// Original application type from the begin-descriptor.
    type_id: Option<u16>,
    /// Ordinal → raw slice bytes. Ordered iteration gives the assembly order
    /// for free, independent of arrival order.
    slices: BTreeMap<u32, Vec<u8>>,
    created_at: Instant,
    complete: bool,
}

impl PartialMessage {
    fn new(logical_id: u32, sender: Option<PeerId>, now: Instant) -> Self {
        Self {
            logical_id,
            sender,
            declared: None,
            type_id: None,
            slices: BTreeMap::new(),
            created_at: now,
            complete: false,
        }
    }

    pub(crate) const fn logical_id(&self) -> u32 {
        self.logical_id
    }

    pub(crate) const fn sender(&self) -> Option<PeerId> {
        self.sender
    }

    pub(crate) const fn type_id(&self) -> Option<u16> {
        self.type_id
    }

    pub(crate) const fn is_complete(&self) -> bool {
        self.complete
    }

    fn received(&self) -> u32 {
        self.slices.len() as u32
    }

    /// Records the begin-descriptor fields. Returns `true` when this makes
    /// the message complete (every slice had already arrived).
    pub(crate) fn describe(&mut self, type_id: u16, declared: u32) -> bool {
        self.type_id = Some(type_id);
        self.declared = Some(declared);
        if !self.complete && self.received() >= declared {
            self.complete = true;
            return true;
        }
        false
    }

    /// Stores one slice keyed by ordinal.
    pub(crate) fn add_slice(&mut self, ordinal: u32, bytes: Vec<u8>) -> SliceOutcome {
        if self.complete {
            // Terminal state; late retransmits are silent no-ops.
            return SliceOutcome::AlreadyComplete;
        }
        if self.slices.insert(ordinal, bytes).is_some() {
            return SliceOutcome::Duplicate;
        }
        match self.declared {
            Some(declared) if self.received() >= declared => {
                self.complete = true;
                SliceOutcome::Completed
            }
            _ => SliceOutcome::Stored,
        }
    }

    pub(crate) fn progress(&self) -> Progress {
        Progress {
            logical_id: self.logical_id,
            declared: self.declared,
            received: self.received(),
            ordinals: self.slices.keys().copied().collect(),
        }
    }

    /// Concatenates the stored slices by ascending ordinal into one
    /// contiguous payload. Only meaningful once complete.
    pub(crate) fn assemble(&self) -> Vec<u8> {
        let total: usize = self.slices.values().map(Vec::len).sum();
        let mut payload = Vec::with_capacity(total);
        for bytes in self.slices.values() {
            payload.extend_from_slice(bytes);
        }
        payload
    }

    fn failure(&self) -> ReassemblyFailure {
        ReassemblyFailure {
            logical_id: self.logical_id,
            type_id: self.type_id,
            sender: self.sender,
            received: self.received(),
            declared: self.declared,
        }
    }
}

/// Mapping from logical id (scoped by sender) to reassembly state.
///
/// Entries are created by whichever of begin-descriptor or first slice
/// arrives first. Completed entries stay in terminal state until the
/// retention sweep removes them, so late duplicates never spawn orphans.
#[derive(Debug, Default)]
pub(crate) struct AssemblyRegistry {
    entries: HashMap<PartialKey, PartialMessage>,
}

impl AssemblyRegistry {
    /// Looks up or creates the state for `key`.
    pub(crate) fn entry(&mut self, key: PartialKey, now: Instant) -> &mut PartialMessage {
        self.entries
            .entry(key)
            .or_insert_with(|| PartialMessage::new(key.logical_id, key.sender, now))
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drops entries older than `retention`. Incomplete ones are reported
    /// through `on_failure`; complete ones leave silently.
    pub(crate) fn reclaim_expired<F>(&mut self, now: Instant, retention: Duration, mut on_failure: F)
    where
        F: FnMut(ReassemblyFailure),
    {
        self.entries.retain(|key, entry| {
            if now.duration_since(entry.created_at) < retention {
                return true;
            }
            if entry.complete {
                debug!(logical_id = key.logical_id, "dropping completed reassembly record");
            } else {
                warn!(
                    logical_id = key.logical_id,
                    received = entry.received(),
                    declared = ?entry.declared,
                    "reassembly abandoned by retention sweep"
                );
                on_failure(entry.failure());
            }
            false
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(logical_id: u32) -> PartialKey {
        PartialKey {
            sender: None,
            logical_id,
        }
    }

    #[test]
    fn test_complete_requires_declared_count() {
        let now = Instant::now();
        let mut registry = AssemblyRegistry::default();
        let entry = registry.entry(key(1), now);

        assert_eq!(entry.add_slice(1, vec![1]), SliceOutcome::Stored);
        assert_eq!(entry.add_slice(2, vec![2]), SliceOutcome::Stored);
        assert!(!entry.is_complete());

        // The begin-descriptor arrives last and resolves completion.
        assert!(entry.describe(7, 2));
        assert!(entry.is_complete());
        assert_eq!(entry.type_id(), Some(7));
        assert_eq!(entry.assemble(), vec![1, 2]);
    }

    #[test]
    fn test_assembles_by_ordinal_not_arrival() {
        let now = Instant::now();
        let mut registry = AssemblyRegistry::default();
        let entry = registry.entry(key(1), now);
        entry.describe(7, 3);

        assert_eq!(entry.add_slice(3, vec![30]), SliceOutcome::Stored);
        assert_eq!(entry.add_slice(1, vec![10]), SliceOutcome::Stored);
        assert_eq!(entry.add_slice(2, vec![20]), SliceOutcome::Completed);
        assert_eq!(entry.assemble(), vec![10, 20, 30]);
    }

    #[test]
    fn test_duplicate_never_inflates_count() {
        let now = Instant::now();
        let mut registry = AssemblyRegistry::default();
        let entry = registry.entry(key(1), now);
        entry.describe(7, 2);

        assert_eq!(entry.add_slice(1, vec![1]), SliceOutcome::Stored);
        assert_eq!(entry.add_slice(1, vec![9]), SliceOutcome::Duplicate);
        assert!(!entry.is_complete());

        // The overwrite keeps the latest bytes.
        assert_eq!(entry.add_slice(2, vec![2]), SliceOutcome::Completed);
        assert_eq!(entry.assemble(), vec![9, 2]);
        assert_eq!(entry.add_slice(2, vec![0]), SliceOutcome::AlreadyComplete);
    }

    #[test]
    fn test_progress_snapshot() {
        let now = Instant::now();
        let mut registry = AssemblyRegistry::default();
        let entry = registry.entry(key(42), now);
        let _ = entry.add_slice(5, vec![0]);
        let _ = entry.add_slice(2, vec![0]);

        let progress = entry.progress();
        assert_eq!(progress.logical_id, 42);
        assert_eq!(progress.declared, None);
        assert_eq!(progress.received, 2);
        assert_eq!(progress.ordinals, vec![2, 5]);
    }

    #[test]
    fn test_reclaim_reports_incomplete_only() {
        let start = Instant::now();
        let retention = Duration::from_secs(5);
        let mut registry = AssemblyRegistry::default();

        let stale = registry.entry(key(1), start);
        let _ = stale.add_slice(1, vec![0]);

        let done = registry.entry(key(2), start);
        done.describe(7, 1);
        let _ = done.add_slice(1, vec![0]);

        let fresh = registry.entry(key(3), start + Duration::from_secs(4));
        let _ = fresh.add_slice(1, vec![0]);

        let mut failures = Vec::new();
        registry.reclaim_expired(start + Duration::from_secs(6), retention, |f| failures.push(f));

        assert_eq!(registry.len(), 1);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].logical_id, 1);
        assert_eq!(failures[0].received, 1);
    }
}
