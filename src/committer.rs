//! The log view: append/pop through the storage collaborator, commit-index
//! and applied-index bookkeeping, and the single-voting-change guard.
//!
//! The committer does not own the log itself — that is the storage
//! collaborator's job — but it is the only code path allowed to mutate
//! `commit_idx`/`last_applied_idx` or decide whether an append is allowed,
//! so every append/pop in the replica goes through here.

use crate::collaborators::{Applier, HostError, Storage};
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::ids::{EntryId, Index, TermId};

#[derive(Debug, Clone, Default)]
pub struct Committer {
    commit_idx: Index,
    last_applied_idx: Index,

    /// Index of the uncommitted voting-change entry currently in flight,
    /// if any. At most one may exist at a time (spec invariant I4 / P7).
    pending_voting_change: Option<Index>,
}

impl Committer {
    pub fn new() -> Self {
        Committer::default()
    }

    pub fn commit_idx(&self) -> Index {
        self.commit_idx
    }

    pub fn last_applied_idx(&self) -> Index {
        self.last_applied_idx
    }

    pub fn voting_change_in_progress(&self) -> bool {
        self.pending_voting_change.is_some()
    }

    pub fn current_idx(&self, storage: &dyn Storage) -> Index {
        storage.last_index()
    }

    pub fn last_term(&self, storage: &dyn Storage) -> TermId {
        storage.term_at(storage.last_index())
    }

    pub fn get(&self, storage: &dyn Storage, idx: Index) -> Option<Entry> {
        if idx == 0 {
            return None;
        }
        storage.entry(idx)
    }

    pub fn is_committed_index(&self, idx: Index) -> bool {
        idx != 0 && idx <= self.commit_idx
    }

    /// Append a new entry built from `term`/`id`/`body` at the end of the
    /// log. Rejects a second concurrent voting-change entry.
    pub fn append(
        &mut self,
        storage: &mut dyn Storage,
        term: TermId,
        id: EntryId,
        body: crate::entry::EntryBody,
    ) -> Result<Entry> {
        if body.is_voting_change() && self.pending_voting_change.is_some() {
            return Err(Error::OneVotingChangeOnly);
        }

        let index = storage.last_index() + 1;
        let entry = Entry::new(term, id, index, body);
        storage
            .append(entry.clone())
            .map_err(|e| Error::StorageFailure(e.to_string()))?;

        if entry.body.is_voting_change() {
            self.pending_voting_change = Some(index);
        }

        Ok(entry)
    }

    /// Remove and return the last entry in the log, undoing any pending
    /// voting-change marker it was responsible for.
    pub fn pop_back(&mut self, storage: &mut dyn Storage) -> Option<Entry> {
        let popped = storage.pop_back()?;
        if self.pending_voting_change == Some(popped.index) {
            self.pending_voting_change = None;
        }
        Some(popped)
    }

    /// Advance `commit_idx` to `idx`, which must not be smaller than the
    /// current value (commit index is monotonic, spec P4).
    pub fn set_commit_idx(&mut self, idx: Index) {
        if idx <= self.commit_idx {
            return;
        }
        self.commit_idx = idx;
        self.clear_resolved_voting_change();
    }

    /// `commit_idx <- min(leader_commit, last_new_index)`, never decreasing.
    pub fn commit_till(&mut self, leader_commit: Index, last_new_index: Index) {
        if leader_commit > self.commit_idx {
            let next = std::cmp::min(leader_commit, last_new_index);
            self.set_commit_idx(next);
        }
    }

    /// Jump `commit_idx` straight to the tail of the log: used by the
    /// sole-voting-member fast path where there is no one else to wait on.
    pub fn commit_all(&mut self, storage: &dyn Storage) {
        self.set_commit_idx(storage.last_index());
    }

    fn clear_resolved_voting_change(&mut self) {
        if let Some(idx) = self.pending_voting_change {
            if idx <= self.commit_idx {
                self.pending_voting_change = None;
            }
        }
    }

    /// Apply the next committed-but-unapplied entry, in order, one at a
    /// time. Returns `NothingToApply` once `last_applied_idx == commit_idx`.
    pub fn apply_one(&mut self, storage: &dyn Storage, applier: &mut dyn Applier) -> Result<Entry> {
        if self.last_applied_idx >= self.commit_idx {
            return Err(Error::NothingToApply);
        }

        let idx = self.last_applied_idx + 1;
        let entry = storage
            .entry(idx)
            .expect("a committed index must have a corresponding log entry");

        applier
            .apply(&entry)
            .map_err(|e| Error::ApplyFailure(e.to_string()))?;

        self.last_applied_idx = idx;
        Ok(entry)
    }
}
