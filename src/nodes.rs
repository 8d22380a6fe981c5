//! The membership registry: one [`NodeRecord`] per known peer (including
//! self), their replication progress, and the vote-tally / commit-majority
//! predicates used by the replica.
//!
//! Mirrors the reference implementation's `Nodes` class, but keeps each
//! peer's bookkeeping (`next_idx`, `match_idx`, the deferred-send flags,
//! vote/sufficient-logs markers) on a record that lives for as long as the
//! peer is known, rather than recreating it fresh in role-specific state
//! every time the replica becomes leader or candidate.

use std::collections::HashMap;

use crate::entry::EntryBody;
use crate::ids::{Index, NodeId};

/// Per-peer record. A `Nodes` registry holds one of these for every node
/// currently known to the replica, including itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub id: NodeId,
    pub is_voting: bool,
    pub is_me: bool,

    /// Set once this peer has granted us a vote in the current election.
    pub has_vote_for_me: bool,

    /// Set once a non-voting peer has caught up closely enough that we
    /// have already proposed promoting it; prevents re-proposing on every
    /// subsequent successful AppendEntries response.
    pub has_sufficient_logs: bool,

    /// Set when a RequestVote to this peer could not be sent because no
    /// sender was available; cleared once successfully (re)sent.
    pub need_vote_req: bool,

    /// Same as `need_vote_req` but for AppendEntries.
    pub need_append_req: bool,

    /// Leader's view: index of the next log entry to send this peer.
    pub next_idx: Index,

    /// Leader's view: highest index known to be durably replicated on
    /// this peer.
    pub match_idx: Index,
}

impl NodeRecord {
    fn new(id: NodeId, is_me: bool, is_voting: bool, last_log_index: Index) -> Self {
        NodeRecord {
            id,
            is_voting,
            is_me,
            has_vote_for_me: false,
            has_sufficient_logs: false,
            need_vote_req: false,
            need_append_req: false,
            next_idx: last_log_index + 1,
            match_idx: if is_me { last_log_index } else { 0 },
        }
    }
}

/// The effect of committing an internal entry, as observed by the caller
/// (the replica needs to know specifically about self-removal so it can
/// transition to `Shutdown`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitEffect {
    None,
    /// A `RemoveNode` entry naming this replica's own id was just committed.
    ShutdownSelf,
}

/// The cluster membership known to this replica, plus per-peer
/// replication/vote bookkeeping.
#[derive(Debug, Clone)]
pub struct Nodes {
    me: NodeId,
    records: HashMap<NodeId, NodeRecord>,
}

impl Nodes {
    /// A brand new single-node cluster: `me` is the only (voting) member.
    pub fn new_single(me: NodeId) -> Self {
        let mut records = HashMap::new();
        records.insert(me, NodeRecord::new(me, true, true, 0));
        Nodes { me, records }
    }

    /// A replica joining (or rejoining) a cluster with a known initial
    /// membership list. `members` should include `me`.
    pub fn new_with_members(me: NodeId, members: &[NodeId]) -> Self {
        let mut records = HashMap::new();
        for &id in members {
            records.insert(id, NodeRecord::new(id, id == me, true, 0));
        }
        records.entry(me).or_insert_with(|| NodeRecord::new(me, true, true, 0));
        Nodes { me, records }
    }

    pub fn me(&self) -> NodeId {
        self.me
    }

    pub fn is_me(&self, id: NodeId) -> bool {
        id == self.me
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeRecord> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeRecord> {
        self.records.get_mut(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.records.contains_key(&id)
    }

    /// All known node ids, in ascending order (for deterministic iteration
    /// and tests).
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.records.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// All node ids other than our own, in ascending order.
    pub fn peer_ids(&self) -> Vec<NodeId> {
        self.ids().into_iter().filter(|id| *id != self.me).collect()
    }

    pub fn is_me_voting(&self) -> bool {
        self.records.get(&self.me).map(|n| n.is_voting).unwrap_or(false)
    }

    /// True iff `me` is the cluster's only voting member: the fast path
    /// that lets a lone replica elect itself without waiting on a timer.
    pub fn is_me_the_only_voting(&self) -> bool {
        self.is_me_voting() && self.records.values().filter(|n| n.is_voting).count() == 1
    }

    /// Add `id` to the registry (creating it if absent) and ensure it is
    /// marked voting if `is_voting` is true. Mirrors the reference
    /// implementation: re-adding an existing node only ever promotes it,
    /// never demotes it.
    pub fn add_node(&mut self, id: NodeId, is_voting: bool, last_log_index: Index) -> &mut NodeRecord {
        let is_me = id == self.me;
        let entry = self
            .records
            .entry(id)
            .or_insert_with(|| NodeRecord::new(id, is_me, is_voting, last_log_index));
        if is_voting {
            entry.is_voting = true;
        }
        entry
    }

    pub fn remove_node(&mut self, id: NodeId) {
        self.records.remove(&id);
    }

    pub fn reset_all_votes(&mut self) {
        for n in self.records.values_mut() {
            n.has_vote_for_me = false;
        }
    }

    pub fn set_all_need_vote_req(&mut self, need: bool) {
        for n in self.records.values_mut() {
            n.need_vote_req = need;
        }
    }

    pub fn set_all_need_append_req(&mut self, need: bool) {
        for n in self.records.values_mut() {
            n.need_append_req = need;
        }
    }

    /// Re-initialize every peer's replication progress as of becoming
    /// leader: `next_idx = last_log_index + 1`, `match_idx = 0` (or
    /// `last_log_index` for self).
    pub fn reset_progress_for_leadership(&mut self, last_log_index: Index) {
        for n in self.records.values_mut() {
            n.next_idx = last_log_index + 1;
            n.match_idx = if n.is_me { last_log_index } else { 0 };
            n.need_vote_req = false;
        }
    }

    /// Number of voting members present in both `self` and `reference`.
    /// With a single configuration in effect, `reference` is simply
    /// `self`; the parameter exists so a future joint-consensus extension
    /// can pass a second, independent configuration without restructuring
    /// this method (spec design note: "joint-configuration hook").
    pub fn num_voting_members(&self, reference: &Nodes) -> usize {
        self.records
            .values()
            .filter(|n| n.is_voting && reference.contains(n.id))
            .count()
    }

    /// Number of voting members (present in `reference`) that have granted
    /// us a vote this election, plus our own vote if `voted_for == me`.
    pub fn votes_for_me(&self, voted_for: Option<NodeId>, reference: &Nodes) -> usize {
        let mut votes = self
            .records
            .values()
            .filter(|n| !n.is_me && n.is_voting && n.has_vote_for_me && reference.contains(n.id))
            .count();
        if voted_for == Some(self.me) {
            votes += 1;
        }
        votes
    }

    /// Whether `votes_for_me(voted_for, reference)` constitutes a majority
    /// of `num_voting_members(reference)`.
    pub fn has_vote_majority(&self, voted_for: Option<NodeId>, reference: &Nodes) -> bool {
        let num = self.num_voting_members(reference);
        let votes = self.votes_for_me(voted_for, reference);
        majority_reached(num, votes)
    }

    /// Whether a majority of voting members (per `reference`) have
    /// replicated at least up to `idx`, counting ourselves as always
    /// caught up with our own log.
    pub fn is_committed(&self, idx: Index, reference: &Nodes) -> bool {
        let mut votes = 1; // ourselves
        for n in self.records.values() {
            if !n.is_me && n.is_voting && reference.contains(n.id) && n.match_idx >= idx {
                votes += 1;
            }
        }
        let num = self.num_voting_members(reference);
        majority_reached(num, votes)
    }

    /// Apply the on-append membership effect of `body` (spec §4.5). Takes
    /// effect immediately, ahead of commit, for routing/voting purposes.
    pub fn apply_on_append(&mut self, body: &EntryBody, last_log_index: Index) {
        if let EntryBody::Internal { kind, node } = body {
            use crate::entry::InternalKind::*;
            match kind {
                AddNonVotingNode => {
                    if !self.is_me(*node) && !self.contains(*node) {
                        self.add_node(*node, false, last_log_index);
                    }
                }
                AddNode => {
                    self.add_node(*node, true, last_log_index);
                }
                DemoteNode => {
                    if let Some(n) = self.get_mut(*node) {
                        n.is_voting = false;
                    }
                }
                RemoveNode => {
                    self.remove_node(*node);
                }
                Noop => {}
            }
        }
    }

    /// Apply the on-commit membership effect of `body` (spec §4.5).
    pub fn apply_on_commit(&mut self, body: &EntryBody) -> CommitEffect {
        if let EntryBody::Internal { kind, node } = body {
            use crate::entry::InternalKind::*;
            match kind {
                AddNode => {
                    if let Some(n) = self.get_mut(*node) {
                        n.has_sufficient_logs = true;
                    }
                    CommitEffect::None
                }
                RemoveNode => {
                    if self.is_me(*node) {
                        CommitEffect::ShutdownSelf
                    } else {
                        CommitEffect::None
                    }
                }
                AddNonVotingNode | DemoteNode | Noop => CommitEffect::None,
            }
        } else {
            CommitEffect::None
        }
    }

    /// Reverse the on-append membership effect of `body` because the
    /// entry that caused it is being truncated off the log's uncommitted
    /// tail (spec §4.5, "On truncation (pop)").
    pub fn apply_on_pop(&mut self, body: &EntryBody, last_log_index: Index) {
        if let EntryBody::Internal { kind, node } = body {
            use crate::entry::InternalKind::*;
            match kind {
                AddNonVotingNode => {
                    self.remove_node(*node);
                }
                AddNode => {
                    if let Some(n) = self.get_mut(*node) {
                        n.is_voting = false;
                    }
                }
                DemoteNode => {
                    if let Some(n) = self.get_mut(*node) {
                        n.is_voting = true;
                    } else {
                        self.add_node(*node, true, last_log_index);
                    }
                }
                RemoveNode => {
                    // The spec adopts the conservative restoration: the
                    // node comes back as non-voting regardless of what it
                    // was before removal (see SPEC_FULL.md / DESIGN.md).
                    self.add_node(*node, false, last_log_index);
                }
                Noop => {}
            }
        }
    }
}

/// `floor(num / 2) + 1`, except an empty configuration can never reach a
/// majority no matter how many votes are tallied.
fn majority_reached(num_voting: usize, votes: usize) -> bool {
    if num_voting == 0 {
        return false;
    }
    votes >= num_voting / 2 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_node_self_elects() {
        let nodes = Nodes::new_single(1);
        assert!(nodes.is_me_the_only_voting());
        assert!(nodes.has_vote_majority(Some(1), &nodes));
    }

    #[test]
    fn three_node_majority_needs_two_votes() {
        let mut nodes = Nodes::new_with_members(1, &[1, 2, 3]);
        let reference = nodes.clone();
        assert!(!nodes.has_vote_majority(None, &reference));
        assert!(!nodes.has_vote_majority(Some(1), &reference));
        nodes.get_mut(2).unwrap().has_vote_for_me = true;
        assert!(nodes.has_vote_majority(Some(1), &reference));
    }

    #[test]
    fn commit_majority_counts_self() {
        let mut nodes = Nodes::new_with_members(1, &[1, 2, 3]);
        let reference = nodes.clone();
        assert!(!nodes.is_committed(5, &reference));
        nodes.get_mut(2).unwrap().match_idx = 5;
        assert!(nodes.is_committed(5, &reference));
    }

    #[test]
    fn add_non_voting_then_promote() {
        let mut nodes = Nodes::new_single(1);
        nodes.apply_on_append(&EntryBody::add_non_voting_node(4), 0);
        assert!(!nodes.get(4).unwrap().is_voting);
        nodes.apply_on_append(&EntryBody::add_node(4), 1);
        assert!(nodes.get(4).unwrap().is_voting);
    }

    #[test]
    fn truncating_add_non_voting_removes_it() {
        let mut nodes = Nodes::new_single(1);
        let body = EntryBody::add_non_voting_node(4);
        nodes.apply_on_append(&body, 0);
        assert!(nodes.contains(4));
        nodes.apply_on_pop(&body, 0);
        assert!(!nodes.contains(4));
    }

    #[test]
    fn truncating_demote_restores_voting() {
        let mut nodes = Nodes::new_with_members(1, &[1, 2]);
        let body = EntryBody::demote_node(2);
        nodes.apply_on_append(&body, 0);
        assert!(!nodes.get(2).unwrap().is_voting);
        nodes.apply_on_pop(&body, 0);
        assert!(nodes.get(2).unwrap().is_voting);
    }

    #[test]
    fn committing_remove_self_signals_shutdown() {
        let mut nodes = Nodes::new_single(1);
        let effect = nodes.apply_on_commit(&EntryBody::remove_node(1));
        assert_eq!(effect, CommitEffect::ShutdownSelf);
    }
}
