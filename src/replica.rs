//! The replica state machine: the orchestrator that ties [`Nodes`],
//! [`Committer`] and [`Timer`] together and exposes the host-facing API.
//!
//! Every public method here runs to completion without suspending (spec
//! concurrency model): there is no locking, no async, and no blocking on
//! the collaborators. A host serializes ticks, incoming messages and
//! client submissions into these methods one at a time.

use std::time::Duration;

use tracing::{debug, trace};

use crate::collaborators::{Applier, HostError, Sender, Storage};
use crate::committer::Committer;
use crate::config::Config;
use crate::entry::{Entry, EntryBody};
use crate::error::{Error, Result};
use crate::ids::{EntryId, Index, NodeId, TermId};
use crate::message::{MsgAeRep, MsgAeReq, MsgVoteRep, MsgVoteReq, VoteGranted};
use crate::nodes::{CommitEffect, Nodes};
use crate::timer::Timer;

/// Where a replica sits in the Raft role lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Follower,
    PreCandidate,
    Candidate,
    Leader,
    Shutdown,
}

/// The outcome of a successful [`Replica::add_entry`] (or the internal
/// membership-change helpers built on top of it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proposal {
    pub term: TermId,
    pub id: EntryId,
    pub idx: Index,
}

/// A single-process Raft replica, generic over its three collaborators.
pub struct Replica<S: Storage, D: Sender, A: Applier> {
    role: Role,
    current_term: TermId,
    voted_for: Option<NodeId>,
    current_leader: Option<NodeId>,

    nodes: Nodes,
    committer: Committer,
    timer: Timer,

    storage: S,
    sender: D,
    applier: A,
}

impl<S: Storage, D: Sender, A: Applier> Replica<S, D, A> {
    /// Boot a brand new single-node cluster. `me` immediately becomes the
    /// sole voting member and elects itself leader; the bootstrap `AddNode`
    /// for `me` is committed synchronously since there is no one else to
    /// wait on.
    pub fn new_single(me: NodeId, config: Config, storage: S, sender: D, applier: A) -> Result<Self> {
        let term = storage.term();
        let voted_for = storage.vote();

        let mut replica = Replica {
            role: Role::Follower,
            current_term: term,
            voted_for,
            current_leader: None,
            nodes: Nodes::new_single(me),
            committer: Committer::new(),
            timer: Timer::new(config),
            storage,
            sender,
            applier,
        };

        replica.become_leader()?;
        let bootstrap = replica
            .committer
            .append(&mut replica.storage, replica.current_term, 0, EntryBody::add_node(me))?;
        replica.nodes.apply_on_append(&bootstrap.body, bootstrap.index);
        replica.committer.commit_all(&replica.storage);

        Ok(replica)
    }

    /// Boot as a member of an already-known cluster membership list.
    /// `members` should include `me`; the replica starts as a Follower and
    /// waits to either hear from a leader or time out into an election.
    pub fn new_with_members(
        me: NodeId,
        members: &[NodeId],
        config: Config,
        storage: S,
        sender: D,
        applier: A,
    ) -> Result<Self> {
        let term = storage.term();
        let voted_for = storage.vote();

        Ok(Replica {
            role: Role::Follower,
            current_term: term,
            voted_for,
            current_leader: None,
            nodes: Nodes::new_with_members(me, members),
            committer: Committer::new(),
            timer: Timer::new(config),
            storage,
            sender,
            applier,
        })
    }

    // -- read-only accessors -------------------------------------------------

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn current_term(&self) -> TermId {
        self.current_term
    }

    pub fn current_leader(&self) -> Option<NodeId> {
        self.current_leader
    }

    pub fn commit_idx(&self) -> Index {
        self.committer.commit_idx()
    }

    pub fn last_applied_idx(&self) -> Index {
        self.committer.last_applied_idx()
    }

    pub fn last_log_idx(&self) -> Index {
        self.committer.current_idx(&self.storage)
    }

    fn last_log_term(&self) -> TermId {
        self.committer.last_term(&self.storage)
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.role == Role::Shutdown {
            return Err(Error::Shutdown);
        }
        Ok(())
    }

    // -- tick -----------------------------------------------------------------

    /// Advance the replica's clock by `elapsed` and react to whatever
    /// timers that crosses (spec §4.8).
    pub fn tick(&mut self, elapsed: Duration) -> Result<()> {
        self.ensure_alive()?;
        self.timer.add_elapsed(elapsed);

        if self.nodes.is_me_the_only_voting() && self.role != Role::Leader {
            self.become_leader()?;
            self.committer.commit_all(&self.storage);
        } else if self.role == Role::Leader {
            if self.timer.is_time_to_ping() {
                self.broadcast_append_entries();
                self.timer.reset_elapsed();
            }
        } else if self.timer.is_time_to_elect() && self.nodes.is_me_voting() {
            self.start_election()?;
        }

        self.drain_applied()?;
        Ok(())
    }

    fn drain_applied(&mut self) -> Result<()> {
        loop {
            match self.committer.apply_one(&self.storage, &mut self.applier) {
                Ok(entry) => self.finalize_applied(&entry),
                Err(Error::NothingToApply) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    fn finalize_applied(&mut self, entry: &Entry) {
        if let CommitEffect::ShutdownSelf = self.nodes.apply_on_commit(&entry.body) {
            debug!(node = self.nodes.me(), term = self.current_term, "shutting down: self removed from cluster");
            self.role = Role::Shutdown;
        }
    }

    // -- elections --------------------------------------------------------------

    /// Start (or restart) an election: send a non-disruptive PreVote round
    /// at `current_term + 1` without bumping `current_term` yet (spec
    /// §4.1 PreVote rationale).
    pub fn start_election(&mut self) -> Result<()> {
        self.ensure_alive()?;

        self.role = Role::PreCandidate;
        self.timer.randomize_election_timeout();
        self.timer.reset_elapsed();
        self.nodes.reset_all_votes();

        let req = MsgVoteReq {
            term: self.current_term + 1,
            last_log_idx: self.last_log_idx(),
            last_log_term: self.last_log_term(),
            is_pre: true,
        };

        trace!(node = self.nodes.me(), term = req.term, "starting prevote round");
        self.broadcast_vote_request(req);
        Ok(())
    }

    fn become_candidate(&mut self) -> Result<()> {
        self.current_term += 1;
        self.voted_for = Some(self.nodes.me());
        self.storage
            .persist_term_vote(self.current_term, self.voted_for)
            .map_err(|e| Error::StorageFailure(e.to_string()))?;

        self.role = Role::Candidate;
        self.current_leader = None;
        self.nodes.reset_all_votes();
        self.timer.randomize_election_timeout();
        self.timer.reset_elapsed();

        let req = MsgVoteReq {
            term: self.current_term,
            last_log_idx: self.last_log_idx(),
            last_log_term: self.last_log_term(),
            is_pre: false,
        };

        debug!(node = self.nodes.me(), term = self.current_term, "became candidate");
        self.broadcast_vote_request(req);
        Ok(())
    }

    fn become_leader(&mut self) -> Result<()> {
        self.role = Role::Leader;
        self.current_leader = Some(self.nodes.me());
        self.nodes.reset_progress_for_leadership(self.last_log_idx());
        self.timer.reset_elapsed();
        debug!(node = self.nodes.me(), term = self.current_term, "became leader");
        Ok(())
    }

    fn become_follower(&mut self, term: TermId) -> Result<()> {
        if term > self.current_term {
            self.current_term = term;
            self.voted_for = None;
            self.storage
                .persist_term_vote(self.current_term, None)
                .map_err(|e| Error::StorageFailure(e.to_string()))?;
        }
        self.role = Role::Follower;
        self.current_leader = None;
        Ok(())
    }

    /// Broadcasts owe every peer a vote request; each is marked deferred
    /// up front, then cleared individually for whichever sends actually go
    /// out. A peer the sender can't reach right now stays marked and is
    /// replayed later through `drain_vote_req`.
    fn broadcast_vote_request(&mut self, req: MsgVoteReq) {
        self.nodes.set_all_need_vote_req(true);
        let peers = self.nodes.peer_ids();
        for peer in peers {
            let sent = self.sender.request_vote(peer, req.clone());
            if let Some(n) = self.nodes.get_mut(peer) {
                n.need_vote_req = !sent;
            }
        }
    }

    fn broadcast_append_entries(&mut self) {
        self.nodes.set_all_need_append_req(true);
        let peers = self.nodes.peer_ids();
        for peer in peers {
            let _ = self.send_appendentries(peer);
        }
    }

    // -- vote RPCs ----------------------------------------------------------

    pub fn accept_vote_req(&mut self, from: NodeId, vr: MsgVoteReq) -> Result<MsgVoteRep> {
        self.ensure_alive()?;

        if !vr.is_pre && vr.term > self.current_term {
            self.become_follower(vr.term)?;
        }

        let is_member = self.nodes.contains(from);
        let granted = self.evaluate_vote_request(&vr);

        if !granted {
            if !is_member {
                return Ok(MsgVoteRep {
                    term: self.current_term,
                    vote_granted: VoteGranted::UnknownNode,
                });
            }
            return Ok(MsgVoteRep {
                term: self.current_term,
                vote_granted: VoteGranted::NotGranted,
            });
        }

        if !vr.is_pre {
            self.voted_for = Some(from);
            self.storage
                .persist_term_vote(self.current_term, self.voted_for)
                .map_err(|e| Error::StorageFailure(e.to_string()))?;
            self.timer.reset_elapsed();
            self.current_leader = None;
        }

        trace!(node = self.nodes.me(), candidate = from, pre = vr.is_pre, "granting vote");
        Ok(MsgVoteRep {
            term: self.current_term,
            vote_granted: VoteGranted::Granted,
        })
    }

    fn evaluate_vote_request(&self, vr: &MsgVoteReq) -> bool {
        if !self.nodes.is_me_voting() {
            return false;
        }
        if vr.term < self.current_term {
            return false;
        }
        if !vr.is_pre && self.current_term == vr.term && self.voted_for.is_some() {
            return false;
        }

        let my_last_term = self.last_log_term();
        let my_last_idx = self.last_log_idx();
        vr.last_log_term > my_last_term || (vr.last_log_term == my_last_term && vr.last_log_idx >= my_last_idx)
    }

    pub fn accept_vote_rep(&mut self, from: NodeId, rep: MsgVoteRep) -> Result<()> {
        self.ensure_alive()?;

        if self.role != Role::PreCandidate && self.role != Role::Candidate {
            return Ok(());
        }

        if rep.vote_granted == VoteGranted::UnknownNode {
            debug!(node = self.nodes.me(), "peer reports us unknown, shutting down");
            self.role = Role::Shutdown;
            return Ok(());
        }

        if rep.term > self.current_term {
            self.become_follower(rep.term)?;
            return Ok(());
        }
        if rep.term < self.current_term {
            return Ok(());
        }

        if rep.vote_granted != VoteGranted::Granted {
            return Ok(());
        }

        if let Some(n) = self.nodes.get_mut(from) {
            n.has_vote_for_me = true;
        }

        let reference = self.nodes.clone();
        match self.role {
            Role::Candidate => {
                if self.nodes.has_vote_majority(self.voted_for, &reference) {
                    self.become_leader()?;
                    let noop = self
                        .committer
                        .append(&mut self.storage, self.current_term, 0, EntryBody::noop())?;
                    self.nodes.apply_on_append(&noop.body, self.last_log_idx());
                    self.broadcast_append_entries();
                }
            }
            Role::PreCandidate => {
                // PreVote tallies against a hypothetical vote for self at
                // term + 1; we are not the recorded voter yet, so count
                // ourselves explicitly.
                let votes = self.nodes.votes_for_me(Some(self.nodes.me()), &reference);
                let num_voting = self.nodes.num_voting_members(&reference);
                if num_voting > 0 && votes >= num_voting / 2 + 1 {
                    self.become_candidate()?;
                }
            }
            _ => {}
        }

        Ok(())
    }

    // -- append entries RPCs --------------------------------------------------

    pub fn accept_ae_req(&mut self, from: NodeId, req: MsgAeReq) -> Result<MsgAeRep> {
        self.ensure_alive()?;

        if req.term == self.current_term && (self.role == Role::Candidate || self.role == Role::PreCandidate) {
            self.become_follower(req.term)?;
        }
        if req.term > self.current_term {
            self.become_follower(req.term)?;
        }
        if req.term < self.current_term {
            return Ok(MsgAeRep {
                term: self.current_term,
                success: false,
                current_idx: self.last_log_idx(),
            });
        }

        self.current_leader = Some(from);
        self.timer.reset_elapsed();

        if req.prev_log_idx > 0 && self.committer.get(&self.storage, req.prev_log_idx).is_none() {
            return Ok(MsgAeRep {
                term: self.current_term,
                success: false,
                current_idx: self.last_log_idx(),
            });
        }

        // Default: every incoming entry already matches locally, so there is
        // nothing left to append.
        let mut start = req.entries.len();
        for (k, incoming) in req.entries.iter().enumerate() {
            let target = req.prev_log_idx + 1 + k as Index;
            match self.committer.get(&self.storage, target) {
                Some(existing) if existing.term != incoming.term => {
                    debug_assert!(
                        target > self.committer.commit_idx(),
                        "leader attempted to overwrite a committed entry"
                    );
                    self.truncate_to(target);
                    start = k;
                    break;
                }
                Some(_) => continue,
                None => {
                    start = k;
                    break;
                }
            }
        }

        for incoming in req.entries.iter().skip(start) {
            self.committer
                .append(&mut self.storage, incoming.term, incoming.id, incoming.body.clone())?;
            self.nodes.apply_on_append(&incoming.body, self.last_log_idx());
        }

        let my_last_idx = self.last_log_idx();
        self.committer.commit_till(req.leader_commit, my_last_idx);

        Ok(MsgAeRep {
            term: self.current_term,
            success: true,
            current_idx: my_last_idx,
        })
    }

    fn truncate_to(&mut self, from_idx: Index) {
        while self.committer.current_idx(&self.storage) >= from_idx {
            if let Some(popped) = self.committer.pop_back(&mut self.storage) {
                self.nodes.apply_on_pop(&popped.body, self.committer.current_idx(&self.storage));
            } else {
                break;
            }
        }
    }

    pub fn accept_ae_rep(&mut self, from: NodeId, rep: MsgAeRep) -> Result<()> {
        self.ensure_alive()?;
        if self.role != Role::Leader {
            return Err(Error::NotLeader);
        }

        if rep.term > self.current_term {
            self.become_follower(rep.term)?;
            return Ok(());
        }
        if rep.term < self.current_term {
            return Ok(());
        }

        let (next_idx, match_idx) = match self.nodes.get(from) {
            Some(n) => (n.next_idx, n.match_idx),
            None => return Err(Error::NodeUnknown(from)),
        };

        if !rep.success {
            let candidate_next_idx = if rep.current_idx < next_idx.saturating_sub(1) {
                std::cmp::min(rep.current_idx + 1, self.last_log_idx())
            } else {
                next_idx.saturating_sub(1).max(1)
            };
            if candidate_next_idx <= match_idx {
                // stale reply: match_idx already proves more progress than
                // this backoff would assume, so it contradicts what we
                // already know and must be ignored.
                return Ok(());
            }
            if let Some(n) = self.nodes.get_mut(from) {
                n.next_idx = candidate_next_idx;
            }
            self.send_appendentries(from)?;
            return Ok(());
        }

        if rep.current_idx <= match_idx {
            return Ok(());
        }

        if let Some(n) = self.nodes.get_mut(from) {
            n.next_idx = rep.current_idx + 1;
            n.match_idx = rep.current_idx;
        }

        self.maybe_promote(from)?;
        self.maybe_advance_commit(rep.current_idx)?;

        if self.nodes.get(from).map(|n| n.next_idx <= self.last_log_idx()).unwrap_or(false) {
            self.send_appendentries(from)?;
        }

        Ok(())
    }

    fn maybe_promote(&mut self, peer: NodeId) -> Result<()> {
        let last_idx = self.last_log_idx();
        let should_promote = match self.nodes.get(peer) {
            Some(n) => {
                !n.is_voting
                    && !self.committer.voting_change_in_progress()
                    && !n.has_sufficient_logs
                    && n.match_idx + 1 >= last_idx
            }
            None => false,
        };

        if should_promote {
            let entry = self
                .committer
                .append(&mut self.storage, self.current_term, 0, EntryBody::add_node(peer))?;
            self.nodes.apply_on_append(&entry.body, self.last_log_idx());
            if let Some(n) = self.nodes.get_mut(peer) {
                n.has_sufficient_logs = true;
            }
        }
        Ok(())
    }

    fn maybe_advance_commit(&mut self, idx: Index) -> Result<()> {
        if self.committer.is_committed_index(idx) {
            return Ok(());
        }
        let entry_term = self.storage.term_at(idx);
        if entry_term != self.current_term {
            return Ok(());
        }
        let reference = self.nodes.clone();
        if self.nodes.is_committed(idx, &reference) {
            self.committer.set_commit_idx(idx);
        }
        Ok(())
    }

    // -- client/admin submissions ---------------------------------------------

    pub fn add_entry(&mut self, id: EntryId, bytes: Vec<u8>) -> Result<Proposal> {
        self.submit(id, EntryBody::User(bytes))
    }

    pub fn add_node(&mut self, id: EntryId, node: NodeId) -> Result<Proposal> {
        self.submit(id, EntryBody::add_non_voting_node(node))
    }

    pub fn remove_node(&mut self, id: EntryId, node: NodeId) -> Result<Proposal> {
        self.submit(id, EntryBody::remove_node(node))
    }

    fn submit(&mut self, id: EntryId, body: EntryBody) -> Result<Proposal> {
        self.ensure_alive()?;
        if self.role != Role::Leader {
            return Err(Error::NotLeader);
        }

        // Captured before the optimistic on-append membership effect: a
        // self-removal would otherwise remove the only voting member before
        // we get to ask whether it was the only voting member, and the
        // entry could never reach a majority to commit.
        let was_sole_voting_member = self.nodes.is_me_the_only_voting();

        let entry = self.committer.append(&mut self.storage, self.current_term, id, body.clone())?;
        self.nodes.apply_on_append(&body, self.last_log_idx());

        if was_sole_voting_member {
            self.committer.commit_all(&self.storage);
        } else {
            let last_idx = self.last_log_idx();
            let caught_up: Vec<NodeId> = self
                .nodes
                .peer_ids()
                .into_iter()
                .filter(|id| self.nodes.get(*id).map(|n| n.next_idx == last_idx).unwrap_or(false))
                .collect();
            for peer in caught_up {
                self.send_appendentries(peer)?;
            }
        }

        Ok(Proposal {
            term: entry.term,
            id: entry.id,
            idx: entry.index,
        })
    }

    /// Build and send (or defer) an AppendEntries to `peer` carrying
    /// whatever suffix of the log it hasn't seen yet.
    pub fn send_appendentries(&mut self, peer: NodeId) -> Result<()> {
        self.ensure_alive()?;
        if self.role != Role::Leader {
            return Err(Error::NotLeader);
        }
        if self.nodes.is_me(peer) {
            return Err(Error::CantSendToMyself);
        }

        let next_idx = self
            .nodes
            .get(peer)
            .ok_or(Error::NodeUnknown(peer))?
            .next_idx;

        let prev_log_idx = next_idx.saturating_sub(1);
        let prev_log_term = self.storage.term_at(prev_log_idx);
        let entries = self.storage.entries_from(next_idx);

        let req = MsgAeReq {
            term: self.current_term,
            prev_log_idx,
            prev_log_term,
            leader_commit: self.committer.commit_idx(),
            entries,
        };

        let sent = self.sender.append_entries(peer, req);
        if let Some(n) = self.nodes.get_mut(peer) {
            n.need_append_req = !sent;
        }
        Ok(())
    }

    /// Replay a deferred RequestVote to `peer`, if one is owed. The drain
    /// counterpart of `broadcast_vote_request`'s deferred-send path (spec
    /// §5, "Sender unavailability").
    pub fn drain_vote_req(&mut self, peer: NodeId) -> Result<()> {
        self.ensure_alive()?;
        if self.role != Role::PreCandidate && self.role != Role::Candidate {
            return Err(Error::NotCandidate);
        }
        let owed = self.nodes.get(peer).map(|n| n.need_vote_req).unwrap_or(false);
        if !owed {
            return Err(Error::NothingToSend);
        }

        let req = MsgVoteReq {
            term: if self.role == Role::PreCandidate { self.current_term + 1 } else { self.current_term },
            last_log_idx: self.last_log_idx(),
            last_log_term: self.last_log_term(),
            is_pre: self.role == Role::PreCandidate,
        };
        let sent = self.sender.request_vote(peer, req);
        if let Some(n) = self.nodes.get_mut(peer) {
            n.need_vote_req = !sent;
        }
        Ok(())
    }

    /// Replay a deferred AppendEntries to `peer`, if one is owed. The drain
    /// counterpart of `send_appendentries`'s deferred-send path.
    pub fn drain_append_req(&mut self, peer: NodeId) -> Result<()> {
        self.ensure_alive()?;
        if self.role != Role::Leader {
            return Err(Error::NotLeader);
        }
        let owed = self.nodes.get(peer).map(|n| n.need_append_req).unwrap_or(false);
        if !owed {
            return Err(Error::NothingToSend);
        }
        self.send_appendentries(peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Entry;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemStorage {
        term: TermId,
        vote: Option<NodeId>,
        log: Vec<Entry>,
    }

    impl Storage for MemStorage {
        fn term(&self) -> TermId {
            self.term
        }
        fn vote(&self) -> Option<NodeId> {
            self.vote
        }
        fn persist_term_vote(&mut self, term: TermId, vote: Option<NodeId>) -> Result<(), HostError> {
            self.term = term;
            self.vote = vote;
            Ok(())
        }
        fn append(&mut self, entry: Entry) -> Result<(), HostError> {
            self.log.push(entry);
            Ok(())
        }
        fn pop_back(&mut self) -> Option<Entry> {
            self.log.pop()
        }
        fn entry(&self, idx: Index) -> Option<Entry> {
            if idx == 0 {
                return None;
            }
            self.log.get((idx - 1) as usize).cloned()
        }
        fn entries_from(&self, from: Index) -> Vec<Entry> {
            if from == 0 || from as usize > self.log.len() + 1 {
                return vec![];
            }
            if (from - 1) as usize >= self.log.len() {
                return vec![];
            }
            self.log[(from - 1) as usize..].to_vec()
        }
        fn last_index(&self) -> Index {
            self.log.len() as Index
        }
        fn term_at(&self, idx: Index) -> TermId {
            if idx == 0 {
                0
            } else {
                self.log.get((idx - 1) as usize).map(|e| e.term).unwrap_or(0)
            }
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        vote_reqs: Vec<(NodeId, MsgVoteReq)>,
        ae_reqs: Vec<(NodeId, MsgAeReq)>,
    }

    impl Sender for RecordingSender {
        fn request_vote(&mut self, to: NodeId, req: MsgVoteReq) -> bool {
            self.vote_reqs.push((to, req));
            true
        }
        fn append_entries(&mut self, to: NodeId, req: MsgAeReq) -> bool {
            self.ae_reqs.push((to, req));
            true
        }
    }

    /// A sender that refuses its first send to each recipient, then
    /// accepts every send after that. Lets tests exercise the
    /// deferred-send / drain path without a real transport.
    #[derive(Default)]
    struct FlakySender {
        refused_once: std::collections::HashSet<NodeId>,
        vote_reqs: Vec<(NodeId, MsgVoteReq)>,
    }

    impl Sender for FlakySender {
        fn request_vote(&mut self, to: NodeId, req: MsgVoteReq) -> bool {
            if self.refused_once.insert(to) {
                return false;
            }
            self.vote_reqs.push((to, req));
            true
        }
        fn append_entries(&mut self, _to: NodeId, _req: MsgAeReq) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct RecordingApplier {
        applied: Vec<Entry>,
    }

    impl Applier for RecordingApplier {
        fn apply(&mut self, entry: &Entry) -> Result<(), HostError> {
            self.applied.push(entry.clone());
            Ok(())
        }
        fn log(&mut self, _message: &str) {}
    }

    fn single_node() -> Replica<MemStorage, RecordingSender, RecordingApplier> {
        Replica::new_single(1, Config::default(), MemStorage::default(), RecordingSender::default(), RecordingApplier::default()).unwrap()
    }

    #[test]
    fn single_node_self_elects_and_commits_bootstrap_entry() {
        let r = single_node();
        assert_eq!(r.role(), Role::Leader);
        assert_eq!(r.commit_idx(), 1);
    }

    #[test]
    fn add_entry_requires_leadership() {
        let mut r = Replica::new_with_members(
            2,
            &[1, 2, 3],
            Config::default(),
            MemStorage::default(),
            RecordingSender::default(),
            RecordingApplier::default(),
        )
        .unwrap();
        let err = r.add_entry(1, vec![1, 2, 3]);
        assert!(matches!(err, Err(Error::NotLeader)));
    }

    #[test]
    fn shutdown_is_sticky() {
        let mut r = single_node();
        r.remove_node(1, 1).unwrap();
        r.tick(Duration::from_millis(1)).unwrap();
        assert_eq!(r.role(), Role::Shutdown);
        let err = r.add_entry(2, vec![]);
        assert!(matches!(err, Err(Error::Shutdown)));
    }

    #[test]
    fn three_node_election_reaches_leader_on_majority() {
        let mut a = Replica::new_with_members(
            1,
            &[1, 2, 3],
            Config::default(),
            MemStorage::default(),
            RecordingSender::default(),
            RecordingApplier::default(),
        )
        .unwrap();

        a.start_election().unwrap();
        assert_eq!(a.role(), Role::PreCandidate);

        a.accept_vote_rep(2, MsgVoteRep { term: 0, vote_granted: VoteGranted::Granted }).unwrap();
        a.accept_vote_rep(3, MsgVoteRep { term: 0, vote_granted: VoteGranted::Granted }).unwrap();
        assert_eq!(a.role(), Role::Candidate);
        assert_eq!(a.current_term(), 1);

        a.accept_vote_rep(2, MsgVoteRep { term: 1, vote_granted: VoteGranted::Granted }).unwrap();
        assert_eq!(a.role(), Role::Leader);
    }

    #[test]
    fn unknown_node_vote_reply_triggers_shutdown() {
        let mut a = Replica::new_with_members(
            1,
            &[1, 2, 3],
            Config::default(),
            MemStorage::default(),
            RecordingSender::default(),
            RecordingApplier::default(),
        )
        .unwrap();
        a.start_election().unwrap();
        a.accept_vote_rep(2, MsgVoteRep { term: 0, vote_granted: VoteGranted::UnknownNode }).unwrap();
        assert_eq!(a.role(), Role::Shutdown);
    }

    #[test]
    fn stale_append_entries_reply_is_ignored() {
        let mut a = single_node();
        a.nodes.add_node(9, true, 0);
        a.nodes.get_mut(9).unwrap().next_idx = 10;
        a.nodes.get_mut(9).unwrap().match_idx = 9;
        let before = a.nodes.get(9).unwrap().clone();
        a.accept_ae_rep(9, MsgAeRep { term: a.current_term(), success: false, current_idx: 3 }).unwrap();
        let after = a.nodes.get(9).unwrap().clone();
        assert_eq!(before, after);
    }

    #[test]
    fn unavailable_sender_defers_vote_request_until_drained() {
        let mut a = Replica::new_with_members(
            1,
            &[1, 2, 3],
            Config::default(),
            MemStorage::default(),
            FlakySender::default(),
            RecordingApplier::default(),
        )
        .unwrap();

        a.start_election().unwrap();
        assert!(a.nodes.get(2).unwrap().need_vote_req, "first send refused, should stay marked");

        a.drain_vote_req(2).unwrap();
        assert!(!a.nodes.get(2).unwrap().need_vote_req, "drain resent and succeeded");
        assert_eq!(a.sender.vote_reqs.len(), 1);

        let err = a.drain_vote_req(2);
        assert!(matches!(err, Err(Error::NothingToSend)));
    }

    #[test]
    fn drain_vote_req_requires_candidate_role() {
        let mut r = Replica::new_with_members(
            2,
            &[1, 2, 3],
            Config::default(),
            MemStorage::default(),
            RecordingSender::default(),
            RecordingApplier::default(),
        )
        .unwrap();
        let err = r.drain_vote_req(1);
        assert!(matches!(err, Err(Error::NotCandidate)));
    }

    #[allow(dead_code)]
    fn _unused(_m: HashMap<u8, u8>) {}
}
