//! Wire-agnostic message schemas exchanged between replicas.
//!
//! These carry the semantic content of the RPCs defined by the Raft paper;
//! how a host actually serializes and transports them is out of scope for
//! this crate (see [`crate::collaborators::Sender`]).

use serde::{Deserialize, Serialize};

use crate::entry::Entry;
use crate::ids::{Index, TermId};

/// A request to be elected (or, when `is_pre` is set, a non-binding probe
/// of whether such a request would succeed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgVoteReq {
    pub term: TermId,
    pub last_log_idx: Index,
    pub last_log_term: TermId,
    pub is_pre: bool,
}

/// The outcome of a [`MsgVoteReq`] as seen by the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteGranted {
    Granted,
    NotGranted,
    /// The receiver does not recognize the requesting node as a cluster
    /// member at all; this is the signal a partitioned, removed node uses
    /// to learn that it should shut down.
    UnknownNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgVoteRep {
    pub term: TermId,
    pub vote_granted: VoteGranted,
}

/// A replication/heartbeat request from the leader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgAeReq {
    pub term: TermId,
    pub prev_log_idx: Index,
    pub prev_log_term: TermId,
    pub leader_commit: Index,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgAeRep {
    pub term: TermId,
    pub success: bool,
    /// On success, the index of the last entry now present in the
    /// follower's log. On failure, the follower's current last index, used
    /// by the leader to fast-forward `next_idx` instead of decrementing by
    /// one per round trip.
    pub current_idx: Index,
}
