//! Error taxonomy for the replica's public operations.
//!
//! The set of variants is closed and enumerable: every public method on
//! [`crate::replica::Replica`] returns one of these, never an opaque boxed
//! error, so hosts can match on failure and decide how to react (retry,
//! redirect to the leader, tear the process down, ...).

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The replica has shut down (observed its own removal, or was told by
    /// a peer that it is unknown to the cluster). Sticky: once returned,
    /// every subsequent operation on the replica returns this again.
    #[error("replica has shut down")]
    Shutdown,

    /// The operation requires the replica to be the current leader.
    #[error("replica is not the leader")]
    NotLeader,

    /// The operation requires the replica to be a (pre)candidate.
    #[error("replica is not a candidate")]
    NotCandidate,

    /// The operation requires the replica to be a follower.
    #[error("replica is not a follower")]
    NotFollower,

    /// The referenced node id is not part of the current membership.
    #[error("node {0} is not a member of this cluster")]
    NodeUnknown(crate::ids::NodeId),

    /// A message or operation was addressed to this replica's own id where
    /// that makes no sense (e.g. sending an AppendEntries to ourselves).
    #[error("cannot send a message to myself")]
    CantSendToMyself,

    /// There was nothing new to send to the requested peer.
    #[error("nothing to send")]
    NothingToSend,

    /// `apply_one` was called but `last_applied_idx == commit_idx`.
    #[error("nothing to apply")]
    NothingToApply,

    /// A membership-change entry was proposed while another one is still
    /// uncommitted. Raft allows at most one in flight.
    #[error("only one voting configuration change may be pending at a time")]
    OneVotingChangeOnly,

    /// The storage collaborator failed to persist term/vote or log state.
    #[error("storage failure: {0}")]
    StorageFailure(String),

    /// The applier collaborator failed to apply a committed entry.
    #[error("apply failure: {0}")]
    ApplyFailure(String),
}
