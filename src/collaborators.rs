//! Capability interfaces the host must supply.
//!
//! None of these traits are async: per the concurrency model (spec §5) the
//! replica is single-threaded cooperative and every public operation runs
//! to completion without suspending, so storage, transport and state
//! machine application are all invoked as plain synchronous calls. A host
//! that wants asynchrony wraps these collaborators itself (e.g. by having
//! `Sender::append_entries` hand the message to a channel and return
//! immediately).

use std::error::Error as StdError;

use crate::entry::Entry;
use crate::ids::{Index, NodeId, TermId};
use crate::message::{MsgAeReq, MsgVoteReq};

/// The error type collaborators fail with. Hosts return whatever concrete
/// error their backing store or application produces (an I/O error, a
/// database driver error, ...); the replica only ever observes it through
/// `to_string()` when wrapping it into its own closed [`crate::error::Error`].
pub type HostError = Box<dyn StdError + Send + Sync + 'static>;

/// Durable storage for the replica's hard state (current term, vote) and
/// its log. Implementations are responsible for making `persist_term_vote`
/// atomic: the replica never observes a torn write.
pub trait Storage {
    /// The term last persisted, or `0` if none has ever been persisted.
    fn term(&self) -> TermId;

    /// The candidate voted for in `term()`, if any.
    fn vote(&self) -> Option<NodeId>;

    /// Atomically persist a new `(term, vote)` pair. Must complete (or
    /// fail) before the replica takes any action predicated on it, per the
    /// persistence-ordering rule in spec §5.
    fn persist_term_vote(&mut self, term: TermId, vote: Option<NodeId>) -> Result<(), HostError>;

    /// Append an entry at the end of the log. The entry's `index` is
    /// exactly `last_index() + 1` at the time of the call.
    fn append(&mut self, entry: Entry) -> Result<(), HostError>;

    /// Remove and return the last entry in the log, or `None` if the log
    /// is empty. Used to undo an uncommitted suffix.
    fn pop_back(&mut self) -> Option<Entry>;

    /// Look up the entry at `idx`, or `None` if no such entry exists
    /// locally (including `idx == 0`).
    fn entry(&self, idx: Index) -> Option<Entry>;

    /// All entries at or after `from` (inclusive), in index order.
    fn entries_from(&self, from: Index) -> Vec<Entry>;

    /// The index of the last entry in the log, or `0` if empty.
    fn last_index(&self) -> Index;

    /// The term of the entry at `idx`, or `0` if `idx == 0` or no such
    /// entry exists.
    fn term_at(&self, idx: Index) -> TermId;
}

/// Outbound transport. A host supplies an implementation that eventually
/// delivers these messages to the named peer; delivery is not assumed to
/// be reliable or ordered, which is why the replica's protocol handling is
/// written to tolerate duplication, reordering, and loss.
///
/// Both methods return `true` if the message was handed off, `false` if
/// the transport is not currently available. On `false` the replica marks
/// the peer's deferred-send flag (`need_vote_req`/`need_append_req`)
/// instead of treating the send as an error; the host drains it later via
/// [`crate::replica::Replica::drain_vote_req`] /
/// [`crate::replica::Replica::drain_append_req`].
pub trait Sender {
    fn request_vote(&mut self, to: NodeId, req: MsgVoteReq) -> bool;
    fn append_entries(&mut self, to: NodeId, req: MsgAeReq) -> bool;
}

/// The host's application state machine. Entries are applied one at a
/// time, strictly in log order, only once committed.
pub trait Applier {
    /// Apply a single committed entry. An error here halts further commit
    /// application (but never regresses `commit_idx`); the replica retries
    /// the same entry on the next `apply_one` call.
    fn apply(&mut self, entry: &Entry) -> Result<(), HostError>;

    /// A diagnostic message from the replica, for hosts that want to
    /// surface it through their own logging rather than `tracing`.
    fn log(&mut self, message: &str);
}
