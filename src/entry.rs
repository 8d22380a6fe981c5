//! The log entry type and the internal commands used for membership
//! changes and leadership no-ops.

use serde::{Deserialize, Serialize};

use crate::ids::{EntryId, Index, NodeId, TermId};

/// The kind of an internal (non user-data) log entry.
///
/// `Noop` is appended by a freshly elected leader to establish that its
/// term has at least one entry it can commit directly (Raft §5.4.2); the
/// other four drive cluster membership and are interpreted by
/// [`crate::nodes::Nodes`] both when they are appended (optimistically,
/// ahead of commit) and when they are popped off an uncommitted tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InternalKind {
    Noop,
    AddNonVotingNode,
    AddNode,
    DemoteNode,
    RemoveNode,
}

impl InternalKind {
    /// Whether this kind counts against the "one voting change in flight"
    /// limit. `AddNonVotingNode` does not: it never changes who gets to
    /// vote, only who receives replicated entries.
    pub fn is_voting_change(self) -> bool {
        matches!(
            self,
            InternalKind::AddNode | InternalKind::DemoteNode | InternalKind::RemoveNode
        )
    }
}

/// The payload of a log entry: either opaque application data, or an
/// internal command targeting a specific node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryBody {
    User(Vec<u8>),
    Internal { kind: InternalKind, node: NodeId },
}

impl EntryBody {
    pub fn noop() -> Self {
        EntryBody::Internal {
            kind: InternalKind::Noop,
            node: 0,
        }
    }

    pub fn add_non_voting_node(node: NodeId) -> Self {
        EntryBody::Internal {
            kind: InternalKind::AddNonVotingNode,
            node,
        }
    }

    pub fn add_node(node: NodeId) -> Self {
        EntryBody::Internal {
            kind: InternalKind::AddNode,
            node,
        }
    }

    pub fn demote_node(node: NodeId) -> Self {
        EntryBody::Internal {
            kind: InternalKind::DemoteNode,
            node,
        }
    }

    pub fn remove_node(node: NodeId) -> Self {
        EntryBody::Internal {
            kind: InternalKind::RemoveNode,
            node,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, EntryBody::User(_))
    }

    /// The entry is a membership change subject to the single-voting-change
    /// guard (see [`InternalKind::is_voting_change`]).
    pub fn is_voting_change(&self) -> bool {
        match self {
            EntryBody::Internal { kind, .. } => kind.is_voting_change(),
            EntryBody::User(_) => false,
        }
    }
}

/// A single immutable record in the replicated log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub term: TermId,
    pub id: EntryId,
    pub index: Index,
    pub body: EntryBody,
}

impl Entry {
    pub fn new(term: TermId, id: EntryId, index: Index, body: EntryBody) -> Self {
        Entry {
            term,
            id,
            index,
            body,
        }
    }
}
