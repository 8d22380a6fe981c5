//! A Raft consensus replica: leader election, log replication, and
//! membership changes, decoupled from storage, transport and the
//! application state machine.
//!
//! The [`replica::Replica`] type is the entry point. Construct one with
//! [`replica::Replica::new_single`] or [`replica::Replica::new_with_members`],
//! feed it ticks and incoming RPCs, and drive its collaborators
//! ([`collaborators::Storage`], [`collaborators::Sender`],
//! [`collaborators::Applier`]) to handle persistence, transport and
//! application respectively.

pub mod collaborators;
pub mod committer;
pub mod config;
pub mod entry;
pub mod error;
pub mod ids;
pub mod message;
pub mod nodes;
pub mod replica;
pub mod timer;

pub use collaborators::{Applier, HostError, Sender, Storage};
pub use config::Config;
pub use entry::{Entry, EntryBody, InternalKind};
pub use error::{Error, Result};
pub use ids::{EntryId, Index, NodeId, TermId};
pub use message::{MsgAeRep, MsgAeReq, MsgVoteRep, MsgVoteReq, VoteGranted};
pub use replica::{Proposal, Replica, Role};
