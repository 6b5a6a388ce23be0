use serde_derive::{Deserialize, Serialize};

pub mod acceptor;
pub mod client;
pub mod consensus;
pub mod election;
pub mod learner;
pub mod messages;
pub mod proposer;

/// Dense node identifier, directory position. Consensus identifiers come
/// first, client identifiers follow.
pub type NodeId = u8;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    PROPOSER,
    ACCEPTOR,
    LEARNER,
    CLIENT,
}
