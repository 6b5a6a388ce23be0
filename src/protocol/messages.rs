use crate::protocol::{NodeId, Role};
use bincode::serialize;
use serde_derive::{Deserialize, Serialize};
use uuid::Uuid;

/// Commands fed to a consensus automaton: inbound wire traffic plus timer
/// expiries (the u64 payload is the scheduling sequence number).
#[derive(Debug)]
pub enum Command {
    MESSAGE(RAW),
    TIMEOUT(u64),
}

macro_rules! declare {
    ($code:expr, $msg:ident) => {
        impl $msg {
            pub const CODE: u8 = $code;
            pub fn to_raw(&self, src: NodeId) -> Vec<u8> {
                let raw = RAW {
                    code: $msg::CODE,
                    src,
                    msg: serialize(&self).unwrap(),
                };
                serialize(&raw).unwrap()
            }
        }
    };
}

declare!(0, READY);
declare!(1, SYNCED);
declare!(2, ELECT);
declare!(3, ELECTED);
declare!(4, ASSIGN);
declare!(5, START);
declare!(6, FWD);
declare!(7, PROPOSAL);
declare!(8, ACK);
declare!(9, NACK);
declare!(10, ACCEPT);
declare!(11, LEARN);
declare!(12, FINAL);
declare!(13, TERMINATE);

/// Outer wrapper carrying the message identifier and the sender. Once
/// serialized the payload is a nested bincode buffer.
#[derive(Debug, Serialize, Deserialize)]
pub struct RAW {
    pub code: u8,
    pub src: NodeId,
    pub msg: Vec<u8>,
}

/// Readiness probe sent to the ring successor until acknowledged.
#[derive(Debug, Serialize, Deserialize)]
pub struct READY;

/// Acknowledgement of a readiness probe.
#[derive(Debug, Serialize, Deserialize)]
pub struct SYNCED;

/// Election token carrying a candidate identifier around the ring.
#[derive(Debug, Serialize, Deserialize)]
pub struct ELECT {
    pub id: NodeId,
}

/// Leader announcement, cycled once around the ring.
#[derive(Debug, Serialize, Deserialize)]
pub struct ELECTED {
    pub id: NodeId,
}

/// Role grant unicast by the leader to each consensus node, together with
/// the full partition.
#[derive(Debug, Serialize, Deserialize)]
pub struct ASSIGN {
    pub role: Role,
    pub proposers: Vec<NodeId>,
    pub acceptors: Vec<NodeId>,
    pub learners: Vec<NodeId>,
}

/// Go signal. Broadcast by the leader to the consensus nodes, then relayed
/// by each of them to every client so clients can pick their proposer.
#[derive(Debug, Serialize, Deserialize)]
pub struct START {
    pub proposers: Vec<NodeId>,
}

/// Client value forwarded to a proposer.
#[derive(Debug, Serialize, Deserialize)]
pub struct FWD {
    pub client: NodeId,
    pub value: String,
}

/// Phase 1a prepare. The round identifier correlates every reply with one
/// specific proposal attempt so stale traffic is detected and dropped.
#[derive(Debug, Serialize, Deserialize)]
pub struct PROPOSAL {
    pub round: Uuid,
    pub n: u64,
}

/// Phase 1b promise, carrying the acceptor's most recently accepted pair
/// if there is one.
#[derive(Debug, Serialize, Deserialize)]
pub struct ACK {
    pub round: Uuid,
    pub n: u64,
    pub accepted: Option<(u64, String)>,
}

/// Rejection of a proposal or accept request numbered at or below an
/// earlier promise.
#[derive(Debug, Serialize, Deserialize)]
pub struct NACK {
    pub round: Uuid,
    pub n: u64,
    pub promised: u64,
}

/// Phase 2a accept request; echoed back verbatim by the acceptor as the
/// phase 2b confirmation.
#[derive(Debug, Serialize, Deserialize)]
pub struct ACCEPT {
    pub round: Uuid,
    pub n: u64,
    pub value: String,
}

/// Acceptor to learner notification of an accepted pair.
#[derive(Debug, Serialize, Deserialize)]
pub struct LEARN {
    pub n: u64,
    pub value: String,
}

/// Decided value, delivered by a learner to every client.
#[derive(Debug, Serialize, Deserialize)]
pub struct FINAL {
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TERMINATE;
