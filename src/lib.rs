//! Single-decree Paxos over UDP, bootstrapped by a Chang-Roberts ring election.
//!
//! A cluster is described by a host directory file listing the consensus
//! endpoints (proposers, acceptors and learners) followed by the client
//! endpoints. Each consensus process runs one event-loop automaton fed by a
//! UDP receiver thread; the automaton owns all protocol state and processes
//! one message at a time. The last consensus node wins the ring election,
//! hands out roles and signals the cluster to start. Clients then forward a
//! value to a proposer and block until a learner reports the decided value.

pub mod config;
pub mod fsm;
pub mod net;
pub mod primitives;
pub mod protocol;
