//! Consensus node state machine covering bootstrap and the steady state.
//! Each node first handshakes with its ring successor, then runs the ring
//! election, and once the elected leader handed roles out settles into its
//! Paxos role until told to terminate.
//!
//!   START -> SYNC  --->  VOTE  --->  RUN
//!           (probe)    (election)  (paxos)
//!
//! The whole protocol is driven by one automaton whose inbox is fed by the
//! UDP receiver thread and by the timer; the handler below is therefore the
//! only code ever mutating protocol state.
use crate::config::{Config, Directory};
use crate::fsm::automaton::{Automaton, Opcode, Recv};
use crate::fsm::timer::Timer;
use crate::net::{self, Udp};
use crate::primitives::event::Guard;
use crate::protocol::acceptor::{Accept, Acceptor, Promise};
use crate::protocol::election::{Ring, Token};
use crate::protocol::learner::Learner;
use crate::protocol::messages::Command::{MESSAGE, TIMEOUT};
use crate::protocol::messages::{
    Command, ACCEPT, ACK, ASSIGN, ELECT, ELECTED, FINAL, FWD, LEARN, NACK, PROPOSAL, RAW, READY,
    START, SYNCED, TERMINATE,
};
use crate::protocol::proposer::Round;
use crate::protocol::{NodeId, Role};
use bincode::deserialize;
use rand::{thread_rng, Rng};
use slog::{debug, info, trace, warn, Logger};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Volatile information carried by each state, mostly who is leading.
mod context {

    use crate::protocol::NodeId;
    use std::fmt;

    #[derive(Copy, Clone, Default, PartialEq)]
    pub struct SYNC {}

    impl fmt::Debug for SYNC {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "SYNCING        |")
        }
    }

    #[derive(Copy, Clone, Default, PartialEq)]
    pub struct VOTE {
        pub leader: Option<NodeId>,
    }

    impl fmt::Debug for VOTE {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self.leader {
                Some(id) => write!(f, "ELECTING ({:03}) |", id),
                _ => write!(f, "ELECTING (N/A) |"),
            }
        }
    }

    #[derive(Copy, Clone, Default, PartialEq)]
    pub struct RUN {}

    impl fmt::Debug for RUN {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "RUNNING        |")
        }
    }
}

#[derive(Copy, Clone)]
enum State {
    SYNC(context::SYNC),
    VOTE(context::VOTE),
    RUN(context::RUN),
}

impl PartialEq for State {
    fn eq(&self, other: &State) -> bool {

        //
        // - we embed a context so PartialEq is overridden to compare the
        //   variants only
        //
        match (*self, *other) {
            (SYNC(_), SYNC(_)) => true,
            (VOTE(_), VOTE(_)) => true,
            (RUN(_), RUN(_)) => true,
            _ => false,
        }
    }
}

impl Default for State {
    fn default() -> State {

        //
        // - a node starts by probing its ring successor until it answers
        //
        State::SYNC(Default::default())
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SYNC(ctx) => ctx.fmt(f),
            VOTE(ctx) => ctx.fmt(f),
            RUN(ctx) => ctx.fmt(f),
        }
    }
}

use self::State::*;

/// Why a given timer is pending.
enum Wait {
    /// Re-probe the ring successor.
    PROBE,
    /// Re-open a preempted round for the given client and value.
    RETRY(NodeId, String),
}

/// Consensus node handle wrapping the automaton, one per process.
pub struct Node {
    pub fsm: Arc<Automaton<Command>>,
}

struct FSM {
    id: NodeId,
    cfg: Config,
    dir: Directory,
    ring: Ring,
    udp: Udp,
    timer: Timer<Command>,
    seq: u64,
    waits: HashMap<u64, Wait>,
    backlog: Vec<RAW>,
    role: Option<Role>,
    proposers: Vec<NodeId>,
    acceptors: Vec<NodeId>,
    learners: Vec<NodeId>,
    next: u64,
    rounds: HashMap<Uuid, Round>,
    acceptor: Acceptor,
    learner: Learner,
    log: Logger,
}

macro_rules! pretty {
    ($self:ident, $fmt:expr $(, $arg:expr)*) => {
        info!(&$self.log, $fmt, $($arg),* ;
            "role" => ?$self.role);
    };
}

impl FSM {
    const PROBE_TIMEOUT: u64 = 100;

    fn probe(&mut self, this: &Arc<Automaton<Command>>) -> () {

        //
        // - probe our ring successor and schedule the next attempt
        // - attempts past the first answer are simply ignored
        //
        let bytes = READY.to_raw(self.id);
        self.send_to(self.ring.successor(), &bytes);
        self.seq += 1;
        self.waits.insert(self.seq, Wait::PROBE);
        self.timer.schedule(
            this.clone(),
            TIMEOUT(self.seq),
            Duration::from_millis(FSM::PROBE_TIMEOUT),
        );
    }

    fn open(&mut self, client: NodeId, value: String) -> () {

        //
        // - draw the next number from our residue class (use, then bump by
        //   the stride)
        // - tag the round with a fresh correlation identifier and multicast
        //   the proposal to every acceptor
        //
        let n = self.next;
        self.next += self.dir.stride();
        let round = Round::new(Uuid::new_v4(), n, client, value);
        pretty!(self, "opening round #{} for client #{}", n, client);
        let bytes = PROPOSAL {
            round: round.id(),
            n,
        }
        .to_raw(self.id);
        self.rounds.insert(round.id(), round);
        self.multicast(&self.acceptors, &bytes);
    }

    fn assign(&mut self) -> () {

        //
        // - partition the consensus identifier space in directory order:
        //   proposers first, then acceptors, then learners (which makes us,
        //   the maximum identifier, a learner)
        // - unicast each node its role plus the full partition, ourselves
        //   included, then broadcast the go signal
        //
        let ids: Vec<NodeId> = (0..self.dir.consensus() as NodeId).collect();
        let proposers = ids[..self.dir.proposers].to_vec();
        let acceptors = ids[self.dir.proposers..self.dir.proposers + self.dir.acceptors].to_vec();
        let learners = ids[self.dir.proposers + self.dir.acceptors..].to_vec();
        pretty!(self, "assigning roles to {} nodes", ids.len());
        for id in &ids {
            let bytes = ASSIGN {
                role: self.dir.role(*id),
                proposers: proposers.clone(),
                acceptors: acceptors.clone(),
                learners: learners.clone(),
            }
            .to_raw(self.id);
            self.send_to(*id, &bytes);
        }
        let bytes = START { proposers }.to_raw(self.id);
        for id in &ids {
            self.send_to(*id, &bytes);
        }
    }

    fn send_to(&self, id: NodeId, bytes: &[u8]) -> () {
        let endpoint = self.dir.endpoint(id);
        self.udp.send(&endpoint.host, endpoint.port, bytes);
    }

    fn multicast(&self, ids: &[NodeId], bytes: &[u8]) -> () {
        for id in ids {
            self.send_to(*id, bytes);
        }
    }
}

impl Recv<Command, State> for FSM {
    fn recv(
        &mut self,
        this: &Arc<Automaton<Command>>,
        mut state: State,
        opcode: Opcode<Command, State>,
    ) -> State {
        match opcode {
            Opcode::START => {
                info!(&self.log, "starting (ring successor #{})", self.ring.successor());
                self.probe(this);
            }
            Opcode::TRANSITION(prv) => {
                match (prv, state) {
                    (SYNC(_), VOTE(_)) => {

                        //
                        // - our successor is wired up: inject our election
                        //   token and replay whatever arrived early
                        //
                        let bytes = ELECT { id: self.id }.to_raw(self.id);
                        self.send_to(self.ring.successor(), &bytes);
                        for raw in self.backlog.drain(..) {
                            let _ = this.post(MESSAGE(raw));
                        }
                    }
                    (VOTE(_), RUN(_)) => {
                        pretty!(self, "{:?} bootstrap complete", state);
                    }
                    _ => {
                        assert!(false, "invalid state transition");
                    }
                }
            }
            Opcode::INPUT(TIMEOUT(seq)) => match self.waits.remove(&seq) {
                Some(Wait::PROBE) => {
                    if let SYNC(_) = state {
                        self.probe(this);
                    }
                }
                Some(Wait::RETRY(client, value)) => {
                    if let RUN(_) = state {
                        self.open(client, value);
                    }
                }
                None => {}
            },
            Opcode::INPUT(MESSAGE(raw)) => {

                //
                // - readiness probes and terminate are answered no matter
                //   what state we are in
                //
                match raw.code {
                    READY::CODE => {
                        let bytes = SYNCED.to_raw(self.id);
                        self.send_to(raw.src, &bytes);
                        return state;
                    }
                    TERMINATE::CODE => {
                        info!(&self.log, "terminate received, going down");
                        this.drain();
                        return state;
                    }
                    _ => {}
                }
                match state {
                    SYNC(_) => match raw.code {
                        SYNCED::CODE => {
                            return VOTE(Default::default());
                        }
                        _ => {

                            //
                            // - not wired up yet, keep the frame for later
                            //
                            trace!(&self.log, "backlogging #{} while syncing", raw.code);
                            self.backlog.push(raw);
                        }
                    },
                    VOTE(ref mut ctx) => match raw.code {
                        ELECT::CODE => match deserialize::<ELECT>(&raw.msg) {
                            Ok(msg) => match self.ring.token(msg.id) {
                                Token::FORWARD(next) => {
                                    trace!(&self.log, "{:?} forwarding token #{}", ctx, next);
                                    let bytes = ELECT { id: next }.to_raw(self.id);
                                    self.send_to(self.ring.successor(), &bytes);
                                }
                                Token::LEADING => {

                                    //
                                    // - our own token survived a full cycle
                                    // - announce ourselves around the ring
                                    //
                                    ctx.leader = Some(self.id);
                                    info!(&self.log, "{:?} token cycled, taking the lead", ctx);
                                    let bytes = ELECTED { id: self.id }.to_raw(self.id);
                                    self.send_to(self.ring.successor(), &bytes);
                                }
                                Token::STALE => {
                                    trace!(&self.log, "{:?} dropping token #{}", ctx, msg.id);
                                }
                            },
                            _ => warn!(&self.log, "dropping unparsable ELECT"),
                        },
                        ELECTED::CODE => match deserialize::<ELECTED>(&raw.msg) {
                            Ok(msg) if msg.id == self.id => {

                                //
                                // - our announcement cycled, e.g every node
                                //   now knows who leads
                                // - hand out the roles and start the cluster
                                //
                                self.assign();
                            }
                            Ok(msg) => {
                                ctx.leader = Some(msg.id);
                                info!(&self.log, "{:?} node #{} leads", ctx, msg.id);
                                let bytes = ELECTED { id: msg.id }.to_raw(self.id);
                                self.send_to(self.ring.successor(), &bytes);
                            }
                            _ => warn!(&self.log, "dropping unparsable ELECTED"),
                        },
                        ASSIGN::CODE => match deserialize::<ASSIGN>(&raw.msg) {
                            Ok(msg) => {
                                info!(&self.log, "{:?} assigned {:?}", ctx, msg.role);
                                self.role = Some(msg.role);
                                self.proposers = msg.proposers;
                                self.acceptors = msg.acceptors;
                                self.learners = msg.learners;
                            }
                            _ => warn!(&self.log, "dropping unparsable ASSIGN"),
                        },
                        START::CODE => {

                            //
                            // - bootstrap is over: relay the proposer roster
                            //   to every client so they can pick a target
                            //
                            let bytes = START {
                                proposers: self.proposers.clone(),
                            }
                            .to_raw(self.id);
                            for client in self.dir.clients() {
                                self.send_to(client, &bytes);
                            }
                            return RUN(Default::default());
                        }
                        _ => {
                            debug!(&self.log, "dropping early #{} frame", raw.code);
                        }
                    },
                    RUN(_) => match raw.code {
                        FWD::CODE if self.role == Some(Role::PROPOSER) => {
                            match deserialize::<FWD>(&raw.msg) {
                                Ok(msg) => {
                                    self.open(msg.client, msg.value);
                                }
                                _ => warn!(&self.log, "dropping unparsable FWD"),
                            }
                        }
                        PROPOSAL::CODE if self.role == Some(Role::ACCEPTOR) => {
                            match deserialize::<PROPOSAL>(&raw.msg) {
                                Ok(msg) => match self.acceptor.prepare(msg.n) {
                                    Promise::ACK(accepted) => {
                                        trace!(&self.log, "promising #{}", msg.n);
                                        let bytes = ACK {
                                            round: msg.round,
                                            n: msg.n,
                                            accepted,
                                        }
                                        .to_raw(self.id);
                                        self.send_to(raw.src, &bytes);
                                    }
                                    Promise::NACK(promised) => {
                                        debug!(
                                            &self.log,
                                            "rejecting proposal #{} (floor #{})", msg.n, promised
                                        );
                                        let bytes = NACK {
                                            round: msg.round,
                                            n: msg.n,
                                            promised,
                                        }
                                        .to_raw(self.id);
                                        self.send_to(raw.src, &bytes);
                                    }
                                },
                                _ => warn!(&self.log, "dropping unparsable PROPOSAL"),
                            }
                        }
                        ACK::CODE if self.role == Some(Role::PROPOSER) => {
                            match deserialize::<ACK>(&raw.msg) {
                                Ok(msg) => {
                                    let quorum = self.dir.quorum();
                                    let candidate = match self.rounds.get_mut(&msg.round) {
                                        Some(round) => {
                                            round.ack(raw.src, msg.round, msg.n, msg.accepted, quorum)
                                        }
                                        None => {
                                            debug!(&self.log, "dropping promise for a dead round");
                                            None
                                        }
                                    };
                                    if let Some(value) = candidate {

                                        //
                                        // - a majority promised: move to the
                                        //   accept phase with the mandated
                                        //   candidate value
                                        //
                                        pretty!(self, "majority promised #{}, accepting '{}'", msg.n, value);
                                        let bytes = ACCEPT {
                                            round: msg.round,
                                            n: msg.n,
                                            value,
                                        }
                                        .to_raw(self.id);
                                        self.multicast(&self.acceptors, &bytes);
                                    }
                                }
                                _ => warn!(&self.log, "dropping unparsable ACK"),
                            }
                        }
                        ACCEPT::CODE => match deserialize::<ACCEPT>(&raw.msg) {
                            Ok(msg) => match self.role {
                                Some(Role::ACCEPTOR) => {
                                    match self.acceptor.accept(msg.n, msg.value.clone()) {
                                        Accept::STORED => {

                                            //
                                            // - the pair is bound: let every
                                            //   learner know and echo the
                                            //   accept back as confirmation
                                            //
                                            pretty!(self, "accepted #{} = '{}'", msg.n, msg.value);
                                            let bytes = LEARN {
                                                n: msg.n,
                                                value: msg.value.clone(),
                                            }
                                            .to_raw(self.id);
                                            self.multicast(&self.learners, &bytes);
                                            let bytes = ACCEPT {
                                                round: msg.round,
                                                n: msg.n,
                                                value: msg.value,
                                            }
                                            .to_raw(self.id);
                                            self.send_to(raw.src, &bytes);
                                        }
                                        Accept::NACK(promised) => {
                                            debug!(
                                                &self.log,
                                                "rejecting accept #{} (floor #{})", msg.n, promised
                                            );
                                            let bytes = NACK {
                                                round: msg.round,
                                                n: msg.n,
                                                promised,
                                            }
                                            .to_raw(self.id);
                                            self.send_to(raw.src, &bytes);
                                        }
                                    }
                                }
                                Some(Role::PROPOSER) => {

                                    //
                                    // - the echo of our own accept request,
                                    //   e.g one confirmation
                                    //
                                    let quorum = self.dir.quorum();
                                    let done = match self.rounds.get_mut(&msg.round) {
                                        Some(round) => {
                                            round.accepted(raw.src, msg.round, msg.n, quorum)
                                        }
                                        None => false,
                                    };
                                    if done {
                                        pretty!(self, "decree #{} accepted by a majority", msg.n);
                                        self.rounds.remove(&msg.round);
                                    }
                                }
                                _ => debug!(&self.log, "dropping misdispatched ACCEPT"),
                            },
                            _ => warn!(&self.log, "dropping unparsable ACCEPT"),
                        },
                        NACK::CODE if self.role == Some(Role::PROPOSER) => {
                            match deserialize::<NACK>(&raw.msg) {
                                Ok(msg) => {
                                    if let Some(round) = self.rounds.remove(&msg.round) {
                                        warn!(
                                            &self.log,
                                            "round #{} preempted (floor #{})",
                                            round.n(),
                                            msg.promised
                                        );
                                        if self.cfg.backoff {

                                            //
                                            // - re-open the round later with
                                            //   an advanced number, after a
                                            //   random lapse to keep dueling
                                            //   proposers from preempting
                                            //   each other forever
                                            //
                                            let lapse = thread_rng().gen_range(50, 500);
                                            pretty!(self, "retrying client #{} in {} ms", round.client(), lapse);
                                            self.seq += 1;
                                            self.waits.insert(
                                                self.seq,
                                                Wait::RETRY(round.client(), round.value().to_string()),
                                            );
                                            self.timer.schedule(
                                                this.clone(),
                                                TIMEOUT(self.seq),
                                                Duration::from_millis(lapse),
                                            );
                                        }
                                    }
                                }
                                _ => warn!(&self.log, "dropping unparsable NACK"),
                            }
                        }
                        LEARN::CODE if self.role == Some(Role::LEARNER) => {
                            match deserialize::<LEARN>(&raw.msg) {
                                Ok(msg) => {
                                    if let Some(value) = self.learner.learn(raw.src, msg.n, msg.value) {

                                        //
                                        // - the pair reached a majority of
                                        //   acceptors: the decree is chosen,
                                        //   notify every client
                                        //
                                        pretty!(self, "'{}' is chosen, notifying the clients", value);
                                        let bytes = FINAL { value }.to_raw(self.id);
                                        for client in self.dir.clients() {
                                            self.send_to(client, &bytes);
                                        }
                                    }
                                }
                                _ => warn!(&self.log, "dropping unparsable LEARN"),
                            }
                        }
                        _ => {
                            debug!(&self.log, "dropping #{} frame from #{}", raw.code, raw.src);
                        }
                    },
                }
            }
            Opcode::DRAIN => {
                warn!(&self.log, "{:?} draining", state);
            }
            Opcode::EXIT => {
                info!(&self.log, "exiting");
            }
        };
        state
    }
}

impl Node {
    pub fn spawn(
        guard: Arc<Guard>,
        id: NodeId,
        cfg: Config,
        dir: Directory,
        log: Logger,
    ) -> io::Result<Node> {

        //
        // - bind our directory port before anything else
        // - the receiver thread and the automaton share the socket
        //
        let socket = UdpSocket::bind(("0.0.0.0", dir.endpoint(id).port))?;
        let udp = Udp::from(socket.try_clone()?, log.clone());
        let ring = Ring::new(id, dir.consensus());
        let quorum = dir.quorum();
        let timer = Timer::spawn(guard.clone());
        let fsm = Automaton::spawn(
            guard.clone(),
            Box::new(FSM {
                id,
                cfg,
                ring,
                udp,
                timer,
                seq: 0,
                waits: HashMap::new(),
                backlog: Vec::new(),
                role: None,
                proposers: Vec::new(),
                acceptors: Vec::new(),
                learners: Vec::new(),
                next: id as u64,
                rounds: HashMap::new(),
                acceptor: Acceptor::new(),
                learner: Learner::new(quorum),
                dir,
                log: log.clone(),
            }),
        );
        net::listen(socket, fsm.clone(), guard, log);
        Ok(Node { fsm })
    }
}

impl Drop for Node {
    fn drop(&mut self) -> () {
        self.fsm.drain();
    }
}
