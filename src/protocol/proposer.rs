//! Proposer round bookkeeping. One round is one proposal attempt: a unique
//! correlation identifier, a proposal number drawn from the proposer's
//! residue class, the promise tally and then the accept tally. Replies that
//! do not match both the identifier and the number are stale traffic from a
//! dead round and are ignored.
use crate::protocol::NodeId;
use std::collections::HashSet;
use uuid::Uuid;

pub struct Round {
    round: Uuid,
    n: u64,
    client: NodeId,
    value: String,
    prior: Option<(u64, String)>,
    acks: HashSet<NodeId>,
    accepts: HashSet<NodeId>,
    committing: bool,
}

impl Round {
    pub fn new(round: Uuid, n: u64, client: NodeId, value: String) -> Round {
        Round {
            round,
            n,
            client,
            value,
            prior: None,
            acks: HashSet::new(),
            accepts: HashSet::new(),
            committing: false,
        }
    }

    #[inline]
    pub fn id(&self) -> Uuid {
        self.round
    }

    #[inline]
    pub fn n(&self) -> u64 {
        self.n
    }

    #[inline]
    pub fn client(&self) -> NodeId {
        self.client
    }

    #[inline]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Tally a phase 1b promise. Returns the phase 2a candidate value the
    /// moment the promise set first reaches a strict majority: the value of
    /// the highest numbered pair any acceptor reported back, or the client
    /// value if nobody accepted anything yet.
    pub fn ack(
        &mut self,
        from: NodeId,
        round: Uuid,
        n: u64,
        accepted: Option<(u64, String)>,
        quorum: usize,
    ) -> Option<String> {
        if round != self.round || n != self.n || self.committing {
            return None;
        }
        self.acks.insert(from);
        if let Some((seen, value)) = accepted {
            if self.prior.as_ref().map_or(true, |(best, _)| seen > *best) {
                self.prior = Some((seen, value));
            }
        }
        if self.acks.len() < quorum {
            return None;
        }
        self.committing = true;
        Some(match self.prior {
            Some((_, ref value)) => value.clone(),
            None => self.value.clone(),
        })
    }

    /// Tally a phase 2b confirmation. True exactly once, when the accept
    /// set first reaches a strict majority and the proposer's obligation is
    /// discharged.
    pub fn accepted(&mut self, from: NodeId, round: Uuid, n: u64, quorum: usize) -> bool {
        if round != self.round || n != self.n || !self.committing {
            return false;
        }
        if !self.accepts.insert(from) {
            return false;
        }
        self.accepts.len() == quorum
    }
}

#[cfg(test)]
mod tests {

    use crate::protocol::proposer::*;
    use uuid::Uuid;

    fn round() -> Round {
        Round::new(Uuid::new_v4(), 7, 5, "mine".into())
    }

    #[test]
    fn majority_of_promises_triggers_the_accept_phase() {
        let mut round = round();
        let id = round.id();
        assert!(round.ack(0, id, 7, None, 2).is_none());
        assert!(round.ack(1, id, 7, None, 2) == Some("mine".into()));

        //
        // - extra promises past the majority are inert
        //
        assert!(round.ack(2, id, 7, None, 2).is_none());
    }

    #[test]
    fn highest_prior_pair_overrides_the_client_value() {
        let mut round = round();
        let id = round.id();
        assert!(round.ack(0, id, 7, Some((2, "old".into())), 3).is_none());
        assert!(round.ack(1, id, 7, Some((4, "won".into())), 3).is_none());
        let candidate = round.ack(2, id, 7, Some((3, "mid".into())), 3);
        assert!(candidate == Some("won".into()));
    }

    #[test]
    fn duplicate_promises_do_not_make_a_majority() {
        let mut round = round();
        let id = round.id();
        assert!(round.ack(0, id, 7, None, 2).is_none());
        assert!(round.ack(0, id, 7, None, 2).is_none());
        assert!(round.ack(1, id, 7, None, 2).is_some());
    }

    #[test]
    fn stale_correlation_or_number_is_dropped() {
        let mut round = round();
        let id = round.id();
        assert!(round.ack(0, Uuid::new_v4(), 7, None, 1).is_none());
        assert!(round.ack(0, id, 8, None, 1).is_none());
        assert!(!round.accepted(0, id, 7, 1));
        assert!(round.ack(0, id, 7, None, 1).is_some());
    }

    #[test]
    fn majority_of_accepts_discharges_the_round() {
        let mut round = round();
        let id = round.id();
        let _ = round.ack(0, id, 7, None, 1);
        assert!(!round.accepted(0, id, 7, 2));
        assert!(!round.accepted(0, id, 7, 2));
        assert!(round.accepted(1, id, 7, 2));
        assert!(!round.accepted(2, id, 7, 2));
    }
}
