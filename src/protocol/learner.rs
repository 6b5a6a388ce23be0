//! Learner tally: distinct acceptors per proposal number. A value is chosen
//! the instant a strict majority of acceptors reported it, at which point
//! the tallies are dropped and the learner goes quiet.
use crate::protocol::NodeId;
use std::collections::{HashMap, HashSet};

pub struct Learner {
    quorum: usize,
    tally: HashMap<u64, (String, HashSet<NodeId>)>,
    decided: Option<(u64, String)>,
}

impl Learner {
    pub fn new(quorum: usize) -> Learner {
        Learner {
            quorum,
            tally: HashMap::new(),
            decided: None,
        }
    }

    /// Record one acceptor vouching for (n, value). Returns the value the
    /// first time any pair reaches a strict majority of distinct acceptors;
    /// anything after that is inert.
    pub fn learn(&mut self, from: NodeId, n: u64, value: String) -> Option<String> {
        if self.decided.is_some() {
            return None;
        }
        let slot = self
            .tally
            .entry(n)
            .or_insert_with(|| (value.clone(), HashSet::new()));
        if slot.0 != value {

            //
            // - numbers are unique so two values under one number can only
            //   be stray traffic
            //
            return None;
        }
        if !slot.1.insert(from) {
            return None;
        }
        if slot.1.len() < self.quorum {
            return None;
        }
        let value = slot.0.clone();
        self.decided = Some((n, value.clone()));
        self.tally.clear();
        Some(value)
    }

    #[inline]
    pub fn decided(&self) -> Option<&(u64, String)> {
        self.decided.as_ref()
    }
}

#[cfg(test)]
mod tests {

    use crate::protocol::learner::*;

    #[test]
    fn chosen_at_a_strict_majority() {
        let mut learner = Learner::new(2);
        assert!(learner.learn(0, 9, "v".into()).is_none());
        assert!(learner.learn(1, 9, "v".into()) == Some("v".into()));
        assert!(learner.decided() == Some(&(9, "v".into())));
    }

    #[test]
    fn duplicate_acceptors_do_not_count() {
        let mut learner = Learner::new(2);
        assert!(learner.learn(0, 9, "v".into()).is_none());
        assert!(learner.learn(0, 9, "v".into()).is_none());
        assert!(learner.learn(2, 9, "v".into()).is_some());
    }

    #[test]
    fn tallies_are_per_number() {
        let mut learner = Learner::new(2);
        assert!(learner.learn(0, 3, "a".into()).is_none());
        assert!(learner.learn(1, 8, "b".into()).is_none());
        assert!(learner.learn(2, 8, "b".into()) == Some("b".into()));
    }

    #[test]
    fn decisions_are_final() {
        let mut learner = Learner::new(1);
        assert!(learner.learn(0, 4, "v".into()) == Some("v".into()));
        assert!(learner.learn(1, 4, "v".into()).is_none());
        assert!(learner.learn(2, 6, "w".into()).is_none());
        assert!(learner.decided() == Some(&(4, "v".into())));
    }

    #[test]
    fn mismatched_values_are_stray() {
        let mut learner = Learner::new(2);
        assert!(learner.learn(0, 5, "v".into()).is_none());
        assert!(learner.learn(1, 5, "x".into()).is_none());
        assert!(learner.learn(1, 5, "v".into()).is_some());
    }
}
