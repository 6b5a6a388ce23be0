//! Acceptor half of the two-phase protocol: a promise floor plus the most
//! recently accepted pair. The floor only ever moves up.

/// Verdict on a phase 1a prepare.
#[derive(Debug, PartialEq)]
pub enum Promise {
    /// Promised, carrying the previously accepted pair if any.
    ACK(Option<(u64, String)>),
    /// Rejected, carrying the current floor.
    NACK(u64),
}

/// Verdict on a phase 2a accept request.
#[derive(Debug, PartialEq)]
pub enum Accept {
    /// The pair was stored and must now reach the learners.
    STORED,
    /// Rejected, carrying the current floor.
    NACK(u64),
}

#[derive(Debug, Default)]
pub struct Acceptor {
    promised: Option<u64>,
    accepted: Option<(u64, String)>,
}

impl Acceptor {
    pub fn new() -> Acceptor {
        Default::default()
    }

    /// Phase 1b: promise strictly above the floor. Numbers are globally
    /// unique, so an equal number is a duplicate and gets rejected too.
    pub fn prepare(&mut self, n: u64) -> Promise {
        match self.promised {
            Some(floor) if n <= floor => Promise::NACK(floor),
            _ => {
                self.promised = Some(n);
                Promise::ACK(self.accepted.clone())
            }
        }
    }

    /// Phase 2b: bind the value unless outbid. Equality is honored, an
    /// acceptor that promised exactly n may still accept n.
    pub fn accept(&mut self, n: u64, value: String) -> Accept {
        match self.promised {
            Some(floor) if n < floor => Accept::NACK(floor),
            _ => {
                self.promised = Some(n);
                self.accepted = Some((n, value));
                Accept::STORED
            }
        }
    }

    #[inline]
    pub fn promised(&self) -> Option<u64> {
        self.promised
    }

    #[inline]
    pub fn accepted(&self) -> Option<&(u64, String)> {
        self.accepted.as_ref()
    }
}

#[cfg(test)]
mod tests {

    use crate::protocol::acceptor::*;

    #[test]
    fn promise_then_accept() {
        let mut acceptor = Acceptor::new();
        assert!(acceptor.prepare(3) == Promise::ACK(None));
        assert!(acceptor.accept(3, "v".into()) == Accept::STORED);
        assert!(acceptor.promised() == Some(3));
        assert!(acceptor.accepted() == Some(&(3, "v".into())));
    }

    #[test]
    fn floor_is_monotonic() {
        let mut acceptor = Acceptor::new();
        assert!(acceptor.prepare(5) == Promise::ACK(None));
        assert!(acceptor.prepare(3) == Promise::NACK(5));
        assert!(acceptor.prepare(5) == Promise::NACK(5));
        assert!(acceptor.prepare(9) == Promise::ACK(None));
        assert!(acceptor.promised() == Some(9));
    }

    #[test]
    fn accept_honors_equality() {
        let mut acceptor = Acceptor::new();
        assert!(acceptor.prepare(4) == Promise::ACK(None));
        assert!(acceptor.accept(4, "v".into()) == Accept::STORED);

        //
        // - a stale accept below the floor is turned down
        //
        assert!(acceptor.accept(2, "w".into()) == Accept::NACK(4));
        assert!(acceptor.accepted() == Some(&(4, "v".into())));
    }

    #[test]
    fn accepted_pair_rides_the_next_promise() {
        let mut acceptor = Acceptor::new();
        let _ = acceptor.prepare(1);
        let _ = acceptor.accept(1, "v".into());
        assert!(acceptor.prepare(6) == Promise::ACK(Some((1, "v".into()))));

        //
        // - a higher accept overwrites the pair and lifts the floor with it
        //
        assert!(acceptor.accept(6, "w".into()) == Accept::STORED);
        assert!(acceptor.promised() == Some(6));
        assert!(acceptor.accepted() == Some(&(6, "w".into())));
    }
}
