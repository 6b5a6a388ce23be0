//! Runtime settings plus the host directory. The directory file is the
//! single source of truth for cluster topology: three count lines followed
//! by one `<host> <port> <con|cli>` line per node, consensus nodes first,
//! indexed by their position (e.g the node identifier).
//!
//! ```text
//! PROPOSERS 1
//! ACCEPTORS 1
//! LEARNERS  1
//! localhost 10000 con
//! localhost 10001 con
//! localhost 10002 con
//! localhost 10003 cli
//! ```
use crate::protocol::{NodeId, Role};
use std::env;
use std::fs;
use std::io;

/// Immutable runtime switches lifted from the environment. Both default to
/// off: DEBUG turns per-handler trace logging on, BACKOFF makes a proposer
/// retry a preempted round after a random bounded wait.
#[derive(Debug, Default, Copy, Clone)]
pub struct Config {
    pub debug: bool,
    pub backoff: bool,
}

impl Config {
    pub fn from_env() -> Config {
        Config {
            debug: flag("DEBUG"),
            backoff: flag("BACKOFF"),
        }
    }
}

fn flag(name: &str) -> bool {
    match env::var(name) {
        Ok(val) => val == "1" || val.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Kind {
    CONSENSUS,
    CLIENT,
}

#[derive(Debug)]
pub enum Errors {
    IO(io::Error),
    SYNTAX(usize),
    COUNTS,
    ORDERING,
}

use self::Errors::*;
use self::Kind::*;

/// Parsed host directory: the (P, A, L) counts plus the ordered endpoint
/// list. Static and immutable after startup.
#[derive(Debug, Clone)]
pub struct Directory {
    pub proposers: usize,
    pub acceptors: usize,
    pub learners: usize,
    hosts: Vec<(Endpoint, Kind)>,
}

impl Directory {
    pub fn load(path: &str) -> Result<Directory, Errors> {
        let text = fs::read_to_string(path).map_err(IO)?;
        Directory::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Directory, Errors> {

        let mut proposers = 0;
        let mut acceptors = 0;
        let mut learners = 0;
        let mut hosts = Vec::new();
        for (n, line) in text.lines().enumerate() {
            let tokens: Vec<_> = line.split_whitespace().collect();
            match (n, tokens.as_slice()) {

                //
                // - the three count lines come first, in a fixed order
                //
                (0, ["PROPOSERS", count]) => {
                    proposers = count.parse().map_err(|_| SYNTAX(n))?;
                }
                (1, ["ACCEPTORS", count]) => {
                    acceptors = count.parse().map_err(|_| SYNTAX(n))?;
                }
                (2, ["LEARNERS", count]) => {
                    learners = count.parse().map_err(|_| SYNTAX(n))?;
                }
                (_, [host, port, tag]) if n > 2 => {
                    let kind = match *tag {
                        "con" => CONSENSUS,
                        "cli" => CLIENT,
                        _ => return Err(SYNTAX(n)),
                    };
                    let port = port.parse().map_err(|_| SYNTAX(n))?;
                    hosts.push((
                        Endpoint {
                            host: host.to_string(),
                            port,
                        },
                        kind,
                    ));
                }
                (_, []) => {}
                _ => return Err(SYNTAX(n)),
            }
        }

        //
        // - each role must have at least one node and the consensus count
        //   must add up
        // - every consensus line must precede the first client line
        //
        let consensus = hosts.iter().filter(|host| host.1 == CONSENSUS).count();
        if proposers == 0 || acceptors == 0 || learners == 0 {
            return Err(COUNTS);
        }
        if consensus != proposers + acceptors + learners {
            return Err(COUNTS);
        }
        if hosts[..consensus].iter().any(|host| host.1 != CONSENSUS) {
            return Err(ORDERING);
        }
        Ok(Directory {
            proposers,
            acceptors,
            learners,
            hosts,
        })
    }

    /// Number of consensus nodes, e.g P+A+L.
    #[inline]
    pub fn consensus(&self) -> usize {
        self.proposers + self.acceptors + self.learners
    }

    /// Total number of nodes, clients included.
    #[inline]
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    #[inline]
    pub fn endpoint(&self, id: NodeId) -> &Endpoint {
        &self.hosts[id as usize].0
    }

    /// Gap between two consecutive proposal numbers of one proposer. Each
    /// proposer sticks to its own residue class modulo this stride, which
    /// keeps numbers unique across the whole cluster.
    #[inline]
    pub fn stride(&self) -> u64 {
        self.consensus() as u64
    }

    /// Strict majority of acceptors.
    #[inline]
    pub fn quorum(&self) -> usize {
        self.acceptors / 2 + 1
    }

    /// Role owned by the given identifier: proposers first, then acceptors,
    /// then learners, clients last.
    pub fn role(&self, id: NodeId) -> Role {
        let id = id as usize;
        if id < self.proposers {
            Role::PROPOSER
        } else if id < self.proposers + self.acceptors {
            Role::ACCEPTOR
        } else if id < self.consensus() {
            Role::LEARNER
        } else {
            Role::CLIENT
        }
    }

    /// Client identifiers, e.g everything past the consensus range.
    pub fn clients(&self) -> impl Iterator<Item = NodeId> + '_ {
        (self.consensus()..self.len()).map(|id| id as NodeId)
    }
}

#[cfg(test)]
mod tests {

    use crate::config::*;

    const SAMPLE: &str = "\
PROPOSERS 1
ACCEPTORS 3
LEARNERS 1
localhost 10000 con
localhost 10001 con
localhost 10002 con
localhost 10003 con
localhost 10004 con
localhost 10005 cli
localhost 10006 cli
";

    #[test]
    fn parse_sample() {
        let dir = Directory::parse(SAMPLE).unwrap();
        assert!(dir.consensus() == 5);
        assert!(dir.len() == 7);
        assert!(dir.quorum() == 2);
        assert!(dir.stride() == 5);
        assert!(dir.endpoint(3).port == 10003);
        assert!(dir.clients().collect::<Vec<_>>() == vec![5, 6]);
    }

    #[test]
    fn role_partition() {
        let dir = Directory::parse(SAMPLE).unwrap();
        let roles: Vec<_> = (0..7).map(|id| dir.role(id)).collect();
        assert!(roles[0] == Role::PROPOSER);
        assert!(roles[1..4].iter().all(|role| *role == Role::ACCEPTOR));
        assert!(roles[4] == Role::LEARNER);
        assert!(roles[5] == Role::CLIENT && roles[6] == Role::CLIENT);

        //
        // - the last consensus node is always a learner
        //
        assert!(dir.role((dir.consensus() - 1) as NodeId) == Role::LEARNER);
    }

    #[test]
    fn quorum_is_a_strict_majority() {
        for (acceptors, quorum) in &[(1usize, 1usize), (2, 2), (3, 2), (4, 3), (5, 3)] {
            let mut text = format!("PROPOSERS 1\nACCEPTORS {}\nLEARNERS 1\n", acceptors);
            for n in 0..acceptors + 2 {
                text.push_str(&format!("localhost {} con\n", 10000 + n));
            }
            text.push_str("localhost 9999 cli\n");
            let dir = Directory::parse(&text).unwrap();
            assert!(dir.quorum() == *quorum);
        }
    }

    #[test]
    fn residue_classes_are_disjoint() {
        let dir = Directory::parse(SAMPLE).unwrap();
        let stride = dir.stride();
        for id in 0..dir.proposers as u64 {
            for round in 0..4 {
                assert!((id + round * stride) % stride == id);
            }
        }
    }

    #[test]
    fn counts_must_add_up() {
        let text = SAMPLE.replace("ACCEPTORS 3", "ACCEPTORS 2");
        assert!(matches!(Directory::parse(&text), Err(Errors::COUNTS)));
    }

    #[test]
    fn clients_come_last() {
        let text = SAMPLE.replace("localhost 10002 con", "localhost 10002 cli");
        assert!(matches!(Directory::parse(&text), Err(Errors::ORDERING)));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(Directory::parse("PROPOSERS x\n"), Err(Errors::SYNTAX(0))));
        let text = SAMPLE.replace("localhost 10001 con", "localhost what con");
        assert!(matches!(Directory::parse(&text), Err(Errors::SYNTAX(4))));
    }
}
