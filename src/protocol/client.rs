//! Synchronous client node. Unlike the consensus nodes there is no automaton
//! here: the client blocks on its socket, first for the proposer roster,
//! then for the decided value. An operator losing patience is the only
//! timeout.
use crate::config::Directory;
use crate::protocol::messages::{FINAL, FWD, RAW, START, TERMINATE};
use crate::protocol::NodeId;
use bincode::deserialize;
use slog::{info, trace, warn, Logger};
use std::io;
use std::net::UdpSocket;

use crate::net::MTU;

#[derive(Debug)]
pub enum Errors {
    IO(io::Error),
    /// set() was invoked before initialize() pinned a proposer.
    NOTREADY,
}

use self::Errors::*;

pub struct Client {
    id: NodeId,
    dir: Directory,
    socket: UdpSocket,
    proposer: Option<NodeId>,
    log: Logger,
}

impl Client {
    pub fn new(id: NodeId, dir: Directory, log: Logger) -> Result<Client, Errors> {
        let socket = UdpSocket::bind(("0.0.0.0", dir.endpoint(id).port)).map_err(IO)?;
        Ok(Client {
            id,
            dir,
            socket,
            proposer: None,
            log,
        })
    }

    /// Block until some consensus node relays the proposer roster, then pin
    /// the proposer at the desired index (reduced modulo the roster size).
    pub fn initialize(&mut self, desired: usize) -> Result<(), Errors> {
        loop {
            let raw = self.next()?;
            if raw.code != START::CODE {
                trace!(&self.log, "ignoring #{} while initializing", raw.code);
                continue;
            }
            match deserialize::<START>(&raw.msg) {
                Ok(msg) if !msg.proposers.is_empty() => {
                    let proposer = msg.proposers[desired % msg.proposers.len()];
                    info!(&self.log, "roster received, using proposer #{}", proposer);
                    self.proposer = Some(proposer);
                    return Ok(());
                }
                _ => warn!(&self.log, "dropping unusable START"),
            }
        }
    }

    /// Forward the value to the pinned proposer and block until any learner
    /// reports the decided value, which may or may not be ours.
    pub fn set(&mut self, value: &str) -> Result<String, Errors> {
        let proposer = match self.proposer {
            Some(id) => id,
            None => return Err(NOTREADY),
        };
        let bytes = FWD {
            client: self.id,
            value: value.to_string(),
        }
        .to_raw(self.id);
        self.send(proposer, &bytes)?;
        info!(&self.log, "forwarded '{}' to proposer #{}", value, proposer);
        loop {
            let raw = self.next()?;
            if raw.code != FINAL::CODE {
                trace!(&self.log, "ignoring #{} while waiting", raw.code);
                continue;
            }
            match deserialize::<FINAL>(&raw.msg) {
                Ok(msg) => {
                    info!(&self.log, "decided value is '{}'", msg.value);
                    return Ok(msg.value);
                }
                _ => warn!(&self.log, "dropping unparsable FINAL"),
            }
        }
    }

    /// Tell every consensus node to shut down.
    pub fn cleanup(&self) -> Result<(), Errors> {
        let bytes = TERMINATE.to_raw(self.id);
        for id in 0..self.dir.consensus() as NodeId {
            self.send(id, &bytes)?;
        }
        Ok(())
    }

    fn send(&self, to: NodeId, bytes: &[u8]) -> Result<(), Errors> {
        let endpoint = self.dir.endpoint(to);
        let _ = self
            .socket
            .send_to(bytes, (endpoint.host.as_str(), endpoint.port))
            .map_err(IO)?;
        Ok(())
    }

    fn next(&self) -> Result<RAW, Errors> {
        let mut buf = [0u8; MTU];
        loop {
            let (len, _) = self.socket.recv_from(&mut buf).map_err(IO)?;
            match deserialize::<RAW>(&buf[..len]) {
                Ok(raw) => return Ok(raw),
                Err(_) => warn!(&self.log, "dropping unparsable datagram ({} bytes)", len),
            }
        }
    }
}
