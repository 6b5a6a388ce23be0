//! UDP glue around the protocol automata. Outgoing traffic is fire and
//! forget; incoming datagrams are deserialized on a dedicated receiver
//! thread and posted into the owning automaton, which is the only place
//! protocol state is ever touched. The receiver polls its socket with a
//! short timeout so it can notice the automaton going down and exit.
use crate::fsm::automaton::Automaton;
use crate::primitives::event::Guard;
use crate::protocol::messages::{Command, RAW};
use bincode::deserialize;
use slog::{trace, warn, Logger};
use std::io::ErrorKind;
use std::net::UdpSocket;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Upper bound on a serialized frame, matching the receive buffer.
pub const MTU: usize = 4096;

/// Sending half handed to the automaton body.
pub struct Udp {
    socket: UdpSocket,
    log: Logger,
}

impl Udp {
    pub fn from(socket: UdpSocket, log: Logger) -> Udp {
        Udp { socket, log }
    }

    /// Best-effort datagram send; a failure is worth a log line and nothing
    /// else, the protocol absorbs loss by design of its quorums.
    pub fn send(&self, host: &str, port: u16, bytes: &[u8]) -> () {
        debug_assert!(bytes.len() <= MTU);
        if let Err(error) = self.socket.send_to(bytes, (host, port)) {
            warn!(&self.log, "send to {}:{} failed ({})", host, port, error);
        }
    }
}

/// Run the receive loop on its own thread: deserialize each datagram into a
/// RAW envelope and post it to the automaton. Unparsable datagrams are
/// dropped with a warning.
pub fn listen(socket: UdpSocket, fsm: Arc<Automaton<Command>>, guard: Arc<Guard>, log: Logger) -> () {
    let _ = thread::spawn(move || {

        //
        // - the timeout bounds how long we may linger once the automaton
        //   drained
        //
        let _ = socket.set_read_timeout(Some(Duration::from_millis(100)));
        let mut buf = [0u8; MTU];
        while fsm.running() {
            match socket.recv_from(&mut buf) {
                Ok((len, _)) => match deserialize::<RAW>(&buf[..len]) {
                    Ok(raw) => {
                        trace!(&log, "<- #{} from {}", raw.code, raw.src);
                        let _ = fsm.post(Command::MESSAGE(raw));
                    }
                    Err(_) => {
                        warn!(&log, "dropping unparsable datagram ({} bytes)", len);
                    }
                },
                Err(ref error)
                    if error.kind() == ErrorKind::WouldBlock
                        || error.kind() == ErrorKind::TimedOut => {}
                Err(error) => {
                    warn!(&log, "socket error ({}), receiver going down", error);
                    break;
                }
            }
        }
        drop(guard);
    });
}
