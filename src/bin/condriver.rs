use clap::{clap_app, value_t};
use decree::config::{Config, Directory};
use decree::primitives::event::Event;
use decree::protocol::consensus::Node;
use slog::{info, o, Drain, Level, LevelFilter, Logger};
use slog_async::Async;
use slog_term::{FullFormat, PlainSyncDecorator};
use std::io::stderr;
use std::sync::Arc;

fn main() {

    //
    // - init slog to dump on stderr
    // - the DEBUG switch lifts the filter up to trace
    //
    let cfg = Config::from_env();
    let decorator = PlainSyncDecorator::new(stderr());
    let formatted = FullFormat::new(decorator).build().fuse();
    let drain = Async::new(formatted).build().fuse();
    let level = if cfg.debug { Level::Trace } else { Level::Info };
    let filter = LevelFilter::new(drain, level).fuse();
    let root = Logger::root(filter, o!());
    let log = root.new(o!("sys" => "main"));

    //
    // - parse the CLI line and load the host directory
    //
    let args = clap_app!(condriver =>
        (version: env!("CARGO_PKG_VERSION"))
        (@arg UID: +required "unique node identifier")
        (@arg HOSTS: --hosts +takes_value "host directory file")
    )
    .get_matches();

    let uid = value_t!(args, "UID", u8).unwrap();
    let hosts = value_t!(args, "HOSTS", String).unwrap_or_else(|_| "./hosts.txt".to_string());
    let dir = Directory::load(&hosts).unwrap();
    assert!((uid as usize) < dir.consensus(), "not a consensus identifier");
    info!(&log, "starting node #{} (version={})", uid, env!("CARGO_PKG_VERSION"));

    //
    // - use a termination event to synchronize our shutdown sequence
    // - the consensus automaton, its receiver and the timer all hold the
    //   guard until they wind down
    //
    let event = Arc::new(Event::new());
    let guard = event.guard();
    let node = Node::spawn(
        guard.clone(),
        uid,
        cfg,
        dir,
        root.new(o!("sys" => "node", "id" => uid)),
    )
    .unwrap();

    {
        //
        // - trap SIGINT/SIGTERM and drain the automaton, same effect as a
        //   TERMINATE frame
        //
        let fsm = node.fsm.clone();
        ctrlc::set_handler(move || {
            fsm.drain();
        })
        .unwrap();
    }

    //
    // - block on the termination event
    // - we are waiting for all our threads to gracefully drain/exit
    //
    drop(guard);
    event.wait();
    info!(&log, "exiting");
}
