use clap::{clap_app, value_t};
use decree::config::{Config, Directory};
use decree::protocol::client::Client;
use slog::{info, o, Drain, Level, LevelFilter, Logger};
use slog_async::Async;
use slog_term::{FullFormat, PlainSyncDecorator};
use std::io::stderr;

fn main() {

    //
    // - init slog to dump on stderr, keeping stdout for the decided value
    //
    let cfg = Config::from_env();
    let decorator = PlainSyncDecorator::new(stderr());
    let formatted = FullFormat::new(decorator).build().fuse();
    let drain = Async::new(formatted).build().fuse();
    let level = if cfg.debug { Level::Trace } else { Level::Info };
    let filter = LevelFilter::new(drain, level).fuse();
    let root = Logger::root(filter, o!());
    let log = root.new(o!("sys" => "main"));

    let args = clap_app!(clidriver =>
        (version: env!("CARGO_PKG_VERSION"))
        (@arg UID: +required "unique client identifier")
        (@arg VALUE: +required "value to propose")
        (@arg PROPOSER: +required "desired proposer index")
        (@arg HOSTS: --hosts +takes_value "host directory file")
    )
    .get_matches();

    let uid = value_t!(args, "UID", u8).unwrap();
    let value = value_t!(args, "VALUE", String).unwrap();
    let desired = value_t!(args, "PROPOSER", usize).unwrap();
    let hosts = value_t!(args, "HOSTS", String).unwrap_or_else(|_| "./hosts.txt".to_string());
    let dir = Directory::load(&hosts).unwrap();
    assert!(
        (uid as usize) >= dir.consensus() && (uid as usize) < dir.len(),
        "not a client identifier"
    );

    //
    // - wait for the cluster to start, submit the value, then tear the
    //   cluster down
    // - the decided value goes to stdout
    //
    let mut client = Client::new(uid, dir, root.new(o!("sys" => "client", "id" => uid))).unwrap();
    client.initialize(desired).unwrap();
    let decided = client.set(&value).unwrap();
    println!("{}", decided);
    client.cleanup().unwrap();
    info!(&log, "exiting");
}
