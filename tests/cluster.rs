//! End-to-end scenarios over loopback UDP: spin a full cluster up in one
//! process, run real clients against it and check what they got back. Each
//! scenario uses its own port range so they can run concurrently.
use decree::config::{Config, Directory};
use decree::primitives::event::Event;
use decree::protocol::client::Client;
use decree::protocol::consensus::Node;
use slog::{o, Logger};
use std::sync::Arc;
use std::thread;

fn logger() -> Logger {
    Logger::root(slog::Discard, o!())
}

fn directory(
    proposers: usize,
    acceptors: usize,
    learners: usize,
    clients: usize,
    base: u16,
) -> Directory {
    let mut text = format!(
        "PROPOSERS {}\nACCEPTORS {}\nLEARNERS {}\n",
        proposers, acceptors, learners
    );
    let consensus = proposers + acceptors + learners;
    for n in 0..consensus {
        text.push_str(&format!("127.0.0.1 {} con\n", base + n as u16));
    }
    for n in 0..clients {
        text.push_str(&format!("127.0.0.1 {} cli\n", base + (consensus + n) as u16));
    }
    Directory::parse(&text).unwrap()
}

/// Boot a full cluster, run one client thread per submission and return
/// the decided value each client observed.
fn run(
    proposers: usize,
    acceptors: usize,
    learners: usize,
    submissions: &[(&str, usize)],
    base: u16,
) -> Vec<String> {
    let dir = directory(proposers, acceptors, learners, submissions.len(), base);
    let consensus = dir.consensus();

    //
    // - bind the client sockets before the cluster starts so no relayed
    //   roster frame can get lost
    //
    let clients: Vec<Client> = (0..submissions.len())
        .map(|n| Client::new((consensus + n) as u8, dir.clone(), logger()).unwrap())
        .collect();

    let event = Arc::new(Event::new());
    let guard = event.guard();
    let nodes: Vec<Node> = (0..consensus)
        .map(|id| Node::spawn(guard.clone(), id as u8, Config::default(), dir.clone(), logger()).unwrap())
        .collect();

    let handles: Vec<_> = clients
        .into_iter()
        .zip(submissions.iter())
        .map(|(mut client, (value, desired))| {
            let value = value.to_string();
            let desired = *desired;
            thread::spawn(move || {
                client.initialize(desired).unwrap();
                let decided = client.set(&value).unwrap();
                client.cleanup().unwrap();
                decided
            })
        })
        .collect();
    let decided: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    //
    // - wait for every node to wind down so the ports free up
    //
    drop(nodes);
    drop(guard);
    event.wait();
    decided
}

#[test]
fn minimal_cluster_decides_the_client_value() {
    let decided = run(1, 1, 1, &[("210", 0)], 24400);
    assert!(decided == vec!["210".to_string()]);
}

#[test]
fn one_proposer_many_clients_one_value() {
    let submissions = [("55", 0), ("56", 0), ("57", 0), ("230", 0)];
    let decided = run(1, 3, 1, &submissions, 24500);
    assert!(decided.iter().all(|value| *value == decided[0]));
    assert!(["55", "56", "57", "230"].contains(&decided[0].as_str()));
}

#[test]
fn concurrent_proposers_still_agree() {
    let submissions = [
        ("55", 0),
        ("89", 1),
        ("144", 2),
        ("233", 3),
        ("377", 4),
        ("610", 5),
        ("987", 6),
        ("1597", 7),
    ];
    let decided = run(3, 3, 5, &submissions, 24600);
    assert!(decided.iter().all(|value| *value == decided[0]));
    assert!([
        "55", "89", "144", "233", "377", "610", "987", "1597"
    ]
    .contains(&decided[0].as_str()));
}
