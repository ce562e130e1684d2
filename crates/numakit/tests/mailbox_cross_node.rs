//! Integration coverage for cross-node mailbox delivery: concurrent
//! senders from multiple "nodes" delivering into a single target node's
//! mailbox, and a bidirectional exchange between two nodes.

use numakit::mailbox::MailboxArray;
use numakit::SendOutcome;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

#[test]
fn concurrent_senders_deliver_every_message_exactly_once() {
    let mailboxes = Arc::new(MailboxArray::<u64>::create(3, 4096).unwrap());
    const SENDERS: u64 = 4;
    const PER_SENDER: u64 = 2000;

    let senders: Vec<_> = (0..SENDERS)
        .map(|s| {
            let mailboxes = Arc::clone(&mailboxes);
            thread::spawn(move || {
                for i in 0..PER_SENDER {
                    let payload = s * PER_SENDER + i;
                    loop {
                        match mailboxes.send(2, payload) {
                            SendOutcome::Delivered => break,
                            SendOutcome::Congested => thread::yield_now(),
                            SendOutcome::InvalidNode => unreachable!(),
                        }
                    }
                }
            })
        })
        .collect();

    for s in senders {
        s.join().unwrap();
    }

    let mut received = HashSet::new();
    mailboxes.process_local(2, |msg| { received.insert(msg); }, 0);

    let total = (SENDERS * PER_SENDER) as usize;
    assert_eq!(received.len(), total);
    for s in 0..SENDERS {
        for i in 0..PER_SENDER {
            assert!(received.contains(&(s * PER_SENDER + i)));
        }
    }
}

#[test]
fn two_nodes_exchange_messages_independently() {
    let mailboxes = MailboxArray::<u64>::create(2, 256).unwrap();

    for i in 0..100u64 {
        assert_eq!(mailboxes.send(0, i), SendOutcome::Delivered);
        assert_eq!(mailboxes.send(1, i * 2), SendOutcome::Delivered);
    }

    let mut node0 = Vec::new();
    let mut node1 = Vec::new();
    mailboxes.process_local(0, |m| node0.push(m), 0);
    mailboxes.process_local(1, |m| node1.push(m), 0);

    assert_eq!(node0, (0..100u64).collect::<Vec<_>>());
    assert_eq!(node1, (0..100u64).map(|i| i * 2).collect::<Vec<_>>());
}
