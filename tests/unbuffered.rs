// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use threadchan::make_channel;

#[test]
fn rendezvous_send_waits_for_receiver() {
    let chan = Arc::new(make_channel::<i32>(0));
    let delivered = Arc::new(AtomicBool::new(false));

    let sender_chan = Arc::clone(&chan);
    let sender_flag = Arc::clone(&delivered);
    let handle = thread::spawn(move || {
        let ok = sender_chan.send(7);
        sender_flag.store(ok, Ordering::SeqCst);
    });

    thread::sleep(Duration::from_millis(30));
    assert!(!delivered.load(Ordering::SeqCst));

    assert_eq!(chan.receive(), Some(7));
    handle.join().unwrap();
    assert!(delivered.load(Ordering::SeqCst));
}

#[test]
fn rendezvous_receive_waits_for_sender() {
    let chan = Arc::new(make_channel::<&str>(0));
    let receiver_chan = Arc::clone(&chan);
    let handle = thread::spawn(move || receiver_chan.receive());

    thread::sleep(Duration::from_millis(30));
    assert!(chan.send("hello"));
    assert_eq!(handle.join().unwrap(), Some("hello"));
}

#[test]
fn closing_an_unbuffered_channel_wakes_both_sides() {
    let chan = Arc::new(make_channel::<i32>(0));
    let receiver_chan = Arc::clone(&chan);
    let handle = thread::spawn(move || receiver_chan.receive());

    thread::sleep(Duration::from_millis(30));
    chan.close();
    assert_eq!(handle.join().unwrap(), None);
    assert!(!chan.send(1));
}

#[test]
fn many_rendezvous_pairs_each_deliver_exactly_once() {
    let chan = Arc::new(make_channel::<i32>(0));
    let senders: Vec<_> = (0..8)
        .map(|i| {
            let chan = Arc::clone(&chan);
            thread::spawn(move || chan.send(i))
        })
        .collect();

    let mut received = Vec::new();
    for _ in 0..8 {
        received.push(chan.receive().expect("sender should be waiting"));
    }
    for s in senders {
        assert!(s.join().unwrap());
    }
    received.sort();
    assert_eq!(received, (0..8).collect::<Vec<_>>());
}
