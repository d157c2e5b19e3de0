// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use threadchan::{make_channel, select, SelectOp, SelectOutcome};

#[test]
fn fan_in_select_picks_whichever_channel_has_data() {
    let a = make_channel::<i32>(1);
    let b = make_channel::<i32>(1);
    assert!(b.send(99));

    let outcome = select(vec![SelectOp::Receive(&a), SelectOp::Receive(&b)], false);
    match outcome {
        SelectOutcome::Received(1, v) => assert_eq!(v, 99),
        _ => panic!("expected Received(1, 99)"),
    }
}

#[test]
fn select_blocks_until_a_channel_becomes_ready() {
    let a = Arc::new(make_channel::<i32>(1));
    let b = Arc::new(make_channel::<i32>(1));

    let b2 = Arc::clone(&b);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(40));
        b2.send(5);
    });

    let outcome = select(vec![SelectOp::Receive(&*a), SelectOp::Receive(&*b)], false);
    match outcome {
        SelectOutcome::Received(1, v) => assert_eq!(v, 5),
        _ => panic!("expected Received(1, 5)"),
    }
    handle.join().unwrap();
}

#[test]
fn default_arm_fires_when_nothing_is_ready() {
    let a = make_channel::<i32>(1);
    let b = make_channel::<i32>(1);

    let outcome = select(vec![SelectOp::Receive(&a), SelectOp::Receive(&b)], true);
    assert!(matches!(outcome, SelectOutcome::Default));
}

#[test]
fn all_closed_short_circuits() {
    let a = make_channel::<i32>(1);
    let b = make_channel::<i32>(1);
    a.close();
    b.close();

    let outcome = select(vec![SelectOp::Receive(&a), SelectOp::Receive(&b)], false);
    assert!(matches!(outcome, SelectOutcome::AllClosed));
}

#[test]
fn select_send_arm_completes_when_receiver_ready() {
    let a = make_channel::<i32>(0); // unbuffered, needs a receiver present
    let b = make_channel::<i32>(0);

    let a_ref = Arc::new(a);
    let a2 = Arc::clone(&a_ref);
    let handle = thread::spawn(move || a2.receive());
    thread::sleep(Duration::from_millis(30));

    let outcome = select(
        vec![SelectOp::Send(&*a_ref, 1), SelectOp::Send(&b, 2)],
        false,
    );
    match outcome {
        SelectOutcome::Sent(0) => assert_eq!(handle.join().unwrap(), Some(1)),
        _ => panic!("expected Sent(0)"),
    }
}

#[test]
fn one_closed_arm_does_not_stop_select_from_using_the_other() {
    let a = make_channel::<i32>(1);
    let b = Arc::new(make_channel::<i32>(1));
    a.close();

    let b2 = Arc::clone(&b);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(40));
        b2.send(7);
    });

    let outcome = select(vec![SelectOp::Receive(&a), SelectOp::Receive(&*b)], false);
    match outcome {
        SelectOutcome::Received(1, v) => assert_eq!(v, 7),
        _ => panic!("expected Received(1, 7), a closed arm must not force AllClosed"),
    }
    handle.join().unwrap();
}

#[test]
fn two_concurrent_selects_rendezvous_on_an_unbuffered_channel() {
    let u = Arc::new(make_channel::<i32>(0));

    let u2 = Arc::clone(&u);
    let receiver = thread::spawn(move || select(vec![SelectOp::Receive(&*u2)], false));

    thread::sleep(Duration::from_millis(30));

    let u3 = Arc::clone(&u);
    let sender = thread::spawn(move || select(vec![SelectOp::Send(&*u3, 21)], false));

    let sent = sender.join().unwrap();
    assert!(matches!(sent, SelectOutcome::Sent(0)));

    let received = receiver.join().unwrap();
    match received {
        SelectOutcome::Received(0, v) => assert_eq!(v, 21),
        _ => panic!("expected Received(0, 21)"),
    }
}

#[test]
fn select_across_unbuffered_and_buffered_channels() {
    let rendezvous = Arc::new(make_channel::<i32>(0));
    let buffered = make_channel::<i32>(1);
    assert!(buffered.send(42));

    // The buffered channel is immediately ready; the rendezvous channel
    // has no waiting receiver, so the buffered arm must win.
    let outcome = select(
        vec![
            SelectOp::Receive(&*rendezvous),
            SelectOp::Receive(&buffered),
        ],
        false,
    );
    match outcome {
        SelectOutcome::Received(1, v) => assert_eq!(v, 42),
        _ => panic!("expected Received(1, 42)"),
    }
}
