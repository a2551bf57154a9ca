//! Handoff scenarios driven through the public API
//!
//! A `ManualProvider` stands in for the OS notification mechanism so each test
//! controls the exact interleaving of producer and consumer.

use procgate::dispatcher::{Completion, ControlRequest, PendingWait};
use procgate::error::{AttachError, ControlError, RegistrationError};
use procgate::lifecycle::Monitor;
use procgate::mailbox::{PublishOutcome, SlotState};
use procgate::models::{DecisionRecord, ProcessNotification};
use procgate::source::ManualProvider;

fn attach() -> (Monitor, ManualProvider) {
    let provider = ManualProvider::new();
    let monitor = Monitor::attach(Box::new(provider.clone())).unwrap();
    (monitor, provider)
}

fn pending(completion: Completion) -> PendingWait {
    match completion {
        Completion::Pending(pending) => pending,
        Completion::Ready(result) => panic!("expected pending wait, got {:?}", result),
    }
}

#[test]
fn test_launch_with_no_waiter_is_dropped() {
    let (monitor, provider) = attach();

    let outcome = provider.notify(ProcessNotification::created(100, 1, Some("C:\\a.exe")));
    assert_eq!(outcome, Some(PublishOutcome::Dropped));
    assert_eq!(monitor.slot_state(), SlotState::Empty);
    assert_eq!(monitor.stats().dropped, 1);
}

#[test]
fn test_waiting_consumer_receives_launch() {
    let (monitor, provider) = attach();
    let wait = pending(monitor.dispatcher().dispatch(ControlRequest::wait_for_next_event()));
    assert_eq!(monitor.slot_state(), SlotState::WaitingConsumer);

    let outcome = provider.notify(ProcessNotification::created(200, 4, Some("C:\\b.exe")));
    assert_eq!(outcome, Some(PublishOutcome::Delivered));

    let event = wait.blocking_wait().unwrap();
    assert_eq!(event.process_id, 200);
    assert_eq!(event.parent_process_id, 4);
    assert_eq!(event.image_path.as_str(), "C:\\b.exe");
    assert_eq!(monitor.slot_state(), SlotState::Empty);
}

#[test]
fn test_second_consumer_busy_then_detach_cancels_first() {
    let (mut monitor, provider) = attach();
    let dispatcher = monitor.dispatcher();

    let first = pending(dispatcher.dispatch(ControlRequest::wait_for_next_event()));
    match dispatcher.dispatch(ControlRequest::wait_for_next_event()) {
        Completion::Ready(Err(ControlError::Busy)) => {}
        Completion::Ready(other) => panic!("expected Busy, got {:?}", other),
        Completion::Pending(_) => panic!("second wait must not be parked"),
    }

    monitor.detach();
    assert_eq!(first.blocking_wait(), Err(ControlError::Cancelled));
    assert_eq!(monitor.slot_state(), SlotState::Closed);

    // A consumer arriving after teardown is not parked
    match dispatcher.dispatch(ControlRequest::wait_for_next_event()) {
        Completion::Ready(Err(ControlError::Cancelled)) => {}
        Completion::Ready(other) => panic!("expected Cancelled, got {:?}", other),
        Completion::Pending(_) => panic!("wait parked after detach"),
    }

    // Source is unregistered: late notifications go nowhere
    assert!(!provider.is_registered());
    assert_eq!(provider.notify(ProcessNotification::created(300, 1, None)), None);
}

#[test]
fn test_exit_notifications_never_reach_consumer() {
    let (monitor, provider) = attach();
    let wait = pending(monitor.dispatcher().dispatch(ControlRequest::wait_for_next_event()));

    assert_eq!(provider.notify(ProcessNotification::exited(55)), None);
    assert_eq!(monitor.slot_state(), SlotState::WaitingConsumer);

    provider.notify(ProcessNotification::created(56, 1, Some("/bin/sh")));
    assert_eq!(wait.blocking_wait().unwrap().process_id, 56);
}

#[test]
fn test_long_image_path_is_truncated_identically() {
    let (monitor, provider) = attach();
    let long_path: String = std::iter::repeat('x').take(300).collect();

    let mut delivered = Vec::new();
    for _ in 0..2 {
        let wait = pending(monitor.dispatcher().dispatch(ControlRequest::wait_for_next_event()));
        provider.notify(ProcessNotification::created(7, 1, Some(&long_path)));
        delivered.push(wait.blocking_wait().unwrap());
    }

    assert_eq!(delivered[0].image_path.utf16_len(), 260);
    assert_eq!(delivered[0], delivered[1]);
}

#[test]
fn test_abandoned_consumer_does_not_block_the_next() {
    let (monitor, provider) = attach();
    let dispatcher = monitor.dispatcher();

    drop(pending(dispatcher.dispatch(ControlRequest::wait_for_next_event())));
    let wait = pending(dispatcher.dispatch(ControlRequest::wait_for_next_event()));

    provider.notify(ProcessNotification::created(8, 1, None));
    let event = wait.blocking_wait().unwrap();
    assert_eq!(event.process_id, 8);
    assert!(event.image_path.is_empty());
}

#[test]
fn test_decisions_do_not_touch_the_slot() {
    let (monitor, _provider) = attach();
    let dispatcher = monitor.dispatcher();
    let _wait = pending(dispatcher.dispatch(ControlRequest::wait_for_next_event()));

    let reply = dispatcher.dispatch(ControlRequest::submit_decision(DecisionRecord {
        process_id: 9,
        verdict: 1,
    }));
    assert!(matches!(reply, Completion::Ready(Ok(_))));
    assert_eq!(monitor.slot_state(), SlotState::WaitingConsumer);
}

#[test]
fn test_attach_failure_leaves_nothing_registered() {
    let provider = ManualProvider::failing(RegistrationError::Os("access denied".to_string()));
    match Monitor::attach(Box::new(provider.clone())) {
        Err(AttachError::Registration(RegistrationError::Os(reason))) => {
            assert_eq!(reason, "access denied")
        }
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("attach must fail"),
    }
    assert!(!provider.is_registered());
}

#[test]
fn test_concurrent_launches_deliver_exactly_one() {
    let (monitor, provider) = attach();
    let wait = pending(monitor.dispatcher().dispatch(ControlRequest::wait_for_next_event()));

    let handles: Vec<_> = (1..=8u64)
        .map(|pid| {
            let provider = provider.clone();
            std::thread::spawn(move || provider.notify(ProcessNotification::created(pid, 1, None)))
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let delivered = outcomes
        .iter()
        .filter(|o| **o == Some(PublishOutcome::Delivered))
        .count();
    assert_eq!(delivered, 1);
    assert_eq!(monitor.stats().dropped, 7);

    let event = wait.blocking_wait().unwrap();
    assert!((1..=8).contains(&event.process_id));
}
