//! Control request dispatcher
//!
//! The consumer-facing surface of the handoff core. Two device-control style
//! operations are multiplexed over one channel:
//! - `WAIT_FOR_NEXT_EVENT`: park the caller in the mailbox until an event or
//!   cancellation arrives
//! - `SUBMIT_DECISION`: acknowledge a verdict from the decision service
//!
//! Every other control code fails with `InvalidRequest`.

pub mod codes;

pub use codes::{ctl_code, SUBMIT_DECISION, WAIT_FOR_NEXT_EVENT};

use crate::error::ControlError;
use crate::mailbox::{Mailbox, OneshotWaiter, RegisterOutcome, WaitReceiver};
use crate::models::{Decision, DecisionRecord, ProcessEvent, Verdict, WaitOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One control request as received from the consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub code: u32,
    /// Input buffer for `SUBMIT_DECISION`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<DecisionRecord>,
}

impl ControlRequest {
    pub fn wait_for_next_event() -> Self {
        Self {
            code: WAIT_FOR_NEXT_EVENT,
            decision: None,
        }
    }

    pub fn submit_decision(decision: DecisionRecord) -> Self {
        Self {
            code: SUBMIT_DECISION,
            decision: Some(decision),
        }
    }
}

/// Successful completion payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlReply {
    Event(ProcessEvent),
    DecisionAccepted(Decision),
}

/// How a dispatched request completes
#[derive(Debug)]
pub enum Completion {
    /// Completed immediately
    Ready(Result<ControlReply, ControlError>),
    /// Left outstanding in the mailbox
    Pending(PendingWait),
}

/// A WaitForNextEvent parked in the mailbox.
///
/// Dropping it abandons the wait; the mailbox slot then becomes reclaimable.
#[derive(Debug)]
pub struct PendingWait {
    receiver: WaitReceiver,
}

impl PendingWait {
    pub async fn wait(self) -> Result<ProcessEvent, ControlError> {
        into_result(self.receiver.recv().await)
    }

    pub fn blocking_wait(self) -> Result<ProcessEvent, ControlError> {
        into_result(self.receiver.blocking_recv())
    }
}

fn into_result(outcome: WaitOutcome) -> Result<ProcessEvent, ControlError> {
    match outcome {
        WaitOutcome::Event(event) => Ok(event),
        WaitOutcome::Cancelled => Err(ControlError::Cancelled),
    }
}

/// Maps control requests onto mailbox operations. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ControlDispatcher {
    mailbox: Arc<Mailbox>,
}

impl ControlDispatcher {
    pub fn new(mailbox: Arc<Mailbox>) -> Self {
        Self { mailbox }
    }

    pub fn dispatch(&self, request: ControlRequest) -> Completion {
        match request.code {
            WAIT_FOR_NEXT_EVENT => self.wait_for_next_event(),
            SUBMIT_DECISION => Completion::Ready(
                self.submit_decision(request.decision)
                    .map(ControlReply::DecisionAccepted),
            ),
            other => {
                log::warn!("rejecting unknown control code {:#x}", other);
                Completion::Ready(Err(ControlError::InvalidRequest(other)))
            }
        }
    }

    fn wait_for_next_event(&self) -> Completion {
        let (waiter, receiver) = OneshotWaiter::new();
        match self.mailbox.register_waiter(Box::new(waiter)) {
            RegisterOutcome::Accepted => {
                log::debug!("wait request pending");
                Completion::Pending(PendingWait { receiver })
            }
            RegisterOutcome::Busy => {
                log::debug!("wait request rejected, another wait is outstanding");
                Completion::Ready(Err(ControlError::Busy))
            }
            RegisterOutcome::Closed => {
                log::debug!("wait request rejected, monitor is detached");
                Completion::Ready(Err(ControlError::Cancelled))
            }
        }
    }

    fn submit_decision(&self, record: Option<DecisionRecord>) -> Result<Decision, ControlError> {
        let record = record.ok_or_else(|| {
            ControlError::MalformedDecision("request carries no decision record".to_string())
        })?;
        let decision = Decision::try_from(record)?;

        match decision.verdict {
            Verdict::Allow => log::info!("decision received: allow pid {}", decision.process_id),
            // Enforcement is not wired: a Block verdict is acknowledged only
            Verdict::Block => log::warn!(
                "decision received: block pid {} (enforcement not implemented, acknowledged only)",
                decision.process_id
            ),
        }
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::{PublishOutcome, SlotState};

    fn dispatcher() -> (ControlDispatcher, Arc<Mailbox>) {
        let mailbox = Arc::new(Mailbox::new());
        (ControlDispatcher::new(mailbox.clone()), mailbox)
    }

    fn expect_pending(completion: Completion) -> PendingWait {
        match completion {
            Completion::Pending(pending) => pending,
            Completion::Ready(result) => panic!("expected pending wait, got {:?}", result),
        }
    }

    fn expect_ready(completion: Completion) -> Result<ControlReply, ControlError> {
        match completion {
            Completion::Ready(result) => result,
            Completion::Pending(_) => panic!("expected immediate completion"),
        }
    }

    #[test]
    fn test_wait_is_pending_until_publish() {
        let (dispatcher, mailbox) = dispatcher();
        let pending = expect_pending(dispatcher.dispatch(ControlRequest::wait_for_next_event()));
        assert_eq!(mailbox.state(), SlotState::WaitingConsumer);

        let event = ProcessEvent::new(200, 1, Some("/usr/bin/make"));
        assert_eq!(mailbox.publish(event.clone()), PublishOutcome::Delivered);

        assert_eq!(pending.blocking_wait(), Ok(event));
    }

    #[test]
    fn test_second_wait_completes_busy() {
        let (dispatcher, _mailbox) = dispatcher();
        let _first = expect_pending(dispatcher.dispatch(ControlRequest::wait_for_next_event()));

        let second = expect_ready(dispatcher.dispatch(ControlRequest::wait_for_next_event()));
        assert_eq!(second, Err(ControlError::Busy));
    }

    #[test]
    fn test_dropped_pending_wait_frees_slot() {
        let (dispatcher, _mailbox) = dispatcher();
        let first = expect_pending(dispatcher.dispatch(ControlRequest::wait_for_next_event()));
        drop(first);

        expect_pending(dispatcher.dispatch(ControlRequest::wait_for_next_event()));
    }

    #[test]
    fn test_cancel_completes_wait_with_cancelled() {
        let (dispatcher, mailbox) = dispatcher();
        let pending = expect_pending(dispatcher.dispatch(ControlRequest::wait_for_next_event()));

        mailbox.cancel();

        assert_eq!(pending.blocking_wait(), Err(ControlError::Cancelled));
    }

    #[test]
    fn test_wait_on_closed_mailbox_completes_cancelled() {
        let (dispatcher, mailbox) = dispatcher();
        mailbox.close();

        let reply = expect_ready(dispatcher.dispatch(ControlRequest::wait_for_next_event()));
        assert_eq!(reply, Err(ControlError::Cancelled));
        assert_eq!(mailbox.state(), SlotState::Closed);
    }

    #[tokio::test]
    async fn test_async_wait_receives_event() {
        let (dispatcher, mailbox) = dispatcher();
        let pending = expect_pending(dispatcher.dispatch(ControlRequest::wait_for_next_event()));

        let producer = std::thread::spawn(move || {
            mailbox.publish(ProcessEvent::new(321, 1, Some("/bin/echo")))
        });

        let event = pending.wait().await.unwrap();
        assert_eq!(event.process_id, 321);
        assert_eq!(producer.join().unwrap(), PublishOutcome::Delivered);
    }

    #[test]
    fn test_submit_allow_decision_is_acknowledged() {
        let (dispatcher, _mailbox) = dispatcher();
        let request = ControlRequest::submit_decision(DecisionRecord {
            process_id: 200,
            verdict: 0,
        });
        let reply = expect_ready(dispatcher.dispatch(request));
        assert_eq!(
            reply,
            Ok(ControlReply::DecisionAccepted(Decision::new(200, Verdict::Allow)))
        );
    }

    #[test]
    fn test_submit_block_decision_is_acknowledged_only() {
        let (dispatcher, mailbox) = dispatcher();
        let request = ControlRequest::submit_decision(DecisionRecord {
            process_id: 200,
            verdict: 1,
        });
        let reply = expect_ready(dispatcher.dispatch(request));
        assert_eq!(
            reply,
            Ok(ControlReply::DecisionAccepted(Decision::new(200, Verdict::Block)))
        );
        assert_eq!(mailbox.state(), SlotState::Empty);
    }

    #[test]
    fn test_submit_decision_rejects_bad_records() {
        let (dispatcher, _mailbox) = dispatcher();

        for record in [
            DecisionRecord { process_id: 0, verdict: 0 },
            DecisionRecord { process_id: 5, verdict: 7 },
        ] {
            let reply = expect_ready(dispatcher.dispatch(ControlRequest::submit_decision(record)));
            assert!(matches!(reply, Err(ControlError::MalformedDecision(_))));
        }

        let missing = expect_ready(dispatcher.dispatch(ControlRequest {
            code: SUBMIT_DECISION,
            decision: None,
        }));
        assert!(matches!(missing, Err(ControlError::MalformedDecision(_))));
    }

    #[test]
    fn test_unknown_code_is_invalid_request() {
        let (dispatcher, mailbox) = dispatcher();
        let reply = expect_ready(dispatcher.dispatch(ControlRequest {
            code: 0x0022_2000,
            decision: None,
        }));
        assert_eq!(reply, Err(ControlError::InvalidRequest(0x0022_2000)));
        assert_eq!(mailbox.state(), SlotState::Empty);
    }

    #[test]
    fn test_control_request_json_shape() {
        let json = serde_json::to_value(ControlRequest::wait_for_next_event()).unwrap();
        assert_eq!(json, serde_json::json!({ "code": WAIT_FOR_NEXT_EVENT }));

        let json = r#"{"code":2269192,"decision":{"process_id":3,"verdict":1}}"#;
        let parsed: ControlRequest = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.code, SUBMIT_DECISION);
        assert_eq!(parsed.decision, Some(DecisionRecord { process_id: 3, verdict: 1 }));
    }
}
