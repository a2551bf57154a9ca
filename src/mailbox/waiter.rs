//! Completion tokens for suspended consumers

use crate::models::WaitOutcome;
use tokio::sync::oneshot;

/// A consumer suspended inside WaitForNextEvent.
///
/// `resume` consumes the token, so a waiter can be completed at most once.
pub trait Waiter: Send {
    /// Complete the wait. Returns the outcome back if the consumer is gone.
    fn resume(self: Box<Self>, outcome: WaitOutcome) -> Result<(), WaitOutcome>;

    /// True once the consumer can no longer receive a result
    fn is_abandoned(&self) -> bool;
}

/// Waiter backed by a `tokio` oneshot channel
#[derive(Debug)]
pub struct OneshotWaiter {
    tx: oneshot::Sender<WaitOutcome>,
}

/// Consumer half of a `OneshotWaiter`
#[derive(Debug)]
pub struct WaitReceiver {
    rx: oneshot::Receiver<WaitOutcome>,
}

impl OneshotWaiter {
    pub fn new() -> (Self, WaitReceiver) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, WaitReceiver { rx })
    }
}

impl Waiter for OneshotWaiter {
    fn resume(self: Box<Self>, outcome: WaitOutcome) -> Result<(), WaitOutcome> {
        self.tx.send(outcome)
    }

    fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

impl WaitReceiver {
    /// Suspend until the mailbox resumes this waiter.
    ///
    /// A waiter dropped without being resumed (mailbox torn down, or the
    /// registration was rejected) reads as `Cancelled`.
    pub async fn recv(self) -> WaitOutcome {
        self.rx.await.unwrap_or(WaitOutcome::Cancelled)
    }

    /// Blocking variant for consumers outside an async runtime
    pub fn blocking_recv(self) -> WaitOutcome {
        self.rx.blocking_recv().unwrap_or(WaitOutcome::Cancelled)
    }

    pub fn try_recv(&mut self) -> Result<WaitOutcome, oneshot::error::TryRecvError> {
        self.rx.try_recv()
    }
}
