//! Notification provider backed by process table polling
//!
//! Hosts without a push notification hook still get create/exit notifications:
//! a background thread refreshes the process table at a fixed interval and
//! diffs consecutive snapshots.

use super::tracker::{ProcessRecord, ProcessSnapshot, SnapshotTracker};
use super::{EventSource, NotificationProvider};
use crate::error::RegistrationError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use sysinfo::{ProcessesToUpdate, System};

/// Upper bound on how long `unregister` waits for the poller to notice
const STOP_CHECK_SLICE: Duration = Duration::from_millis(50);

pub struct PollingProvider {
    interval: Duration,
    worker: Option<PollingWorker>,
}

struct PollingWorker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl PollingProvider {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            worker: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl NotificationProvider for PollingProvider {
    fn register(&mut self, source: Arc<EventSource>) -> Result<(), RegistrationError> {
        if self.worker.is_some() {
            return Err(RegistrationError::AlreadyRegistered);
        }

        let running = Arc::new(AtomicBool::new(true));
        let worker_running = running.clone();
        let interval = self.interval;
        let handle = std::thread::Builder::new()
            .name("procgate-poller".to_string())
            .spawn(move || poll_loop(source, interval, worker_running))
            .map_err(|e| RegistrationError::Os(format!("failed to start polling thread: {}", e)))?;

        log::info!("process polling started (interval: {:.1}s)", interval.as_secs_f64());
        self.worker = Some(PollingWorker { running, handle });
        Ok(())
    }

    fn unregister(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.running.store(false, Ordering::SeqCst);
            if worker.handle.join().is_err() {
                log::error!("process polling thread panicked");
            }
            log::info!("process polling stopped");
        }
    }
}

impl Drop for PollingProvider {
    fn drop(&mut self) {
        self.unregister();
    }
}

fn poll_loop(source: Arc<EventSource>, interval: Duration, running: Arc<AtomicBool>) {
    let mut system = System::new();
    let mut tracker = SnapshotTracker::new();

    while running.load(Ordering::SeqCst) {
        let cycle_start = Instant::now();

        system.refresh_processes(ProcessesToUpdate::All, true);
        for notification in tracker.detect_changes(take_snapshot(&system)) {
            // Unregister may have landed mid-cycle
            if !running.load(Ordering::SeqCst) {
                return;
            }
            source.on_process_notify(&notification);
        }

        // Sleep the remainder of the interval in slices so unregister stays prompt
        while running.load(Ordering::SeqCst) {
            let elapsed = cycle_start.elapsed();
            match interval.checked_sub(elapsed) {
                Some(remaining) if !remaining.is_zero() => {
                    std::thread::sleep(remaining.min(STOP_CHECK_SLICE));
                }
                _ => break,
            }
        }
    }
}

/// Process table without thread entries; Linux lists every task as a process
fn take_snapshot(system: &System) -> ProcessSnapshot {
    let records = system
        .processes()
        .iter()
        .filter(|(_, process)| process.thread_kind().is_none())
        .map(|(pid, process)| ProcessRecord {
            pid: pid.as_u32(),
            parent_pid: process.parent().map(|p| p.as_u32()).unwrap_or(0),
            start_time: process.start_time(),
            executable_path: process.exe().map(|p| p.to_path_buf()),
        });
    ProcessSnapshot::from_records(records)
}
