//! Process table snapshot tracking
//!
//! Diffs consecutive snapshots of the process table into create and exit
//! notifications for the polling source.

use crate::models::ProcessNotification;
use std::collections::HashMap;
use std::path::PathBuf;

/// One process table entry as seen by the polling source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub parent_pid: u32,
    /// Process start time in seconds since epoch
    pub start_time: u64,
    pub executable_path: Option<PathBuf>,
}

/// Process table at one polling instant.
///
/// Keyed by (PID, start_time) so that PID reuse reads as a new process.
#[derive(Debug, Clone, Default)]
pub struct ProcessSnapshot {
    pub processes: HashMap<(u32, u64), ProcessRecord>,
}

impl ProcessSnapshot {
    pub fn from_records(records: impl IntoIterator<Item = ProcessRecord>) -> Self {
        Self {
            processes: records
                .into_iter()
                .map(|record| ((record.pid, record.start_time), record))
                .collect(),
        }
    }
}

/// Turns successive snapshots into create/exit notifications
pub struct SnapshotTracker {
    current_snapshot: Option<ProcessSnapshot>,
}

impl SnapshotTracker {
    pub fn new() -> Self {
        Self {
            current_snapshot: None,
        }
    }

    /// Compare `new_snapshot` with the previous one.
    ///
    /// The first snapshot only establishes a baseline; processes already running
    /// at startup are not reported. Creations come out before exits, each
    /// ordered by start time and PID.
    pub fn detect_changes(&mut self, new_snapshot: ProcessSnapshot) -> Vec<ProcessNotification> {
        let notifications = match &self.current_snapshot {
            None => Vec::new(),
            Some(previous) => {
                let mut created: Vec<&ProcessRecord> = new_snapshot
                    .processes
                    .iter()
                    .filter(|(key, _)| !previous.processes.contains_key(key))
                    .map(|(_, record)| record)
                    .collect();
                created.sort_by_key(|record| (record.start_time, record.pid));

                let mut exited: Vec<&(u32, u64)> = previous
                    .processes
                    .keys()
                    .filter(|key| !new_snapshot.processes.contains_key(key))
                    .collect();
                exited.sort_by_key(|(pid, start_time)| (*start_time, *pid));

                created
                    .into_iter()
                    .map(|record| {
                        let path = record
                            .executable_path
                            .as_ref()
                            .map(|p| p.to_string_lossy());
                        ProcessNotification::created(
                            u64::from(record.pid),
                            u64::from(record.parent_pid),
                            path.as_deref(),
                        )
                    })
                    .chain(
                        exited
                            .into_iter()
                            .map(|(pid, _)| ProcessNotification::exited(u64::from(*pid))),
                    )
                    .collect()
            }
        };

        self.current_snapshot = Some(new_snapshot);
        notifications
    }
}

impl Default for SnapshotTracker {
    fn default() -> Self {
        Self::new()
    }
}
