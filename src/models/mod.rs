//! Data models module
//!
//! Defines the records that cross the producer/consumer boundary:
//! - ProcessNotification: raw input handed over by the OS notification mechanism
//! - ProcessEvent: bounded, owned copy delivered to a waiting consumer
//! - DecisionRecord / Decision: verdict submitted by the decision service
//!
//! Records are copied or moved across the boundary, never shared by reference.

use crate::constants::MAX_IMAGE_PATH_UNITS;
use crate::error::ControlError;
use serde::{Deserialize, Serialize};
use std::fmt;


/// Executable image path bounded to `MAX_IMAGE_PATH_UNITS` UTF-16 code units
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ImagePath(String);

impl ImagePath {
    /// Build a path from text, truncating to the first 260 UTF-16 code units
    pub fn new(path: &str) -> Self {
        let units: Vec<u16> = path.encode_utf16().take(MAX_IMAGE_PATH_UNITS + 1).collect();
        Self::from_utf16_units(&units)
    }

    /// Build a path from raw UTF-16 code units as handed over by the OS.
    ///
    /// Units past the limit are cut off. A high surrogate left dangling by the
    /// cut is dropped too, so the stored text is always well formed. Unpaired
    /// surrogates elsewhere are replaced with U+FFFD.
    pub fn from_utf16_units(units: &[u16]) -> Self {
        let mut end = units.len().min(MAX_IMAGE_PATH_UNITS);
        if end < units.len() && end > 0 && is_high_surrogate(units[end - 1]) {
            end -= 1;
        }
        ImagePath(String::from_utf16_lossy(&units[..end]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in UTF-16 code units
    pub fn utf16_len(&self) -> usize {
        self.0.encode_utf16().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn is_high_surrogate(unit: u16) -> bool {
    (0xD800..=0xDBFF).contains(&unit)
}

impl From<String> for ImagePath {
    fn from(path: String) -> Self {
        ImagePath::new(&path)
    }
}

impl From<ImagePath> for String {
    fn from(path: ImagePath) -> Self {
        path.0
    }
}

impl fmt::Display for ImagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Creation details supplied by the OS; absent on exit notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInfo {
    pub parent_process_id: u64,
    /// The OS may not know the image file name
    pub image_path: Option<String>,
}

/// One callback invocation from the notification mechanism
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessNotification {
    pub process_id: u64,
    /// `Some` for creation, `None` for exit
    pub create_info: Option<CreateInfo>,
}

impl ProcessNotification {
    pub fn created(process_id: u64, parent_process_id: u64, image_path: Option<&str>) -> Self {
        Self {
            process_id,
            create_info: Some(CreateInfo {
                parent_process_id,
                image_path: image_path.map(str::to_string),
            }),
        }
    }

    pub fn exited(process_id: u64) -> Self {
        Self {
            process_id,
            create_info: None,
        }
    }
}

/// Process creation event handed to a waiting consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEvent {
    /// PID of the new process
    pub process_id: u64,
    /// PID of the parent process
    pub parent_process_id: u64,
    /// Full path of the executable, bounded
    pub image_path: ImagePath,
}

impl ProcessEvent {
    pub fn new(process_id: u64, parent_process_id: u64, image_path: Option<&str>) -> Self {
        Self {
            process_id,
            parent_process_id,
            image_path: image_path.map(ImagePath::new).unwrap_or_default(),
        }
    }
}

/// Result handed to a suspended WaitForNextEvent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Event(ProcessEvent),
    Cancelled,
}

/// Verdict of the decision service for a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum Verdict {
    Allow = 0,
    Block = 1,
}

impl TryFrom<u32> for Verdict {
    type Error = ControlError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Verdict::Allow),
            1 => Ok(Verdict::Block),
            other => Err(ControlError::MalformedDecision(format!(
                "unknown verdict value {}",
                other
            ))),
        }
    }
}

impl From<Verdict> for u32 {
    fn from(verdict: Verdict) -> Self {
        verdict as u32
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Allow => f.write_str("allow"),
            Verdict::Block => f.write_str("block"),
        }
    }
}

/// Decision as it travels on the control channel, not yet validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub process_id: u64,
    pub verdict: u32,
}

/// Validated decision for one process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub process_id: u64,
    pub verdict: Verdict,
}

impl Decision {
    pub fn new(process_id: u64, verdict: Verdict) -> Self {
        Self { process_id, verdict }
    }
}

impl TryFrom<DecisionRecord> for Decision {
    type Error = ControlError;

    fn try_from(record: DecisionRecord) -> Result<Self, Self::Error> {
        if record.process_id == 0 {
            return Err(ControlError::MalformedDecision(
                "process id is not set".to_string(),
            ));
        }
        let verdict = Verdict::try_from(record.verdict)?;
        Ok(Decision {
            process_id: record.process_id,
            verdict,
        })
    }
}

impl From<Decision> for DecisionRecord {
    fn from(decision: Decision) -> Self {
        DecisionRecord {
            process_id: decision.process_id,
            verdict: decision.verdict.into(),
        }
    }
}
