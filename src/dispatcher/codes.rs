//! Control codes for the two operations of the control channel
//!
//! Laid out like device I/O control codes:
//! device type (bits 16-31), required access (14-15), function (2-13), transfer method (0-1).

use crate::constants::CONTROL_DEVICE_TYPE;

pub const METHOD_BUFFERED: u32 = 0;
pub const FILE_READ_DATA: u32 = 0x0001;
pub const FILE_WRITE_DATA: u32 = 0x0002;

pub const fn ctl_code(device_type: u32, function: u32, method: u32, access: u32) -> u32 {
    (device_type << 16) | (access << 14) | (function << 2) | method
}

/// Block until the next process creation event
pub const WAIT_FOR_NEXT_EVENT: u32 =
    ctl_code(CONTROL_DEVICE_TYPE, 0x801, METHOD_BUFFERED, FILE_READ_DATA);

/// Submit a verdict for a process
pub const SUBMIT_DECISION: u32 =
    ctl_code(CONTROL_DEVICE_TYPE, 0x802, METHOD_BUFFERED, FILE_WRITE_DATA);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_code_values() {
        assert_eq!(WAIT_FOR_NEXT_EVENT, 0x0022_6004);
        assert_eq!(SUBMIT_DECISION, 0x0022_A008);
        assert_ne!(WAIT_FOR_NEXT_EVENT, SUBMIT_DECISION);
    }
}
