//! DUCI error status, message types and permission levels.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use bitflags::bitflags;

bitflags! {
    /// DUCI error status register.
    ///
    /// Each flag is one failure kind.  An empty set means success.  The bit
    /// positions are those reported on the wire by the `RE` command, so must
    /// not be reordered.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ErrorStatus: u32 {
        /// First character is not a start character for this parser
        const NEEDS_START = 1 << 0;
        /// Command code not found in the table
        const UNKNOWN_COMMAND = 1 << 1;
        /// Argument count, type or format mismatch
        const INVALID_ARGS = 1 << 2;
        /// Message type is not appropriate for the receiver
        const INVALID_RESPONSE = 1 << 3;
        /// Checksum required but not present
        const MISSING_ARGS = 1 << 4;
        const NUMBER_NOT_IN_SEQUENCE = 1 << 5;
        const WRITE_TO_FLASH = 1 << 6;
        const BUFFER_SIZE = 1 << 7;
        /// Permission check failed
        const INVALID_MODE = 1 << 8;
        const TX_TIMEOUT = 1 << 9;
        const RX_TIMEOUT = 1 << 10;
        const FLASH_CRC_ERROR = 1 << 11;
        const BAD_REPLY = 1 << 12;
        /// Checksum present but mismatched
        const INVALID_CHECKSUM = 1 << 13;
        const HARDWARE_ERROR = 1 << 14;
        const CAL_FAILED = 1 << 15;
        /// Line shorter than [`crate::MESSAGE_MIN_SIZE`]
        const MESSAGE_TOO_SMALL = 1 << 16;
        /// Line longer than [`crate::MESSAGE_MAX_SIZE`]
        const MESSAGE_TOO_BIG = 1 << 17;
        const UNEXPECTED_MESSAGE = 1 << 18;
        /// Matched direction has no callback
        const UNHANDLED_MESSAGE = 1 << 19;
        /// Callback ran but failed
        const COMMAND_FAILED = 1 << 20;
        const BAD_DATA = 1 << 21;
    }
}

impl ErrorStatus {
    /// True if no error flags are set
    pub fn is_ok(&self) -> bool {
        self.is_empty()
    }
}

/// Classification of a line by its start character
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Starts with `*` or `#`, sent by a master
    Command,
    /// Starts with `!`, sent in reply to a command
    Reply,
    /// Any other start character, or nothing parsed yet
    #[default]
    Unexpected,
}

/// Access level (PIN mode) required to run a command.
///
/// A command is only dispatched if its required level is `None`, or equal to
/// the instrument's current level.  Levels are not ordered.
#[repr(u32)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    #[default]
    None = 0x0000,
    Calibration = 0x0001,
    Configuration = 0x0002,
    Factory = 0x0004,
    Engineering = 0x0008,
    Upgrade = 0x0010,
    OptionEnable = 0x0020,
}

impl Permission {
    /// Check whether `current` satisfies this required level
    pub fn permits(self, current: Permission) -> bool {
        self == Permission::None || self == current
    }
}

/// Converts a raw PIN mode value.  Fails with the value itself if it is not
/// exactly one known level.
impl TryFrom<u32> for Permission {
    type Error = u32;

    fn try_from(value: u32) -> core::result::Result<Self, Self::Error> {
        let level = match value {
            0x0000 => Permission::None,
            0x0001 => Permission::Calibration,
            0x0002 => Permission::Configuration,
            0x0004 => Permission::Factory,
            0x0008 => Permission::Engineering,
            0x0010 => Permission::Upgrade,
            0x0020 => Permission::OptionEnable,
            _ => return Err(value),
        };
        Ok(level)
    }
}

/// Supplies the instrument's current access level to the dispatcher.
///
/// Implemented by whatever context type is handed to command callbacks, so
/// the level is explicit state rather than a global.
pub trait AccessControl {
    /// Current access level
    fn access_level(&self) -> Permission;
}
