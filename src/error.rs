//! Error taxonomy of a programming run.
use std::{fmt, io};

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Non-success status reported by the transport for an erase, write or read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub i32);

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport operation that produced a [`StatusCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportOp {
    Erase,
    Write,
    Read,
}

impl fmt::Display for TransportOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportOp::Erase => write!(f, "erase"),
            TransportOp::Write => write!(f, "write"),
            TransportOp::Read => write!(f, "read"),
        }
    }
}

/// Rejected command line. Raised before the device is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("no operation selected")]
    NoOperation,
    #[error("conflicting operations, only one of identify/erase/read/write can be selected")]
    Conflict,
    #[error("ignoring ECC errors conflicts with disabling ECC")]
    EccIgnoreWithEccDisabled,
    #[error("ignoring ECC errors is only allowed when reading, not when writing")]
    EccIgnoreWithWrite,
    #[error("EEPROM chips cannot be auto-detected")]
    EepromIdentify,
    #[error("unknown EEPROM chip {0}")]
    UnknownEeprom(String),
    #[error("{0} is only valid for Microwire EEPROM chips")]
    MicrowireOnly(&'static str),
    #[error("address length {0} out of range, at most {max} bits", max = crate::constants::MAX_ADDR_LEN)]
    AddressLength(u32),
    #[error("length {length} exceeds EEPROM {name} size of {size} bytes")]
    EepromLength {
        name: String,
        length: usize,
        size: usize,
    },
}

/// Range that cannot be handed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("length 0x{length:016X} must be a multiple of the block size 0x{block_size:08X}")]
    Misaligned { length: usize, block_size: usize },
    #[error("range addr = 0x{address:016X}, len = 0x{length:016X} exceeds device size 0x{size:016X}")]
    OutOfBounds {
        address: usize,
        length: usize,
        size: usize,
    },
}

/// First position where the read-back data differs from the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    pub offset: usize,
    /// Byte from the source file, `None` at end of file
    pub expected: Option<u8>,
    /// Byte read back from the device
    pub found: u8,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expected {
            Some(expected) => write!(
                f,
                "offset 0x{:08X}: expected 0x{:02X}, read 0x{:02X}",
                self.offset, expected, self.found
            ),
            None => write!(
                f,
                "offset 0x{:08X}: source file ended, read 0x{:02X}",
                self.offset, self.found
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error("programmer not available: {0}")]
    DeviceUnavailable(String),
    #[error("{action}: {source}")]
    Io {
        action: String,
        #[source]
        source: io::Error,
    },
    #[error("{op} failed with status {code}")]
    Transport { op: TransportOp, code: StatusCode },
    #[error("verification failed at {0}")]
    Verification(Mismatch),
}

impl Error {
    pub(crate) fn io(action: impl Into<String>) -> impl FnOnce(io::Error) -> Error {
        let action = action.into();
        move |source| Error::Io { action, source }
    }

    pub(crate) fn transport(op: TransportOp) -> impl FnOnce(StatusCode) -> Error {
        move |code| Error::Transport { op, code }
    }
}
