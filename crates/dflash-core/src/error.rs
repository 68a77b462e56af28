//! Error types for dflash-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
///
/// `InitFailed` and `CommandLocked` mean the driver has to be started
/// again (or the chip reset). `Timeout` and `InvalidAddress` can be retried
/// once the cause is corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Mode entry, clock setup or firmware bootstrap could not be established
    InitFailed,
    /// Address or block outside the flash geometry (or rejected by the FCU)
    InvalidAddress,
    /// A bounded hardware wait expired
    Timeout,
    /// The FCU command-lock is stuck, even after a forced stop
    CommandLocked,
    /// The FCU reported a program error
    ProgramFailed,
    /// The FCU reported an erase error
    EraseFailed,
}

impl Error {
    /// Returns true if the driver must be restarted before further use
    pub fn requires_restart(&self) -> bool {
        matches!(self, Self::InitFailed | Self::CommandLocked)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitFailed => write!(f, "flash initialization failed"),
            Self::InvalidAddress => write!(f, "address out of bounds"),
            Self::Timeout => write!(f, "flash operation timed out"),
            Self::CommandLocked => write!(f, "flash command sequencer is locked"),
            Self::ProgramFailed => write!(f, "program operation failed"),
            Self::EraseFailed => write!(f, "erase operation failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
