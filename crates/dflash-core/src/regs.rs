//! FCU/FACI register definitions
//!
//! Key values, command opcodes and status bits shared by every supported
//! family. Register *addresses* differ between families and live in
//! [`RegisterMap`].
//!
//! # Register overview
//!
//! - FENTRYR: P/E mode entry (keyed, 16 bits)
//! - FSADDR/FEADDR: command start/end address (32 bits)
//! - FCMD: command issue area, opcodes and payload are written here
//! - FSTATR: ready flag and per-class error flags (32 bits)
//! - FASTAT: access status, holds the command-lock flag (8 bits)
//! - FBCCNT/FBCSTAT: blank-check direction and result (8 bits)
//! - FCURAME: FCU RAM enable (keyed, 16 bits)
//! - FPCKAR: peripheral clock notification (keyed, 16 bits)

use bitflags::bitflags;

// ============================================================================
// FENTRYR
// ============================================================================

/// Key that must accompany every FENTRYR write
pub const FENTRYR_KEY: u16 = 0xAA00;
/// Data flash P/E mode entry bit
pub const FENTRYR_FENTRYD: u16 = 0x0080;
/// Mask of the readable mode bits
pub const FENTRYR_MODE_MASK: u16 = 0x00FF;

// ============================================================================
// FCURAME
// ============================================================================

/// Key that must accompany every FCURAME write
pub const FCURAME_KEY: u16 = 0xC400;
/// FCU RAM enable
pub const FCURAME_FCRME: u16 = 0x0001;

// ============================================================================
// FPCKAR
// ============================================================================

/// Key that must accompany every FPCKAR write
pub const FPCKAR_KEY: u16 = 0x1E00;

// ============================================================================
// FBCCNT / FBCSTAT
// ============================================================================

/// Blank check in increasing address order
pub const FBCCNT_BCDIR_INCREMENT: u8 = 0x00;
/// Blank check result: set when a programmed byte was found
pub const FBCSTAT_BCST: u8 = 0x01;

// ============================================================================
// Command opcodes (written to FCMD)
// ============================================================================

/// Program command
pub const CMD_PROGRAM: u8 = 0xE8;
/// Block erase command
pub const CMD_BLOCK_ERASE: u8 = 0x20;
/// Blank check command
pub const CMD_BLANK_CHECK: u8 = 0x71;
/// Final (confirm) command for program, erase and blank check
pub const CMD_CONFIRM: u8 = 0xD0;
/// Forced stop, aborts the running command and releases the lock
pub const CMD_FORCED_STOP: u8 = 0xB3;
/// Clears error flags and the command-lock
pub const CMD_STATUS_CLEAR: u8 = 0x50;

bitflags! {
    /// FSTATR: Flash status register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FlashStatus: u32 {
        /// Double buffer full, next payload push must wait
        const DBFULL  = 1 << 10;
        /// Program error
        const PRGERR  = 1 << 12;
        /// Erase error
        const ERSERR  = 1 << 13;
        /// Illegal command or address
        const ILGLERR = 1 << 14;
        /// Flash ready
        const FRDY    = 1 << 15;

        /// All error flags
        const ERRORS = Self::PRGERR.bits() | Self::ERSERR.bits() | Self::ILGLERR.bits();
    }
}

bitflags! {
    /// FASTAT: Flash access status register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessStatus: u8 {
        /// Data flash access violation
        const DFAE  = 1 << 3;
        /// Command-lock: the sequencer refuses new commands
        const CMDLK = 1 << 4;
    }
}

/// Register addresses of one flash controller instance
///
/// Every address is absolute. Families differ only in where their registers
/// sit, so one sequencer serves all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct RegisterMap {
    /// Read window of the data flash array (offset 0 of the array)
    pub array_base: u32,
    /// FENTRYR (16 bits)
    pub fentryr: u32,
    /// FSADDR (32 bits)
    pub fsaddr: u32,
    /// FEADDR (32 bits)
    pub feaddr: u32,
    /// FSTATR (32 bits)
    pub fstatr: u32,
    /// FASTAT (8 bits)
    pub fastat: u32,
    /// FBCCNT (8 bits)
    pub fbccnt: u32,
    /// FBCSTAT (8 bits)
    pub fbcstat: u32,
    /// Command issue area
    pub fcmd: u32,
    /// FCURAME (16 bits), only on families with FCU firmware
    #[cfg_attr(feature = "std", serde(default))]
    pub fcurame: Option<u32>,
    /// FPCKAR (16 bits), only on families that need the clock notified
    #[cfg_attr(feature = "std", serde(default))]
    pub fpckar: Option<u32>,
}

/// Build a FENTRYR write value
#[inline]
pub const fn fentryr_value(program_erase: bool) -> u16 {
    if program_erase {
        FENTRYR_KEY | FENTRYR_FENTRYD
    } else {
        FENTRYR_KEY
    }
}

/// Build a FPCKAR write value for the given FCLK in MHz
#[inline]
pub const fn fpckar_value(fclk_mhz: u8) -> u16 {
    FPCKAR_KEY | fclk_mhz as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_values() {
        assert_eq!(fentryr_value(true), 0xAA80);
        assert_eq!(fentryr_value(false), 0xAA00);
        assert_eq!(fpckar_value(50), 0x1E32);
    }

    #[test]
    fn test_error_mask() {
        let status = FlashStatus::FRDY | FlashStatus::PRGERR;
        assert!(status.intersects(FlashStatus::ERRORS));
        assert!(!FlashStatus::FRDY.intersects(FlashStatus::ERRORS));
    }
}
