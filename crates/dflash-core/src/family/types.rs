//! Flash family type definitions

use heapless::String;

use crate::regs::RegisterMap;
use crate::timing::Timing;

/// Maximum length of a family name
pub const FAMILY_NAME_LEN: usize = 16;
/// Maximum number of unique-ID words any family exposes
pub const MAX_UNIQUE_IDS: usize = 4;
/// Largest supported program unit in bytes
pub const MAX_PROGRAM_UNIT: usize = 4;
/// Value of an erased byte
pub const ERASED_BYTE: u8 = 0xFF;

/// Data flash geometry, fixed per family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct FlashGeometry {
    /// Total data flash size in bytes
    pub size: u32,
    /// Erase block size in bytes
    pub block_size: u32,
    /// Minimum program unit in bytes (1, 2 or 4)
    pub program_unit: u32,
    /// Worst-case operation times
    pub timing: Timing,
}

impl FlashGeometry {
    /// Number of erase blocks
    pub const fn block_count(&self) -> u32 {
        self.size / self.block_size
    }

    /// Check if `addr` is inside the array
    pub const fn contains(&self, addr: u32) -> bool {
        addr < self.size
    }

    /// Check if `[addr, addr + len)` is inside the array
    pub fn is_valid_range(&self, addr: u32, len: usize) -> bool {
        // u64 so that len > u32::MAX cannot wrap
        addr < self.size && addr as u64 + len as u64 <= self.size as u64
    }

    /// Block index containing `addr`
    pub const fn block_of(&self, addr: u32) -> u32 {
        addr / self.block_size
    }

    /// First byte offset of `block`
    pub const fn block_address(&self, block: u32) -> u32 {
        block * self.block_size
    }

    /// Check that the geometry is self-consistent
    pub fn validate(&self) -> Result<(), &'static str> {
        if !matches!(self.program_unit, 1 | 2 | 4) {
            return Err("program unit must be 1, 2 or 4 bytes");
        }
        if self.size == 0 || self.block_size == 0 {
            return Err("size and block size must be non-zero");
        }
        if !self.size.is_multiple_of(self.block_size) {
            return Err("size must be a multiple of the block size");
        }
        if !self.block_size.is_multiple_of(self.program_unit) {
            return Err("block size must be a multiple of the program unit");
        }
        Ok(())
    }
}

/// Width of a single payload push into the command area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum PushWidth {
    /// 8-bit pushes
    Byte,
    /// 16-bit pushes (little-endian byte pairs)
    HalfWord,
}

impl PushWidth {
    /// Bytes per push
    pub const fn bytes(self) -> u32 {
        match self {
            PushWidth::Byte => 1,
            PushWidth::HalfWord => 2,
        }
    }
}

/// Whether the FCU runs firmware that has to be copied into its RAM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum Firmware {
    /// The FCU needs no firmware transfer
    NotRequired,
    /// Copy `len` bytes from `rom` to `ram` before the first P/E entry
    Required {
        /// Source address of the firmware image
        rom: u32,
        /// FCU RAM window
        ram: u32,
        /// Image length in bytes (multiple of 4)
        len: u32,
        /// Whether a second `start()` may run again after success
        allow_retransfer: bool,
    },
}

impl Firmware {
    /// Returns true if a transfer is needed
    pub const fn is_required(&self) -> bool {
        matches!(self, Firmware::Required { .. })
    }
}

/// Location of the factory unique-ID words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct UniqueIdLayout {
    /// Address of word 0
    pub base: u32,
    /// Number of 32-bit words
    pub count: u32,
}

/// A silicon family: geometry plus everything the driver needs to
/// sequence its flash controller
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct FlashFamily {
    /// Family name
    pub name: String<FAMILY_NAME_LEN>,
    /// Data flash geometry
    pub geometry: FlashGeometry,
    /// Register addresses
    pub regs: RegisterMap,
    /// FCU firmware requirement
    pub firmware: Firmware,
    /// Payload push width
    pub push_width: PushWidth,
    /// Whether the command area is double buffered (DBFULL polling)
    pub double_buffered: bool,
    /// Unique-ID words, if the family has them
    pub unique_id: Option<UniqueIdLayout>,
    /// Lowest FCLK at which P/E operations are allowed
    pub fclk_min_hz: u32,
    /// Highest FCLK at which P/E operations are allowed
    pub fclk_max_hz: u32,
}

impl FlashFamily {
    /// Number of payload pushes per program unit
    pub const fn pushes_per_unit(&self) -> u32 {
        self.geometry.program_unit / self.push_width.bytes()
    }

    /// Number of unique-ID words
    pub fn unique_id_count(&self) -> u32 {
        self.unique_id.map_or(0, |uid| uid.count)
    }

    /// Check that the family description is self-consistent
    pub fn validate(&self) -> Result<(), &'static str> {
        self.geometry.validate()?;
        if self.regs.array_base.checked_add(self.geometry.size).is_none() {
            return Err("data flash array runs past the end of the address space");
        }
        if self.geometry.program_unit < self.push_width.bytes() {
            return Err("program unit is smaller than one payload push");
        }
        if let Firmware::Required { rom, ram, len, .. } = self.firmware {
            if len == 0 || !len.is_multiple_of(4) {
                return Err("firmware length must be a non-zero multiple of 4");
            }
            if rom.checked_add(len).is_none() || ram.checked_add(len).is_none() {
                return Err("firmware window runs past the end of the address space");
            }
            if self.regs.fcurame.is_none() {
                return Err("firmware transfer needs an FCURAME register");
            }
        }
        if let Some(uid) = self.unique_id {
            if uid.count as usize > MAX_UNIQUE_IDS {
                return Err("too many unique-ID words");
            }
        }
        if self.fclk_min_hz == 0 || self.fclk_min_hz > self.fclk_max_hz {
            return Err("invalid FCLK range");
        }
        Ok(())
    }
}

/// Build a family name, truncating anything past [`FAMILY_NAME_LEN`]
pub fn family_name(name: &str) -> String<FAMILY_NAME_LEN> {
    let mut s = String::new();
    for c in name.chars() {
        if s.push(c).is_err() {
            break;
        }
    }
    s
}
