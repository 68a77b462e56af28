//! Family database for runtime loading and lookup
//!
//! This module provides the `FamilyDatabase` type for loading family
//! definitions from RON files at runtime, on top of the built-in catalogue.

use alloc::{string::String, vec::Vec};
use std::fs;
use std::io;
use std::path::Path;

use super::builtin;
use super::types::{family_name, Firmware, FlashFamily, FlashGeometry, PushWidth, UniqueIdLayout};
use super::FAMILY_NAME_LEN;
use crate::regs::RegisterMap;
use crate::timing::Timing;

/// Error type for family database operations
#[derive(Debug, thiserror::Error)]
pub enum FamilyDbError {
    /// I/O error reading files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// RON parsing error
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// Validation error
    #[error("Validation error in family '{family}': {message}")]
    Validation {
        /// Family the error was found in
        family: String,
        /// What is wrong with it
        message: &'static str,
    },
}

// ============================================================================
// RON deserialization types (intermediate format)
// ============================================================================

/// Size specification with human-readable units (for RON parsing)
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub enum Size {
    /// Size in bytes
    B(u32),
    /// Size in kibibytes (1024 bytes)
    KiB(u32),
}

impl Size {
    /// Convert to bytes, `None` if the result does not fit in 32 bits
    pub fn to_bytes(self) -> Option<u32> {
        match self {
            Size::B(n) => Some(n),
            Size::KiB(n) => n.checked_mul(1024),
        }
    }
}

/// Firmware requirement in RON format
#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
enum FirmwareDef {
    #[default]
    NotRequired,
    Required {
        rom: u32,
        ram: u32,
        len: Size,
        #[serde(default = "default_allow_retransfer")]
        allow_retransfer: bool,
    },
}

fn default_allow_retransfer() -> bool {
    true
}

impl FirmwareDef {
    fn to_firmware(self) -> Option<Firmware> {
        Some(match self {
            FirmwareDef::NotRequired => Firmware::NotRequired,
            FirmwareDef::Required {
                rom,
                ram,
                len,
                allow_retransfer,
            } => Firmware::Required {
                rom,
                ram,
                len: len.to_bytes()?,
                allow_retransfer,
            },
        })
    }
}

/// FCLK limits in RON format
#[derive(Debug, Clone, Copy, serde::Deserialize)]
struct FclkDef {
    min: u32,
    max: u32,
}

/// Single family definition in RON format
#[derive(Debug, Clone, serde::Deserialize)]
struct FamilyDef {
    name: String,
    size: Size,
    block_size: Size,
    program_unit: u32,
    push_width: PushWidth,
    #[serde(default)]
    double_buffered: bool,
    timing: Timing,
    regs: RegisterMap,
    #[serde(default)]
    firmware: FirmwareDef,
    #[serde(default)]
    unique_id: Option<UniqueIdLayout>,
    fclk: FclkDef,
}

/// Top-level RON file: a list of families
#[derive(Debug, Clone, serde::Deserialize)]
struct FamilyFileDef {
    families: Vec<FamilyDef>,
}

impl FamilyDef {
    fn into_family(self) -> Result<FlashFamily, FamilyDbError> {
        if self.name.is_empty() || self.name.len() > FAMILY_NAME_LEN {
            return Err(FamilyDbError::Validation {
                family: self.name,
                message: "name must be 1 to 16 characters",
            });
        }

        let (Some(size), Some(block_size), Some(firmware)) = (
            self.size.to_bytes(),
            self.block_size.to_bytes(),
            self.firmware.to_firmware(),
        ) else {
            return Err(FamilyDbError::Validation {
                family: self.name,
                message: "size does not fit in 32 bits",
            });
        };

        let family = FlashFamily {
            name: family_name(&self.name),
            geometry: FlashGeometry {
                size,
                block_size,
                program_unit: self.program_unit,
                timing: self.timing,
            },
            regs: self.regs,
            firmware,
            push_width: self.push_width,
            double_buffered: self.double_buffered,
            unique_id: self.unique_id,
            fclk_min_hz: self.fclk.min,
            fclk_max_hz: self.fclk.max,
        };

        family
            .validate()
            .map_err(|message| FamilyDbError::Validation {
                family: self.name,
                message,
            })?;

        Ok(family)
    }
}

// ============================================================================
// Family database
// ============================================================================

/// Runtime family database
///
/// Holds the families the tool can drive. Later definitions with the same
/// name replace earlier ones, so a RON file can override a built-in entry.
#[derive(Debug, Clone, Default)]
pub struct FamilyDatabase {
    families: Vec<FlashFamily>,
}

impl FamilyDatabase {
    /// Create an empty family database
    pub fn new() -> Self {
        Self {
            families: Vec::new(),
        }
    }

    /// Create a database holding the built-in families
    pub fn with_builtins() -> Self {
        let mut db = Self::new();
        for family in builtin::all() {
            db.insert(family);
        }
        db
    }

    /// Add or replace a family
    pub fn insert(&mut self, family: FlashFamily) {
        match self
            .families
            .iter_mut()
            .find(|f| f.name.as_str().eq_ignore_ascii_case(&family.name))
        {
            Some(existing) => {
                log::debug!("Overriding family {}", family.name);
                *existing = family;
            }
            None => self.families.push(family),
        }
    }

    /// Load family definitions from a single RON file
    pub fn load_file(&mut self, path: &Path) -> Result<usize, FamilyDbError> {
        let content = fs::read_to_string(path)?;
        self.load_ron(&content)
    }

    /// Load family definitions from a RON string
    pub fn load_ron(&mut self, content: &str) -> Result<usize, FamilyDbError> {
        let file_def: FamilyFileDef = ron::from_str(content)?;
        let count = file_def.families.len();

        for def in file_def.families {
            let family = def.into_family()?;
            self.insert(family);
        }

        Ok(count)
    }

    /// Load all RON files from a directory
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, FamilyDbError> {
        let mut total = 0;

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "ron") {
                total += self.load_file(&path)?;
            }
        }

        Ok(total)
    }

    /// Get all families in the database
    pub fn families(&self) -> &[FlashFamily] {
        &self.families
    }

    /// Get the number of families in the database
    pub fn len(&self) -> usize {
        self.families.len()
    }

    /// Check if the database is empty
    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Find a family by name (case-insensitive exact match)
    pub fn find(&self, name: &str) -> Option<&FlashFamily> {
        self.families
            .iter()
            .find(|f| f.name.as_str().eq_ignore_ascii_case(name))
    }

    /// Iterate over all families
    pub fn iter(&self) -> impl Iterator<Item = &FlashFamily> {
        self.families.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RX63N_RON: &str = r#"
    (
        families: [
            (
                name: "RX63N",
                size: KiB(32),
                block_size: KiB(2),
                program_unit: 2,
                push_width: HalfWord,
                timing: (
                    write_unit_cycles: 100000,
                    erase_block_cycles: 12500000,
                    blank_check_cycles: 35000,
                ),
                regs: (
                    array_base: 0x00100000,
                    fentryr: 0x007FC484,
                    fsaddr: 0x007FC430,
                    feaddr: 0x007FC434,
                    fstatr: 0x007FC480,
                    fastat: 0x007FC410,
                    fbccnt: 0x007FC4D0,
                    fbcstat: 0x007FC4D4,
                    fcmd: 0x007E0000,
                    fcurame: Some(0x007FC454),
                ),
                firmware: Required(rom: 0xFEFFE000, ram: 0x007F8000, len: KiB(8)),
                fclk: (min: 8000000, max: 50000000),
            ),
        ],
    )
    "#;

    #[test]
    fn test_load_ron() {
        let mut db = FamilyDatabase::new();
        let count = db.load_ron(RX63N_RON).unwrap();

        assert_eq!(count, 1);
        assert_eq!(db.len(), 1);

        let family = db.find("rx63n").unwrap();
        assert_eq!(family.geometry.size, 32 * 1024);
        assert_eq!(family.geometry.block_count(), 16);
        assert_eq!(family.regs.fpckar, None);
        assert!(matches!(
            family.firmware,
            Firmware::Required {
                len: 8192,
                allow_retransfer: true,
                ..
            }
        ));
        assert_eq!(family.unique_id_count(), 0);
    }

    #[test]
    fn test_builtins_and_override() {
        let mut db = FamilyDatabase::with_builtins();
        assert_eq!(db.len(), 3);

        let mut custom = FlashFamily::rx24t();
        custom.fclk_max_hz = 40_000_000;
        db.insert(custom);

        assert_eq!(db.len(), 3);
        assert_eq!(db.find("RX24T").unwrap().fclk_max_hz, 40_000_000);
    }

    #[test]
    fn test_validation_error() {
        let broken = RX63N_RON.replace("program_unit: 2", "program_unit: 3");
        let mut db = FamilyDatabase::new();
        let err = db.load_ron(&broken).unwrap_err();
        assert!(matches!(err, FamilyDbError::Validation { .. }));
        assert!(db.is_empty());
    }

    #[test]
    fn test_size_conversion() {
        assert_eq!(Size::B(64).to_bytes(), Some(64));
        assert_eq!(Size::KiB(2).to_bytes(), Some(2048));
        assert_eq!(Size::KiB(4 * 1024 * 1024).to_bytes(), None);
    }

    #[test]
    fn test_oversized_family_rejected() {
        let huge = RX63N_RON.replace("size: KiB(32)", "size: KiB(4194305)");
        let mut db = FamilyDatabase::new();
        let err = db.load_ron(&huge).unwrap_err();
        assert!(matches!(
            err,
            FamilyDbError::Validation {
                message: "size does not fit in 32 bits",
                ..
            }
        ));

        let huge_fw = RX63N_RON.replace("len: KiB(8)", "len: KiB(4194305)");
        assert!(matches!(
            db.load_ron(&huge_fw),
            Err(FamilyDbError::Validation { .. })
        ));
        assert!(db.is_empty());
    }
}
