//! Silicon family definitions
//!
//! A [`FlashFamily`] bundles the data flash geometry with the register map,
//! firmware policy and capabilities of one microcontroller family. The
//! driver takes one by value at construction, which replaces per-family
//! conditional compilation.

pub mod builtin;
#[cfg(feature = "std")]
mod database;
mod types;

#[cfg(feature = "std")]
pub use database::{FamilyDatabase, FamilyDbError, Size};
pub use types::{
    family_name, Firmware, FlashFamily, FlashGeometry, PushWidth, UniqueIdLayout, ERASED_BYTE,
    FAMILY_NAME_LEN, MAX_PROGRAM_UNIT, MAX_UNIQUE_IDS,
};
