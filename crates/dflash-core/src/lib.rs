//! dflash-core - Data flash controller driver
//!
//! This crate drives the on-chip data flash of microcontrollers whose flash
//! is sequenced by a Flash Control Unit (FCU/FACI). It is `no_std` and
//! talks to the hardware only through two small traits, so the same code
//! runs against real registers or against an emulator.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`), the RON
//!   family database and `std::error::Error` impls
//! - `alloc` - Enable heap allocation
//!
//! # Example
//!
//! ```ignore
//! use dflash_core::family::FlashFamily;
//! use dflash_core::flash::{DataFlash, FlashConfig};
//!
//! fn store<B: Mmio, D: Delay>(bus: B, delay: D) -> dflash_core::Result<()> {
//!     let mut flash = DataFlash::new(bus, delay, FlashFamily::rx62n(), FlashConfig::new(50_000_000));
//!     flash.start()?;
//!     flash.erase(0)?;
//!     flash.write(0, &[0xDE, 0xAD, 0xBE, 0xEF])?;
//!     let mut buf = [0u8; 4];
//!     flash.read_range(0, &mut buf)?;
//!     Ok(())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod bus;
pub mod error;
pub mod family;
pub mod flash;
pub mod regs;
pub mod timing;

pub use bus::{Delay, Mmio};
pub use error::{Error, Result};
pub use family::{FlashFamily, FlashGeometry};
pub use flash::{DataFlash, FlashConfig, Mode};
