//! FCU firmware transfer
//!
//! Some families run firmware on the FCU that has to be copied from ROM into
//! FCU RAM before the first P/E command. The copy is done in Read mode with
//! FCU RAM access enabled through FCURAME, and verified word by word.

use super::{DataFlash, Mode};
use crate::bus::{Delay, Mmio};
use crate::error::{Error, Result};
use crate::family::Firmware;
use crate::regs::{FCURAME_FCRME, FCURAME_KEY};

impl<B: Mmio, D: Delay> DataFlash<B, D> {
    /// Copy the FCU firmware, once
    pub(super) fn transfer_firmware(&mut self) -> Result<()> {
        let Firmware::Required { rom, ram, len, .. } = self.family.firmware else {
            return Ok(());
        };
        if self.firmware_transferred {
            log::debug!("FCU firmware already transferred");
            return Ok(());
        }
        if self.mode != Mode::Read {
            return Err(Error::InitFailed);
        }
        let Some(fcurame) = self.family.regs.fcurame else {
            log::error!("{} has no FCURAME register", self.family.name);
            return Err(Error::InitFailed);
        };

        self.bus.write16(fcurame, FCURAME_KEY | FCURAME_FCRME);
        if self.bus.read16(fcurame) & FCURAME_FCRME == 0 {
            log::error!("FCU RAM access could not be enabled");
            self.bus.write16(fcurame, FCURAME_KEY);
            return Err(Error::InitFailed);
        }

        for offset in (0..len).step_by(4) {
            let word = self.bus.read32(rom + offset);
            self.bus.write32(ram + offset, word);
        }

        let mut mismatch = None;
        for offset in (0..len).step_by(4) {
            if self.bus.read32(ram + offset) != self.bus.read32(rom + offset) {
                mismatch = Some(offset);
                break;
            }
        }

        self.bus.write16(fcurame, FCURAME_KEY);

        if let Some(offset) = mismatch {
            log::error!("FCU RAM verify failed at offset {:#x}", offset);
            return Err(Error::InitFailed);
        }

        self.firmware_transferred = true;
        log::info!(
            "Transferred {} bytes of FCU firmware from {:#010x} to {:#010x}",
            len,
            rom,
            ram
        );
        Ok(())
    }
}
