//! FCU command sequences
//!
//! Each sequence writes its address registers, issues the opcode and the
//! final confirm command through FCMD, then waits for FRDY. All of them
//! require P/E mode.

use super::{DataFlash, Mode};
use crate::bus::{Delay, Mmio};
use crate::error::Result;
use crate::family::PushWidth;
use crate::regs::{
    CMD_BLANK_CHECK, CMD_BLOCK_ERASE, CMD_CONFIRM, CMD_PROGRAM, FBCCNT_BCDIR_INCREMENT,
    FBCSTAT_BCST,
};
use crate::timing::Operation;

impl<B: Mmio, D: Delay> DataFlash<B, D> {
    /// Program one aligned unit at array offset `offset`
    pub(super) fn program_unit(&mut self, offset: u32, unit: &[u8]) -> Result<()> {
        debug_assert_eq!(self.mode, Mode::ProgramErase);
        debug_assert_eq!(unit.len() as u32, self.family.geometry.program_unit);
        debug_assert_eq!(offset % self.family.geometry.program_unit, 0);

        let regs = self.family.regs;
        log::trace!("Program {:#x}: {:02x?}", offset, unit);

        self.bus.write32(regs.fsaddr, regs.array_base + offset);
        self.bus.write8(regs.fcmd, CMD_PROGRAM);
        self.bus.write8(regs.fcmd, self.family.pushes_per_unit() as u8);

        match self.family.push_width {
            PushWidth::Byte => {
                for (i, &byte) in unit.iter().enumerate() {
                    if i > 0 {
                        self.wait_buffer()?;
                    }
                    self.bus.write8(regs.fcmd, byte);
                }
            }
            PushWidth::HalfWord => {
                for (i, pair) in unit.chunks_exact(2).enumerate() {
                    if i > 0 {
                        self.wait_buffer()?;
                    }
                    self.bus
                        .write16(regs.fcmd, u16::from_le_bytes([pair[0], pair[1]]));
                }
            }
        }

        self.bus.write8(regs.fcmd, CMD_CONFIRM);
        let status = self.wait_ready(Operation::Program)?;
        self.check_status(Operation::Program, status)
    }

    /// Erase `block`
    pub(super) fn erase_block(&mut self, block: u32) -> Result<()> {
        debug_assert_eq!(self.mode, Mode::ProgramErase);

        let regs = self.family.regs;
        let start = self.family.geometry.block_address(block);
        log::debug!("Erase block {} at {:#x}", block, start);

        self.bus.write32(regs.fsaddr, regs.array_base + start);
        self.bus.write8(regs.fcmd, CMD_BLOCK_ERASE);
        self.bus.write8(regs.fcmd, CMD_CONFIRM);

        let status = self.wait_ready(Operation::Erase)?;
        self.check_status(Operation::Erase, status)
    }

    /// Blank-check `block`, true if it is fully erased
    pub(super) fn blank_check_block(&mut self, block: u32) -> Result<bool> {
        debug_assert_eq!(self.mode, Mode::ProgramErase);

        let regs = self.family.regs;
        let start = self.family.geometry.block_address(block);
        let end = start + self.family.geometry.block_size - 1;

        self.bus.write8(regs.fbccnt, FBCCNT_BCDIR_INCREMENT);
        self.bus.write32(regs.fsaddr, regs.array_base + start);
        self.bus.write32(regs.feaddr, regs.array_base + end);
        self.bus.write8(regs.fcmd, CMD_BLANK_CHECK);
        self.bus.write8(regs.fcmd, CMD_CONFIRM);

        let status = self.wait_ready(Operation::BlankCheck)?;
        self.check_status(Operation::BlankCheck, status)?;

        let blank = self.bus.read8(regs.fbcstat) & FBCSTAT_BCST == 0;
        log::debug!("Block {} is {}", block, if blank { "blank" } else { "programmed" });
        Ok(blank)
    }
}

#[cfg(test)]
mod tests {
    use super::super::mock::{flash, MockBus, MockDelay};
    use super::*;
    use crate::error::Error;
    use crate::family::FlashFamily;
    use std::vec::Vec;

    fn pe_flash(family: FlashFamily) -> DataFlash<MockBus, MockDelay> {
        let mut flash = flash(MockBus::new(), MockDelay::default());
        flash.bus.regs_map = family.regs;
        flash.family = family;
        flash.enter_program_erase().unwrap();
        flash.bus.writes.clear();
        flash
    }

    #[test]
    fn test_program_halfword_sequence() {
        let mut flash = pe_flash(FlashFamily::rx62n());
        let regs = flash.family.regs;
        flash.program_unit(2, &[0xBE, 0xEF]).unwrap();

        assert_eq!(
            flash.bus.writes,
            [
                (regs.fsaddr, regs.array_base + 2),
                (regs.fcmd, CMD_PROGRAM as u32),
                (regs.fcmd, 1),
                (regs.fcmd, 0xEFBE),
                (regs.fcmd, CMD_CONFIRM as u32),
            ]
        );
    }

    #[test]
    fn test_program_byte_sequence() {
        let mut flash = pe_flash(FlashFamily::rx24t());
        let regs = flash.family.regs;
        flash.program_unit(7, &[0x42]).unwrap();

        let cmds: Vec<u32> = flash
            .bus
            .writes
            .iter()
            .filter(|(a, _)| *a == regs.fcmd)
            .map(|&(_, v)| v)
            .collect();
        assert_eq!(cmds, [CMD_PROGRAM as u32, 1, 0x42, CMD_CONFIRM as u32]);
    }

    #[test]
    fn test_program_double_buffered() {
        let mut flash = pe_flash(FlashFamily::rx64m());
        flash.bus.dbfull_reads = 2;
        flash.program_unit(4, &[1, 2, 3, 4]).unwrap();

        let regs = flash.family.regs;
        assert!(flash.bus.writes.contains(&(regs.fcmd, 2)));
        assert!(flash.bus.writes.contains(&(regs.fcmd, 0x0201)));
        assert!(flash.bus.writes.contains(&(regs.fcmd, 0x0403)));
    }

    #[test]
    fn test_erase_sequence() {
        let mut flash = pe_flash(FlashFamily::rx62n());
        let regs = flash.family.regs;
        flash.erase_block(3).unwrap();

        assert_eq!(
            flash.bus.writes,
            [
                (regs.fsaddr, regs.array_base + 3 * 2048),
                (regs.fcmd, CMD_BLOCK_ERASE as u32),
                (regs.fcmd, CMD_CONFIRM as u32),
            ]
        );
    }

    #[test]
    fn test_blank_check() {
        let mut flash = pe_flash(FlashFamily::rx62n());
        let regs = flash.family.regs;
        assert_eq!(flash.blank_check_block(1), Ok(true));
        assert!(flash
            .bus
            .writes
            .contains(&(regs.feaddr, regs.array_base + 4095)));

        flash.bus.poke8(regs.fbcstat, FBCSTAT_BCST);
        assert_eq!(flash.blank_check_block(1), Ok(false));
    }

    #[test]
    fn test_erase_error_flag() {
        let mut flash = pe_flash(FlashFamily::rx62n());
        flash.bus.error_on_confirm = crate::regs::FlashStatus::ERSERR.bits();
        assert_eq!(flash.erase_block(0), Err(Error::EraseFailed));
    }
}
