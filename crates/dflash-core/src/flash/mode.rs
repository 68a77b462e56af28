//! Read / Program-Erase mode transitions
//!
//! The array cannot be read while the FCU is in P/E mode, and P/E commands
//! are refused in Read mode. Transitions are lazy: an operation switches
//! mode only when it needs the other one.

use super::{DataFlash, Mode};
use crate::bus::{Delay, Mmio};
use crate::error::{Error, Result};
use crate::regs::{fentryr_value, FENTRYR_FENTRYD, FENTRYR_MODE_MASK};
use crate::timing::{MODE_CHANGE_DELAY_US, MODE_EXIT_TIMEOUT_US, POLL_STEP_US};

impl<B: Mmio, D: Delay> DataFlash<B, D> {
    /// Switch to Read mode
    ///
    /// If FENTRYR does not disarm in time the running command is aborted and
    /// the exit is retried once.
    pub(super) fn enter_read(&mut self) -> Result<()> {
        if self.mode == Mode::Read {
            return Ok(());
        }

        if self.exit_program_erase() {
            return Ok(());
        }

        log::warn!("FENTRYR still armed after {} us", MODE_EXIT_TIMEOUT_US);
        self.forced_stop()?;
        if self.exit_program_erase() {
            return Ok(());
        }

        log::error!("Could not leave P/E mode");
        Err(Error::Timeout)
    }

    /// Write the exit key and wait for the mode bits to clear
    fn exit_program_erase(&mut self) -> bool {
        let fentryr = self.family.regs.fentryr;
        self.bus.write16(fentryr, fentryr_value(false));

        let mut remaining = MODE_EXIT_TIMEOUT_US;
        loop {
            if self.bus.read16(fentryr) & FENTRYR_MODE_MASK == 0 {
                log::debug!("Entered read mode");
                self.mode = Mode::Read;
                return true;
            }
            if remaining == 0 {
                return false;
            }
            self.delay.delay_us(POLL_STEP_US);
            remaining = remaining.saturating_sub(POLL_STEP_US);
        }
    }

    /// Switch to Program/Erase mode
    ///
    /// Families with FCU firmware refuse this until the firmware is in
    /// FCU RAM.
    pub(super) fn enter_program_erase(&mut self) -> Result<()> {
        if self.mode == Mode::ProgramErase {
            return Ok(());
        }
        if self.family.firmware.is_required() && !self.firmware_transferred {
            log::error!("P/E mode needs the FCU firmware, call start() first");
            return Err(Error::InitFailed);
        }

        let fentryr = self.family.regs.fentryr;
        self.bus.write16(fentryr, fentryr_value(true));
        self.delay.delay_us(MODE_CHANGE_DELAY_US);

        let value = self.bus.read16(fentryr);
        if value & FENTRYR_FENTRYD == 0 {
            log::error!("FENTRYR reads {:#06x} after P/E entry", value);
            return Err(Error::InitFailed);
        }

        log::debug!("Entered P/E mode");
        self.mode = Mode::ProgramErase;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::mock::{flash, MockBus, MockDelay};
    use super::*;
    use crate::regs::CMD_FORCED_STOP;

    #[test]
    fn test_round_trip() {
        let mut flash = flash(MockBus::new(), MockDelay::default());

        flash.enter_program_erase().unwrap();
        assert_eq!(flash.mode, Mode::ProgramErase);
        assert_eq!(flash.bus.fentryr(), FENTRYR_FENTRYD);

        flash.enter_read().unwrap();
        assert_eq!(flash.mode, Mode::Read);
        assert_eq!(flash.bus.fentryr(), 0);
    }

    #[test]
    fn test_noop_in_same_mode() {
        let mut flash = flash(MockBus::new(), MockDelay::default());
        flash.enter_read().unwrap();
        assert!(flash.bus.writes.is_empty());

        flash.enter_program_erase().unwrap();
        let writes = flash.bus.writes.len();
        flash.enter_program_erase().unwrap();
        assert_eq!(flash.bus.writes.len(), writes);
    }

    #[test]
    fn test_program_erase_needs_firmware() {
        let mut flash = flash(MockBus::new(), MockDelay::default());
        flash.firmware_transferred = false;
        assert_eq!(flash.enter_program_erase(), Err(Error::InitFailed));
        assert!(flash.bus.writes.is_empty());
        assert_eq!(flash.mode, Mode::Read);
    }

    #[test]
    fn test_program_erase_entry_rejected() {
        let mut bus = MockBus::new();
        bus.fentryr_ignores_entry = true;
        let mut flash = flash(bus, MockDelay::default());
        assert_eq!(flash.enter_program_erase(), Err(Error::InitFailed));
        assert_eq!(flash.mode, Mode::Read);
    }

    #[test]
    fn test_read_exit_retry_after_forced_stop() {
        let mut flash = flash(MockBus::new(), MockDelay::default());
        flash.enter_program_erase().unwrap();
        flash.bus.fentryr_ignores_first_exit = true;

        assert_eq!(flash.enter_read(), Ok(()));
        assert_eq!(flash.mode, Mode::Read);
        assert_eq!(flash.bus.fentryr(), 0);
        assert_eq!(flash.bus.commands(), [CMD_FORCED_STOP]);

        let fentryr = flash.bus.regs_map.fentryr;
        let exit_key = fentryr_value(false) as u32;
        let exits = flash
            .bus
            .writes
            .iter()
            .filter(|&&(a, v)| a == fentryr && v == exit_key)
            .count();
        assert_eq!(exits, 2);
    }

    #[test]
    fn test_read_exit_stuck() {
        let mut flash = flash(MockBus::new(), MockDelay::default());
        flash.enter_program_erase().unwrap();
        flash.bus.fentryr_ignores_exit = true;

        assert_eq!(flash.enter_read(), Err(Error::Timeout));
        assert_eq!(flash.mode, Mode::ProgramErase);
        assert!(flash.bus.commands().contains(&CMD_FORCED_STOP));
        // Two exit windows plus one forced-stop poll
        assert!(flash.delay.total_us <= 2 * MODE_EXIT_TIMEOUT_US as u64 + 20);
    }
}
