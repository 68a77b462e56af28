//! Bounded status polling and recovery
//!
//! Every wait on the FCU is bounded by a budget in microseconds. When a
//! budget runs out the running command is aborted with a forced stop. If the
//! forced stop cannot release the command-lock either, the driver latches
//! `locked` and refuses further work until `start()` recovers it.

use super::DataFlash;
use crate::bus::{Delay, Mmio};
use crate::error::{Error, Result};
use crate::regs::{AccessStatus, FlashStatus, CMD_FORCED_STOP, CMD_STATUS_CLEAR};
use crate::timing::{Operation, DBFULL_TIMEOUT_US, FORCED_STOP_TIMEOUT_US, POLL_STEP_US};

impl<B: Mmio, D: Delay> DataFlash<B, D> {
    pub(super) fn flash_status(&mut self) -> FlashStatus {
        FlashStatus::from_bits_retain(self.bus.read32(self.family.regs.fstatr))
    }

    pub(super) fn access_status(&mut self) -> AccessStatus {
        AccessStatus::from_bits_retain(self.bus.read8(self.family.regs.fastat))
    }

    /// Poll FSTATR until `done` holds or `budget_us` has elapsed
    ///
    /// Each iteration sleeps `step_us` first, so the total delay is at most
    /// `budget_us` rounded up to a whole step.
    fn poll_status(
        &mut self,
        budget_us: u32,
        step_us: u32,
        done: impl Fn(FlashStatus) -> bool,
    ) -> Option<FlashStatus> {
        let mut remaining = budget_us;

        loop {
            self.delay.delay_us(step_us);
            let status = self.flash_status();
            if done(status) {
                return Some(status);
            }

            remaining = remaining.saturating_sub(step_us);
            if remaining == 0 {
                return None;
            }
        }
    }

    /// Wait for FRDY within the budget of `op`
    ///
    /// On timeout the command is aborted and `Timeout` is returned, or
    /// `CommandLocked` if the abort failed.
    pub(super) fn wait_ready(&mut self, op: Operation) -> Result<FlashStatus> {
        let budget = self.budgets.for_operation(op);
        match self.poll_status(budget, op.poll_step_us(), |s| {
            s.contains(FlashStatus::FRDY)
        }) {
            Some(status) => Ok(status),
            None => {
                log::warn!("{} did not complete within {} us", op.name(), budget);
                self.forced_stop()?;
                Err(Error::Timeout)
            }
        }
    }

    /// Wait for room in the command buffer before the next payload push
    pub(super) fn wait_buffer(&mut self) -> Result<()> {
        if !self.family.double_buffered {
            return Ok(());
        }
        if !self.flash_status().contains(FlashStatus::DBFULL) {
            return Ok(());
        }
        match self.poll_status(DBFULL_TIMEOUT_US, POLL_STEP_US, |s| {
            !s.contains(FlashStatus::DBFULL)
        }) {
            Some(_) => Ok(()),
            None => {
                log::warn!("Command buffer stayed full for {} us", DBFULL_TIMEOUT_US);
                self.forced_stop()?;
                Err(Error::Timeout)
            }
        }
    }

    /// Abort the running command
    ///
    /// Succeeds when the FCU is ready again and the command-lock is clear.
    /// Otherwise the lock is latched.
    pub(super) fn forced_stop(&mut self) -> Result<()> {
        log::warn!("Issuing forced stop");
        self.bus.write8(self.family.regs.fcmd, CMD_FORCED_STOP);

        let ready = self
            .poll_status(FORCED_STOP_TIMEOUT_US, POLL_STEP_US, |s| {
                s.contains(FlashStatus::FRDY)
            })
            .is_some();
        let locked = self.access_status().contains(AccessStatus::CMDLK);

        if ready && !locked {
            return Ok(());
        }

        log::error!(
            "Forced stop failed (ready: {}, command-lock: {}), flash disabled until restart",
            ready,
            locked
        );
        self.locked = true;
        Err(Error::CommandLocked)
    }

    /// Map the error flags of a finished command and clear them
    pub(super) fn check_status(&mut self, op: Operation, status: FlashStatus) -> Result<()> {
        let cmdlk = self.access_status().contains(AccessStatus::CMDLK);
        if !status.intersects(FlashStatus::ERRORS) && !cmdlk {
            return Ok(());
        }

        let err = if status.contains(FlashStatus::ILGLERR) {
            Error::InvalidAddress
        } else if status.contains(FlashStatus::ERSERR) {
            Error::EraseFailed
        } else if status.contains(FlashStatus::PRGERR) {
            Error::ProgramFailed
        } else {
            Error::CommandLocked
        };
        log::warn!(
            "{} failed: FSTATR {:#010x}, command-lock {}",
            op.name(),
            status.bits(),
            cmdlk
        );

        self.clear_status()?;
        Err(err)
    }

    /// Issue a status clear, falling back to a forced stop if the lock stays
    fn clear_status(&mut self) -> Result<()> {
        self.bus.write8(self.family.regs.fcmd, CMD_STATUS_CLEAR);
        if !self.access_status().contains(AccessStatus::CMDLK) {
            return Ok(());
        }
        self.forced_stop()
    }

    /// Try to release a latched command-lock
    pub(super) fn release_lock(&mut self) -> Result<()> {
        log::warn!("Attempting to release the command-lock");
        self.locked = false;

        // Leaves `locked` set again if it fails
        self.forced_stop()?;
        self.clear_status()?;

        // The mode register is in an unknown state after an abort
        self.mode = super::Mode::Uninitialized;
        log::info!("Command-lock released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::mock::{flash, MockBus, MockDelay};
    use super::*;

    #[test]
    fn test_wait_ready_immediate() {
        let mut flash = flash(MockBus::new(), MockDelay::default());
        let status = flash.wait_ready(Operation::Program).unwrap();
        assert!(status.contains(FlashStatus::FRDY));
        assert_eq!(flash.delay.total_us, POLL_STEP_US as u64);
    }

    #[test]
    fn test_wait_ready_timeout_is_bounded() {
        let mut bus = MockBus::new();
        bus.busy_reads = u32::MAX;
        bus.stop_clears_busy = true;
        let mut flash = flash(bus, MockDelay::default());
        let budget = flash.budgets.erase_us;

        assert_eq!(flash.wait_ready(Operation::Erase), Err(Error::Timeout));
        assert!(!flash.locked);

        let limit = budget as u64 + Operation::Erase.poll_step_us() as u64
            + FORCED_STOP_TIMEOUT_US as u64;
        assert!(flash.delay.total_us <= limit);
        assert!(flash.delay.total_us >= budget as u64);
        assert!(flash.bus.commands().contains(&CMD_FORCED_STOP));
    }

    #[test]
    fn test_forced_stop_latches_lock() {
        let mut bus = MockBus::new();
        bus.busy_reads = u32::MAX;
        bus.stuck_lock = true;
        let mut flash = flash(bus, MockDelay::default());

        assert_eq!(flash.wait_ready(Operation::Program), Err(Error::CommandLocked));
        assert!(flash.locked);
    }

    #[test]
    fn test_check_status_maps_errors() {
        let mut flash = flash(MockBus::new(), MockDelay::default());

        let status = FlashStatus::FRDY | FlashStatus::ILGLERR;
        assert_eq!(
            flash.check_status(Operation::Program, status),
            Err(Error::InvalidAddress)
        );
        let status = FlashStatus::FRDY | FlashStatus::ERSERR;
        assert_eq!(
            flash.check_status(Operation::Erase, status),
            Err(Error::EraseFailed)
        );
        let status = FlashStatus::FRDY | FlashStatus::PRGERR;
        assert_eq!(
            flash.check_status(Operation::Program, status),
            Err(Error::ProgramFailed)
        );
        assert_eq!(
            flash
                .bus
                .commands()
                .iter()
                .filter(|&&c| c == CMD_STATUS_CLEAR)
                .count(),
            3
        );
        assert!(!flash.locked);
    }

    #[test]
    fn test_check_status_clean() {
        let mut flash = flash(MockBus::new(), MockDelay::default());
        assert!(flash
            .check_status(Operation::Program, FlashStatus::FRDY)
            .is_ok());
        assert!(flash.bus.commands().is_empty());
    }

    #[test]
    fn test_wait_buffer_single_buffered_skips() {
        let mut flash = flash(MockBus::new(), MockDelay::default());
        flash.family.double_buffered = false;
        flash.bus.dbfull_reads = u32::MAX;
        assert!(flash.wait_buffer().is_ok());
        assert_eq!(flash.delay.total_us, 0);
    }

    #[test]
    fn test_wait_buffer_drains() {
        let mut flash = flash(MockBus::new(), MockDelay::default());
        flash.family.double_buffered = true;
        flash.bus.dbfull_reads = 3;
        assert!(flash.wait_buffer().is_ok());
        assert!(flash.delay.total_us <= DBFULL_TIMEOUT_US as u64);
    }

    #[test]
    fn test_release_lock() {
        let mut flash = flash(MockBus::new(), MockDelay::default());
        flash.locked = true;
        assert!(flash.release_lock().is_ok());
        assert!(!flash.locked);
        assert_eq!(flash.mode, super::super::Mode::Uninitialized);
    }
}
