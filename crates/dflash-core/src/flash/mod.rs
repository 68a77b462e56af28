//! Data flash driver
//!
//! [`DataFlash`] owns the register bus, the delay source and the only piece
//! of mutable driver state: the current [`Mode`]. Its implementation is split
//! by concern:
//!
//! - `mode` - FENTRYR key handshake between Read and Program/Erase mode
//! - `firmware` - one-time FCU firmware transfer into FCU RAM
//! - `command` - program, block erase and blank check command sequences
//! - `poll` - bounded FRDY polling, forced stop and error-flag handling
//! - `write` - decomposition of byte ranges into aligned program units
//!
//! # Concurrency
//!
//! Every operation blocks until the hardware is done and takes `&mut self`.
//! The driver performs no locking. If several threads or interrupt handlers
//! need the flash, wrap the driver in a mutex or critical section.
//!
//! # Range policy
//!
//! - `read_range` clamps at the end of the array and returns the number of
//!   bytes actually read.
//! - `write` rejects any range that does not fit with `InvalidAddress`,
//!   before touching a register.
//! - Any start address at or past the end of the array is `InvalidAddress`.

mod command;
mod firmware;
#[cfg(test)]
mod mock;
mod mode;
mod poll;
mod write;

pub use write::{PendingWrite, ProgramUnit};

use heapless::Vec;

use crate::bus::{Delay, Mmio};
use crate::error::{Error, Result};
use crate::family::{Firmware, FlashFamily, FlashGeometry, MAX_UNIQUE_IDS};
use crate::regs::fpckar_value;
use crate::timing::{fclk_mhz, Budgets};

/// Operating mode of the flash array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// `start()` has not completed yet
    #[default]
    Uninitialized,
    /// The array is readable, no P/E command can be issued
    Read,
    /// P/E commands can be issued, the array is not readable
    ProgramErase,
}

/// Runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashConfig {
    /// Flash peripheral clock (FCLK) in Hz
    pub fclk_hz: u32,
}

impl FlashConfig {
    /// Create a configuration for the given FCLK
    pub const fn new(fclk_hz: u32) -> Self {
        Self { fclk_hz }
    }
}

/// Data flash driver
pub struct DataFlash<B, D> {
    bus: B,
    delay: D,
    family: FlashFamily,
    config: FlashConfig,
    mode: Mode,
    budgets: Budgets,
    started: bool,
    firmware_transferred: bool,
    /// Set when a forced stop failed to release the command-lock
    locked: bool,
}

impl<B: Mmio, D: Delay> DataFlash<B, D> {
    /// Create a driver in `Uninitialized` mode. No register is touched.
    pub fn new(bus: B, delay: D, family: FlashFamily, config: FlashConfig) -> Self {
        Self {
            bus,
            delay,
            family,
            config,
            mode: Mode::Uninitialized,
            budgets: Budgets::default(),
            started: false,
            firmware_transferred: false,
            locked: false,
        }
    }

    /// Bring the controller up and leave it in Read mode
    ///
    /// Validates the family and FCLK, computes the timeout budgets, transfers
    /// the FCU firmware if the family needs it and notifies the FCU of the
    /// clock.
    ///
    /// Calling it again after success is a no-op, except on families whose
    /// firmware may only be transferred once, where it fails with
    /// `InitFailed`. If the command-lock was latched, `start()` tries to
    /// release it instead.
    pub fn start(&mut self) -> Result<()> {
        if let Err(reason) = self.family.validate() {
            log::error!("{}: invalid family: {}", self.family.name, reason);
            return Err(Error::InitFailed);
        }

        if self.locked {
            self.release_lock()?;
            if self.started {
                return self.enter_read();
            }
        } else if self.started {
            if let Firmware::Required {
                allow_retransfer: false,
                ..
            } = self.family.firmware
            {
                log::error!(
                    "{}: FCU firmware must not be transferred twice",
                    self.family.name
                );
                return Err(Error::InitFailed);
            }
            log::debug!("{}: already started", self.family.name);
            return Ok(());
        }

        let fclk_hz = self.config.fclk_hz;
        if fclk_hz < self.family.fclk_min_hz || fclk_hz > self.family.fclk_max_hz {
            log::error!(
                "{}: FCLK {} Hz outside of {}..={} Hz",
                self.family.name,
                fclk_hz,
                self.family.fclk_min_hz,
                self.family.fclk_max_hz
            );
            return Err(Error::InitFailed);
        }

        self.budgets = Budgets::new(&self.family.geometry.timing, fclk_hz);
        log::debug!(
            "Budgets at {} Hz: write {} us, erase {} us, blank check {} us",
            fclk_hz,
            self.budgets.write_us,
            self.budgets.erase_us,
            self.budgets.blank_check_us
        );

        self.enter_read().map_err(|e| match e {
            Error::Timeout => Error::InitFailed,
            e => e,
        })?;
        self.transfer_firmware()?;
        self.notify_clock();

        self.started = true;
        log::info!(
            "{} data flash ready: {} bytes, {} blocks of {} bytes",
            self.family.name,
            self.family.geometry.size,
            self.family.geometry.block_count(),
            self.family.geometry.block_size
        );
        Ok(())
    }

    /// Tell the FCU the FCLK frequency, on families that need it
    fn notify_clock(&mut self) {
        if let Some(fpckar) = self.family.regs.fpckar {
            let mhz = fclk_mhz(self.config.fclk_hz).min(u8::MAX as u32) as u8;
            log::debug!("FPCKAR <- {} MHz", mhz);
            self.bus.write16(fpckar, fpckar_value(mhz));
        }
    }

    /// Fail unless the driver is started and not latched
    fn ensure_ready(&self) -> Result<()> {
        if self.locked {
            return Err(Error::CommandLocked);
        }
        if !self.started {
            return Err(Error::InitFailed);
        }
        Ok(())
    }

    fn ensure_block(&self, block: u32) -> Result<()> {
        if block >= self.family.geometry.block_count() {
            log::debug!(
                "Block {} out of range (0..{})",
                block,
                self.family.geometry.block_count()
            );
            return Err(Error::InvalidAddress);
        }
        Ok(())
    }

    // ========================================================================
    // Read
    // ========================================================================

    /// Read a single byte
    pub fn read(&mut self, addr: u32) -> Result<u8> {
        self.ensure_ready()?;
        if !self.family.geometry.contains(addr) {
            return Err(Error::InvalidAddress);
        }
        self.enter_read()?;
        Ok(self.bus.read8(self.family.regs.array_base + addr))
    }

    /// Read into `buf` starting at `addr`
    ///
    /// The read is clamped at the end of the array. Returns the number of
    /// bytes read.
    pub fn read_range(&mut self, addr: u32, buf: &mut [u8]) -> Result<usize> {
        self.ensure_ready()?;
        let size = self.family.geometry.size;
        if !self.family.geometry.contains(addr) {
            return Err(Error::InvalidAddress);
        }

        let len = buf.len().min((size - addr) as usize);
        if len < buf.len() {
            log::debug!(
                "Read of {} bytes at {:#x} clamped to {} bytes",
                buf.len(),
                addr,
                len
            );
        }
        if len == 0 {
            return Ok(0);
        }

        self.enter_read()?;
        let base = self.family.regs.array_base + addr;
        for (i, byte) in buf[..len].iter_mut().enumerate() {
            *byte = self.bus.read8(base + i as u32);
        }
        Ok(len)
    }

    // ========================================================================
    // Program / erase
    // ========================================================================

    /// Program `src` at `addr`
    ///
    /// The target should be erased. Partial program units at either end are
    /// padded with the erased value, so neighbouring erased bytes stay
    /// erased. Stops at the first failing unit; units already written stay
    /// written.
    pub fn write(&mut self, addr: u32, src: &[u8]) -> Result<()> {
        self.ensure_ready()?;
        if !self.family.geometry.is_valid_range(addr, src.len()) {
            log::debug!(
                "Write of {} bytes at {:#x} exceeds {} bytes",
                src.len(),
                addr,
                self.family.geometry.size
            );
            return Err(Error::InvalidAddress);
        }
        if src.is_empty() {
            return Ok(());
        }

        self.enter_program_erase()?;
        let unit_size = self.family.geometry.program_unit;
        for unit in PendingWrite::new(addr, src, unit_size) {
            self.program_unit(unit.addr, unit.bytes())?;
        }
        log::debug!("Wrote {} bytes at {:#x}", src.len(), addr);
        Ok(())
    }

    /// Erase one block
    pub fn erase(&mut self, block: u32) -> Result<()> {
        self.ensure_ready()?;
        self.ensure_block(block)?;
        self.enter_program_erase()?;
        self.erase_block(block)
    }

    /// Blank-check one block. Returns true if every byte is erased.
    pub fn erase_check(&mut self, block: u32) -> Result<bool> {
        self.ensure_ready()?;
        self.ensure_block(block)?;
        self.enter_program_erase()?;
        self.blank_check_block(block)
    }

    /// Erase every block
    ///
    /// Blocks that already pass the blank check are not erased again.
    pub fn erase_all(&mut self) -> Result<()> {
        self.ensure_ready()?;
        self.enter_program_erase()?;

        let mut erased = 0;
        for block in 0..self.family.geometry.block_count() {
            if self.blank_check_block(block)? {
                continue;
            }
            self.erase_block(block)?;
            erased += 1;
        }
        log::info!(
            "Erased {} of {} blocks",
            erased,
            self.family.geometry.block_count()
        );
        Ok(())
    }

    // ========================================================================
    // Unique ID
    // ========================================================================

    /// Number of unique-ID words (0 if unsupported)
    pub fn unique_id_count(&self) -> u32 {
        self.family.unique_id_count()
    }

    /// Unique-ID word `index` (0 if unsupported or out of range)
    pub fn unique_id(&mut self, index: u32) -> u32 {
        match self.family.unique_id {
            Some(layout) if index < layout.count => self.bus.read32(layout.base + index * 4),
            _ => 0,
        }
    }

    /// All unique-ID words
    pub fn unique_ids(&mut self) -> Vec<u32, MAX_UNIQUE_IDS> {
        let mut ids = Vec::new();
        for index in 0..self.unique_id_count() {
            if ids.push(self.unique_id(index)).is_err() {
                break;
            }
        }
        ids
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Current mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether the command-lock is latched
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// The family this driver was built for
    pub fn family(&self) -> &FlashFamily {
        &self.family
    }

    /// Data flash geometry
    pub fn geometry(&self) -> &FlashGeometry {
        &self.family.geometry
    }

    /// Timeout budgets (all zero before `start()`)
    pub fn budgets(&self) -> Budgets {
        self.budgets
    }

    /// Block index containing `addr`
    pub fn block_of(&self, addr: u32) -> u32 {
        self.family.geometry.block_of(addr)
    }

    /// First byte offset of `block`
    pub fn block_address(&self, block: u32) -> u32 {
        self.family.geometry.block_address(block)
    }

    /// Get a reference to the register bus
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Get a mutable reference to the register bus
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Get a reference to the delay source
    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// Get a mutable reference to the delay source
    pub fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }

    /// Give back the bus and the delay source
    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }
}

impl<B, D> core::fmt::Debug for DataFlash<B, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DataFlash")
            .field("family", &self.family.name)
            .field("mode", &self.mode)
            .field("started", &self.started)
            .field("locked", &self.locked)
            .finish()
    }
}
