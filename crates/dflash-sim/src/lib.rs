//! dflash-sim - In-memory FCU data flash emulator for testing
//!
//! This crate provides [`SimFlash`], a register-level model of a data flash
//! controller that implements [`Mmio`]. It is what the driver tests run
//! against, and what the `dflash` tool uses as its backend.
//!
//! The model covers:
//! - FENTRYR, FCURAME and FPCKAR with their write keys
//! - the FCMD command state machine (program, block erase, blank check,
//!   forced stop, status clear)
//! - FRDY busy time, DBFULL double buffering and the command-lock
//! - the FCU firmware ROM image and the FCU RAM it must be copied to
//! - AND-only programming and 0xFF erase
//! - factory unique-ID words
//!
//! Faults can be injected with [`SimFlash::inject`].

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

mod delay;

pub use delay::SimDelay;

#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

#[cfg(feature = "alloc")]
use dflash_core::family::{Firmware, FlashFamily, PushWidth, ERASED_BYTE};
#[cfg(feature = "alloc")]
use dflash_core::regs::{
    AccessStatus, FlashStatus, CMD_BLANK_CHECK, CMD_BLOCK_ERASE, CMD_CONFIRM, CMD_FORCED_STOP,
    CMD_PROGRAM, CMD_STATUS_CLEAR, FBCSTAT_BCST, FCURAME_FCRME, FCURAME_KEY, FENTRYR_FENTRYD,
    FENTRYR_KEY, FPCKAR_KEY,
};
#[cfg(feature = "alloc")]
use dflash_core::Mmio;

/// Injectable hardware faults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Commands never raise FRDY. A forced stop still aborts them.
    NeverReady,
    /// Every confirmed command raises the command-lock, and neither status
    /// clear nor forced stop releases it
    StuckLock,
    /// FENTRYR ignores the exit key and stays in P/E mode
    ModeStuck,
    /// FCURAME ignores writes, so FCU RAM can never be enabled
    RamEnableRejected,
}

/// Emulator timing knobs
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// FSTATR reads that report busy after each confirmed command
    pub busy_polls: u32,
    /// FSTATR reads that report DBFULL after each payload push
    pub buffer_polls: u32,
    /// Factory unique-ID words (families without unique IDs ignore these)
    pub unique_ids: [u32; 4],
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            busy_polls: 2,
            buffer_polls: 1,
            unique_ids: [0x5244_4631, 0x0042_1337, 0xC0FF_EE00, 0x0000_2026],
        }
    }
}

/// Word `index` of the emulated FCU firmware ROM
pub const fn firmware_word(index: u32) -> u32 {
    0xFC00_0000 ^ index.wrapping_mul(0x0101_0101).rotate_left(3)
}

#[cfg(feature = "alloc")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Register {
    Fentryr,
    Fsaddr,
    Feaddr,
    Fstatr,
    Fastat,
    Fbccnt,
    Fbcstat,
    Fcmd,
    Fcurame,
    Fpckar,
}

/// What an address maps to
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Register(Register),
    Array(usize),
    FirmwareRom(u32),
    FcuRam(usize),
    UniqueId(usize),
    Unmapped,
}

/// Command that has been set up and waits for the confirm opcode
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    Program { addr: u32, data: Vec<u8> },
    Erase { addr: u32 },
    BlankCheck { start: u32, end: u32 },
}

#[cfg(feature = "alloc")]
#[derive(Debug, Clone, PartialEq, Eq)]
enum CommandState {
    Idle,
    /// PROGRAM seen, waiting for the push count
    ProgramCount { addr: u32 },
    /// Collecting payload pushes
    ProgramData { addr: u32, data: Vec<u8>, pushes: u32 },
    AwaitConfirm(Pending),
}

/// Emulated data flash controller
#[cfg(feature = "alloc")]
pub struct SimFlash {
    family: FlashFamily,
    config: SimConfig,
    data: Vec<u8>,
    fcu_ram: Vec<u8>,
    faults: Vec<Fault>,

    fentryr: u16,
    fcurame: u16,
    fpckar: u16,
    fsaddr: u32,
    feaddr: u32,
    fbccnt: u8,
    fbcstat: u8,
    errors: FlashStatus,
    cmdlk: bool,
    busy_polls: u32,
    dbfull_polls: u32,
    state: CommandState,

    bus_writes: u64,
    commands_executed: u64,
    pe_array_reads: u64,
}

#[cfg(feature = "alloc")]
impl SimFlash {
    /// Create an erased emulator for `family`
    pub fn new(family: FlashFamily) -> Self {
        Self::with_config(family, SimConfig::default())
    }

    /// Create an erased emulator with custom timing
    pub fn with_config(family: FlashFamily, config: SimConfig) -> Self {
        let ram_len = match family.firmware {
            Firmware::Required { len, .. } => len as usize,
            Firmware::NotRequired => 0,
        };
        Self {
            data: vec![ERASED_BYTE; family.geometry.size as usize],
            fcu_ram: vec![0; ram_len],
            family,
            config,
            faults: Vec::new(),
            fentryr: 0,
            fcurame: 0,
            fpckar: 0,
            fsaddr: 0,
            feaddr: 0,
            fbccnt: 0,
            fbcstat: 0,
            errors: FlashStatus::empty(),
            cmdlk: false,
            busy_polls: 0,
            dbfull_polls: 0,
            state: CommandState::Idle,
            bus_writes: 0,
            commands_executed: 0,
            pe_array_reads: 0,
        }
    }

    /// Create an emulator with pre-filled array contents
    pub fn with_data(family: FlashFamily, initial_data: &[u8]) -> Self {
        let mut sim = Self::new(family);
        let len = core::cmp::min(initial_data.len(), sim.data.len());
        sim.data[..len].copy_from_slice(&initial_data[..len]);
        sim
    }

    /// Get a reference to the array contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the array contents
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// The emulated family
    pub fn family(&self) -> &FlashFamily {
        &self.family
    }

    /// Inject a fault
    pub fn inject(&mut self, fault: Fault) {
        if !self.faults.contains(&fault) {
            log::debug!("sim: injecting {:?}", fault);
            self.faults.push(fault);
        }
    }

    /// Remove all injected faults
    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    fn has(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }

    /// Number of bus writes seen so far
    pub fn bus_writes(&self) -> u64 {
        self.bus_writes
    }

    /// Number of commands that reached the confirm step
    pub fn commands_executed(&self) -> u64 {
        self.commands_executed
    }

    /// Number of array reads performed while in P/E mode
    pub fn pe_array_reads(&self) -> u64 {
        self.pe_array_reads
    }

    /// True if FENTRYR is in data flash P/E mode
    pub fn in_program_erase(&self) -> bool {
        self.fentryr & FENTRYR_FENTRYD != 0
    }

    /// True if the command-lock is set
    pub fn is_locked(&self) -> bool {
        self.cmdlk
    }

    /// Last value written to FPCKAR (clock in MHz), 0 if never written
    pub fn fclk_mhz(&self) -> u8 {
        self.fpckar as u8
    }

    /// True if FCU RAM holds the firmware image
    pub fn firmware_loaded(&self) -> bool {
        match self.family.firmware {
            Firmware::NotRequired => true,
            Firmware::Required { .. } => self
                .fcu_ram
                .chunks_exact(4)
                .enumerate()
                .all(|(i, w)| {
                    u32::from_le_bytes([w[0], w[1], w[2], w[3]]) == firmware_word(i as u32)
                }),
        }
    }

    // ========================================================================
    // Address decoding
    // ========================================================================

    fn register(&self, addr: u32) -> Option<Register> {
        let regs = &self.family.regs;
        let reg = match addr {
            a if a == regs.fentryr => Register::Fentryr,
            a if a == regs.fsaddr => Register::Fsaddr,
            a if a == regs.feaddr => Register::Feaddr,
            a if a == regs.fstatr => Register::Fstatr,
            a if a == regs.fastat => Register::Fastat,
            a if a == regs.fbccnt => Register::Fbccnt,
            a if a == regs.fbcstat => Register::Fbcstat,
            a if a == regs.fcmd => Register::Fcmd,
            a if Some(a) == regs.fcurame => Register::Fcurame,
            a if Some(a) == regs.fpckar => Register::Fpckar,
            _ => return None,
        };
        Some(reg)
    }

    fn decode(&self, addr: u32) -> Target {
        if let Some(reg) = self.register(addr) {
            return Target::Register(reg);
        }

        let base = self.family.regs.array_base;
        if addr >= base && addr - base < self.family.geometry.size {
            return Target::Array((addr - base) as usize);
        }

        if let Firmware::Required { rom, ram, len, .. } = self.family.firmware {
            if addr >= rom && addr - rom < len {
                return Target::FirmwareRom(addr - rom);
            }
            if addr >= ram && addr - ram < len {
                return Target::FcuRam((addr - ram) as usize);
            }
        }

        if let Some(uid) = self.family.unique_id {
            if addr >= uid.base && addr - uid.base < uid.count * 4 {
                return Target::UniqueId(((addr - uid.base) / 4) as usize);
            }
        }

        Target::Unmapped
    }

    // ========================================================================
    // Register model
    // ========================================================================

    fn read_fstatr(&mut self) -> u32 {
        let mut status = self.errors;

        if self.busy_polls == 0 {
            status |= FlashStatus::FRDY;
        } else if self.busy_polls != u32::MAX {
            self.busy_polls -= 1;
        }

        if self.dbfull_polls > 0 {
            status |= FlashStatus::DBFULL;
            self.dbfull_polls -= 1;
        }

        status.bits()
    }

    fn read_fastat(&self) -> u8 {
        if self.cmdlk {
            AccessStatus::CMDLK.bits()
        } else {
            0
        }
    }

    fn write_fentryr(&mut self, value: u16) {
        if value & 0xFF00 != FENTRYR_KEY {
            log::trace!("sim: FENTRYR write without key: {:#06x}", value);
            return;
        }
        let bits = value & 0x00FF;
        if bits == 0 && self.has(Fault::ModeStuck) {
            return;
        }
        if bits != 0 && bits != FENTRYR_FENTRYD {
            return;
        }
        if self.busy_polls != 0 {
            // Mode cannot change while a command runs
            return;
        }
        self.fentryr = bits;
    }

    fn write_fcurame(&mut self, value: u16) {
        if value & 0xFF00 != FCURAME_KEY || self.has(Fault::RamEnableRejected) {
            return;
        }
        self.fcurame = value & FCURAME_FCRME;
    }

    fn write_fpckar(&mut self, value: u16) {
        if value & 0xFF00 == FPCKAR_KEY {
            self.fpckar = value & 0x00FF;
        }
    }

    fn ram_writable(&self) -> bool {
        self.fcurame & FCURAME_FCRME != 0 && self.fentryr == 0
    }

    fn read_array(&mut self, offset: usize) -> u8 {
        if self.in_program_erase() {
            self.pe_array_reads += 1;
            return 0;
        }
        self.data[offset]
    }

    fn read_byte(&mut self, addr: u32) -> u8 {
        match self.decode(addr) {
            Target::Array(offset) => self.read_array(offset),
            Target::FcuRam(offset) => self.fcu_ram[offset],
            Target::FirmwareRom(offset) => {
                firmware_word(offset / 4).to_le_bytes()[(offset % 4) as usize]
            }
            _ => 0,
        }
    }

    // ========================================================================
    // Command state machine
    // ========================================================================

    /// Record an illegal command: ILGLERR plus command-lock
    fn illegal(&mut self, why: &str) {
        log::debug!("sim: illegal command sequence: {}", why);
        self.errors |= FlashStatus::ILGLERR;
        self.cmdlk = true;
        self.state = CommandState::Idle;
    }

    fn accepts_commands(&self) -> bool {
        self.in_program_erase() && self.firmware_loaded()
    }

    fn forced_stop(&mut self) {
        log::debug!("sim: forced stop");
        self.state = CommandState::Idle;
        self.busy_polls = 0;
        self.dbfull_polls = 0;
        if !self.has(Fault::StuckLock) {
            self.errors = FlashStatus::empty();
            self.cmdlk = false;
        }
    }

    fn status_clear(&mut self) {
        if !self.has(Fault::StuckLock) {
            self.errors = FlashStatus::empty();
            self.cmdlk = false;
        }
    }

    fn command_byte(&mut self, value: u8) {
        let byte_payload = self.family.push_width == PushWidth::Byte
            && matches!(self.state, CommandState::ProgramData { .. });
        if value == CMD_FORCED_STOP && !byte_payload {
            self.forced_stop();
            return;
        }

        match core::mem::replace(&mut self.state, CommandState::Idle) {
            CommandState::Idle => self.start_command(value),
            CommandState::ProgramCount { addr } => {
                if value as u32 != self.family.pushes_per_unit() {
                    self.illegal("wrong program push count");
                } else {
                    self.state = CommandState::ProgramData {
                        addr,
                        data: Vec::new(),
                        pushes: value as u32,
                    };
                }
            }
            CommandState::ProgramData { addr, data, pushes } => {
                if self.family.push_width != PushWidth::Byte {
                    self.illegal("byte push on a half-word family");
                } else {
                    self.push(addr, data, pushes, &[value]);
                }
            }
            CommandState::AwaitConfirm(pending) => {
                if value == CMD_CONFIRM {
                    self.execute(pending);
                } else {
                    self.illegal("expected confirm");
                }
            }
        }
    }

    fn command_halfword(&mut self, value: u16) {
        match core::mem::replace(&mut self.state, CommandState::Idle) {
            CommandState::ProgramData { addr, data, pushes }
                if self.family.push_width == PushWidth::HalfWord =>
            {
                self.push(addr, data, pushes, &value.to_le_bytes());
            }
            _ => self.illegal("unexpected half-word write to FCMD"),
        }
    }

    fn start_command(&mut self, value: u8) {
        if value == CMD_STATUS_CLEAR {
            self.status_clear();
            return;
        }
        if self.cmdlk {
            log::trace!("sim: command {:#04x} ignored, command-lock set", value);
            return;
        }
        if self.busy_polls != 0 {
            self.illegal("command while busy");
            return;
        }
        if !self.accepts_commands() {
            self.illegal("not in P/E mode or FCU firmware missing");
            return;
        }

        match value {
            CMD_PROGRAM => self.state = CommandState::ProgramCount { addr: self.fsaddr },
            CMD_BLOCK_ERASE => {
                self.state = CommandState::AwaitConfirm(Pending::Erase { addr: self.fsaddr })
            }
            CMD_BLANK_CHECK => {
                self.state = CommandState::AwaitConfirm(Pending::BlankCheck {
                    start: self.fsaddr,
                    end: self.feaddr,
                })
            }
            _ => self.illegal("unknown opcode"),
        }
    }

    fn push(&mut self, addr: u32, mut data: Vec<u8>, pushes: u32, bytes: &[u8]) {
        if self.dbfull_polls > 0 {
            self.illegal("payload push while the buffer is full");
            return;
        }
        data.extend_from_slice(bytes);

        let expected = self.family.geometry.program_unit as usize;
        if data.len() >= expected {
            self.state = CommandState::AwaitConfirm(Pending::Program { addr, data });
        } else {
            if self.family.double_buffered {
                self.dbfull_polls = self.config.buffer_polls;
            }
            self.state = CommandState::ProgramData { addr, data, pushes };
        }
    }

    /// Array offset of `addr`, if it is inside the array
    fn array_offset(&self, addr: u32) -> Option<u32> {
        let base = self.family.regs.array_base;
        (addr >= base && addr - base < self.family.geometry.size).then(|| addr - base)
    }

    fn execute(&mut self, pending: Pending) {
        self.commands_executed += 1;
        let geometry = self.family.geometry;

        match pending {
            Pending::Program { addr, data } => {
                let Some(offset) = self.array_offset(addr) else {
                    return self.illegal("program address outside the array");
                };
                if offset % geometry.program_unit != 0 {
                    return self.illegal("unaligned program address");
                }
                log::trace!("sim: program {:#x} {:02x?}", offset, data);
                for (i, byte) in data.iter().enumerate() {
                    // Programming can only clear bits
                    self.data[offset as usize + i] &= byte;
                }
            }
            Pending::Erase { addr } => {
                let Some(offset) = self.array_offset(addr) else {
                    return self.illegal("erase address outside the array");
                };
                if offset % geometry.block_size != 0 {
                    return self.illegal("unaligned erase address");
                }
                log::trace!("sim: erase block at {:#x}", offset);
                let start = offset as usize;
                self.data[start..start + geometry.block_size as usize].fill(ERASED_BYTE);
            }
            Pending::BlankCheck { start, end } => {
                let (Some(start), Some(end)) = (self.array_offset(start), self.array_offset(end))
                else {
                    return self.illegal("blank check range outside the array");
                };
                if start > end {
                    return self.illegal("blank check range reversed");
                }
                let programmed = self.data[start as usize..=end as usize]
                    .iter()
                    .any(|&b| b != ERASED_BYTE);
                self.fbcstat = if programmed { FBCSTAT_BCST } else { 0 };
            }
        }

        self.busy_polls = if self.has(Fault::NeverReady) {
            u32::MAX
        } else {
            self.config.busy_polls
        };
        if self.has(Fault::StuckLock) {
            self.cmdlk = true;
        }
    }
}

#[cfg(feature = "alloc")]
impl Mmio for SimFlash {
    fn read8(&mut self, addr: u32) -> u8 {
        match self.decode(addr) {
            Target::Register(Register::Fastat) => self.read_fastat(),
            Target::Register(Register::Fbccnt) => self.fbccnt,
            Target::Register(Register::Fbcstat) => self.fbcstat,
            Target::Register(Register::Fstatr) => self.read_fstatr() as u8,
            Target::Register(_) => 0,
            _ => self.read_byte(addr),
        }
    }

    fn read16(&mut self, addr: u32) -> u16 {
        match self.decode(addr) {
            Target::Register(Register::Fentryr) => self.fentryr,
            Target::Register(Register::Fcurame) => self.fcurame,
            Target::Register(Register::Fpckar) => self.fpckar,
            Target::Register(_) => self.read8(addr) as u16,
            _ => u16::from_le_bytes([self.read_byte(addr), self.read_byte(addr + 1)]),
        }
    }

    fn read32(&mut self, addr: u32) -> u32 {
        match self.decode(addr) {
            Target::Register(Register::Fstatr) => self.read_fstatr(),
            Target::Register(Register::Fsaddr) => self.fsaddr,
            Target::Register(Register::Feaddr) => self.feaddr,
            Target::Register(_) => self.read16(addr) as u32,
            Target::FirmwareRom(offset) => firmware_word(offset / 4),
            Target::UniqueId(index) => self.config.unique_ids.get(index).copied().unwrap_or(0),
            _ => u32::from_le_bytes([
                self.read_byte(addr),
                self.read_byte(addr + 1),
                self.read_byte(addr + 2),
                self.read_byte(addr + 3),
            ]),
        }
    }

    fn write8(&mut self, addr: u32, value: u8) {
        self.bus_writes += 1;
        match self.decode(addr) {
            Target::Register(Register::Fcmd) => self.command_byte(value),
            Target::Register(Register::Fbccnt) => self.fbccnt = value,
            Target::FcuRam(offset) if self.ram_writable() => self.fcu_ram[offset] = value,
            target => log::trace!("sim: 8-bit write to {:?} ignored", target),
        }
    }

    fn write16(&mut self, addr: u32, value: u16) {
        self.bus_writes += 1;
        match self.decode(addr) {
            Target::Register(Register::Fentryr) => self.write_fentryr(value),
            Target::Register(Register::Fcurame) => self.write_fcurame(value),
            Target::Register(Register::Fpckar) => self.write_fpckar(value),
            Target::Register(Register::Fcmd) => self.command_halfword(value),
            target => log::trace!("sim: 16-bit write to {:?} ignored", target),
        }
    }

    fn write32(&mut self, addr: u32, value: u32) {
        self.bus_writes += 1;
        match self.decode(addr) {
            Target::Register(Register::Fsaddr) => self.fsaddr = value,
            Target::Register(Register::Feaddr) => self.feaddr = value,
            Target::FcuRam(offset) if self.ram_writable() && offset + 4 <= self.fcu_ram.len() => {
                self.fcu_ram[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
            }
            target => log::trace!("sim: 32-bit write to {:?} ignored", target),
        }
    }
}

#[cfg(feature = "std")]
impl SimFlash {
    /// Create an emulator whose array is loaded from an image file
    ///
    /// Short images are padded with the erased value, long ones truncated.
    pub fn load(family: FlashFamily, path: &std::path::Path) -> std::io::Result<Self> {
        let image = std::fs::read(path)?;
        if image.len() != family.geometry.size as usize {
            log::warn!(
                "Image {} is {} bytes, {} data flash is {} bytes",
                path.display(),
                image.len(),
                family.name,
                family.geometry.size
            );
        }
        Ok(Self::with_data(family, &image))
    }

    /// Write the array contents to an image file
    pub fn save(&self, path: &std::path::Path) -> std::io::Result<()> {
        std::fs::write(path, &self.data)
    }
}
