//! Minimal register bank for the driver's unit tests

use std::collections::BTreeMap;
use std::vec::Vec;

use super::{DataFlash, FlashConfig, Mode};
use crate::bus::{Delay, Mmio};
use crate::family::{Firmware, FlashFamily};
use crate::regs::{
    AccessStatus, FlashStatus, RegisterMap, CMD_CONFIRM, CMD_FORCED_STOP, CMD_STATUS_CLEAR,
    FENTRYR_KEY, FCURAME_KEY,
};
use crate::timing::Budgets;

pub(super) struct MockBus {
    pub regs_map: RegisterMap,
    mem: BTreeMap<u32, u32>,
    rom: (u32, u32),
    ram: (u32, u32),
    /// Every write as (address, value)
    pub writes: Vec<(u32, u32)>,
    /// FSTATR reads that report busy before FRDY (u32::MAX: forever)
    pub busy_reads: u32,
    /// FSTATR reads that report DBFULL
    pub dbfull_reads: u32,
    /// FSTATR bits raised by the next confirm command
    pub error_on_confirm: u32,
    pub stop_clears_busy: bool,
    pub stuck_lock: bool,
    pub fentryr_ignores_exit: bool,
    /// Ignore only the next exit key
    pub fentryr_ignores_first_exit: bool,
    pub fentryr_ignores_entry: bool,
    pub fcurame_rejected: bool,
    pub corrupt_ram: bool,
}

impl MockBus {
    pub fn new() -> Self {
        let family = FlashFamily::rx62n();
        let (rom, ram) = match family.firmware {
            Firmware::Required { rom, ram, len, .. } => ((rom, len), (ram, len)),
            Firmware::NotRequired => ((0, 0), (0, 0)),
        };
        Self {
            regs_map: family.regs,
            mem: BTreeMap::new(),
            rom,
            ram,
            writes: Vec::new(),
            busy_reads: 0,
            dbfull_reads: 0,
            error_on_confirm: 0,
            stop_clears_busy: false,
            stuck_lock: false,
            fentryr_ignores_exit: false,
            fentryr_ignores_first_exit: false,
            fentryr_ignores_entry: false,
            fcurame_rejected: false,
            corrupt_ram: false,
        }
    }

    pub fn rom_word(addr: u32) -> u32 {
        addr.rotate_left(7) ^ 0xA5A5_5A5A
    }

    fn in_window(addr: u32, (base, len): (u32, u32)) -> bool {
        addr >= base && addr < base + len
    }

    pub fn peek(&self, addr: u32) -> u32 {
        self.mem.get(&addr).copied().unwrap_or(0)
    }

    pub fn poke8(&mut self, addr: u32, value: u8) {
        self.mem.insert(addr, value as u32);
    }

    pub fn fentryr(&self) -> u16 {
        self.peek(self.regs_map.fentryr) as u16
    }

    /// Byte commands written to FCMD
    pub fn commands(&self) -> Vec<u8> {
        self.writes
            .iter()
            .filter(|(a, v)| *a == self.regs_map.fcmd && *v <= 0xFF)
            .map(|&(_, v)| v as u8)
            .collect()
    }

    fn clear_lock(&mut self) {
        if self.stuck_lock {
            return;
        }
        self.mem.remove(&self.regs_map.fastat);
        self.mem.remove(&self.regs_map.fstatr);
    }

    fn command(&mut self, cmd: u8) {
        match cmd {
            CMD_FORCED_STOP => {
                if self.stop_clears_busy {
                    self.busy_reads = 0;
                }
                self.clear_lock();
            }
            CMD_STATUS_CLEAR => self.clear_lock(),
            CMD_CONFIRM if self.error_on_confirm != 0 => {
                self.mem.insert(self.regs_map.fstatr, self.error_on_confirm);
                if self.stuck_lock {
                    self.mem
                        .insert(self.regs_map.fastat, AccessStatus::CMDLK.bits() as u32);
                }
            }
            _ => {}
        }
    }
}

impl Mmio for MockBus {
    fn read8(&mut self, addr: u32) -> u8 {
        self.peek(addr) as u8
    }

    fn read16(&mut self, addr: u32) -> u16 {
        self.peek(addr) as u16
    }

    fn read32(&mut self, addr: u32) -> u32 {
        if addr == self.regs_map.fstatr {
            let mut status = FlashStatus::from_bits_retain(self.peek(addr));
            if self.busy_reads > 0 {
                if self.busy_reads != u32::MAX {
                    self.busy_reads -= 1;
                }
            } else {
                status |= FlashStatus::FRDY;
            }
            if self.dbfull_reads > 0 {
                self.dbfull_reads -= 1;
                status |= FlashStatus::DBFULL;
            }
            return status.bits();
        }
        if Self::in_window(addr, self.rom) {
            return Self::rom_word(addr);
        }
        self.peek(addr)
    }

    fn write8(&mut self, addr: u32, value: u8) {
        self.writes.push((addr, value as u32));
        if addr == self.regs_map.fcmd {
            self.command(value);
        } else {
            self.mem.insert(addr, value as u32);
        }
    }

    fn write16(&mut self, addr: u32, value: u16) {
        self.writes.push((addr, value as u32));
        if addr == self.regs_map.fentryr {
            let bits = value & 0x00FF;
            let skip_exit = bits == 0
                && (self.fentryr_ignores_exit || self.fentryr_ignores_first_exit);
            if bits == 0 {
                self.fentryr_ignores_first_exit = false;
            }
            let ignored = value & 0xFF00 != FENTRYR_KEY
                || skip_exit
                || (bits != 0 && self.fentryr_ignores_entry);
            if !ignored {
                self.mem.insert(addr, bits as u32);
            }
        } else if Some(addr) == self.regs_map.fcurame {
            if value & 0xFF00 == FCURAME_KEY && !self.fcurame_rejected {
                self.mem.insert(addr, (value & 0x00FF) as u32);
            }
        } else if addr != self.regs_map.fcmd {
            self.mem.insert(addr, value as u32);
        }
    }

    fn write32(&mut self, addr: u32, value: u32) {
        self.writes.push((addr, value));
        let value = if self.corrupt_ram && Self::in_window(addr, self.ram) {
            value ^ 1
        } else {
            value
        };
        self.mem.insert(addr, value);
    }
}

#[derive(Default)]
pub(super) struct MockDelay {
    pub total_us: u64,
}

impl Delay for MockDelay {
    fn delay_us(&mut self, us: u32) {
        self.total_us += us as u64;
    }
}

/// A started RX62N driver in Read mode with small budgets
pub(super) fn flash(bus: MockBus, delay: MockDelay) -> DataFlash<MockBus, MockDelay> {
    let mut flash = DataFlash::new(
        bus,
        delay,
        FlashFamily::rx62n(),
        FlashConfig::new(50_000_000),
    );
    flash.budgets = Budgets {
        write_us: 50,
        erase_us: 200,
        blank_check_us: 20,
    };
    flash.mode = Mode::Read;
    flash.started = true;
    flash.firmware_transferred = true;
    flash
}
