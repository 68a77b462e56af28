//! Built-in family catalogue

use super::types::{family_name, Firmware, FlashFamily, FlashGeometry, PushWidth, UniqueIdLayout};
use crate::regs::RegisterMap;
use crate::timing::Timing;

/// FACI command issue area
const FACI_CMD_AREA: u32 = 0x007E_0000;
/// Read window of the data flash
const DATA_FLASH_BASE: u32 = 0x0010_0000;

/// Register block laid out at `base`
const fn faci_registers(base: u32, fcurame: bool, fpckar: bool) -> RegisterMap {
    RegisterMap {
        array_base: DATA_FLASH_BASE,
        fastat: base + 0x10,
        fsaddr: base + 0x30,
        feaddr: base + 0x34,
        fstatr: base + 0x80,
        fentryr: base + 0x84,
        fbccnt: base + 0xD0,
        fbcstat: base + 0xD4,
        fcmd: FACI_CMD_AREA,
        fcurame: if fcurame { Some(base + 0x54) } else { None },
        fpckar: if fpckar { Some(base + 0xE4) } else { None },
    }
}

impl FlashFamily {
    /// 32 KiB data flash, 2 KiB blocks, 2-byte program unit.
    /// The FCU runs firmware that is copied from ROM at start-up.
    pub fn rx62n() -> Self {
        Self {
            name: family_name("RX62N"),
            geometry: FlashGeometry {
                size: 32 * 1024,
                block_size: 2 * 1024,
                program_unit: 2,
                // 2 ms / 250 ms / 0.7 ms at 50 MHz
                timing: Timing {
                    write_unit_cycles: 100_000,
                    erase_block_cycles: 12_500_000,
                    blank_check_cycles: 35_000,
                },
            },
            regs: faci_registers(0x007F_C400, true, true),
            firmware: Firmware::Required {
                rom: 0xFEFF_E000,
                ram: 0x007F_8000,
                len: 8 * 1024,
                allow_retransfer: true,
            },
            push_width: PushWidth::HalfWord,
            double_buffered: false,
            unique_id: None,
            fclk_min_hz: 8_000_000,
            fclk_max_hz: 50_000_000,
        }
    }

    /// 8 KiB data flash, 1 KiB blocks, byte programming, no FCU firmware.
    pub fn rx24t() -> Self {
        Self {
            name: family_name("RX24T"),
            geometry: FlashGeometry {
                size: 8 * 1024,
                block_size: 1024,
                program_unit: 1,
                // 0.4 ms / 10 ms / 0.1 ms at 32 MHz
                timing: Timing {
                    write_unit_cycles: 12_800,
                    erase_block_cycles: 320_000,
                    blank_check_cycles: 3_200,
                },
            },
            regs: faci_registers(0x007F_E000, false, false),
            firmware: Firmware::NotRequired,
            push_width: PushWidth::Byte,
            double_buffered: false,
            unique_id: None,
            fclk_min_hz: 1_000_000,
            fclk_max_hz: 32_000_000,
        }
    }

    /// 64 KiB data flash, 64-byte blocks, 4-byte program unit with a double
    /// buffered command area. The FCU firmware may only be transferred once
    /// per power-on.
    pub fn rx64m() -> Self {
        Self {
            name: family_name("RX64M"),
            geometry: FlashGeometry {
                size: 64 * 1024,
                block_size: 64,
                program_unit: 4,
                // 1.7 ms / 10 ms / 30 us at 60 MHz
                timing: Timing {
                    write_unit_cycles: 102_000,
                    erase_block_cycles: 600_000,
                    blank_check_cycles: 1_800,
                },
            },
            regs: faci_registers(0x007F_E000, true, true),
            firmware: Firmware::Required {
                rom: 0xFEFF_F000,
                ram: 0x007F_8000,
                len: 4 * 1024,
                allow_retransfer: false,
            },
            push_width: PushWidth::HalfWord,
            double_buffered: true,
            unique_id: Some(UniqueIdLayout {
                base: 0xFE7F_7D90,
                count: 4,
            }),
            fclk_min_hz: 4_000_000,
            fclk_max_hz: 60_000_000,
        }
    }
}

/// All built-in families
pub fn all() -> [FlashFamily; 3] {
    [FlashFamily::rx62n(), FlashFamily::rx24t(), FlashFamily::rx64m()]
}

/// Find a built-in family by name (case-insensitive)
pub fn find(name: &str) -> Option<FlashFamily> {
    all()
        .into_iter()
        .find(|f| f.name.as_str().eq_ignore_ascii_case(name))
}
