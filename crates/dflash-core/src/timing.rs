//! Timeout budgets derived from the peripheral clock
//!
//! Worst-case operation times are stored per family as FCLK cycle counts.
//! At `start()` they are rescaled to microseconds with the configured FCLK,
//! with a 10% margin on top.

/// Polling step for program and blank check
pub const POLL_STEP_US: u32 = 1;
/// Polling step for block erase
pub const ERASE_POLL_STEP_US: u32 = 10;
/// Budget for FENTRYR to read back as disarmed after the exit key
pub const MODE_EXIT_TIMEOUT_US: u32 = 5;
/// Settle time after writing the P/E entry key
pub const MODE_CHANGE_DELAY_US: u32 = 10;
/// Budget for FRDY after a forced stop
pub const FORCED_STOP_TIMEOUT_US: u32 = 20;
/// Budget for a single DBFULL wait between payload pushes
pub const DBFULL_TIMEOUT_US: u32 = 10;

/// Margin applied on top of the cycle counts, as a ratio
const MARGIN_NUM: u64 = 11;
const MARGIN_DEN: u64 = 10;

/// Worst-case operation times in FCLK cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub struct Timing {
    /// Programming one program unit
    pub write_unit_cycles: u32,
    /// Erasing one block
    pub erase_block_cycles: u32,
    /// Blank-checking one block
    pub blank_check_cycles: u32,
}

/// Kind of FCU operation, selects the budget and polling step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Program one unit
    Program,
    /// Erase one block
    Erase,
    /// Blank-check one block
    BlankCheck,
}

impl Operation {
    /// Polling step matching the granularity of the operation
    pub const fn poll_step_us(self) -> u32 {
        match self {
            Operation::Erase => ERASE_POLL_STEP_US,
            Operation::Program | Operation::BlankCheck => POLL_STEP_US,
        }
    }

    /// Name for log messages
    pub const fn name(self) -> &'static str {
        match self {
            Operation::Program => "program",
            Operation::Erase => "erase",
            Operation::BlankCheck => "blank check",
        }
    }
}

/// Timeout budgets in microseconds, computed once at `start()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Budgets {
    /// Program one unit
    pub write_us: u32,
    /// Erase one block
    pub erase_us: u32,
    /// Blank-check one block
    pub blank_check_us: u32,
}

impl Budgets {
    /// Compute the budgets for `timing` at `fclk_hz`
    pub fn new(timing: &Timing, fclk_hz: u32) -> Self {
        Self {
            write_us: cycles_to_us(timing.write_unit_cycles, fclk_hz),
            erase_us: cycles_to_us(timing.erase_block_cycles, fclk_hz),
            blank_check_us: cycles_to_us(timing.blank_check_cycles, fclk_hz),
        }
    }

    /// Budget for the given operation
    pub const fn for_operation(&self, op: Operation) -> u32 {
        match op {
            Operation::Program => self.write_us,
            Operation::Erase => self.erase_us,
            Operation::BlankCheck => self.blank_check_us,
        }
    }
}

/// Convert an FCLK cycle count to microseconds, margin included
///
/// Rounds up and never returns less than one microsecond.
pub fn cycles_to_us(cycles: u32, fclk_hz: u32) -> u32 {
    if fclk_hz == 0 {
        return u32::MAX;
    }
    let num = cycles as u64 * MARGIN_NUM * 1_000_000;
    let den = MARGIN_DEN * fclk_hz as u64;
    let us = num.div_ceil(den).max(1);
    u32::try_from(us).unwrap_or(u32::MAX)
}

/// FCLK in whole MHz, rounded up, as the FCU expects it
pub fn fclk_mhz(fclk_hz: u32) -> u32 {
    fclk_hz.div_ceil(1_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycles_to_us() {
        // 100_000 cycles at 50 MHz = 2000 us, plus 10%
        assert_eq!(cycles_to_us(100_000, 50_000_000), 2200);
        // Rounds up
        assert_eq!(cycles_to_us(1, 50_000_000), 1);
        assert_eq!(cycles_to_us(0, 50_000_000), 1);
        // Slower clock means a longer budget for the same cycle count
        assert_eq!(cycles_to_us(100_000, 25_000_000), 4400);
    }

    #[test]
    fn test_zero_clock() {
        assert_eq!(cycles_to_us(1000, 0), u32::MAX);
    }

    #[test]
    fn test_budgets() {
        let timing = Timing {
            write_unit_cycles: 100_000,
            erase_block_cycles: 12_500_000,
            blank_check_cycles: 35_000,
        };
        let budgets = Budgets::new(&timing, 50_000_000);
        assert_eq!(budgets.write_us, 2200);
        assert_eq!(budgets.erase_us, 275_000);
        assert_eq!(budgets.blank_check_us, 770);
        assert_eq!(budgets.for_operation(Operation::Erase), 275_000);
    }

    #[test]
    fn test_fclk_mhz() {
        assert_eq!(fclk_mhz(50_000_000), 50);
        assert_eq!(fclk_mhz(32_500_000), 33);
    }
}
