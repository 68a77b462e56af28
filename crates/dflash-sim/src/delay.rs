use dflash_core::Delay;

/// Delay source that only accounts time
///
/// Nothing sleeps. The accumulated total lets tests check how long the
/// driver would have waited on real hardware.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimDelay {
    total_us: u64,
    calls: u64,
}

impl SimDelay {
    /// Create a delay with zero elapsed time
    pub fn new() -> Self {
        Self::default()
    }

    /// Total microseconds requested so far
    pub fn total_us(&self) -> u64 {
        self.total_us
    }

    /// Number of `delay_us` calls so far
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Reset the counters
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Delay for SimDelay {
    fn delay_us(&mut self, us: u32) {
        self.total_us += us as u64;
        self.calls += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates() {
        let mut delay = SimDelay::new();
        delay.delay_us(10);
        delay.delay_us(5);
        assert_eq!(delay.total_us(), 15);
        assert_eq!(delay.calls(), 2);

        delay.reset();
        assert_eq!(delay.total_us(), 0);
    }
}
