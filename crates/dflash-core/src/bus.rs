//! Hardware access traits
//!
//! The driver never dereferences an address itself. Register and array
//! accesses go through [`Mmio`], and every busy-wait goes through [`Delay`],
//! so the same driver code serves real silicon and the emulator.

/// Memory-mapped register access
///
/// Addresses are absolute bus addresses. Implementations must perform each
/// access exactly once and in program order (volatile semantics). The driver
/// assumes accesses are already synchronized with the bus.
pub trait Mmio {
    /// Read an 8-bit value
    fn read8(&mut self, addr: u32) -> u8;
    /// Read a 16-bit value
    fn read16(&mut self, addr: u32) -> u16;
    /// Read a 32-bit value
    fn read32(&mut self, addr: u32) -> u32;
    /// Write an 8-bit value
    fn write8(&mut self, addr: u32, value: u8);
    /// Write a 16-bit value
    fn write16(&mut self, addr: u32, value: u16);
    /// Write a 32-bit value
    fn write32(&mut self, addr: u32, value: u32);
}

/// Microsecond delay source used to pace polling loops
pub trait Delay {
    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}

impl<T: Mmio + ?Sized> Mmio for &mut T {
    fn read8(&mut self, addr: u32) -> u8 {
        (**self).read8(addr)
    }

    fn read16(&mut self, addr: u32) -> u16 {
        (**self).read16(addr)
    }

    fn read32(&mut self, addr: u32) -> u32 {
        (**self).read32(addr)
    }

    fn write8(&mut self, addr: u32, value: u8) {
        (**self).write8(addr, value)
    }

    fn write16(&mut self, addr: u32, value: u16) {
        (**self).write16(addr, value)
    }

    fn write32(&mut self, addr: u32, value: u32) {
        (**self).write32(addr, value)
    }
}

impl<T: Delay + ?Sized> Delay for &mut T {
    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

/// Volatile access to the physical address space
///
/// For use on the target itself, where the register map addresses are the
/// real peripheral addresses.
#[derive(Debug)]
pub struct RawMmio {
    _private: (),
}

impl RawMmio {
    /// Create a raw accessor
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - Every address the driver will use is valid MMIO or memory
    /// - No other code drives the flash controller concurrently
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl Mmio for RawMmio {
    #[inline]
    fn read8(&mut self, addr: u32) -> u8 {
        unsafe { core::ptr::read_volatile(addr as usize as *const u8) }
    }

    #[inline]
    fn read16(&mut self, addr: u32) -> u16 {
        debug_assert!(addr & 1 == 0, "unaligned 16-bit read");
        unsafe { core::ptr::read_volatile(addr as usize as *const u16) }
    }

    #[inline]
    fn read32(&mut self, addr: u32) -> u32 {
        debug_assert!(addr & 3 == 0, "unaligned 32-bit read");
        unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
    }

    #[inline]
    fn write8(&mut self, addr: u32, value: u8) {
        unsafe { core::ptr::write_volatile(addr as usize as *mut u8, value) }
    }

    #[inline]
    fn write16(&mut self, addr: u32, value: u16) {
        debug_assert!(addr & 1 == 0, "unaligned 16-bit write");
        unsafe { core::ptr::write_volatile(addr as usize as *mut u16, value) }
    }

    #[inline]
    fn write32(&mut self, addr: u32, value: u32) {
        debug_assert!(addr & 3 == 0, "unaligned 32-bit write");
        unsafe { core::ptr::write_volatile(addr as usize as *mut u32, value) }
    }
}

/// Delay backed by `std::thread::sleep`
#[cfg(feature = "std")]
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

#[cfg(feature = "std")]
impl Delay for StdDelay {
    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(std::time::Duration::from_micros(us as u64));
    }
}
