//! Register access abstraction
//!
//! All hardware access (device registers and the memory shared with the
//! application processors) goes through [`RegisterBus`]. The firmware uses
//! [`Mmio`]; host tests substitute a simulated register file.

use core::sync::atomic::{fence, Ordering};
use volatile::Volatile;

/// 32-bit load/store access to a physical address space.
pub trait RegisterBus {
    fn read32(&self, addr: usize) -> u32;
    fn write32(&self, addr: usize, value: u32);

    /// Order all prior writes before any later write (doorbell release).
    fn fence_release(&self) {
        fence(Ordering::Release);
    }

    /// Order a flag read before any later read (doorbell acquire).
    fn fence_acquire(&self) {
        fence(Ordering::Acquire);
    }

    fn set32(&self, addr: usize, bits: u32) {
        self.write32(addr, self.read32(addr) | bits);
    }

    fn clr32(&self, addr: usize, bits: u32) {
        self.write32(addr, self.read32(addr) & !bits);
    }

    fn clrset32(&self, addr: usize, clear: u32, set: u32) {
        self.write32(addr, (self.read32(addr) & !clear) | set);
    }

    /// True if any of `mask` is set.
    fn get32(&self, addr: usize, mask: u32) -> bool {
        self.read32(addr) & mask != 0
    }

    /// Spin until all bits of `mask` read as set.
    fn poll32(&self, addr: usize, mask: u32) {
        while self.read32(addr) & mask != mask {
            core::hint::spin_loop();
        }
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for &B {
    fn read32(&self, addr: usize) -> u32 {
        (**self).read32(addr)
    }

    fn write32(&self, addr: usize, value: u32) {
        (**self).write32(addr, value)
    }

    fn fence_release(&self) {
        (**self).fence_release()
    }

    fn fence_acquire(&self) {
        (**self).fence_acquire()
    }
}

/// Memory-mapped register access on the real hardware.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mmio;

impl RegisterBus for Mmio {
    fn read32(&self, addr: usize) -> u32 {
        // SAFETY: addresses come from the platform device map and point at
        // 32-bit aligned device registers or shared SRAM.
        unsafe { (*(addr as *const Volatile<u32>)).read() }
    }

    fn write32(&self, addr: usize, value: u32) {
        // SAFETY: see `read32`.
        unsafe { (*(addr as *mut Volatile<u32>)).write(value) }
    }
}

/// Single-bit mask.
pub const fn bit(n: u32) -> u32 {
    1 << n
}

/// Contiguous mask of bits `high..=low`.
pub const fn genmask(high: u32, low: u32) -> u32 {
    (u32::MAX >> (31 - high)) & (u32::MAX << low)
}
