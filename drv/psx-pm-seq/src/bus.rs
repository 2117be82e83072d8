// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Register access.

/// 32-bit register access by physical address.
///
/// Methods take `&self`: a bus is a handle onto device state, not the state
/// itself.
pub trait RegisterBus {
    fn read(&self, addr: u32) -> u32;
    fn write(&self, addr: u32, value: u32);

    /// Replaces the bits of `addr` selected by `mask` with those of `value`.
    fn rmw(&self, addr: u32, mask: u32, value: u32) {
        let v = self.read(addr);
        self.write(addr, (v & !mask) | (value & mask));
    }

    fn set_bits(&self, addr: u32, mask: u32) {
        self.rmw(addr, mask, mask);
    }

    fn clear_bits(&self, addr: u32, mask: u32) {
        self.rmw(addr, mask, 0);
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for &B {
    fn read(&self, addr: u32) -> u32 {
        (**self).read(addr)
    }

    fn write(&self, addr: u32, value: u32) {
        (**self).write(addr, value)
    }
}

/// Volatile access to the PSM's own address space.
#[derive(Copy, Clone, Debug, Default)]
pub struct Mmio;

impl RegisterBus for Mmio {
    fn read(&self, addr: u32) -> u32 {
        // Safety: addresses come from the register map, which only names
        // aligned device registers.
        unsafe { (addr as usize as *const u32).read_volatile() }
    }

    fn write(&self, addr: u32, value: u32) {
        // Safety: as for `read`.
        unsafe { (addr as usize as *mut u32).write_volatile(value) }
    }
}
