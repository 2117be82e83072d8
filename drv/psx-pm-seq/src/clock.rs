// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Time sources for polling and settle delays.

use crate::bus::RegisterBus;
use crate::regs;

pub trait Clock {
    /// Current tick count. Only differences between readings are meaningful.
    fn now(&self) -> u64;

    fn ticks_per_us(&self) -> u32;

    fn us_to_ticks(&self, us: u32) -> u64 {
        u64::from(us) * u64::from(self.ticks_per_us())
    }

    /// Busy-waits for at least `us` microseconds.
    fn delay_us(&self, us: u32) {
        let start = self.now();
        let ticks = self.us_to_ticks(us);
        while self.now().wrapping_sub(start) < ticks {
            core::hint::spin_loop();
        }
    }
}

/// The platform's free-running 64-bit system counter.
pub struct SysCounter<B> {
    bus: B,
    ticks_per_us: u32,
}

impl<B: RegisterBus> SysCounter<B> {
    pub fn new(bus: B, ticks_per_us: u32) -> Self {
        Self { bus, ticks_per_us }
    }
}

impl<B: RegisterBus> Clock for SysCounter<B> {
    fn now(&self) -> u64 {
        // The halves are read separately; retry the low half if the high
        // half moved underneath us.
        loop {
            let hi = self.bus.read(regs::SYS_COUNTER_HI);
            let lo = self.bus.read(regs::SYS_COUNTER_LO);
            if self.bus.read(regs::SYS_COUNTER_HI) == hi {
                return (u64::from(hi) << 32) | u64::from(lo);
            }
        }
    }

    fn ticks_per_us(&self) -> u32 {
        self.ticks_per_us
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBus;

    #[test]
    fn counter_halves_combine() {
        let bus = SimBus::new();
        bus.poke(regs::SYS_COUNTER_HI, 0x12);
        bus.poke(regs::SYS_COUNTER_LO, 0x3456_789a);

        let counter = SysCounter::new(&bus, 100);
        assert_eq!(counter.now(), 0x12_3456_789a);
        assert_eq!(counter.us_to_ticks(7), 700);
    }
}
