// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded register polling.
//!
//! Every wait in the sequencer is one of these: read a register, test it,
//! and give up once the timeout has fully elapsed. There is no retry; a
//! timeout goes straight back to the caller.

use crate::bus::RegisterBus;
use crate::clock::Clock;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PollTimeout;

/// Waits for every bit of `mask` to be set in `addr`.
pub fn poll_for_mask(
    bus: &impl RegisterBus,
    clock: &impl Clock,
    addr: u32,
    mask: u32,
    timeout_us: u32,
) -> Result<(), PollTimeout> {
    poll(bus, clock, addr, timeout_us, |v| v & mask == mask)
}

/// Waits for every bit of `mask` to be clear in `addr`.
pub fn poll_for_zero(
    bus: &impl RegisterBus,
    clock: &impl Clock,
    addr: u32,
    mask: u32,
    timeout_us: u32,
) -> Result<(), PollTimeout> {
    poll(bus, clock, addr, timeout_us, |v| v & mask == 0)
}

fn poll(
    bus: &impl RegisterBus,
    clock: &impl Clock,
    addr: u32,
    timeout_us: u32,
    done: impl Fn(u32) -> bool,
) -> Result<(), PollTimeout> {
    let limit = clock.us_to_ticks(timeout_us);
    let start = clock.now();
    loop {
        if done(bus.read(addr)) {
            return Ok(());
        }
        if clock.now().wrapping_sub(start) >= limit {
            return Err(PollTimeout);
        }
        core::hint::spin_loop();
    }
}
