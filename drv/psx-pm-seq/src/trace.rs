// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event ring for the sequencer.
//!
//! The sequencer has nowhere to print to, so everything worth knowing about
//! after the fact (timeouts, soft retention mismatches, rejected domain ids,
//! interrupt handler failures) goes into a fixed-size ring of entries owned
//! by the sequencer context. A debugger can dump it; tests read it through
//! [`Ringbuf::iter`].
//!
//! An entry that repeats the most recent one (same source line and payload)
//! bumps that entry's `count` rather than taking a new slot, so a tight loop
//! hitting the same event doesn't wipe out the history.
//!
//! Ported from the Hubris `ringbuf` crate, keeping its entry layout (line,
//! generation, count, payload). Unlike that crate, the ring here is an
//! ordinary owned value rather than a static.

#[derive(Debug, Copy, Clone)]
pub struct RingbufEntry<T: Copy + PartialEq> {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    pub payload: T,
}

#[derive(Debug)]
pub struct Ringbuf<T: Copy + PartialEq, const N: usize> {
    last: Option<usize>,
    buffer: [RingbufEntry<T>; N],
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, N> {
    pub const fn new(init: T) -> Self {
        Self {
            last: None,
            buffer: [RingbufEntry {
                line: 0,
                generation: 0,
                count: 0,
                payload: init,
            }; N],
        }
    }

    /// Records `payload`. A repeat of the newest entry only bumps its
    /// count, until the count would overflow.
    pub fn entry(&mut self, line: u16, payload: T) {
        if let Some(ent) = self.last.map(|i| &mut self.buffer[i]) {
            if ent.line == line && ent.payload == payload {
                if let Some(count) = ent.count.checked_add(1) {
                    ent.count = count;
                    return;
                }
            }
        }

        let ndx = self.last.map_or(0, |i| (i + 1) % N);
        let ent = &mut self.buffer[ndx];
        ent.generation = ent.generation.wrapping_add(1);
        ent.line = line;
        ent.count = 1;
        ent.payload = payload;
        self.last = Some(ndx);
    }

    /// The most recently recorded entry.
    pub fn last(&self) -> Option<&RingbufEntry<T>> {
        self.last.and_then(|i| self.buffer.get(i))
    }

    /// Recorded entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &RingbufEntry<T>> {
        let split = self.last.map_or(0, |i| i + 1).min(N);
        let (head, tail) = self.buffer.split_at(split);
        tail.iter().chain(head.iter()).filter(|e| e.count != 0)
    }
}
