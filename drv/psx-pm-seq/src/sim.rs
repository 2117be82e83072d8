// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host stand-ins for the register file and the system counter.
//!
//! [`SimBus`] is a sparse register file with just enough hardware behaviour
//! for the sequencer to make progress: interrupt groups behave like the real
//! ones (write-one-to-clear status, enable/disable writing the mask), and a
//! list of [`Rule`]s copies control bits into the status bits the sequencer
//! polls. Pulling bits out of the rules with [`SimBus::disconnect`] makes
//! them stick, which is how tests make a handshake time out.
//!
//! [`SimClock`] moves forward by a fixed step every time it's read, so every
//! poll loop terminates.

use crate::bus::RegisterBus;
use crate::clock::Clock;
use crate::regs::{self, ClusterReset, IrqGroup, IslandCtrl};
use crate::tables::{self, MemoryVariant};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

#[derive(Copy, Clone, Debug)]
pub enum Rule {
    /// The `mask` bits of `dst` track the same bits of `src`.
    Mirror { src: u32, dst: u32, mask: u32 },
    /// The `dst_mask` bits of `dst` are set while all of `src_mask` is set
    /// in `src`, and clear otherwise.
    Follow {
        src: u32,
        src_mask: u32,
        dst: u32,
        dst_mask: u32,
    },
}

#[derive(Default)]
struct State {
    regs: BTreeMap<u32, u32>,
    writes: Vec<(u32, u32)>,
    reads: BTreeMap<u32, usize>,
    rules: Vec<Rule>,
    stuck: BTreeMap<u32, u32>,
    groups: Vec<IrqGroup>,
}

impl State {
    fn get(&self, addr: u32) -> u32 {
        self.regs.get(&addr).copied().unwrap_or(0)
    }

    fn store(&mut self, addr: u32, value: u32) {
        let group = self.groups.iter().find(|g| {
            addr == g.status || addr == g.enable || addr == g.disable
        });
        match group.copied() {
            Some(g) if addr == g.status => {
                let v = self.get(addr) & !value;
                self.regs.insert(addr, v);
            }
            Some(g) if addr == g.enable => {
                let v = self.get(g.mask) & !value;
                self.regs.insert(g.mask, v);
            }
            Some(g) => {
                let v = self.get(g.mask) | value;
                self.regs.insert(g.mask, v);
            }
            None => {
                self.regs.insert(addr, value);
            }
        }
    }

    fn apply_rules(&mut self) {
        for i in 0..self.rules.len() {
            let (dst, mask, bits) = match self.rules[i] {
                Rule::Mirror { src, dst, mask } => {
                    (dst, mask, self.get(src) & mask)
                }
                Rule::Follow {
                    src,
                    src_mask,
                    dst,
                    dst_mask,
                } => {
                    let on = self.get(src) & src_mask == src_mask;
                    (dst, dst_mask, if on { dst_mask } else { 0 })
                }
            };
            let mask = mask & !self.stuck.get(&dst).copied().unwrap_or(0);
            let v = (self.get(dst) & !mask) | (bits & mask);
            self.regs.insert(dst, v);
        }
    }
}

const IRQ_GROUPS: [IrqGroup; 11] = [
    regs::REQ_PWRUP0,
    regs::REQ_PWRUP1,
    regs::REQ_PWRUP2,
    regs::REQ_PWRDWN0,
    regs::REQ_PWRDWN1,
    regs::REQ_PWRDWN2,
    regs::WAKEUP0,
    regs::WAKEUP1,
    regs::PWR_CTRL_IRQ,
    regs::REQ_SWRST,
    regs::PSM_IRQ,
];

/// Simulated register file.
pub struct SimBus {
    state: RefCell<State>,
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBus {
    /// A register file where everything reads as zero and only the
    /// interrupt groups have any behaviour.
    pub fn new() -> Self {
        let state = State {
            groups: IRQ_GROUPS.to_vec(),
            ..Default::default()
        };
        Self {
            state: RefCell::new(state),
        }
    }

    /// A register file that answers the sequencer the way the PSX does,
    /// starting from reset: cores and clusters held in reset with their
    /// clocks off, every request interrupt masked, and every island's status
    /// following its control bits.
    pub fn psx() -> Self {
        let bus = Self::new();

        for pc in tables::CORES.iter() {
            bus.add_rule(Rule::Mirror {
                src: pc.pwr_ctrl,
                dst: pc.pwr_ctrl + regs::STS_OFFSET,
                mask: IslandCtrl::GATES.bits(),
            });
            for pcil in [pc.core_pcil, pc.cluster_pcil] {
                bus.add_rule(Rule::Follow {
                    src: pcil + regs::PCIL_PREQ,
                    src_mask: regs::PREQ,
                    dst: pcil + regs::PCIL_PACTIVE,
                    dst_mask: regs::PACCEPT,
                });
            }
            let rst = bus.peek(pc.rst);
            let held = pc.warm_rst_mask | ClusterReset::CLUSTER.bits();
            bus.poke(pc.rst, rst | held);
            bus.poke(pc.pwr_ctrl, IslandCtrl::ISOLATION.bits());
        }

        for r in [tables::OCM_REGS, tables::TCM_REGS, tables::GEM_REGS] {
            bus.add_rule(Rule::Mirror {
                src: r.pwr_ctrl,
                dst: r.pwr_status,
                mask: !0,
            });
            bus.add_rule(Rule::Mirror {
                src: r.ret_ctrl,
                dst: r.ret_status,
                mask: !0,
            });
        }

        for mc in tables::MEMORY.iter() {
            if let MemoryVariant::Gem {
                rst_ctrl, rst_mask, ..
            } = mc.variant
            {
                bus.poke(rst_ctrl, rst_mask);
            }
        }

        for g in IRQ_GROUPS {
            bus.poke(g.mask, !0);
        }

        bus
    }

    /// Sets a register without logging it or running the rules.
    pub fn poke(&self, addr: u32, value: u32) {
        self.state.borrow_mut().regs.insert(addr, value);
    }

    /// Reads a register without counting the read.
    pub fn peek(&self, addr: u32) -> u32 {
        self.state.borrow().get(addr)
    }

    /// Every write since the last [`clear_log`](Self::clear_log), in order.
    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.state.borrow().writes.clone()
    }

    pub fn writes_to(&self, addr: u32) -> Vec<u32> {
        self.state
            .borrow()
            .writes
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn reads_of(&self, addr: u32) -> usize {
        self.state.borrow().reads.get(&addr).copied().unwrap_or(0)
    }

    pub fn clear_log(&self) {
        let mut st = self.state.borrow_mut();
        st.writes.clear();
        st.reads.clear();
    }

    pub fn add_rule(&self, rule: Rule) {
        self.state.borrow_mut().rules.push(rule);
    }

    /// Stops the rules from driving the `mask` bits of `dst`; they keep
    /// whatever value they have now.
    pub fn disconnect(&self, dst: u32, mask: u32) {
        *self.state.borrow_mut().stuck.entry(dst).or_default() |= mask;
    }
}

impl RegisterBus for SimBus {
    fn read(&self, addr: u32) -> u32 {
        let mut st = self.state.borrow_mut();
        *st.reads.entry(addr).or_default() += 1;
        st.get(addr)
    }

    fn write(&self, addr: u32, value: u32) {
        let mut st = self.state.borrow_mut();
        st.writes.push((addr, value));
        st.store(addr, value);
        st.apply_rules();
    }
}

/// A clock that advances one microsecond per reading, and by the full
/// amount on a delay.
pub struct SimClock {
    ticks: Cell<u64>,
    delayed_us: Cell<u64>,
    ticks_per_us: u32,
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            ticks: Cell::new(0),
            delayed_us: Cell::new(0),
            ticks_per_us: tables::SYS_COUNTER_TICKS_PER_US,
        }
    }

    /// Current tick count, without advancing.
    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }

    /// How far each reading moves the clock.
    pub fn step(&self) -> u64 {
        u64::from(self.ticks_per_us)
    }

    /// Total time spent in [`Clock::delay_us`].
    pub fn delayed_us(&self) -> u64 {
        self.delayed_us.get()
    }
}

impl Clock for SimClock {
    fn now(&self) -> u64 {
        let t = self.ticks.get();
        self.ticks.set(t + self.step());
        t
    }

    fn ticks_per_us(&self) -> u32 {
        self.ticks_per_us
    }

    fn delay_us(&self, us: u32) {
        self.delayed_us.set(self.delayed_us.get() + u64::from(us));
        self.ticks.set(self.ticks.get() + self.us_to_ticks(us));
    }
}
