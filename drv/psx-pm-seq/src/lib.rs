// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power sequencer for the PSX cores and memory islands.
//!
//! Everything lives in a [`PowerSequencer`], which owns the register bus,
//! the time source, and the little runtime state the sequencing needs
//! (which clusters have had their handshake run, logical memory bank
//! states, stored resume addresses, domain use counts, and the event ring).
//! The per-instance register layout is in [`tables`] and never changes.
//!
//! Entry points:
//!
//! - `direct_power_up` / `direct_power_down` for cores, by node id.
//! - `send_island_power_up_request` / `send_island_power_down_request` for
//!   memory islands, by node id.
//! - `request_power` / `release_power` for use-counted access to the
//!   islands.
//! - `handle_interrupt` from the power-management interrupt vector.
//!
//! All of these block until the hardware has answered or a timeout has run
//! out. Nothing is retried and nothing is rolled back: a sequence that fails
//! part way leaves the steps before the failure in place, and says which
//! handshake timed out.

#![cfg_attr(target_os = "none", no_std)]

use drv_psx_pm_api::{Cluster, Core, MemoryBank, PmError};
use enum_map::EnumMap;

pub use drv_psx_pm_api as api;

/// Records an event in a sequencer's ring, tagged with the source line.
macro_rules! trace {
    ($seq:expr, $payload:expr) => {{
        let p = $payload;
        $seq.trace.entry(line!() as u16, p);
    }};
}

pub mod bus;
pub mod clock;
mod cpu;
pub mod domain;
mod irq;
mod memory;
pub mod poll;
pub mod regs;
pub mod tables;
pub mod trace;

use bus::RegisterBus;
use clock::Clock;
use domain::{
    DomainTree, IslandControl, PowerDomainDescriptor, PowerNode, Release,
};
use trace::Ringbuf;

cfg_if::cfg_if! {
    if #[cfg(target_os = "none")] {
        use bus::Mmio;
        use clock::SysCounter;

        /// The sequencer wired to the PSM's own registers and counter.
        pub type Platform = PowerSequencer<Mmio, SysCounter<Mmio>>;

        pub fn platform() -> Platform {
            PowerSequencer::new(
                Mmio,
                SysCounter::new(Mmio, tables::SYS_COUNTER_TICKS_PER_US),
            )
        }
    } else {
        pub mod sim;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trace {
    None,
    ClusterUp(Cluster),
    ClusterDown(Cluster),
    StageTimeout { core: Core, stage: u8 },
    ResumeAddr { core: Core, low: u32, high: u32 },
    CoreUp(Core),
    CoreDown(Core),
    CoreAlreadyUp(Core),
    CoreAlreadyDown(Core),
    CoreFailed(Core, PmError),
    LockstepSibling(MemoryBank),
    MemoryUp(MemoryBank),
    MemoryDown(MemoryBank),
    RetentionEntered(MemoryBank),
    RetentionNotReflected(MemoryBank),
    MemoryFailed(MemoryBank, PmError),
    InvalidDomain(u32),
    UnusedRelease(PowerNode),
    ParentReleaseFailed(PowerNode, PmError),
    Irq { irq: u32, pending: u32 },
    PowerUpRequest(Core),
    PowerDownRequest(Core),
    PowerDownSuperseded(Core),
    MemoryUpRequest(MemoryBank),
    MemoryDownRequest(MemoryBank),
    MemoryDownSuperseded(MemoryBank),
    BankHandlerFailed(MemoryBank, PmError),
    Wake(Core),
    PowerControlRequest(Core),
    HandlerFailed(Core, PmError),
}

pub const TRACE_DEPTH: usize = 64;

/// Logical state of a memory bank, as last left by the sequencer.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum BankState {
    /// Untouched since startup.
    #[default]
    Default,
    On,
    Down,
    /// Contents held; active circuitry off.
    Retained,
}

pub struct PowerSequencer<B: RegisterBus, C: Clock> {
    bus: B,
    clock: C,
    cluster_configured: EnumMap<Cluster, bool>,
    resume_addr: EnumMap<Core, u64>,
    bank_state: EnumMap<MemoryBank, BankState>,
    domains: DomainTree,
    trace: Ringbuf<Trace, TRACE_DEPTH>,
}

impl<B: RegisterBus, C: Clock> PowerSequencer<B, C> {
    /// State starts out as after a reset: no cluster configured, every bank
    /// untouched, every domain unused.
    pub fn new(bus: B, clock: C) -> Self {
        Self {
            bus,
            clock,
            cluster_configured: EnumMap::default(),
            resume_addr: EnumMap::default(),
            bank_state: EnumMap::default(),
            domains: DomainTree::new(),
            trace: Ringbuf::new(Trace::None),
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn cluster_configured(&self, cluster: Cluster) -> bool {
        self.cluster_configured[cluster]
    }

    pub fn bank_state(&self, bank: MemoryBank) -> BankState {
        self.bank_state[bank]
    }

    pub fn resume_addr(&self, core: Core) -> u64 {
        self.resume_addr[core]
    }

    pub fn domain(&self, node: PowerNode) -> &PowerDomainDescriptor {
        self.domains.get(node)
    }

    pub fn trace(&self) -> &Ringbuf<Trace, TRACE_DEPTH> {
        &self.trace
    }

    fn wait_for_mask(
        &self,
        addr: u32,
        mask: u32,
        timeout_us: u32,
        err: PmError,
    ) -> Result<(), PmError> {
        poll::poll_for_mask(&self.bus, &self.clock, addr, mask, timeout_us)
            .map_err(|_| err)
    }

    fn wait_for_zero(
        &self,
        addr: u32,
        mask: u32,
        timeout_us: u32,
        err: PmError,
    ) -> Result<(), PmError> {
        poll::poll_for_zero(&self.bus, &self.clock, addr, mask, timeout_us)
            .map_err(|_| err)
    }

    fn reject(&mut self, domain_id: u32) -> Result<(), PmError> {
        trace!(self, Trace::InvalidDomain(domain_id));
        Err(PmError::InvalidParam)
    }

    /// Powers up a core and starts it at `resume_addr`.
    pub fn direct_power_up(
        &mut self,
        domain_id: u32,
        resume_addr: u64,
    ) -> Result<(), PmError> {
        match Core::from_node_id(domain_id) {
            Some(core) => self.power_up_core_direct(core, resume_addr),
            None => self.reject(domain_id),
        }
    }

    pub fn direct_power_down(&mut self, domain_id: u32) -> Result<(), PmError> {
        match Core::from_node_id(domain_id) {
            Some(core) => self.power_down_core_direct(core),
            None => self.reject(domain_id),
        }
    }

    pub fn send_island_power_up_request(
        &mut self,
        domain_id: u32,
    ) -> Result<(), PmError> {
        match MemoryBank::from_node_id(domain_id) {
            Some(bank) => self.power_up_memory(bank),
            None => self.reject(domain_id),
        }
    }

    pub fn send_island_power_down_request(
        &mut self,
        domain_id: u32,
    ) -> Result<(), PmError> {
        match MemoryBank::from_node_id(domain_id) {
            Some(bank) => self.power_down_memory(bank),
            None => self.reject(domain_id),
        }
    }

    /// Takes a use on a power domain, powering it up on first use.
    pub fn request_power(&mut self, node: PowerNode) -> Result<(), PmError> {
        let mut domains = core::mem::take(&mut self.domains);
        let r = domains.request(node, self);
        self.domains = domains;
        r
    }

    /// Gives back a use on a power domain, powering it down on last use.
    /// Releasing a domain nobody uses changes nothing.
    pub fn release_power(&mut self, node: PowerNode) -> Result<(), PmError> {
        let mut domains = core::mem::take(&mut self.domains);
        let r = domains.release(node, self);
        self.domains = domains;
        if r == Ok(Release::NotInUse) {
            trace!(self, Trace::UnusedRelease(node));
        }
        r.map(|_| ())
    }
}

impl<B: RegisterBus, C: Clock> IslandControl for PowerSequencer<B, C> {
    fn power_up(&mut self, node: PowerNode) -> Result<(), PmError> {
        match node {
            // The PSM runs from the low-power domain; it's up if we are.
            PowerNode::Lpd => Ok(()),
            PowerNode::Island(bank) => self.power_up_memory(bank),
        }
    }

    fn power_down(&mut self, node: PowerNode) -> Result<(), PmError> {
        match node {
            PowerNode::Lpd => Ok(()),
            PowerNode::Island(bank) => self.power_down_memory(bank),
        }
    }

    fn release_failed(&mut self, node: PowerNode, err: PmError) {
        trace!(self, Trace::ParentReleaseFailed(node, err));
    }
}
