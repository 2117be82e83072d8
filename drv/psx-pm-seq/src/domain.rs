// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Use-counted power domains.
//!
//! Each memory island hangs off the low-power domain. Requesting an island
//! takes a use on it; the first use takes a use on the parent and then
//! powers the island. Releasing the last use powers the island off and
//! hands the parent's use back. A domain is only switched off when nothing
//! uses it and none of its children are on.
//!
//! The tree does no register access itself. Transitions that need hardware
//! go through an [`IslandControl`].

use drv_psx_pm_api::{MemoryBank, PmError};
use enum_map::Enum;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PowerNode {
    /// Low-power domain; parent of every island.
    Lpd,
    Island(MemoryBank),
}

pub const NODE_COUNT: usize = 1 + <MemoryBank as Enum>::LENGTH;

impl PowerNode {
    fn index(self) -> usize {
        match self {
            PowerNode::Lpd => 0,
            PowerNode::Island(b) => 1 + b.into_usize(),
        }
    }

    fn from_index(i: usize) -> Self {
        match i {
            0 => PowerNode::Lpd,
            i => PowerNode::Island(MemoryBank::from_usize(i - 1)),
        }
    }

    pub fn parent(self) -> Option<PowerNode> {
        match self {
            PowerNode::Lpd => None,
            PowerNode::Island(_) => Some(PowerNode::Lpd),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PowerState {
    Off,
    On,
}

#[derive(Copy, Clone, Debug)]
pub struct PowerDomainDescriptor {
    pub node: PowerNode,
    pub parent: Option<PowerNode>,
    pub use_count: u16,
    /// Uses this domain has taken on its parent and not yet handed back.
    pub pending_parent_use: u16,
    pub pwr_up_latency_us: u32,
    pub pwr_dn_latency_us: u32,
    pub state: PowerState,
}

const LPD_LATENCY_US: u32 = 100;
const ISLAND_LATENCY_US: u32 = 10;

/// What a release did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Release {
    /// There was no use to give back; nothing changed.
    NotInUse,
    StillInUse,
    PoweredOff,
}

/// Hardware side of a domain transition.
pub trait IslandControl {
    fn power_up(&mut self, node: PowerNode) -> Result<(), PmError>;
    fn power_down(&mut self, node: PowerNode) -> Result<(), PmError>;

    /// Called when handing a parent's use back after a failed power-up
    /// itself fails. The power-up's own error is what gets returned.
    fn release_failed(&mut self, _node: PowerNode, _err: PmError) {}
}

#[derive(Debug)]
pub struct DomainTree {
    nodes: [PowerDomainDescriptor; NODE_COUNT],
}

impl Default for DomainTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainTree {
    pub fn new() -> Self {
        let nodes = core::array::from_fn(|i| {
            let node = PowerNode::from_index(i);
            let latency = match node {
                PowerNode::Lpd => LPD_LATENCY_US,
                PowerNode::Island(_) => ISLAND_LATENCY_US,
            };
            PowerDomainDescriptor {
                node,
                parent: node.parent(),
                use_count: 0,
                pending_parent_use: 0,
                pwr_up_latency_us: latency,
                pwr_dn_latency_us: latency,
                state: PowerState::Off,
            }
        });
        Self { nodes }
    }

    pub fn get(&self, node: PowerNode) -> &PowerDomainDescriptor {
        &self.nodes[node.index()]
    }

    fn get_mut(&mut self, node: PowerNode) -> &mut PowerDomainDescriptor {
        &mut self.nodes[node.index()]
    }

    fn children_off(&self, node: PowerNode) -> bool {
        self.nodes
            .iter()
            .filter(|d| d.parent == Some(node))
            .all(|d| d.state == PowerState::Off)
    }

    /// Takes a use on `node`, powering it (and its ancestors) if this is the
    /// first.
    pub fn request(
        &mut self,
        node: PowerNode,
        hw: &mut impl IslandControl,
    ) -> Result<(), PmError> {
        let d = self.get_mut(node);
        if d.use_count > 0 {
            d.use_count = d.use_count.checked_add(1).ok_or(PmError::Failure)?;
            return Ok(());
        }

        // A domain whose last power-down failed is still on and still holds
        // its parent.
        let take_parent = d.parent.filter(|_| d.pending_parent_use == 0);
        if let Some(p) = take_parent {
            self.request(p, hw)?;
            self.get_mut(node).pending_parent_use += 1;
        }

        if self.get(node).state == PowerState::Off {
            if let Err(e) = hw.power_up(node) {
                if let Some(p) = take_parent {
                    self.get_mut(node).pending_parent_use -= 1;
                    // The parent was fine before we asked; hand its use back
                    // and report our own failure.
                    if let Err(pe) = self.release(p, hw) {
                        hw.release_failed(p, pe);
                    }
                }
                return Err(e);
            }
        }

        let d = self.get_mut(node);
        d.state = PowerState::On;
        d.use_count = 1;
        Ok(())
    }

    /// Gives back a use on `node`, powering it off if that was the last one
    /// and nothing below it is still on.
    pub fn release(
        &mut self,
        node: PowerNode,
        hw: &mut impl IslandControl,
    ) -> Result<Release, PmError> {
        let d = self.get_mut(node);
        if d.use_count == 0 {
            return Ok(Release::NotInUse);
        }
        d.use_count -= 1;
        if d.use_count > 0 || !self.children_off(node) {
            return Ok(Release::StillInUse);
        }

        hw.power_down(node)?;

        let d = self.get_mut(node);
        d.state = PowerState::Off;
        if let Some(p) = d.parent {
            if d.pending_parent_use > 0 {
                d.pending_parent_use -= 1;
                self.release(p, hw)?;
            }
        }
        Ok(Release::PoweredOff)
    }

    /// Time to bring `node` up from where things are now: its own latency,
    /// plus that of every ancestor that is currently off.
    pub fn wake_latency(&self, node: PowerNode) -> u32 {
        let mut total = 0;
        let mut next = Some(node);
        while let Some(n) = next {
            let d = self.get(n);
            if d.state == PowerState::On {
                break;
            }
            total += d.pwr_up_latency_us;
            next = d.parent;
        }
        total
    }
}
