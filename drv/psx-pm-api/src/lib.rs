// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! API crate for the PSX power-management sequencer.
//!
//! This names the things the sequencer can power up and down (application
//! and real-time cores, their clusters, and the memory islands), defines the
//! platform node-id encoding callers use to refer to them, and defines the
//! error codes every sequencing operation returns.

#![no_std]

use enum_map::Enum;
use num_derive::FromPrimitive;
use static_assertions::const_assert_eq;

pub use num_traits::FromPrimitive;

pub mod node;

/// Errors returned by sequencing operations.
///
/// The discriminants are the status codes handed back across the C-style
/// surface; `Failure` and `InvalidParam` keep the platform's generic codes.
#[derive(Copy, Clone, Debug, FromPrimitive, Eq, PartialEq)]
#[repr(u32)]
pub enum PmError {
    Failure = 1,
    InvalidParam = 15,

    /// The cluster-level PACCEPT never arrived.
    ClusterAcceptTimeout = 0x100,
    /// The core-level PACCEPT never arrived.
    CoreAcceptTimeout,
    /// A power-up stage was not acknowledged.
    StageAckTimeout,
    /// Power gates did not clear after being removed.
    PowerDownAckTimeout,
    /// The core kept its handshake active after being asked to stop.
    ActiveTimeout,
    /// A memory bank's power status did not follow its power control.
    MemoryAckTimeout,
    /// Retention stayed engaged after being cleared.
    RetentionDisableTimeout,
    /// The status shadow did not reflect a requested retention entry.
    RetentionNotEntered,
}

pub const STATUS_SUCCESS: u32 = 0;

impl From<PmError> for u32 {
    fn from(e: PmError) -> Self {
        e as u32
    }
}

/// Flattens a sequencing result into a status code.
pub fn status_code(result: Result<(), PmError>) -> u32 {
    match result {
        Ok(()) => STATUS_SUCCESS,
        Err(e) => e.into(),
    }
}

/// Recovers a result from a status code. Codes we don't recognize come back
/// as `Failure`.
pub fn status_result(code: u32) -> Result<(), PmError> {
    match code {
        STATUS_SUCCESS => Ok(()),
        c => Err(PmError::from_u32(c).unwrap_or(PmError::Failure)),
    }
}

const APU_CORES: usize = 8;
const RPU_CORES: usize = 10;
const TCM_BANKS: usize = 10;
const OCM_BANKS: usize = 16;
const GEM_BANKS: usize = 2;

/// A physical processor core.
///
/// Cores are laid out cluster by cluster, two per cluster, application
/// clusters first.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Enum)]
pub enum Core {
    Acpu0_0,
    Acpu0_1,
    Acpu1_0,
    Acpu1_1,
    Acpu2_0,
    Acpu2_1,
    Acpu3_0,
    Acpu3_1,
    RpuA_0,
    RpuA_1,
    RpuB_0,
    RpuB_1,
    RpuC_0,
    RpuC_1,
    RpuD_0,
    RpuD_1,
    RpuE_0,
    RpuE_1,
}

const_assert_eq!(APU_CORES + RPU_CORES, <Core as Enum>::LENGTH);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CoreClass {
    Application,
    RealTime,
}

/// A group of cores sharing one cluster-level power handshake.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Enum)]
pub enum Cluster {
    Apu0,
    Apu1,
    Apu2,
    Apu3,
    RpuA,
    RpuB,
    RpuC,
    RpuD,
    RpuE,
}

pub const CORES_PER_CLUSTER: usize = 2;

const_assert_eq!(
    <Cluster as Enum>::LENGTH * CORES_PER_CLUSTER,
    <Core as Enum>::LENGTH
);

/// A gateable memory island.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Enum)]
pub enum MemoryBank {
    TcmA_0,
    TcmA_1,
    TcmB_0,
    TcmB_1,
    TcmC_0,
    TcmC_1,
    TcmD_0,
    TcmD_1,
    TcmE_0,
    TcmE_1,
    Ocm0_0,
    Ocm0_1,
    Ocm0_2,
    Ocm0_3,
    Ocm1_0,
    Ocm1_1,
    Ocm1_2,
    Ocm1_3,
    Ocm2_0,
    Ocm2_1,
    Ocm2_2,
    Ocm2_3,
    Ocm3_0,
    Ocm3_1,
    Ocm3_2,
    Ocm3_3,
    Gem0,
    Gem1,
}

const_assert_eq!(
    TCM_BANKS + OCM_BANKS + GEM_BANKS,
    <MemoryBank as Enum>::LENGTH
);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MemoryKind {
    /// Tightly-coupled memory of a real-time core.
    Tcm,
    /// Shared on-chip memory.
    Ocm,
    /// Network-interface memory.
    Gem,
}

/// Anything the sequencer accepts a direct request for.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Domain {
    Core(Core),
    Memory(MemoryBank),
}

use node::Span;

const CORE_SPANS: [Span; 2] = [
    Span {
        ty: node::TYPE_APU,
        index_base: 3,
        first: 0,
        len: APU_CORES,
    },
    Span {
        ty: node::TYPE_RPU,
        index_base: 5,
        first: APU_CORES,
        len: RPU_CORES,
    },
];

const BANK_SPANS: [Span; 3] = [
    Span {
        ty: node::TYPE_TCM,
        index_base: 0,
        first: 0,
        len: TCM_BANKS,
    },
    Span {
        ty: node::TYPE_OCM,
        index_base: 0,
        first: TCM_BANKS,
        len: OCM_BANKS,
    },
    Span {
        ty: node::TYPE_GEM,
        index_base: 0,
        first: TCM_BANKS + OCM_BANKS,
        len: GEM_BANKS,
    },
];

impl Core {
    pub fn iter() -> impl Iterator<Item = Core> {
        (0..Self::LENGTH).map(Self::from_usize)
    }

    pub fn class(self) -> CoreClass {
        if self.into_usize() < APU_CORES {
            CoreClass::Application
        } else {
            CoreClass::RealTime
        }
    }

    pub fn cluster(self) -> Cluster {
        Cluster::from_usize(self.into_usize() / CORES_PER_CLUSTER)
    }

    /// Position of this core within its cluster.
    pub fn slot(self) -> usize {
        self.into_usize() % CORES_PER_CLUSTER
    }

    pub fn node_id(self) -> u32 {
        node::encode(
            self.into_usize(),
            node::CLASS_DEVICE,
            node::SUBCLASS_CORE,
            &CORE_SPANS,
        )
    }

    pub fn from_node_id(id: u32) -> Option<Self> {
        node::decode(id, node::CLASS_DEVICE, node::SUBCLASS_CORE, &CORE_SPANS)
            .map(Self::from_usize)
    }
}

impl Cluster {
    pub fn iter() -> impl Iterator<Item = Cluster> {
        (0..Self::LENGTH).map(Self::from_usize)
    }

    pub fn cores(self) -> [Core; CORES_PER_CLUSTER] {
        let first = self.into_usize() * CORES_PER_CLUSTER;
        [Core::from_usize(first), Core::from_usize(first + 1)]
    }
}

impl MemoryBank {
    pub fn iter() -> impl Iterator<Item = MemoryBank> {
        (0..Self::LENGTH).map(Self::from_usize)
    }

    pub fn kind(self) -> MemoryKind {
        match self.into_usize() {
            i if i < TCM_BANKS => MemoryKind::Tcm,
            i if i < TCM_BANKS + OCM_BANKS => MemoryKind::Ocm,
            _ => MemoryKind::Gem,
        }
    }

    /// The real-time core a TCM bank belongs to. TCM banks are numbered the
    /// same way as the real-time cores.
    pub fn owner(self) -> Option<Core> {
        match self.kind() {
            MemoryKind::Tcm => {
                Some(Core::from_usize(APU_CORES + self.into_usize()))
            }
            _ => None,
        }
    }

    pub fn node_id(self) -> u32 {
        node::encode(
            self.into_usize(),
            node::CLASS_POWER,
            node::SUBCLASS_ISLAND,
            &BANK_SPANS,
        )
    }

    pub fn from_node_id(id: u32) -> Option<Self> {
        node::decode(id, node::CLASS_POWER, node::SUBCLASS_ISLAND, &BANK_SPANS)
            .map(Self::from_usize)
    }
}

impl Domain {
    pub fn from_node_id(id: u32) -> Option<Self> {
        Core::from_node_id(id)
            .map(Domain::Core)
            .or_else(|| MemoryBank::from_node_id(id).map(Domain::Memory))
    }

    pub fn node_id(self) -> u32 {
        match self {
            Domain::Core(c) => c.node_id(),
            Domain::Memory(m) => m.node_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_cores_use_platform_ids() {
        assert_eq!(Core::Acpu0_0.node_id(), 0x1810_c003);
        assert_eq!(Core::RpuA_0.node_id(), 0x1811_0005);
    }

    #[test]
    fn every_id_decodes_to_itself() {
        for c in Core::iter() {
            assert_eq!(
                Domain::from_node_id(c.node_id()),
                Some(Domain::Core(c))
            );
        }
        for m in MemoryBank::iter() {
            assert_eq!(
                Domain::from_node_id(m.node_id()),
                Some(Domain::Memory(m))
            );
        }
    }

    #[test]
    fn junk_ids_are_rejected() {
        assert_eq!(Domain::from_node_id(0xffff), None);
        assert_eq!(Domain::from_node_id(0), None);
        // One past the last application core.
        assert_eq!(Core::from_node_id(Core::Acpu3_1.node_id() + 1), None);
        // One before the first real-time core.
        assert_eq!(Core::from_node_id(Core::RpuA_0.node_id() - 1), None);
        assert_eq!(
            MemoryBank::from_node_id(MemoryBank::Gem1.node_id() + 1),
            None
        );
    }

    #[test]
    fn clusters_and_owners() {
        assert_eq!(Core::Acpu2_1.cluster(), Cluster::Apu2);
        assert_eq!(Core::Acpu2_1.slot(), 1);
        assert_eq!(Core::RpuC_0.cluster(), Cluster::RpuC);
        assert_eq!(Core::RpuC_0.class(), CoreClass::RealTime);
        assert_eq!(Cluster::RpuE.cores(), [Core::RpuE_0, Core::RpuE_1]);
        assert_eq!(MemoryBank::TcmD_1.owner(), Some(Core::RpuD_1));
        assert_eq!(MemoryBank::Ocm1_2.owner(), None);
        assert_eq!(MemoryBank::Gem0.kind(), MemoryKind::Gem);
    }

    #[test]
    fn status_codes() {
        assert_eq!(status_code(Ok(())), 0);
        assert_eq!(status_code(Err(PmError::InvalidParam)), 15);
        assert_eq!(
            status_result(u32::from(PmError::StageAckTimeout)),
            Err(PmError::StageAckTimeout)
        );
        assert_eq!(status_result(0xdead), Err(PmError::Failure));
    }
}
