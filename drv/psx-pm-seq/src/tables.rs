// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-instance control descriptors.
//!
//! One row per physical core and memory bank, in the same order as the
//! identifier enums in the API crate. Nothing here changes at runtime.

use crate::regs::{self, ClusterReset, IrqGroup};
use drv_psx_pm_api::{Cluster, Core, CoreClass, MemoryBank};
use enum_map::Enum;
use static_assertions::const_assert_eq;

include!(concat!(env!("OUT_DIR"), "/pm_timing.rs"));

/// One step of a core's power ramp.
#[derive(Copy, Clone, Debug)]
pub struct PowerStage {
    /// Bit asserted in the island control register, and expected back in
    /// its status register.
    pub enable: u32,
    pub ack_timeout_us: u32,
    /// Time to wait after the acknowledgment before the next step.
    pub settle_us: u32,
}

/// Request, power-down and wake registers for one class of core.
#[derive(Copy, Clone, Debug)]
pub struct ClassRequests {
    pub up: IrqGroup,
    pub down: IrqGroup,
    pub wake: IrqGroup,
}

pub const APU_REQUESTS: ClassRequests = ClassRequests {
    up: regs::REQ_PWRUP0,
    down: regs::REQ_PWRDWN0,
    wake: regs::WAKEUP0,
};

pub const RPU_REQUESTS: ClassRequests = ClassRequests {
    up: regs::REQ_PWRUP1,
    down: regs::REQ_PWRDWN1,
    wake: regs::WAKEUP1,
};

pub fn requests(class: CoreClass) -> &'static ClassRequests {
    match class {
        CoreClass::Application => &APU_REQUESTS,
        CoreClass::RealTime => &RPU_REQUESTS,
    }
}

#[derive(Debug)]
pub struct CorePowerControl {
    pub core: Core,
    pub cluster: Cluster,
    /// Low half of the reset vector; the high half follows it.
    pub rvbar: u32,
    /// Bit in the core status shadow, and in the per-core request
    /// registers that are laid out in core order.
    pub pwr_state_mask: u32,
    /// Bit in this core's class request registers.
    pub req_mask: u32,
    /// Island control register.
    pub pwr_ctrl: u32,
    pub cluster_pcil: u32,
    pub core_pcil: u32,
    pub stages: &'static [PowerStage],
    pub pwr_dwn_ack_timeout_us: u32,
    /// Cluster reset register holding this core's warm reset.
    pub rst: u32,
    pub warm_rst_mask: u32,
    pub clk_ctrl: u32,
    pub clk_prop_time_us: u32,
    /// Lock-step/split configuration, for clusters that have one.
    pub cluster_cfg: Option<u32>,
    pub requests: ClassRequests,
}

impl CorePowerControl {
    /// Every gate the power-up stages turn on.
    pub fn gates(&self) -> u32 {
        self.stages.iter().fold(0, |acc, s| acc | s.enable)
    }
}

pub static APU_STAGES: [PowerStage; 4] = [
    PowerStage {
        enable: regs::IslandCtrl::PRDY0.bits(),
        ack_timeout_us: APU_STAGE_ACK_TIMEOUT_US[0],
        settle_us: APU_STAGE_SETTLE_US[0],
    },
    PowerStage {
        enable: regs::IslandCtrl::PRDY1.bits(),
        ack_timeout_us: APU_STAGE_ACK_TIMEOUT_US[1],
        settle_us: APU_STAGE_SETTLE_US[1],
    },
    PowerStage {
        enable: regs::IslandCtrl::PRDY2.bits(),
        ack_timeout_us: APU_STAGE_ACK_TIMEOUT_US[2],
        settle_us: APU_STAGE_SETTLE_US[2],
    },
    PowerStage {
        enable: regs::IslandCtrl::PRDY3.bits(),
        ack_timeout_us: APU_STAGE_ACK_TIMEOUT_US[3],
        settle_us: APU_STAGE_SETTLE_US[3],
    },
];

// Real-time cores bring all their gates up at once.
pub static RPU_STAGES: [PowerStage; 1] = [PowerStage {
    enable: regs::IslandCtrl::GATES.bits(),
    ack_timeout_us: RPU_STAGE_ACK_TIMEOUT_US[0],
    settle_us: RPU_STAGE_SETTLE_US[0],
}];

const APU_CORE_COUNT: u32 = 8;

const fn apu_core(
    core: Core,
    cluster: Cluster,
    c: u32,
    slot: u32,
    stages: &'static [PowerStage],
) -> CorePowerControl {
    let n = c * 2 + slot;
    CorePowerControl {
        core,
        cluster,
        rvbar: regs::APU_CLUSTER
            + c * regs::APU_CLUSTER_STRIDE
            + regs::APU_RVBAR_OFFSET
            + slot * regs::RVBAR_STRIDE,
        pwr_state_mask: 1 << n,
        req_mask: 1 << n,
        pwr_ctrl: regs::APU_PWR_CNTRL + n * regs::PWR_CNTRL_STRIDE,
        cluster_pcil: regs::APU_PCIL_CLUSTER + c * regs::PCIL_STRIDE,
        core_pcil: regs::APU_PCIL_CORE + n * regs::PCIL_STRIDE,
        stages,
        pwr_dwn_ack_timeout_us: APU_PWR_DWN_ACK_TIMEOUT_US,
        rst: regs::CRF_RST_APU + c * regs::CLUSTER_REG_STRIDE,
        warm_rst_mask: ClusterReset::CORE0_WARM.bits() << slot,
        clk_ctrl: regs::CRF_ACPU_CLK_CTRL + c * regs::CLUSTER_REG_STRIDE,
        clk_prop_time_us: APU_CLK_PROP_TIME_US,
        cluster_cfg: None,
        requests: APU_REQUESTS,
    }
}

const fn rpu_core(
    core: Core,
    cluster: Cluster,
    c: u32,
    slot: u32,
    stages: &'static [PowerStage],
) -> CorePowerControl {
    let n = c * 2 + slot;
    let cluster_base = regs::RPU_CLUSTER + c * regs::RPU_CLUSTER_STRIDE;
    CorePowerControl {
        core,
        cluster,
        rvbar: cluster_base
            + regs::RPU_VECTABLE_OFFSET
            + slot * regs::RVBAR_STRIDE,
        pwr_state_mask: 1 << (APU_CORE_COUNT + n),
        req_mask: 1 << n,
        pwr_ctrl: regs::RPU_PWR_CNTRL + n * regs::PWR_CNTRL_STRIDE,
        cluster_pcil: regs::RPU_PCIL_CLUSTER + c * regs::PCIL_STRIDE,
        core_pcil: regs::RPU_PCIL_CORE + n * regs::PCIL_STRIDE,
        stages,
        pwr_dwn_ack_timeout_us: RPU_PWR_DWN_ACK_TIMEOUT_US,
        rst: regs::CRL_RST_RPU + c * regs::CLUSTER_REG_STRIDE,
        warm_rst_mask: ClusterReset::CORE0_WARM.bits() << slot,
        clk_ctrl: regs::CRL_RPU_CLK_CTRL + c * regs::CLUSTER_REG_STRIDE,
        clk_prop_time_us: RPU_CLK_PROP_TIME_US,
        cluster_cfg: Some(cluster_base + regs::RPU_CFG_OFFSET),
        requests: RPU_REQUESTS,
    }
}

pub static CORES: [CorePowerControl; 18] = [
    apu_core(Core::Acpu0_0, Cluster::Apu0, 0, 0, &APU_STAGES),
    apu_core(Core::Acpu0_1, Cluster::Apu0, 0, 1, &APU_STAGES),
    apu_core(Core::Acpu1_0, Cluster::Apu1, 1, 0, &APU_STAGES),
    apu_core(Core::Acpu1_1, Cluster::Apu1, 1, 1, &APU_STAGES),
    apu_core(Core::Acpu2_0, Cluster::Apu2, 2, 0, &APU_STAGES),
    apu_core(Core::Acpu2_1, Cluster::Apu2, 2, 1, &APU_STAGES),
    apu_core(Core::Acpu3_0, Cluster::Apu3, 3, 0, &APU_STAGES),
    apu_core(Core::Acpu3_1, Cluster::Apu3, 3, 1, &APU_STAGES),
    rpu_core(Core::RpuA_0, Cluster::RpuA, 0, 0, &RPU_STAGES),
    rpu_core(Core::RpuA_1, Cluster::RpuA, 0, 1, &RPU_STAGES),
    rpu_core(Core::RpuB_0, Cluster::RpuB, 1, 0, &RPU_STAGES),
    rpu_core(Core::RpuB_1, Cluster::RpuB, 1, 1, &RPU_STAGES),
    rpu_core(Core::RpuC_0, Cluster::RpuC, 2, 0, &RPU_STAGES),
    rpu_core(Core::RpuC_1, Cluster::RpuC, 2, 1, &RPU_STAGES),
    rpu_core(Core::RpuD_0, Cluster::RpuD, 3, 0, &RPU_STAGES),
    rpu_core(Core::RpuD_1, Cluster::RpuD, 3, 1, &RPU_STAGES),
    rpu_core(Core::RpuE_0, Cluster::RpuE, 4, 0, &RPU_STAGES),
    rpu_core(Core::RpuE_1, Cluster::RpuE, 4, 1, &RPU_STAGES),
];

const_assert_eq!(18, <Core as Enum>::LENGTH);

pub fn core(core: Core) -> &'static CorePowerControl {
    &CORES[core.into_usize()]
}

/// Registers one kind of memory bank shares.
#[derive(Copy, Clone, Debug)]
pub struct MemoryRegs {
    pub ce: u32,
    pub pwr_ctrl: u32,
    pub pwr_status: u32,
    pub ret_ctrl: u32,
    pub ret_status: u32,
    pub up: IrqGroup,
    pub down: IrqGroup,
    /// Status shadow the bank's power-state bit lives in.
    pub shadow: u32,
}

const fn memory_regs(
    base: u32,
    up: IrqGroup,
    down: IrqGroup,
    shadow: u32,
) -> MemoryRegs {
    MemoryRegs {
        ce: base + regs::CE_OFFSET,
        pwr_ctrl: base + regs::PWR_OFFSET,
        pwr_status: base + regs::PWR_STATUS_OFFSET,
        ret_ctrl: base + regs::RET_OFFSET,
        ret_status: base + regs::RET_STATUS_OFFSET,
        up,
        down,
        shadow,
    }
}

pub const OCM_REGS: MemoryRegs = memory_regs(
    regs::OCM_CTRL,
    regs::REQ_PWRUP2,
    regs::REQ_PWRDWN2,
    regs::AUX_PWR_STATE_1,
);

pub const TCM_REGS: MemoryRegs = memory_regs(
    regs::TCM_CTRL,
    regs::REQ_PWRUP1,
    regs::REQ_PWRDWN1,
    regs::AUX_PWR_STATE_1,
);

pub const GEM_REGS: MemoryRegs = memory_regs(
    regs::GEM_CTRL,
    regs::REQ_PWRUP1,
    regs::REQ_PWRDWN1,
    regs::AUX_PWR_STATE_2,
);

#[derive(Copy, Clone, Debug)]
pub enum MemoryVariant {
    Ocm,
    /// Powered through its owning real-time core first.
    Tcm { owner: Core },
    /// Network memory also gates its controller's reference clock and reset.
    Gem {
        clk_ctrl: u32,
        rst_ctrl: u32,
        rst_mask: u32,
    },
}

#[derive(Debug)]
pub struct MemoryPowerControl {
    pub bank: MemoryBank,
    pub regs: MemoryRegs,
    /// Bit in the status shadow.
    pub pwr_state_mask: u32,
    pub chip_en_mask: u32,
    pub pwr_ctrl_mask: u32,
    pub pwr_status_mask: u32,
    /// Bit in the up/down request registers.
    pub glob_pwr_status_mask: u32,
    /// Retention request bit in the down request register; zero if the
    /// bank can't retain.
    pub ret_mask: u32,
    /// Bit in the retention control and status registers.
    pub ret_ctrl_mask: u32,
    pub ack_timeout_us: u32,
    pub settle_us: u32,
    pub variant: MemoryVariant,
}

const fn tcm(bank: MemoryBank, owner: Core, i: u32) -> MemoryPowerControl {
    MemoryPowerControl {
        bank,
        regs: TCM_REGS,
        pwr_state_mask: 1 << i,
        chip_en_mask: 1 << i,
        pwr_ctrl_mask: 1 << i,
        pwr_status_mask: 1 << i,
        glob_pwr_status_mask: 1 << (10 + i),
        ret_mask: 1 << (22 + i),
        ret_ctrl_mask: 1 << i,
        ack_timeout_us: TCM_ACK_TIMEOUT_US,
        settle_us: TCM_SETTLE_US,
        variant: MemoryVariant::Tcm { owner },
    }
}

const fn ocm(bank: MemoryBank, i: u32) -> MemoryPowerControl {
    MemoryPowerControl {
        bank,
        regs: OCM_REGS,
        pwr_state_mask: 1 << (10 + i),
        chip_en_mask: 1 << i,
        pwr_ctrl_mask: 1 << i,
        pwr_status_mask: 1 << i,
        glob_pwr_status_mask: 1 << i,
        ret_mask: 1 << (16 + i),
        ret_ctrl_mask: 1 << i,
        ack_timeout_us: OCM_ACK_TIMEOUT_US,
        settle_us: 0,
        variant: MemoryVariant::Ocm,
    }
}

const fn gem(bank: MemoryBank, i: u32) -> MemoryPowerControl {
    MemoryPowerControl {
        bank,
        regs: GEM_REGS,
        pwr_state_mask: 1 << i,
        chip_en_mask: 1 << i,
        pwr_ctrl_mask: 1 << i,
        pwr_status_mask: 1 << i,
        glob_pwr_status_mask: 1 << (20 + i),
        ret_mask: 0,
        ret_ctrl_mask: 0,
        ack_timeout_us: GEM_ACK_TIMEOUT_US[i as usize],
        settle_us: GEM_SETTLE_US[i as usize],
        variant: MemoryVariant::Gem {
            clk_ctrl: regs::CRL_GEM_REF_CTRL + i * regs::CLUSTER_REG_STRIDE,
            rst_ctrl: regs::CRL_RST_GEM + i * regs::CLUSTER_REG_STRIDE,
            rst_mask: 1 << 0,
        },
    }
}

pub static MEMORY: [MemoryPowerControl; 28] = [
    tcm(MemoryBank::TcmA_0, Core::RpuA_0, 0),
    tcm(MemoryBank::TcmA_1, Core::RpuA_1, 1),
    tcm(MemoryBank::TcmB_0, Core::RpuB_0, 2),
    tcm(MemoryBank::TcmB_1, Core::RpuB_1, 3),
    tcm(MemoryBank::TcmC_0, Core::RpuC_0, 4),
    tcm(MemoryBank::TcmC_1, Core::RpuC_1, 5),
    tcm(MemoryBank::TcmD_0, Core::RpuD_0, 6),
    tcm(MemoryBank::TcmD_1, Core::RpuD_1, 7),
    tcm(MemoryBank::TcmE_0, Core::RpuE_0, 8),
    tcm(MemoryBank::TcmE_1, Core::RpuE_1, 9),
    ocm(MemoryBank::Ocm0_0, 0),
    ocm(MemoryBank::Ocm0_1, 1),
    ocm(MemoryBank::Ocm0_2, 2),
    ocm(MemoryBank::Ocm0_3, 3),
    ocm(MemoryBank::Ocm1_0, 4),
    ocm(MemoryBank::Ocm1_1, 5),
    ocm(MemoryBank::Ocm1_2, 6),
    ocm(MemoryBank::Ocm1_3, 7),
    ocm(MemoryBank::Ocm2_0, 8),
    ocm(MemoryBank::Ocm2_1, 9),
    ocm(MemoryBank::Ocm2_2, 10),
    ocm(MemoryBank::Ocm2_3, 11),
    ocm(MemoryBank::Ocm3_0, 12),
    ocm(MemoryBank::Ocm3_1, 13),
    ocm(MemoryBank::Ocm3_2, 14),
    ocm(MemoryBank::Ocm3_3, 15),
    gem(MemoryBank::Gem0, 0),
    gem(MemoryBank::Gem1, 1),
];

const_assert_eq!(28, <MemoryBank as Enum>::LENGTH);

pub fn memory(bank: MemoryBank) -> &'static MemoryPowerControl {
    &MEMORY[bank.into_usize()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use drv_psx_pm_api::MemoryKind;

    #[test]
    fn rows_match_their_index() {
        for c in Core::iter() {
            let row = core(c);
            assert_eq!(row.core, c);
            assert_eq!(row.cluster, c.cluster());
            assert_eq!(row.requests.up, requests(c.class()).up);
        }
        for b in MemoryBank::iter() {
            let row = memory(b);
            assert_eq!(row.bank, b);
            match (row.variant, b.kind()) {
                (MemoryVariant::Tcm { owner }, MemoryKind::Tcm) => {
                    assert_eq!(Some(owner), b.owner());
                }
                (MemoryVariant::Ocm, MemoryKind::Ocm) => (),
                (MemoryVariant::Gem { .. }, MemoryKind::Gem) => (),
                (v, k) => panic!("{b:?}: {v:?} row for a {k:?} bank"),
            }
        }
    }

    #[test]
    fn masks_are_unique_per_register() {
        let mut shadow0 = 0;
        for c in Core::iter() {
            let m = core(c).pwr_state_mask;
            assert_eq!(shadow0 & m, 0, "{c:?} shares a status bit");
            shadow0 |= m;
        }

        let mut seen = std::collections::BTreeMap::<u32, u32>::new();
        for b in MemoryBank::iter() {
            let row = memory(b);
            let shadow = seen.entry(row.regs.shadow).or_default();
            assert_eq!(*shadow & row.pwr_state_mask, 0, "{b:?} shadow bit");
            *shadow |= row.pwr_state_mask;

            let down = seen.entry(row.regs.down.status).or_default();
            let bits = row.glob_pwr_status_mask | row.ret_mask;
            assert_eq!(*down & bits, 0, "{b:?} request bits");
            *down |= bits;
        }

        // Core request bits share REQ_PWRDWN1 with TCM and network memory.
        for c in Core::iter().filter(|c| c.class() == CoreClass::RealTime) {
            let down = seen.entry(core(c).requests.down.status).or_default();
            assert_eq!(*down & core(c).req_mask, 0, "{c:?} request bit");
        }
    }

    #[test]
    fn apu_stages_cover_all_gates() {
        assert_eq!(
            core(Core::Acpu1_1).gates(),
            regs::IslandCtrl::GATES.bits()
        );
        assert_eq!(core(Core::RpuB_0).gates(), regs::IslandCtrl::GATES.bits());
        assert_eq!(core(Core::RpuB_0).stages.len(), 1);
    }
}
