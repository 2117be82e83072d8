// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Register addresses and bit masks used by the sequencer.

use bitflags::bitflags;

/// A status register with its mask, enable and disable companions.
///
/// Status bits are write-one-to-clear. Writing a bit to `enable` clears it
/// in `mask`; writing it to `disable` sets it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IrqGroup {
    pub status: u32,
    pub mask: u32,
    pub enable: u32,
    pub disable: u32,
}

impl IrqGroup {
    pub const fn at(base: u32) -> Self {
        Self {
            status: base,
            mask: base + 0x4,
            enable: base + 0x8,
            disable: base + 0xc,
        }
    }
}

//
// PSX low-power domain system control.
//
pub const LPX_SLCR: u32 = 0xeb41_0000;

/// Application-core power-up requests, one bit per core.
pub const REQ_PWRUP0: IrqGroup = IrqGroup::at(LPX_SLCR + 0x100);
/// Real-time cores (bits 0-9), TCM (10-19), network memory (20-21).
pub const REQ_PWRUP1: IrqGroup = IrqGroup::at(LPX_SLCR + 0x110);
/// OCM banks (bits 0-15).
pub const REQ_PWRUP2: IrqGroup = IrqGroup::at(LPX_SLCR + 0x120);

pub const REQ_PWRDWN0: IrqGroup = IrqGroup::at(LPX_SLCR + 0x200);
/// As `REQ_PWRUP1`, plus TCM retention requests in bits 22-31.
pub const REQ_PWRDWN1: IrqGroup = IrqGroup::at(LPX_SLCR + 0x210);
/// As `REQ_PWRUP2`, plus OCM retention requests in bits 16-31.
pub const REQ_PWRDWN2: IrqGroup = IrqGroup::at(LPX_SLCR + 0x220);

pub const WAKEUP0: IrqGroup = IrqGroup::at(LPX_SLCR + 0x300);
pub const WAKEUP1: IrqGroup = IrqGroup::at(LPX_SLCR + 0x310);

/// Direct power-down requests, one bit per core in core order.
pub const PWR_CTRL_IRQ: IrqGroup = IrqGroup::at(LPX_SLCR + 0x400);
/// Software reset requests, one bit per core in core order.
pub const REQ_SWRST: IrqGroup = IrqGroup::at(LPX_SLCR + 0x500);

/// The power-management interrupt itself.
pub const PSM_IRQ: IrqGroup = IrqGroup::at(LPX_SLCR + 0x600);

bitflags! {
    /// Bits of `PSM_IRQ`.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct PsmIrq: u32 {
        const PWR_UP = 1 << 0;
        const PWR_DWN = 1 << 1;
        const WAKEUP = 1 << 2;
        const PWR_CTRL = 1 << 3;
    }
}

/// Per-core island control registers; the status register sits at
/// `STS_OFFSET` from the control register.
pub const APU_PWR_CNTRL: u32 = LPX_SLCR + 0x1000;
pub const RPU_PWR_CNTRL: u32 = LPX_SLCR + 0x1100;
pub const PWR_CNTRL_STRIDE: u32 = 0x10;
pub const STS_OFFSET: u32 = 0x4;

bitflags! {
    /// Bits of a core island control register.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct IslandCtrl: u32 {
        const PRDY0 = 1 << 0;
        const PRDY1 = 1 << 1;
        const PRDY2 = 1 << 2;
        const PRDY3 = 1 << 3;
        const ISOLATION = 1 << 4;

        const GATES = Self::PRDY0.bits()
            | Self::PRDY1.bits()
            | Self::PRDY2.bits()
            | Self::PRDY3.bits();
    }
}

/// Memory control blocks. Each has chip-enable, power control, power
/// status, retention control and retention status registers in that order.
pub const OCM_CTRL: u32 = LPX_SLCR + 0x700;
pub const TCM_CTRL: u32 = LPX_SLCR + 0x720;
pub const GEM_CTRL: u32 = LPX_SLCR + 0x740;

pub const CE_OFFSET: u32 = 0x0;
pub const PWR_OFFSET: u32 = 0x4;
pub const PWR_STATUS_OFFSET: u32 = 0x8;
pub const RET_OFFSET: u32 = 0xc;
pub const RET_STATUS_OFFSET: u32 = 0x10;

//
// PCIL power handshake blocks. Cluster and core blocks share a layout.
//
pub const APU_PCIL_CLUSTER: u32 = 0xecb1_0000;
pub const APU_PCIL_CORE: u32 = 0xecb1_1000;
pub const RPU_PCIL_CLUSTER: u32 = 0xeb42_0000;
pub const RPU_PCIL_CORE: u32 = 0xeb42_1000;
pub const PCIL_STRIDE: u32 = 0x100;

pub const PCIL_PSTATE: u32 = 0x00;
pub const PCIL_PREQ: u32 = 0x04;
pub const PCIL_PACTIVE: u32 = 0x08;
pub const PCIL_ISR_POWER: u32 = 0x10;
pub const PCIL_IEN_POWER: u32 = 0x14;
pub const PCIL_IDS_POWER: u32 = 0x18;
pub const PCIL_ISR_WAKE: u32 = 0x20;

pub const PSTATE_OFF: u32 = 0x0;
pub const PSTATE_ON: u32 = 0x8;
pub const PREQ: u32 = 1 << 0;
pub const PACTIVE: u32 = 1 << 0;
pub const PACCEPT: u32 = 1 << 8;
/// Power and wake ISR bits live in bit 0 of their registers.
pub const PCIL_ISR: u32 = 1 << 0;

//
// PMC global status shadows.
//
pub const PMC_GLOBAL: u32 = 0xf111_0000;
/// One bit per core in core order.
pub const AUX_PWR_STATE_0: u32 = PMC_GLOBAL + 0x200;
/// TCM banks (bits 0-9) and OCM banks (bits 10-25).
pub const AUX_PWR_STATE_1: u32 = PMC_GLOBAL + 0x204;
/// Network memory (bits 0-1).
pub const AUX_PWR_STATE_2: u32 = PMC_GLOBAL + 0x208;

//
// Reset and clock control.
//
pub const CRF_RST_APU: u32 = 0xec20_0300;
pub const CRF_ACPU_CLK_CTRL: u32 = 0xec20_010c;
pub const CRL_RST_RPU: u32 = 0xeb5e_0310;
pub const CRL_RPU_CLK_CTRL: u32 = 0xeb5e_0200;
pub const CRL_GEM_REF_CTRL: u32 = 0xeb5e_0118;
pub const CRL_RST_GEM: u32 = 0xeb5e_0330;

/// Per-cluster registers are packed one word apart.
pub const CLUSTER_REG_STRIDE: u32 = 0x4;

bitflags! {
    /// Bits of a cluster reset register. Core warm resets are indexed by
    /// the core's slot within the cluster.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct ClusterReset: u32 {
        const CORE0_WARM = 1 << 0;
        const CORE1_WARM = 1 << 1;
        const CLUSTER_COLD = 1 << 8;
        const CLUSTER_WARM = 1 << 9;

        const CLUSTER = Self::CLUSTER_COLD.bits() | Self::CLUSTER_WARM.bits();
    }
}

pub const CLKACT: u32 = 1 << 25;

//
// Reset vectors and cluster configuration.
//
pub const APU_CLUSTER: u32 = 0xecc0_0000;
pub const APU_CLUSTER_STRIDE: u32 = 0x10_0000;
pub const APU_RVBAR_OFFSET: u32 = 0x40;

pub const RPU_CLUSTER: u32 = 0xeb58_0000;
pub const RPU_CLUSTER_STRIDE: u32 = 0x1_0000;
pub const RPU_CFG_OFFSET: u32 = 0x0;
pub const RPU_VECTABLE_OFFSET: u32 = 0x10;

/// Split (independent) mode; clear means lock-step.
pub const RPU_CFG_SLSPLIT: u32 = 1 << 3;

/// Each core has a low/high reset-vector pair.
pub const RVBAR_STRIDE: u32 = 0x8;
pub const RVBAR_HIGH_OFFSET: u32 = 0x4;
pub const RVBAR_LOW_MASK: u32 = !0x3;
pub const RVBAR_HIGH_MASK: u32 = 0xffff;

/// Free-running 64-bit system counter.
pub const SYS_COUNTER_LO: u32 = 0xeb5b_0008;
pub const SYS_COUNTER_HI: u32 = 0xeb5b_000c;
