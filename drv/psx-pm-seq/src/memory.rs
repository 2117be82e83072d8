// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Memory island sequencing: OCM, TCM and network-memory banks.

use crate::bus::RegisterBus;
use crate::clock::Clock;
use crate::regs;
use crate::tables::{self, MemoryPowerControl, MemoryVariant};
use crate::{BankState, PowerSequencer, Trace};
use drv_psx_pm_api::{Core, MemoryBank, PmError};

impl<B: RegisterBus, C: Clock> PowerSequencer<B, C> {
    pub(crate) fn power_up_memory(
        &mut self,
        bank: MemoryBank,
    ) -> Result<(), PmError> {
        let r = self.memory_up(tables::memory(bank));
        match r {
            Ok(()) => trace!(self, Trace::MemoryUp(bank)),
            Err(e) => trace!(self, Trace::MemoryFailed(bank, e)),
        }
        r
    }

    pub(crate) fn power_down_memory(
        &mut self,
        bank: MemoryBank,
    ) -> Result<(), PmError> {
        let r = self.memory_down(tables::memory(bank));
        match r {
            Ok(BankState::Retained) => {
                trace!(self, Trace::RetentionEntered(bank))
            }
            Ok(_) => trace!(self, Trace::MemoryDown(bank)),
            Err(e) => trace!(self, Trace::MemoryFailed(bank, e)),
        }
        r.map(|_| ())
    }

    /// TCM sits in its core's island, so the core comes up first. In
    /// lock-step the second core of the pair is never used, and its banks
    /// ride on the first core's power instead.
    fn power_tcm_owner(
        &mut self,
        bank: MemoryBank,
        owner: Core,
    ) -> Result<(), PmError> {
        let split = match tables::core(owner).cluster_cfg {
            Some(cfg) => self.bus.read(cfg) & regs::RPU_CFG_SLSPLIT != 0,
            None => true,
        };
        if owner.slot() == 1 && !split {
            trace!(self, Trace::LockstepSibling(bank));
            let [first, _] = owner.cluster().cores();
            return self.power_up_core_async(first);
        }
        self.power_up_core_async(owner)
    }

    fn memory_up(&mut self, mc: &MemoryPowerControl) -> Result<(), PmError> {
        if let MemoryVariant::Tcm { owner } = mc.variant {
            self.power_tcm_owner(mc.bank, owner)?;
        }

        let r = &mc.regs;
        self.bus.set_bits(r.ce, mc.chip_en_mask);
        self.bus.set_bits(r.pwr_ctrl, mc.pwr_ctrl_mask);
        self.bus.set_bits(r.shadow, mc.pwr_state_mask);
        if mc.ret_ctrl_mask != 0 {
            self.bus.clear_bits(r.ret_ctrl, mc.ret_ctrl_mask);
        }

        self.wait_for_mask(
            r.pwr_status,
            mc.pwr_status_mask,
            mc.ack_timeout_us,
            PmError::MemoryAckTimeout,
        )?;
        self.clock.delay_us(mc.settle_us);

        if let MemoryVariant::Gem {
            clk_ctrl,
            rst_ctrl,
            rst_mask,
        } = mc.variant
        {
            self.bus.set_bits(clk_ctrl, regs::CLKACT);
            self.bus.clear_bits(rst_ctrl, rst_mask);
        }

        self.bus
            .write(r.down.enable, mc.glob_pwr_status_mask | mc.ret_mask);
        self.bus.write(r.up.disable, mc.glob_pwr_status_mask);
        self.bus.write(r.up.status, mc.glob_pwr_status_mask);
        self.bank_state[mc.bank] = BankState::On;
        Ok(())
    }

    fn memory_down(
        &mut self,
        mc: &MemoryPowerControl,
    ) -> Result<BankState, PmError> {
        let r = &mc.regs;
        self.bus.write(r.down.status, mc.glob_pwr_status_mask);
        let retain = mc.ret_mask != 0
            && self.bus.read(r.down.status) & mc.ret_mask != 0;

        let state = if retain {
            self.enter_retention(mc)?
        } else {
            self.memory_off(mc)?
        };
        self.bank_state[mc.bank] = state;
        Ok(state)
    }

    /// Hardware asked for retention: hold the contents, leave the power
    /// gates alone and don't wait on power status.
    fn enter_retention(
        &mut self,
        mc: &MemoryPowerControl,
    ) -> Result<BankState, PmError> {
        let r = &mc.regs;
        self.bus.set_bits(r.ret_ctrl, mc.ret_ctrl_mask);
        self.bus.write(r.down.status, mc.ret_mask);

        // The shadow is expected to keep showing the bank, but parts have
        // been seen where it doesn't.
        let shadow = self.bus.read(r.shadow);
        if shadow & mc.pwr_state_mask != mc.pwr_state_mask {
            trace!(self, Trace::RetentionNotReflected(mc.bank));
            if cfg!(feature = "strict-retention") {
                return Err(PmError::RetentionNotEntered);
            }
        }

        self.bus.clear_bits(r.ce, mc.chip_en_mask);
        self.bus.write(r.up.enable, mc.glob_pwr_status_mask);
        Ok(BankState::Retained)
    }

    fn memory_off(
        &mut self,
        mc: &MemoryPowerControl,
    ) -> Result<BankState, PmError> {
        let r = &mc.regs;
        if mc.ret_ctrl_mask != 0 {
            self.bus.clear_bits(r.ret_ctrl, mc.ret_ctrl_mask);
            self.wait_for_zero(
                r.ret_status,
                mc.ret_ctrl_mask,
                mc.ack_timeout_us,
                PmError::RetentionDisableTimeout,
            )?;
        }

        if let MemoryVariant::Gem {
            clk_ctrl,
            rst_ctrl,
            rst_mask,
        } = mc.variant
        {
            self.bus.set_bits(rst_ctrl, rst_mask);
            self.bus.clear_bits(clk_ctrl, regs::CLKACT);
        }

        self.bus.clear_bits(r.pwr_ctrl, mc.pwr_ctrl_mask);
        self.bus.clear_bits(r.ce, mc.chip_en_mask);
        self.bus.clear_bits(r.shadow, mc.pwr_state_mask);
        self.wait_for_zero(
            r.pwr_status,
            mc.pwr_status_mask,
            mc.ack_timeout_us,
            PmError::MemoryAckTimeout,
        )?;

        self.bus.write(r.up.enable, mc.glob_pwr_status_mask);
        self.bus.write(r.down.status, mc.glob_pwr_status_mask);
        Ok(BankState::Down)
    }
}
