// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core power sequencing.
//!
//! Application and real-time cores go through the same steps, driven by
//! their row in [`tables::CORES`]: an optional cluster handshake the first
//! time any core of the cluster comes up, the island's power stages in
//! order, then the core-level handshake. Going down is the same in reverse,
//! and the cluster handshake is torn down again with the cluster's last
//! core.

use crate::bus::RegisterBus;
use crate::clock::Clock;
use crate::regs::{self, ClusterReset, IrqGroup, IslandCtrl};
use crate::tables::{self, CorePowerControl};
use crate::{PowerSequencer, Trace};
use drv_psx_pm_api::{Core, PmError};

impl<B: RegisterBus, C: Clock> PowerSequencer<B, C> {
    fn configure_cluster(
        &mut self,
        pc: &CorePowerControl,
    ) -> Result<(), PmError> {
        let pcil = pc.cluster_pcil;
        self.bus.write(pcil + regs::PCIL_PSTATE, regs::PSTATE_ON);
        self.bus.write(pcil + regs::PCIL_PREQ, regs::PREQ);

        self.bus.set_bits(pc.clk_ctrl, regs::CLKACT);
        self.clock.delay_us(pc.clk_prop_time_us);

        self.bus.clear_bits(pc.rst, ClusterReset::CLUSTER.bits());

        self.wait_for_mask(
            pcil + regs::PCIL_PACTIVE,
            regs::PACCEPT,
            tables::PACCEPT_TIMEOUT_US,
            PmError::ClusterAcceptTimeout,
        )?;
        self.bus.write(pcil + regs::PCIL_PREQ, 0);
        self.bus.write(pcil + regs::PCIL_ISR_POWER, regs::PCIL_ISR);
        self.bus.write(pcil + regs::PCIL_ISR_WAKE, regs::PCIL_ISR);

        self.cluster_configured[pc.cluster] = true;
        trace!(self, Trace::ClusterUp(pc.cluster));
        Ok(())
    }

    fn teardown_cluster(
        &mut self,
        pc: &CorePowerControl,
    ) -> Result<(), PmError> {
        let pcil = pc.cluster_pcil;
        self.bus.write(pcil + regs::PCIL_PSTATE, regs::PSTATE_OFF);
        self.bus.write(pcil + regs::PCIL_PREQ, regs::PREQ);
        self.wait_for_mask(
            pcil + regs::PCIL_PACTIVE,
            regs::PACCEPT,
            tables::PACCEPT_TIMEOUT_US,
            PmError::ClusterAcceptTimeout,
        )?;
        self.bus.write(pcil + regs::PCIL_PREQ, 0);

        self.bus.set_bits(pc.rst, ClusterReset::CLUSTER.bits());
        self.bus.clear_bits(pc.clk_ctrl, regs::CLKACT);

        self.cluster_configured[pc.cluster] = false;
        trace!(self, Trace::ClusterDown(pc.cluster));
        Ok(())
    }

    /// Brings a core's island up and starts its handshake. The core is left
    /// in warm reset.
    ///
    /// A stage that isn't acknowledged in time stops the sequence there;
    /// stages before it stay asserted.
    pub(crate) fn power_up_core(&mut self, core: Core) -> Result<(), PmError> {
        let pc = tables::core(core);
        if !self.cluster_configured[pc.cluster] {
            self.configure_cluster(pc)?;
        }

        let sts = pc.pwr_ctrl + regs::STS_OFFSET;
        for (i, stage) in pc.stages.iter().enumerate() {
            self.bus.set_bits(pc.pwr_ctrl, stage.enable);
            let acked = self.wait_for_mask(
                sts,
                stage.enable,
                stage.ack_timeout_us,
                PmError::StageAckTimeout,
            );
            if let Err(e) = acked {
                trace!(self, Trace::StageTimeout { core, stage: i as u8 });
                return Err(e);
            }
            self.clock.delay_us(stage.settle_us);
        }

        self.bus.clear_bits(pc.pwr_ctrl, IslandCtrl::ISOLATION.bits());
        self.bus.write(pc.core_pcil + regs::PCIL_PSTATE, regs::PSTATE_ON);
        self.bus.write(pc.core_pcil + regs::PCIL_PREQ, regs::PREQ);
        Ok(())
    }

    /// Powers `core` and releases it from reset at `resume_addr`. A core
    /// that's already running is left alone, reset vector included.
    pub(crate) fn power_up_core_direct(
        &mut self,
        core: Core,
        resume_addr: u64,
    ) -> Result<(), PmError> {
        if self.core_is_up(tables::core(core)) {
            trace!(self, Trace::CoreAlreadyUp(core));
            return Ok(());
        }
        self.resume_addr[core] = resume_addr;
        let r = self
            .power_up_core(core)
            .and_then(|()| self.start_core(tables::core(core), resume_addr));
        match r {
            Ok(()) => trace!(self, Trace::CoreUp(core)),
            Err(e) => trace!(self, Trace::CoreFailed(core, e)),
        }
        r
    }

    fn start_core(
        &mut self,
        pc: &CorePowerControl,
        resume_addr: u64,
    ) -> Result<(), PmError> {
        let low = resume_addr as u32 & regs::RVBAR_LOW_MASK;
        let high = (resume_addr >> 32) as u32 & regs::RVBAR_HIGH_MASK;
        self.bus.write(pc.rvbar, low);
        self.bus.write(pc.rvbar + regs::RVBAR_HIGH_OFFSET, high);
        trace!(self, Trace::ResumeAddr { core: pc.core, low, high });

        self.bus.clear_bits(pc.rst, pc.warm_rst_mask);
        let pcil = pc.core_pcil;
        self.wait_for_mask(
            pcil + regs::PCIL_PACTIVE,
            regs::PACCEPT,
            tables::PACCEPT_TIMEOUT_US,
            PmError::CoreAcceptTimeout,
        )?;

        self.bus.write(pcil + regs::PCIL_ISR_POWER, regs::PCIL_ISR);
        self.bus.write(pcil + regs::PCIL_ISR_WAKE, regs::PCIL_ISR);
        self.bus.write(pcil + regs::PCIL_PREQ, 0);

        self.bus.write(pc.requests.wake.status, pc.req_mask);

        // Requests that came in while we had them masked would otherwise
        // never be seen.
        self.unmask_pending(pc.requests.up);
        self.unmask_pending(regs::REQ_SWRST);

        self.bus.set_bits(regs::AUX_PWR_STATE_0, pc.pwr_state_mask);
        Ok(())
    }

    fn unmask_pending(&self, group: IrqGroup) {
        let pending = self.bus.read(group.status) & self.bus.read(group.mask);
        if pending != 0 {
            self.bus.write(group.enable, pending);
        }
    }

    /// Asks `core` to stop, then powers it and (if it was the last one) its
    /// cluster down. A core that's already off has nobody to answer the
    /// handshake, so it's left alone.
    pub(crate) fn power_down_core_direct(
        &mut self,
        core: Core,
    ) -> Result<(), PmError> {
        let pc = tables::core(core);
        if !self.core_is_up(pc) {
            trace!(self, Trace::CoreAlreadyDown(core));
            return Ok(());
        }
        let r = self.stop_core(pc).and_then(|()| {
            self.island_power_down(pc)?;
            self.bus.write(pc.requests.wake.status, pc.req_mask);
            self.bus.write(pc.requests.wake.enable, pc.req_mask);
            self.finish_power_down(pc)
        });
        if let Err(e) = r {
            trace!(self, Trace::CoreFailed(core, e));
        }
        r
    }

    fn stop_core(&mut self, pc: &CorePowerControl) -> Result<(), PmError> {
        let pcil = pc.core_pcil;
        self.bus.write(pc.requests.wake.disable, pc.req_mask);
        self.bus.write(pcil + regs::PCIL_IDS_POWER, regs::PCIL_ISR);

        self.wait_for_zero(
            pcil + regs::PCIL_PACTIVE,
            regs::PACTIVE,
            tables::PACTIVE_TIMEOUT_US,
            PmError::ActiveTimeout,
        )?;

        self.bus.write(pcil + regs::PCIL_PSTATE, regs::PSTATE_OFF);
        self.bus.write(pcil + regs::PCIL_PREQ, regs::PREQ);
        self.wait_for_mask(
            pcil + regs::PCIL_PACTIVE,
            regs::PACCEPT,
            tables::PACCEPT_TIMEOUT_US,
            PmError::CoreAcceptTimeout,
        )?;
        self.bus.write(pcil + regs::PCIL_PREQ, 0);

        self.bus.write(pcil + regs::PCIL_ISR_POWER, regs::PCIL_ISR);
        self.bus.write(pcil + regs::PCIL_IEN_POWER, regs::PCIL_ISR);
        Ok(())
    }

    fn island_power_down(
        &mut self,
        pc: &CorePowerControl,
    ) -> Result<(), PmError> {
        self.bus.set_bits(pc.rst, pc.warm_rst_mask);
        self.bus.set_bits(pc.pwr_ctrl, IslandCtrl::ISOLATION.bits());
        self.bus.clear_bits(pc.pwr_ctrl, pc.gates());
        self.wait_for_zero(
            pc.pwr_ctrl + regs::STS_OFFSET,
            pc.gates(),
            pc.pwr_dwn_ack_timeout_us,
            PmError::PowerDownAckTimeout,
        )
    }

    fn finish_power_down(
        &mut self,
        pc: &CorePowerControl,
    ) -> Result<(), PmError> {
        if self.cluster_configured[pc.cluster] && self.last_in_cluster(pc) {
            self.teardown_cluster(pc)?;
        }
        self.bus.clear_bits(regs::AUX_PWR_STATE_0, pc.pwr_state_mask);
        trace!(self, Trace::CoreDown(pc.core));
        Ok(())
    }

    /// Whether every other core of `pc`'s cluster is off, counting a core
    /// with an unmasked power-up request outstanding as on.
    fn last_in_cluster(&self, pc: &CorePowerControl) -> bool {
        let shadow = self.bus.read(regs::AUX_PWR_STATE_0);
        pc.cluster
            .cores()
            .into_iter()
            .filter(|&c| c != pc.core)
            .map(tables::core)
            .all(|sib| {
                let up = &sib.requests.up;
                let pending =
                    self.bus.read(up.status) & !self.bus.read(up.mask);
                shadow & sib.pwr_state_mask == 0 && pending & sib.req_mask == 0
            })
    }

    fn core_is_up(&self, pc: &CorePowerControl) -> bool {
        self.bus.read(regs::AUX_PWR_STATE_0) & pc.pwr_state_mask != 0
    }

    /// Request-driven power-up. Does nothing for a core that's already on.
    pub(crate) fn power_up_core_async(
        &mut self,
        core: Core,
    ) -> Result<(), PmError> {
        let pc = tables::core(core);
        if self.core_is_up(pc) {
            trace!(self, Trace::CoreAlreadyUp(core));
            return Ok(());
        }

        self.bus.write(pc.requests.up.disable, pc.req_mask);
        self.bus.set_bits(pc.rst, pc.warm_rst_mask);
        self.power_up_core(core)?;
        self.bus.set_bits(regs::AUX_PWR_STATE_0, pc.pwr_state_mask);
        trace!(self, Trace::CoreUp(core));
        Ok(())
    }

    /// Request-driven power-down. The core's power-up request is re-armed
    /// and its power-down request acknowledged.
    pub(crate) fn power_down_core_async(
        &mut self,
        core: Core,
    ) -> Result<(), PmError> {
        let pc = tables::core(core);
        self.island_power_down(pc)?;
        self.bus.write(pc.requests.up.enable, pc.req_mask);
        self.bus.write(pc.requests.down.status, pc.req_mask);
        self.finish_power_down(pc)
    }

    /// Brings a core back on a wake event, at the address it was last
    /// started at.
    pub(crate) fn wake_core(&mut self, core: Core) -> Result<(), PmError> {
        let resume_addr = self.resume_addr[core];
        self.power_up_core_direct(core, resume_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimBus, SimClock};
    use drv_psx_pm_api::Cluster;

    fn make_uut() -> PowerSequencer<SimBus, SimClock> {
        PowerSequencer::new(SimBus::psx(), SimClock::new())
    }

    fn shadow(uut: &PowerSequencer<SimBus, SimClock>, core: Core) -> bool {
        let mask = tables::core(core).pwr_state_mask;
        uut.bus().peek(regs::AUX_PWR_STATE_0) & mask != 0
    }

    #[test]
    fn stage_timeout_keeps_earlier_stages() {
        let mut uut = make_uut();
        let pc = tables::core(Core::Acpu1_0);
        let sts = pc.pwr_ctrl + regs::STS_OFFSET;
        uut.bus().disconnect(sts, IslandCtrl::PRDY2.bits());

        assert_eq!(
            uut.power_up_core_direct(Core::Acpu1_0, 0x1000),
            Err(PmError::StageAckTimeout)
        );

        let ctrl = IslandCtrl::from_bits_truncate(uut.bus().peek(pc.pwr_ctrl));
        assert_eq!(
            ctrl & IslandCtrl::GATES,
            IslandCtrl::PRDY0 | IslandCtrl::PRDY1 | IslandCtrl::PRDY2
        );
        assert!(!shadow(&uut, Core::Acpu1_0));

        let events: Vec<_> = uut.trace().iter().map(|e| e.payload).collect();
        assert!(events.contains(&Trace::StageTimeout {
            core: Core::Acpu1_0,
            stage: 2,
        }));
        assert_eq!(
            uut.trace().last().map(|e| e.payload),
            Some(Trace::CoreFailed(Core::Acpu1_0, PmError::StageAckTimeout))
        );
    }

    #[test]
    fn cluster_handshake_runs_once() {
        let mut uut = make_uut();
        let preq = tables::core(Core::RpuB_0).cluster_pcil + regs::PCIL_PREQ;

        uut.power_up_core_direct(Core::RpuB_0, 0).unwrap();
        uut.power_up_core_direct(Core::RpuB_1, 0).unwrap();

        // One request, one release.
        assert_eq!(uut.bus().writes_to(preq), [regs::PREQ, 0]);
        assert!(uut.cluster_configured(Cluster::RpuB));
    }

    #[test]
    fn cluster_goes_down_with_its_last_core() {
        let mut uut = make_uut();
        uut.power_up_core_direct(Core::Acpu2_0, 0).unwrap();
        uut.power_up_core_direct(Core::Acpu2_1, 0).unwrap();

        uut.power_down_core_direct(Core::Acpu2_1).unwrap();
        assert!(uut.cluster_configured(Cluster::Apu2));
        assert!(!shadow(&uut, Core::Acpu2_1));

        uut.power_down_core_direct(Core::Acpu2_0).unwrap();
        assert!(!uut.cluster_configured(Cluster::Apu2));
        let rst = uut.bus().peek(tables::core(Core::Acpu2_0).rst);
        assert!(ClusterReset::from_bits_truncate(rst)
            .contains(ClusterReset::CLUSTER));
    }

    #[test]
    fn pending_power_up_keeps_cluster() {
        let mut uut = make_uut();
        uut.power_up_core_direct(Core::Acpu3_0, 0).unwrap();

        // The sibling has asked to come up and we've unmasked it.
        let sib = tables::core(Core::Acpu3_1);
        uut.bus().poke(sib.requests.up.status, sib.req_mask);
        uut.bus().poke(sib.requests.up.mask, !sib.req_mask);

        uut.power_down_core_direct(Core::Acpu3_0).unwrap();
        assert!(uut.cluster_configured(Cluster::Apu3));
    }

    #[test]
    fn async_power_up_is_idempotent() {
        let mut uut = make_uut();
        uut.power_up_core_async(Core::RpuC_0).unwrap();
        assert!(shadow(&uut, Core::RpuC_0));

        uut.bus().clear_log();
        uut.power_up_core_async(Core::RpuC_0).unwrap();
        assert!(uut.bus().writes().is_empty());
        assert_eq!(
            uut.trace().last().map(|e| e.payload),
            Some(Trace::CoreAlreadyUp(Core::RpuC_0))
        );
    }

    #[test]
    fn async_power_down_rearms_power_up() {
        let mut uut = make_uut();
        let pc = tables::core(Core::RpuD_1);
        uut.power_up_core_async(Core::RpuD_1).unwrap();
        assert_ne!(uut.bus().peek(pc.requests.up.mask) & pc.req_mask, 0);

        uut.bus().poke(pc.requests.down.status, pc.req_mask);
        uut.power_down_core_async(Core::RpuD_1).unwrap();

        assert_eq!(uut.bus().peek(pc.requests.up.mask) & pc.req_mask, 0);
        assert_eq!(uut.bus().peek(pc.requests.down.status), 0);
        assert!(!shadow(&uut, Core::RpuD_1));
        assert!(!uut.cluster_configured(Cluster::RpuD));
    }

    #[test]
    fn wake_uses_stored_resume_address() {
        let mut uut = make_uut();
        let pc = tables::core(Core::Acpu0_1);
        uut.power_up_core_direct(Core::Acpu0_1, 0x1_2345_6788).unwrap();
        uut.power_down_core_direct(Core::Acpu0_1).unwrap();
        uut.bus().poke(pc.rvbar, 0);

        uut.wake_core(Core::Acpu0_1).unwrap();
        assert_eq!(uut.bus().peek(pc.rvbar), 0x2345_6788);
        assert_eq!(uut.bus().peek(pc.rvbar + regs::RVBAR_HIGH_OFFSET), 1);
        assert!(shadow(&uut, Core::Acpu0_1));
    }

    #[test]
    fn direct_power_up_leaves_running_core_alone() {
        let mut uut = make_uut();
        let pc = tables::core(Core::Acpu1_1);
        uut.power_up_core_direct(Core::Acpu1_1, 0x8000).unwrap();
        uut.bus().clear_log();

        uut.power_up_core_direct(Core::Acpu1_1, 0x9000).unwrap();
        assert!(uut.bus().writes().is_empty());
        assert_eq!(uut.bus().peek(pc.rvbar), 0x8000);
        assert_eq!(uut.resume_addr(Core::Acpu1_1), 0x8000);
        assert_eq!(
            uut.trace().last().map(|e| e.payload),
            Some(Trace::CoreAlreadyUp(Core::Acpu1_1))
        );
    }

    #[test]
    fn direct_power_down_of_off_core_skips_handshake() {
        let mut uut = make_uut();
        let pc = tables::core(Core::RpuA_0);
        // An unpowered core never accepts.
        let pactive = pc.core_pcil + regs::PCIL_PACTIVE;
        uut.bus().disconnect(pactive, regs::PACCEPT);

        assert_eq!(uut.power_down_core_direct(Core::RpuA_0), Ok(()));
        assert!(uut.bus().writes().is_empty());
        assert_eq!(
            uut.trace().last().map(|e| e.payload),
            Some(Trace::CoreAlreadyDown(Core::RpuA_0))
        );

        // And again after a real power-down.
        uut.power_up_core_direct(Core::RpuB_0, 0).unwrap();
        uut.power_down_core_direct(Core::RpuB_0).unwrap();
        uut.bus().clear_log();
        assert_eq!(uut.power_down_core_direct(Core::RpuB_0), Ok(()));
        assert!(uut.bus().writes().is_empty());
    }

    #[test]
    fn start_accept_timeout_is_reported() {
        let mut uut = make_uut();
        let pc = tables::core(Core::Acpu2_0);
        let pactive = pc.core_pcil + regs::PCIL_PACTIVE;
        uut.bus().disconnect(pactive, regs::PACCEPT);

        assert_eq!(
            uut.power_up_core_direct(Core::Acpu2_0, 0x4000),
            Err(PmError::CoreAcceptTimeout)
        );
        assert!(!shadow(&uut, Core::Acpu2_0));
        assert_eq!(uut.bus().peek(pc.rvbar), 0x4000);
    }

    #[test]
    fn stuck_core_fails_power_down() {
        let mut uut = make_uut();
        let pc = tables::core(Core::RpuA_0);
        uut.power_up_core_direct(Core::RpuA_0, 0).unwrap();
        uut.bus().poke(pc.core_pcil + regs::PCIL_PACTIVE, regs::PACTIVE);
        uut.bus().disconnect(pc.core_pcil + regs::PCIL_PACTIVE, regs::PACTIVE);

        assert_eq!(
            uut.power_down_core_direct(Core::RpuA_0),
            Err(PmError::ActiveTimeout)
        );
        assert!(shadow(&uut, Core::RpuA_0));
    }
}
