// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power-management interrupt dispatch.
//!
//! The top-level register has one bit per kind of request. Each pending,
//! unmasked kind is handed to its handler, which walks the per-core request
//! bits for that kind and, for power-up and power-down, the per-bank ones
//! of the memory islands. A request bit is acknowledged and masked once its
//! handler returns, whether or not the sequence worked; the failure is
//! traced and the walk carries on.
//!
//! A power-down request gives way to a power-up request for the same core
//! or bank that is either pending or unmasked.
//!
//! The dispatcher does not mask the interrupt line itself. It takes the
//! sequencer by `&mut`, so the platform must not let the vector pre-empt
//! itself.

use crate::bus::RegisterBus;
use crate::clock::Clock;
use crate::regs::{self, IrqGroup, PsmIrq};
use crate::tables;
use crate::{PowerSequencer, Trace};
use drv_psx_pm_api::{Core, CoreClass, MemoryBank, PmError};

const CLASSES: [CoreClass; 2] = [CoreClass::Application, CoreClass::RealTime];

impl<B: RegisterBus, C: Clock> PowerSequencer<B, C> {
    /// Services every pending power-management request. `irq` is only
    /// recorded. Handler failures are traced, not returned.
    pub fn handle_interrupt(&mut self, irq: u32) -> Result<(), PmError> {
        let pending = PsmIrq::from_bits_truncate(self.pending(regs::PSM_IRQ));
        trace!(self, Trace::Irq { irq, pending: pending.bits() });

        let handlers: [(PsmIrq, fn(&mut Self)); 4] = [
            (PsmIrq::PWR_UP, Self::handle_power_up),
            (PsmIrq::PWR_DWN, Self::handle_power_down),
            (PsmIrq::WAKEUP, Self::handle_wakeup),
            (PsmIrq::PWR_CTRL, Self::handle_power_control),
        ];
        for (bit, handler) in handlers {
            if pending.contains(bit) {
                handler(self);
                self.bus.write(regs::PSM_IRQ.status, bit.bits());
            }
        }
        Ok(())
    }

    /// Request bits that are set and not masked.
    fn pending(&self, group: IrqGroup) -> u32 {
        self.bus.read(group.status) & !self.bus.read(group.mask)
    }

    /// Whether a power-up request for `mask` is pending or armed.
    fn up_requested(&self, up: IrqGroup, mask: u32) -> bool {
        let status = self.bus.read(up.status);
        let armed = !self.bus.read(up.mask);
        (status | armed) & mask != 0
    }

    fn ack_request(&self, group: IrqGroup, mask: u32) {
        self.bus.write(group.status, mask);
        self.bus.write(group.disable, mask);
    }

    fn ack(
        &mut self,
        group: IrqGroup,
        mask: u32,
        core: Core,
        r: Result<(), PmError>,
    ) {
        if let Err(e) = r {
            trace!(self, Trace::HandlerFailed(core, e));
        }
        self.ack_request(group, mask);
    }

    fn ack_bank(
        &mut self,
        group: IrqGroup,
        mask: u32,
        bank: MemoryBank,
        r: Result<(), PmError>,
    ) {
        if let Err(e) = r {
            trace!(self, Trace::BankHandlerFailed(bank, e));
        }
        self.ack_request(group, mask);
    }

    fn class_cores(class: CoreClass) -> impl Iterator<Item = Core> {
        Core::iter().filter(move |c| c.class() == class)
    }

    fn handle_power_up(&mut self) {
        for class in CLASSES {
            let up = tables::requests(class).up;
            let pending = self.pending(up);
            for core in Self::class_cores(class) {
                let mask = tables::core(core).req_mask;
                if pending & mask != 0 {
                    trace!(self, Trace::PowerUpRequest(core));
                    let r = self.power_up_core_async(core);
                    self.ack(up, mask, core, r);
                }
            }
        }

        for bank in MemoryBank::iter() {
            let mc = tables::memory(bank);
            let up = mc.regs.up;
            let mask = mc.glob_pwr_status_mask;
            if self.pending(up) & mask != 0 {
                trace!(self, Trace::MemoryUpRequest(bank));
                let r = self.power_up_memory(bank);
                self.ack_bank(up, mask, bank, r);
            }
        }
    }

    fn handle_power_down(&mut self) {
        // Memory first; TCM lives in its core's island.
        for bank in MemoryBank::iter() {
            let mc = tables::memory(bank);
            let r = &mc.regs;
            let mask = mc.glob_pwr_status_mask | mc.ret_mask;
            if self.pending(r.down) & mask == 0 {
                continue;
            }
            if self.up_requested(r.up, mc.glob_pwr_status_mask) {
                trace!(self, Trace::MemoryDownSuperseded(bank));
                self.ack_request(r.down, mask);
                continue;
            }
            trace!(self, Trace::MemoryDownRequest(bank));
            let res = self.power_down_memory(bank);
            self.ack_bank(r.down, mask, bank, res);
        }

        for class in CLASSES {
            let req = tables::requests(class);
            let pending = self.pending(req.down);
            for core in Self::class_cores(class) {
                let mask = tables::core(core).req_mask;
                if pending & mask == 0 {
                    continue;
                }
                if self.up_requested(req.up, mask) {
                    trace!(self, Trace::PowerDownSuperseded(core));
                    self.ack_request(req.down, mask);
                    continue;
                }
                trace!(self, Trace::PowerDownRequest(core));
                let r = self.power_down_core_async(core);
                self.ack(req.down, mask, core, r);
            }
        }
    }

    fn handle_wakeup(&mut self) {
        for class in CLASSES {
            let wake = tables::requests(class).wake;
            let pending = self.pending(wake);
            for core in Self::class_cores(class) {
                let mask = tables::core(core).req_mask;
                if pending & mask != 0 {
                    trace!(self, Trace::Wake(core));
                    let r = self.wake_core(core);
                    self.ack(wake, mask, core, r);
                }
            }
        }
    }

    fn handle_power_control(&mut self) {
        let pending = self.pending(regs::PWR_CTRL_IRQ);
        for core in Core::iter() {
            let mask = tables::core(core).pwr_state_mask;
            if pending & mask != 0 {
                trace!(self, Trace::PowerControlRequest(core));
                let r = self.power_down_core_direct(core);
                self.ack(regs::PWR_CTRL_IRQ, mask, core, r);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::IslandCtrl;
    use crate::sim::{SimBus, SimClock};
    use crate::BankState;

    fn make_uut() -> PowerSequencer<SimBus, SimClock> {
        PowerSequencer::new(SimBus::psx(), SimClock::new())
    }

    /// Raises a request for `mask` in `group`, unmasked, under top-level
    /// bit `top`.
    fn raise(
        uut: &PowerSequencer<SimBus, SimClock>,
        top: PsmIrq,
        group: IrqGroup,
        mask: u32,
    ) {
        let bus = uut.bus();
        let psm = bus.peek(regs::PSM_IRQ.status);
        bus.poke(regs::PSM_IRQ.status, psm | top.bits());
        bus.poke(regs::PSM_IRQ.mask, 0);
        bus.poke(group.status, bus.peek(group.status) | mask);
        bus.poke(group.mask, bus.peek(group.mask) & !mask);
    }

    fn up(uut: &PowerSequencer<SimBus, SimClock>, core: Core) -> bool {
        let mask = tables::core(core).pwr_state_mask;
        uut.bus().peek(regs::AUX_PWR_STATE_0) & mask != 0
    }

    fn events(uut: &PowerSequencer<SimBus, SimClock>) -> Vec<Trace> {
        uut.trace().iter().map(|e| e.payload).collect()
    }

    #[test]
    fn power_up_request_brings_core_up() {
        let mut uut = make_uut();
        let pc = tables::core(Core::Acpu1_1);
        raise(&uut, PsmIrq::PWR_UP, pc.requests.up, pc.req_mask);

        assert_eq!(uut.handle_interrupt(7), Ok(()));
        assert!(up(&uut, Core::Acpu1_1));
        assert_eq!(uut.bus().peek(pc.requests.up.status), 0);
        assert_eq!(uut.bus().peek(regs::PSM_IRQ.status), 0);
        assert!(events(&uut).contains(&Trace::Irq {
            irq: 7,
            pending: PsmIrq::PWR_UP.bits(),
        }));
    }

    #[test]
    fn failed_handler_is_still_acknowledged() {
        let mut uut = make_uut();
        let pc = tables::core(Core::RpuE_0);
        let sts = pc.pwr_ctrl + regs::STS_OFFSET;
        uut.bus().disconnect(sts, IslandCtrl::GATES.bits());
        raise(&uut, PsmIrq::PWR_UP, pc.requests.up, pc.req_mask);

        assert_eq!(uut.handle_interrupt(0), Ok(()));
        assert!(!up(&uut, Core::RpuE_0));
        assert_eq!(uut.bus().peek(pc.requests.up.status) & pc.req_mask, 0);
        assert_ne!(uut.bus().peek(pc.requests.up.mask) & pc.req_mask, 0);
        assert_eq!(uut.bus().peek(regs::PSM_IRQ.status), 0);
        assert!(events(&uut).contains(&Trace::HandlerFailed(
            Core::RpuE_0,
            PmError::StageAckTimeout
        )));
    }

    #[test]
    fn one_failure_does_not_block_others() {
        let mut uut = make_uut();
        let bad = tables::core(Core::RpuE_0);
        let good = tables::core(Core::RpuE_1);
        let sts = bad.pwr_ctrl + regs::STS_OFFSET;
        uut.bus().disconnect(sts, IslandCtrl::GATES.bits());
        raise(&uut, PsmIrq::PWR_UP, bad.requests.up, bad.req_mask);
        raise(&uut, PsmIrq::PWR_UP, good.requests.up, good.req_mask);

        uut.handle_interrupt(0).unwrap();
        assert!(!up(&uut, Core::RpuE_0));
        assert!(up(&uut, Core::RpuE_1));
    }

    #[test]
    fn masked_top_level_bit_is_left_alone() {
        let mut uut = make_uut();
        let pc = tables::core(Core::Acpu0_0);
        raise(&uut, PsmIrq::PWR_UP, pc.requests.up, pc.req_mask);
        uut.bus().poke(regs::PSM_IRQ.mask, PsmIrq::PWR_UP.bits());

        uut.handle_interrupt(0).unwrap();
        assert!(!up(&uut, Core::Acpu0_0));
        assert_eq!(
            uut.bus().peek(regs::PSM_IRQ.status),
            PsmIrq::PWR_UP.bits()
        );
    }

    #[test]
    fn power_down_request_with_pending_power_up_is_skipped() {
        let mut uut = make_uut();
        let pc = tables::core(Core::Acpu2_0);
        uut.power_up_core_async(Core::Acpu2_0).unwrap();

        raise(&uut, PsmIrq::PWR_DWN, pc.requests.down, pc.req_mask);
        raise(&uut, PsmIrq::PWR_DWN, pc.requests.up, pc.req_mask);
        uut.handle_interrupt(0).unwrap();

        assert!(up(&uut, Core::Acpu2_0));
        let down = uut.bus().peek(pc.requests.down.status);
        assert_eq!(down & pc.req_mask, 0);
        assert!(events(&uut)
            .contains(&Trace::PowerDownSuperseded(Core::Acpu2_0)));
    }

    #[test]
    fn power_down_request_with_armed_power_up_is_skipped() {
        let mut uut = make_uut();
        let pc = tables::core(Core::Acpu0_1);
        raise(&uut, PsmIrq::PWR_DWN, pc.requests.down, pc.req_mask);
        let up_mask = uut.bus().peek(pc.requests.up.mask);
        uut.bus().poke(pc.requests.up.mask, up_mask & !pc.req_mask);
        uut.bus().clear_log();

        uut.handle_interrupt(0).unwrap();
        assert!(uut.bus().writes_to(pc.pwr_ctrl).is_empty());
        let down = uut.bus().peek(pc.requests.down.status);
        assert_eq!(down & pc.req_mask, 0);
        assert!(events(&uut)
            .contains(&Trace::PowerDownSuperseded(Core::Acpu0_1)));
    }

    #[test]
    fn power_down_request_powers_core_off() {
        let mut uut = make_uut();
        let pc = tables::core(Core::RpuA_1);
        uut.power_up_core_async(Core::RpuA_1).unwrap();

        raise(&uut, PsmIrq::PWR_DWN, pc.requests.down, pc.req_mask);
        uut.handle_interrupt(0).unwrap();

        assert!(!up(&uut, Core::RpuA_1));
        assert!(!uut.cluster_configured(pc.cluster));
    }

    #[test]
    fn wake_restarts_core_at_its_resume_address() {
        let mut uut = make_uut();
        let pc = tables::core(Core::RpuB_1);
        uut.power_up_core_direct(Core::RpuB_1, 0x4000_0100).unwrap();
        uut.power_down_core_direct(Core::RpuB_1).unwrap();
        uut.bus().poke(pc.rvbar, 0);

        raise(&uut, PsmIrq::WAKEUP, pc.requests.wake, pc.req_mask);
        uut.handle_interrupt(0).unwrap();

        assert!(up(&uut, Core::RpuB_1));
        assert_eq!(uut.bus().peek(pc.rvbar), 0x4000_0100);
    }

    #[test]
    fn power_control_request_powers_core_down() {
        let mut uut = make_uut();
        let pc = tables::core(Core::Acpu3_1);
        uut.power_up_core_direct(Core::Acpu3_1, 0).unwrap();

        raise(&uut, PsmIrq::PWR_CTRL, regs::PWR_CTRL_IRQ, pc.pwr_state_mask);
        uut.handle_interrupt(0).unwrap();

        assert!(!up(&uut, Core::Acpu3_1));
        let ctrl = uut.bus().peek(regs::PWR_CTRL_IRQ.status);
        assert_eq!(ctrl & pc.pwr_state_mask, 0);
        assert!(events(&uut).contains(&Trace::CoreDown(Core::Acpu3_1)));
    }

    #[test]
    fn memory_power_down_request_powers_bank_off() {
        let mut uut = make_uut();
        let bank = MemoryBank::Ocm0_1;
        let mc = tables::memory(bank);
        uut.power_up_memory(bank).unwrap();

        let bit = mc.glob_pwr_status_mask;
        raise(&uut, PsmIrq::PWR_DWN, mc.regs.down, bit);
        uut.handle_interrupt(0).unwrap();

        assert_eq!(uut.bank_state(bank), BankState::Down);
        let bus = uut.bus();
        assert_eq!(bus.peek(mc.regs.pwr_status) & mc.pwr_status_mask, 0);
        assert_eq!(bus.peek(mc.regs.down.status) & bit, 0);
        assert_ne!(bus.peek(mc.regs.down.mask) & bit, 0);
        assert_eq!(bus.peek(regs::PSM_IRQ.status), 0);
        assert!(events(&uut).contains(&Trace::MemoryDownRequest(bank)));
    }

    #[test]
    fn memory_power_up_request_powers_bank_on() {
        let mut uut = make_uut();
        let bank = MemoryBank::Gem0;
        let mc = tables::memory(bank);

        let bit = mc.glob_pwr_status_mask;
        raise(&uut, PsmIrq::PWR_UP, mc.regs.up, bit);
        uut.handle_interrupt(0).unwrap();

        assert_eq!(uut.bank_state(bank), BankState::On);
        let bus = uut.bus();
        assert_ne!(bus.peek(mc.regs.pwr_status) & mc.pwr_status_mask, 0);
        assert_eq!(bus.peek(mc.regs.up.status) & bit, 0);
        assert_ne!(bus.peek(mc.regs.up.mask) & bit, 0);
        // No core shares these request bits.
        assert!(!events(&uut)
            .iter()
            .any(|e| matches!(e, Trace::PowerUpRequest(_))));
    }

    #[test]
    fn retention_request_through_interrupt_retains_bank() {
        let mut uut = make_uut();
        let bank = MemoryBank::TcmB_0;
        let mc = tables::memory(bank);
        uut.power_up_memory(bank).unwrap();

        let bits = mc.glob_pwr_status_mask | mc.ret_mask;
        raise(&uut, PsmIrq::PWR_DWN, mc.regs.down, bits);
        uut.handle_interrupt(0).unwrap();

        assert_eq!(uut.bank_state(bank), BankState::Retained);
        assert_ne!(uut.bus().peek(mc.regs.ret_ctrl) & mc.ret_ctrl_mask, 0);
        assert_eq!(uut.bus().peek(mc.regs.down.status) & bits, 0);
        assert!(events(&uut).contains(&Trace::RetentionEntered(bank)));
        // The core the bank lives in is left running.
        assert!(up(&uut, Core::RpuB_0));
    }

    #[test]
    fn memory_power_down_gives_way_to_power_up() {
        let mut uut = make_uut();
        let bank = MemoryBank::Ocm2_0;
        let mc = tables::memory(bank);
        uut.power_up_memory(bank).unwrap();

        let bit = mc.glob_pwr_status_mask;
        raise(&uut, PsmIrq::PWR_DWN, mc.regs.down, bit);
        raise(&uut, PsmIrq::PWR_DWN, mc.regs.up, bit);
        uut.handle_interrupt(0).unwrap();

        assert_eq!(uut.bank_state(bank), BankState::On);
        assert_eq!(uut.bus().peek(mc.regs.down.status) & bit, 0);
        assert!(events(&uut).contains(&Trace::MemoryDownSuperseded(bank)));
    }

    #[test]
    fn failed_memory_handler_is_still_acknowledged() {
        let mut uut = make_uut();
        let bank = MemoryBank::Gem1;
        let mc = tables::memory(bank);
        uut.bus().disconnect(mc.regs.pwr_status, mc.pwr_status_mask);

        let bit = mc.glob_pwr_status_mask;
        raise(&uut, PsmIrq::PWR_UP, mc.regs.up, bit);
        assert_eq!(uut.handle_interrupt(0), Ok(()));

        assert_eq!(uut.bus().peek(mc.regs.up.status) & bit, 0);
        assert_ne!(uut.bus().peek(mc.regs.up.mask) & bit, 0);
        assert!(events(&uut).contains(&Trace::BankHandlerFailed(
            bank,
            PmError::MemoryAckTimeout
        )));
    }
}
