//! Host-side model of an RP2040 style PIO block.
//!
//! A block has four state machines sharing one instruction clock source (the system clock)
//! and eight IRQ flags. Each machine runs its own program through a fractional clock divider.
//! Nothing runs on its own: whoever owns the clock (the audio callback, or a simulated delay)
//! calls [`Pio::advance`] to move the block forward.

use std::sync::Arc;

use anyhow::{bail, Result};
use bitflags::bitflags;
use crossbeam::channel;
use parking_lot::Mutex;
use tracing::{debug, warn};

pub mod instruction;
pub mod pin;
pub mod program;
pub mod state_machine;

use self::{
    pin::Pin,
    program::Program,
    state_machine::{Machine, StateMachine, FIFO_DEPTH},
};

/// Number of state machines in a block.
pub const STATE_MACHINES: usize = 4;

bitflags! {
    /// The block's IRQ flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqFlags: u8 {
        const _ = !0;
    }
}

impl IrqFlags {
    pub fn level(&self, index: u8) -> bool {
        self.bits() & (1 << (index & 7)) != 0
    }

    pub fn set_level(&mut self, index: u8, level: bool) {
        self.set(Self::from_bits_retain(1 << (index & 7)), level);
    }
}

pub(crate) struct Block {
    sys_clock: u32,
    irq: IrqFlags,
    machines: [Option<Machine>; STATE_MACHINES],
}

impl Block {
    fn machine(&self, slot: usize) -> &Machine {
        self.machines[slot]
            .as_ref()
            .expect("handles only exist for loaded slots")
    }

    fn machine_mut(&mut self, slot: usize) -> &mut Machine {
        self.machines[slot]
            .as_mut()
            .expect("handles only exist for loaded slots")
    }

    /// Runs `ticks` system clock cycles, returning how many of them ended with `probe` high.
    /// Stretches where every running machine is stuck on a `wait` are skipped in one go.
    fn advance(&mut self, mut ticks: u64, probe: Option<&Pin>) -> u64 {
        let mut high = 0;

        while ticks > 0 {
            let irq = self.irq;
            let next = self
                .machines
                .iter()
                .flatten()
                .filter(|x| x.enabled() && !x.is_waiting(irq))
                .map(|x| x.due_in())
                .min()
                .unwrap_or(ticks)
                .min(ticks);

            let level = probe.map(|x| x.value()).unwrap_or(false);
            high += (next - 1) * level as u64;

            let Block { machines, irq, .. } = &mut *self;
            for machine in machines.iter_mut().flatten().filter(|x| x.enabled()) {
                if machine.advance_clock(next) {
                    machine.step(irq);
                }
            }

            high += probe.map(|x| x.value()).unwrap_or(false) as u64;
            ticks -= next;
        }

        high
    }
}

/// A shared handle to a PIO block.
#[derive(Clone)]
pub struct Pio {
    block: Arc<Mutex<Block>>,
}

impl Pio {
    pub fn new(sys_clock: u32) -> Self {
        Self {
            block: Arc::new(Mutex::new(Block {
                sys_clock,
                irq: IrqFlags::empty(),
                machines: Default::default(),
            })),
        }
    }

    pub fn sys_clock(&self) -> u32 {
        self.block.lock().sys_clock
    }

    pub fn irq_flags(&self) -> IrqFlags {
        self.block.lock().irq
    }

    /// Loads `program` into state machine `slot`, clocked at `freq` Hz.
    /// The machine starts stopped. If `sideset_pin` is given, side-set values drive that pin.
    pub fn state_machine(
        &self,
        slot: usize,
        program: &Program,
        freq: u32,
        sideset_pin: Option<Pin>,
    ) -> Result<StateMachine> {
        let mut block = self.block.lock();
        if program.uses_side_set() && sideset_pin.is_none() {
            warn!(slot, "program uses side-set but no pin is bound to it");
        }

        if slot >= STATE_MACHINES {
            bail!("State machine slot {slot} does not exist (0..{STATE_MACHINES})");
        }

        if block.machines[slot].is_some() {
            bail!("State machine slot {slot} is already in use");
        }

        if freq == 0 || freq > block.sys_clock {
            bail!(
                "State machine frequency {freq} Hz must be between 1 Hz and the system clock ({} Hz)",
                block.sys_clock
            );
        }

        let clkdiv = block.sys_clock as u64 * 256 / freq as u64;
        if clkdiv > u16::MAX as u64 * 256 {
            bail!("State machine frequency {freq} Hz is too low for the system clock");
        }

        debug!(
            slot,
            freq,
            clkdiv = clkdiv as f64 / 256.0,
            instructions = program.len(),
            "loading program"
        );

        let (tx, rx) = channel::bounded(FIFO_DEPTH);
        block.machines[slot] = Some(Machine::new(
            Arc::new(program.clone()),
            clkdiv as u32,
            rx,
            sideset_pin,
        ));

        Ok(StateMachine::new(self.block.clone(), slot, tx))
    }

    /// Runs the block for `ticks` system clock cycles.
    pub fn advance(&self, ticks: u64) {
        self.block.lock().advance(ticks, None);
    }

    /// Runs the block for `ticks` system clock cycles and counts the cycles `pin` ended high.
    pub fn advance_probed(&self, ticks: u64, pin: &Pin) -> u64 {
        self.block.lock().advance(ticks, Some(pin))
    }
}

#[cfg(test)]
mod test {
    use super::{pin::Pin, program::ProgramBuilder, IrqFlags, Pio};
    use crate::pio::instruction::{JmpCondition, SetDest};

    #[test]
    fn test_irq_levels() {
        let mut irq = IrqFlags::empty();
        irq.set_level(4, true);
        assert_eq!(irq.bits(), 1 << 4);
        assert!(irq.level(4));
        irq.set_level(4, false);
        assert!(!irq.level(4));
    }

    #[test]
    fn test_slot_checks() {
        let mut p = ProgramBuilder::new();
        p.nop();
        let program = p.build().unwrap();
        let pio = Pio::new(1_000_000);

        assert!(pio.state_machine(4, &program, 1000, None).is_err());
        assert!(pio.state_machine(0, &program, 2_000_000, None).is_err());
        assert!(pio.state_machine(0, &program, 10, None).is_err());
        assert!(pio.state_machine(0, &program, 1000, None).is_ok());
        assert!(pio.state_machine(0, &program, 1000, None).is_err());
    }

    #[test]
    fn test_waiting_machines_are_skipped() {
        // Raises IRQ 0 for one step in every six, the second machine mirrors it on a pin
        let mut producer = ProgramBuilder::new();
        producer
            .set(SetDest::Y, 2)
            .label("delay")
            .jmp(JmpCondition::YDec, "delay")
            .irq(0)
            .irq_clear(0);
        let mut consumer = ProgramBuilder::new();
        consumer.wait_irq(true, 0).side(false).nop().side(true);

        let pio = Pio::new(1000);
        let pin = Pin::new(1);
        let producer = pio
            .state_machine(0, &producer.build().unwrap(), 100, None)
            .unwrap();
        let consumer = pio
            .state_machine(1, &consumer.build().unwrap(), 1000, Some(pin.clone()))
            .unwrap();
        producer.active(true);
        consumer.active(true);

        // set, 3 jumps, irq: the flag goes up on the 5th producer step
        let high = pio.advance_probed(45, &pin);
        assert_eq!(high, 0);
        pio.advance(5);
        assert!(pio.irq_flags().level(0));
        pio.advance(3);
        assert!(pin.value());

        producer.active(false);
        consumer.active(false);
        let before = producer.registers();
        pio.advance(10_000);
        assert_eq!(producer.registers(), before);
    }
}
