//! A single PIO state machine: registers, program counter, TX FIFO and clock divider.

use std::sync::Arc;

use anyhow::{bail, Result};
use crossbeam::channel::{Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use tracing::{trace, warn};

use super::{
    instruction::{Instruction, JmpCondition, MovDest, MovSource, Op, SetDest},
    pin::Pin,
    program::Program,
    Block, IrqFlags,
};

/// Depth of the TX FIFO.
pub const FIFO_DEPTH: usize = 4;

/// Snapshot of a state machine's registers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub x: u32,
    pub y: u32,
    pub isr: u32,
    pub osr: u32,
    pub pc: u8,
}

enum Flow {
    Next,
    Jump(u8),
    Stall,
}

/// The hardware side of a state machine, owned by the [`Block`].
pub(super) struct Machine {
    program: Arc<Program>,
    regs: Registers,
    enabled: bool,
    /// Clock divider in 16.8 fixed point, relative to the system clock.
    clkdiv: u32,
    /// Fractional clock accumulator, same unit as `clkdiv`.
    acc: u32,
    fifo: Receiver<u32>,
    side_pin: Option<Pin>,
}

impl Machine {
    pub(super) fn new(
        program: Arc<Program>,
        clkdiv: u32,
        fifo: Receiver<u32>,
        side_pin: Option<Pin>,
    ) -> Self {
        Self {
            program,
            regs: Registers::default(),
            enabled: false,
            clkdiv,
            acc: 0,
            fifo,
            side_pin,
        }
    }

    pub(super) fn enabled(&self) -> bool {
        self.enabled
    }

    /// Enabling a stopped machine restarts it from the first instruction with a fresh clock divider.
    /// Registers are kept so the last pulled value can still be recycled.
    pub(super) fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            self.regs.pc = 0;
            self.acc = 0;
        }
        self.enabled = enabled;
    }

    pub(super) fn registers(&self) -> Registers {
        self.regs
    }

    /// System clock ticks until this machine executes its next instruction.
    pub(super) fn due_in(&self) -> u64 {
        (((self.clkdiv - self.acc) as u64 + 255) / 256).max(1)
    }

    /// Moves the clock divider forward by `ticks`, returning true if an instruction is due.
    pub(super) fn advance_clock(&mut self, ticks: u64) -> bool {
        let total = self.acc as u64 + ticks * 256;
        self.acc = (total % self.clkdiv as u64) as u32;
        total >= self.clkdiv as u64
    }

    /// Drops everything waiting in the TX FIFO, returning how many values were dropped.
    pub(super) fn clear_fifo(&mut self) -> usize {
        self.fifo.try_iter().count()
    }

    /// True if the current instruction is a `wait` that can not complete with the given flags.
    pub(super) fn is_waiting(&self, irq: IrqFlags) -> bool {
        match self.program.ops()[self.regs.pc as usize].instruction {
            Instruction::WaitIrq { polarity, index } => irq.level(index) != polarity,
            _ => false,
        }
    }

    /// Runs the instruction at the program counter.
    pub(super) fn step(&mut self, irq: &mut IrqFlags) {
        let op = self.program.ops()[self.regs.pc as usize];
        match self.execute(op, irq) {
            Flow::Next => {
                let next = self.regs.pc as usize + 1;
                self.regs.pc = if next >= self.program.len() { 0 } else { next as u8 };
            }
            Flow::Jump(target) => self.regs.pc = target,
            Flow::Stall => {}
        }
    }

    /// Runs an instruction that is not part of the program.
    /// A jump moves the program counter, anything else leaves it alone.
    pub(super) fn exec(&mut self, op: Op, irq: &mut IrqFlags) -> Result<()> {
        match self.execute(op, irq) {
            Flow::Next => Ok(()),
            Flow::Jump(target) => {
                self.regs.pc = target;
                Ok(())
            }
            Flow::Stall => bail!("Executed instruction `{op}` would stall"),
        }
    }

    fn execute(&mut self, op: Op, irq: &mut IrqFlags) -> Flow {
        if let (Some(side), Some(pin)) = (op.side, &self.side_pin) {
            pin.set(side);
        }

        let regs = &mut self.regs;
        match op.instruction {
            Instruction::Jmp { condition, target } => {
                let jump = match condition {
                    JmpCondition::Always => true,
                    JmpCondition::XNotY => regs.x != regs.y,
                    JmpCondition::YDec => {
                        let jump = regs.y != 0;
                        regs.y = regs.y.wrapping_sub(1);
                        jump
                    }
                };

                if jump {
                    return Flow::Jump(target);
                }
            }
            Instruction::WaitIrq { polarity, index } => {
                if irq.level(index) != polarity {
                    return Flow::Stall;
                }
            }
            Instruction::Irq { clear, index } => irq.set_level(index, !clear),
            Instruction::Mov { dest, source } => {
                let value = match source {
                    MovSource::Isr => regs.isr,
                    MovSource::Osr => regs.osr,
                };
                match dest {
                    MovDest::X => regs.x = value,
                    MovDest::Y => regs.y = value,
                    MovDest::Isr => regs.isr = value,
                }
            }
            Instruction::Pull { block } => match self.fifo.try_recv() {
                Ok(value) => {
                    trace!(value, "pulled from fifo");
                    regs.osr = value;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) if block => {
                    return Flow::Stall
                }
                Err(_) => regs.osr = regs.x,
            },
            Instruction::Set {
                dest: SetDest::Y,
                data,
            } => regs.y = data as u32,
            Instruction::Nop => {}
        }

        Flow::Next
    }
}

/// Handle to a state machine loaded into a [`super::Pio`] block.
/// Pushes go straight into the TX FIFO, everything else briefly locks the block.
#[derive(Clone)]
pub struct StateMachine {
    block: Arc<Mutex<Block>>,
    slot: usize,
    tx: Sender<u32>,
}

impl StateMachine {
    pub(super) fn new(block: Arc<Mutex<Block>>, slot: usize, tx: Sender<u32>) -> Self {
        Self { block, slot, tx }
    }

    /// Starts or stops the state machine.
    pub fn active(&self, active: bool) {
        trace!(slot = self.slot, active, "state machine");
        self.block.lock().machine_mut(self.slot).set_enabled(active);
    }

    /// Pushes a value into the TX FIFO, blocking while the FIFO is full.
    pub fn put(&self, value: u32) {
        if self.tx.send(value).is_err() {
            warn!(slot = self.slot, "TX FIFO has no receiver, dropping value");
        }
    }

    /// Empties the TX FIFO, so values the program never pulled don't reach the next run.
    pub fn clear_fifos(&self) {
        let dropped = self.block.lock().machine_mut(self.slot).clear_fifo();
        if dropped > 0 {
            trace!(slot = self.slot, dropped, "cleared fifo");
        }
    }

    /// Immediately runs one instruction on this state machine.
    pub fn exec(&self, op: impl Into<Op>) -> Result<()> {
        let mut block = self.block.lock();
        let Block { machines, irq, .. } = &mut *block;
        match machines[self.slot].as_mut() {
            Some(machine) => machine.exec(op.into(), irq),
            None => bail!("State machine {} has no program", self.slot),
        }
    }

    pub fn registers(&self) -> Registers {
        self.block.lock().machine(self.slot).registers()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crossbeam::channel;

    use super::{Machine, FIFO_DEPTH};
    use crate::pio::{
        instruction::{Instruction, JmpCondition, MovDest, MovSource, SetDest},
        pin::Pin,
        program::ProgramBuilder,
        IrqFlags, Pio,
    };

    fn machine(p: ProgramBuilder, clkdiv: u32, pin: Option<Pin>) -> (Machine, channel::Sender<u32>) {
        let (tx, rx) = channel::bounded(FIFO_DEPTH);
        let mut machine = Machine::new(Arc::new(p.build().unwrap()), clkdiv, rx, pin);
        machine.set_enabled(true);
        (machine, tx)
    }

    #[test]
    fn test_pull_noblock_recycles_x() {
        let mut p = ProgramBuilder::new();
        p.pull(false).mov(MovDest::X, MovSource::Osr);
        let (mut sm, tx) = machine(p, 256, None);
        let mut irq = IrqFlags::empty();

        tx.send(42).unwrap();
        sm.step(&mut irq);
        sm.step(&mut irq);
        assert_eq!(sm.registers().x, 42);

        // Nothing pushed, so the pull copies X back into OSR
        sm.step(&mut irq);
        assert_eq!(sm.registers().osr, 42);
        assert_eq!(sm.registers().pc, 1);
    }

    #[test]
    fn test_jmp_y_dec() {
        let mut p = ProgramBuilder::new();
        p.set(SetDest::Y, 1)
            .label("loop")
            .jmp(JmpCondition::YDec, "loop")
            .nop();
        let (mut sm, _tx) = machine(p, 256, None);
        let mut irq = IrqFlags::empty();

        sm.step(&mut irq);
        sm.step(&mut irq);
        assert_eq!(sm.registers().pc, 1);
        assert_eq!(sm.registers().y, 0);

        // Y was zero: fall through and wrap below zero
        sm.step(&mut irq);
        assert_eq!(sm.registers().pc, 2);
        assert_eq!(sm.registers().y, u32::MAX);
    }

    #[test]
    fn test_side_set_and_wait() {
        let pin = Pin::new(0);
        let mut p = ProgramBuilder::new();
        p.wait_irq(true, 4).nop().side(true);
        let (mut sm, _tx) = machine(p, 256, Some(pin.clone()));
        let mut irq = IrqFlags::empty();

        assert!(sm.is_waiting(irq));
        sm.step(&mut irq);
        assert_eq!(sm.registers().pc, 0);

        irq.set_level(4, true);
        assert!(!sm.is_waiting(irq));
        sm.step(&mut irq);
        sm.step(&mut irq);
        assert!(pin.value());
        // The wait only reads the flag
        assert!(irq.level(4));
    }

    #[test]
    fn test_exec_blocking_pull_stalls() {
        let mut p = ProgramBuilder::new();
        p.nop();
        let (mut sm, tx) = machine(p, 256, None);
        let mut irq = IrqFlags::empty();

        assert!(sm
            .exec(Instruction::Pull { block: true }.into(), &mut irq)
            .is_err());
        tx.send(5000).unwrap();
        sm.exec(Instruction::Pull { block: true }.into(), &mut irq)
            .unwrap();
        sm.exec(
            Instruction::Mov {
                dest: MovDest::Isr,
                source: MovSource::Osr,
            }
            .into(),
            &mut irq,
        )
        .unwrap();
        assert_eq!(sm.registers().isr, 5000);
    }

    #[test]
    fn test_clear_fifos() {
        let mut p = ProgramBuilder::new();
        p.pull(false).mov(MovDest::X, MovSource::Osr);
        let pio = Pio::new(1000);
        let sm = pio.state_machine(0, &p.build().unwrap(), 1000, None).unwrap();

        // A full FIFO would block the next put
        for i in 0..FIFO_DEPTH as u32 {
            sm.put(i + 1);
        }
        sm.clear_fifos();
        sm.put(9);

        sm.active(true);
        pio.advance(2);
        assert_eq!(sm.registers().x, 9);

        // Nothing left behind the value that was pulled
        pio.advance(2);
        assert_eq!(sm.registers().x, 9);
    }

    #[test]
    fn test_clock_divider() {
        let mut p = ProgramBuilder::new();
        p.nop();
        // Divide by 2.5
        let (mut sm, _tx) = machine(p, 640, None);

        let steps = (0..10).filter(|_| sm.advance_clock(1)).count();
        assert_eq!(steps, 4);
        assert!(!sm.advance_clock(1));
        assert_eq!(sm.due_in(), 2);

        sm.set_enabled(false);
        sm.set_enabled(true);
        assert_eq!(sm.due_in(), 3);
    }
}
