//! Volume sequencer.
//! Each time the sync flag is up it runs an 8 tick PWM window: the pin goes high at the tick
//! where the counter meets the duty in X and stays high until the window ends.
//! Duty -1 never matches the counter, so the pin stays low.

use anyhow::Result;

use super::SYNC_IRQ;
use crate::pio::{
    instruction::{JmpCondition, MovDest, MovSource, SetDest},
    program::{Program, ProgramBuilder},
    state_machine::Registers,
};

/// Highest duty value, the counter starts here every window.
pub const MAX_DUTY: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Loading the duty and waiting for the sync flag.
    WaitSync,
    /// Inside the PWM window, with the counter value.
    PulseTick(u8),
}

pub fn program() -> Result<Program> {
    let mut p = ProgramBuilder::new();
    p.pull(false)
        .side(false)
        .mov(MovDest::X, MovSource::Osr)
        .set(SetDest::Y, MAX_DUTY)
        .wait_irq(true, SYNC_IRQ);

    p.label("pwmloop")
        .jmp(JmpCondition::XNotY, "skip")
        .nop()
        .side(true)
        .label("skip")
        .jmp(JmpCondition::YDec, "pwmloop");

    p.build()
}

pub fn phase(program: &Program, regs: &Registers) -> Phase {
    match program.label("pwmloop") {
        Some(start) if regs.pc >= start => Phase::PulseTick(regs.y.min(MAX_DUTY as u32) as u8),
        _ => Phase::WaitSync,
    }
}

#[cfg(test)]
mod test {
    use super::{phase, program, Phase};
    use crate::{
        pio::{
            instruction::JmpCondition, pin::Pin, program::ProgramBuilder, state_machine::Registers,
            Pio,
        },
        programs::SYNC_IRQ,
    };

    /// Runs the volume program with the sync flag held up and returns the pin's high fraction.
    fn duty_cycle(duty: i32) -> f64 {
        let mut hold = ProgramBuilder::new();
        hold.irq(SYNC_IRQ)
            .label("end")
            .jmp(JmpCondition::Always, "end");

        let pio = Pio::new(1_000_000);
        let pin = Pin::new(0);
        let flag = pio
            .state_machine(0, &hold.build().unwrap(), 1_000_000, None)
            .unwrap();
        let volume = pio
            .state_machine(1, &program().unwrap(), 1_000_000, Some(pin.clone()))
            .unwrap();

        flag.active(true);
        volume.active(true);
        volume.put(duty as u32);

        let ticks = 21_000;
        pio.advance_probed(ticks, &pin) as f64 / ticks as f64
    }

    #[test]
    fn test_silent_duty() {
        assert_eq!(duty_cycle(-1), 0.0);
    }

    #[test]
    fn test_duty_steps() {
        // Window is 21 ticks, the pin is high for two ticks per duty step
        for duty in 0..=7 {
            let expected = 2.0 * (duty + 1) as f64 / 21.0;
            let got = duty_cycle(duty);
            assert!(
                (got - expected).abs() < 0.01,
                "duty {duty}: expected {expected}, got {got}"
            );
        }
    }

    #[test]
    fn test_waits_for_sync() {
        let pio = Pio::new(1_000_000);
        let pin = Pin::new(0);
        let volume = pio
            .state_machine(0, &program().unwrap(), 1_000_000, Some(pin.clone()))
            .unwrap();
        volume.active(true);
        volume.put(7);

        assert_eq!(pio.advance_probed(10_000, &pin), 0);
        let regs = volume.registers();
        assert_eq!(regs.x, 7);
        assert_eq!(phase(&program().unwrap(), &regs), Phase::WaitSync);
    }

    #[test]
    fn test_phases() {
        let program = program().unwrap();
        let regs = Registers {
            pc: 5,
            y: 3,
            ..Default::default()
        };
        assert_eq!(phase(&program, &regs), Phase::PulseTick(3));
        assert_eq!(phase(&program, &Registers::default()), Phase::WaitSync);
    }
}
