//! Tone sequencer.
//! Counts Y down from the reference value in ISR to the half-period count in X,
//! raising the sync flag at the end of the high half and clearing it at the end of the low half.

use anyhow::Result;

use super::SYNC_IRQ;
use crate::pio::{
    instruction::{JmpCondition, MovDest, MovSource},
    program::{Program, ProgramBuilder},
};

/// Where the tone sequencer is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Pulling the next count and reloading the counter.
    Restart,
    CountingHigh,
    CountingLow,
}

pub fn program() -> Result<Program> {
    let mut p = ProgramBuilder::new();
    p.label("restart")
        // An empty FIFO leaves the last count in X
        .pull(false)
        .mov(MovDest::X, MovSource::Osr)
        .mov(MovDest::Y, MovSource::Isr);

    p.label("uploop")
        .jmp(JmpCondition::XNotY, "skip_up")
        .irq(SYNC_IRQ)
        .jmp(JmpCondition::Always, "down")
        .label("skip_up")
        .jmp(JmpCondition::YDec, "uploop");

    p.label("down")
        .mov(MovDest::Y, MovSource::Isr)
        .label("down_loop")
        .jmp(JmpCondition::XNotY, "skip_down")
        .irq_clear(SYNC_IRQ)
        .jmp(JmpCondition::Always, "restart")
        .label("skip_down")
        .jmp(JmpCondition::YDec, "down_loop");

    p.build()
}

/// Maps a program counter of [`program`] to its phase.
pub fn phase(program: &Program, pc: u8) -> Phase {
    let high = program.label("uploop").unwrap_or(0);
    let low = program.label("down").unwrap_or(0);

    if pc < high {
        Phase::Restart
    } else if pc < low {
        Phase::CountingHigh
    } else {
        Phase::CountingLow
    }
}
