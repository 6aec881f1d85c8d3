//! The subset of the PIO instruction set used by the beeper programs.

use std::fmt::{self, Display};

/// Condition checked by a `jmp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JmpCondition {
    Always,
    /// Jump if Y is non-zero, decrementing Y either way.
    YDec,
    XNotY,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovSource {
    Isr,
    Osr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovDest {
    X,
    Y,
    Isr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetDest {
    Y,
}

/// A single decoded instruction, without side-set.
/// Jump targets are absolute program addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Jmp { condition: JmpCondition, target: u8 },
    /// Stall until IRQ flag `index` has the level `polarity`.
    /// The flag is only read, never cleared.
    WaitIrq { polarity: bool, index: u8 },
    Irq { clear: bool, index: u8 },
    Mov { dest: MovDest, source: MovSource },
    /// Load OSR from the TX FIFO.
    /// A non-blocking pull from an empty FIFO copies X into OSR instead.
    Pull { block: bool },
    Set { dest: SetDest, data: u8 },
    Nop,
}

/// An instruction plus the optional side-set value applied when it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Op {
    pub instruction: Instruction,
    pub side: Option<bool>,
}

impl Instruction {
    pub fn irq_set(index: u8) -> Self {
        Self::Irq {
            clear: false,
            index,
        }
    }

    pub fn irq_clear(index: u8) -> Self {
        Self::Irq { clear: true, index }
    }
}

impl From<Instruction> for Op {
    fn from(instruction: Instruction) -> Self {
        Self {
            instruction,
            side: None,
        }
    }
}

impl Display for JmpCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Always => "",
            Self::YDec => "y-- ",
            Self::XNotY => "x!=y ",
        })
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jmp { condition, target } => write!(f, "jmp {condition}{target}"),
            Self::WaitIrq { polarity, index } => write!(f, "wait {} irq {index}", *polarity as u8),
            Self::Irq { clear: true, index } => write!(f, "irq clear {index}"),
            Self::Irq { clear: false, index } => write!(f, "irq {index}"),
            Self::Mov { dest, source } => write!(f, "mov {dest:?}, {source:?}"),
            Self::Pull { block: true } => f.write_str("pull block"),
            Self::Pull { block: false } => f.write_str("pull noblock"),
            Self::Set { dest, data } => write!(f, "set {dest:?}, {data}"),
            Self::Nop => f.write_str("nop"),
        }
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.side {
            Some(side) => write!(f, "{} side {}", self.instruction, side as u8),
            None => write!(f, "{}", self.instruction),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Instruction, JmpCondition, Op};

    #[test]
    fn test_display() {
        let jmp = Instruction::Jmp {
            condition: JmpCondition::YDec,
            target: 3,
        };
        assert_eq!(jmp.to_string(), "jmp y-- 3");
        assert_eq!(Instruction::irq_clear(4).to_string(), "irq clear 4");

        let op = Op {
            instruction: Instruction::Nop,
            side: Some(true),
        };
        assert_eq!(op.to_string(), "nop side 1");
    }
}
