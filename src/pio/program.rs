//! Assembling PIO programs from labelled instructions.

use anyhow::{bail, Result};
use hashbrown::HashMap;

use super::instruction::{Instruction, JmpCondition, MovDest, MovSource, Op, SetDest};

/// Size of the instruction memory of one PIO block.
pub const MAX_PROGRAM_LEN: usize = 32;

/// An assembled program.
/// Keeps its labels around so a program counter can be mapped back to a named section.
#[derive(Debug, Clone)]
pub struct Program {
    ops: Vec<Op>,
    labels: HashMap<&'static str, u8>,
}

impl Program {
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Address of a label, if the program defines it.
    pub fn label(&self, name: &str) -> Option<u8> {
        self.labels.get(name).copied()
    }

    /// True if any instruction drives a side-set pin.
    pub fn uses_side_set(&self) -> bool {
        self.ops.iter().any(|x| x.side.is_some())
    }
}

enum Pending {
    Ready(Op),
    Jump {
        condition: JmpCondition,
        label: &'static str,
        side: Option<bool>,
    },
}

/// Builds a [`Program`] one instruction at a time.
/// Jumps refer to labels, which are resolved in [`ProgramBuilder::build`].
///
/// ```text
/// let mut p = ProgramBuilder::new();
/// p.label("top").set(SetDest::Y, 7).jmp(JmpCondition::YDec, "top");
/// let program = p.build()?;
/// ```
#[derive(Default)]
pub struct ProgramBuilder {
    ops: Vec<Pending>,
    labels: HashMap<&'static str, u8>,
    duplicate: Option<&'static str>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the address of the next instruction.
    pub fn label(&mut self, name: &'static str) -> &mut Self {
        let addr = self.ops.len() as u8;
        if self.labels.insert(name, addr).is_some() {
            self.duplicate.get_or_insert(name);
        }
        self
    }

    pub fn jmp(&mut self, condition: JmpCondition, label: &'static str) -> &mut Self {
        self.ops.push(Pending::Jump {
            condition,
            label,
            side: None,
        });
        self
    }

    pub fn wait_irq(&mut self, polarity: bool, index: u8) -> &mut Self {
        self.push(Instruction::WaitIrq { polarity, index })
    }

    pub fn irq(&mut self, index: u8) -> &mut Self {
        self.push(Instruction::irq_set(index))
    }

    pub fn irq_clear(&mut self, index: u8) -> &mut Self {
        self.push(Instruction::irq_clear(index))
    }

    pub fn mov(&mut self, dest: MovDest, source: MovSource) -> &mut Self {
        self.push(Instruction::Mov { dest, source })
    }

    pub fn pull(&mut self, block: bool) -> &mut Self {
        self.push(Instruction::Pull { block })
    }

    pub fn set(&mut self, dest: SetDest, data: u8) -> &mut Self {
        self.push(Instruction::Set { dest, data })
    }

    pub fn nop(&mut self) -> &mut Self {
        self.push(Instruction::Nop)
    }

    /// Attaches a side-set value to the previous instruction.
    pub fn side(&mut self, value: bool) -> &mut Self {
        match self.ops.last_mut() {
            Some(Pending::Ready(op)) => op.side = Some(value),
            Some(Pending::Jump { side, .. }) => *side = Some(value),
            None => {}
        }
        self
    }

    fn push(&mut self, instruction: Instruction) -> &mut Self {
        self.ops.push(Pending::Ready(instruction.into()));
        self
    }

    pub fn build(self) -> Result<Program> {
        if let Some(label) = self.duplicate {
            bail!("Label `{label}` defined more than once");
        }

        if self.ops.is_empty() {
            bail!("Program is empty");
        }

        if self.ops.len() > MAX_PROGRAM_LEN {
            bail!(
                "Program is {} instructions long, the limit is {MAX_PROGRAM_LEN}",
                self.ops.len()
            );
        }

        let mut ops = Vec::with_capacity(self.ops.len());
        for i in self.ops {
            ops.push(match i {
                Pending::Ready(op) => op,
                Pending::Jump {
                    condition,
                    label,
                    side,
                } => {
                    let Some(&target) = self.labels.get(label) else {
                        bail!("Undefined label `{label}`");
                    };
                    Op {
                        instruction: Instruction::Jmp { condition, target },
                        side,
                    }
                }
            });
        }

        Ok(Program {
            ops,
            labels: self.labels,
        })
    }
}
