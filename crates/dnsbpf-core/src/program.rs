//! In-memory BPF program model
//!
//! A [`Program`] is built once by the compiler and then rendered or
//! interpreted. Jump targets are block indices, never textual labels.

use std::fmt;

use crate::types::{CompileFlags, Width};

/// Number of scratch memory words available to a classic BPF program.
pub const MEMWORDS: usize = 16;

/// Scratch slot holding the offset of the first DNS question byte.
pub const BASE_CURSOR_SLOT: u8 = 0;

/// Index of a block within [`Program::blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);

impl BlockId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }

    #[inline]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lb_{}", self.0)
    }
}

/// One line of a program. `X` is the cursor register, `A` the accumulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Non-executing annotation
    Comment(String),
    /// `ldx 4*([offset]&0xf)` - X = IPv4 header length
    LoadHeaderLength { offset: u32 },
    /// `ldx M[slot]`
    LoadCursorFromSlot { slot: u8 },
    /// `st M[slot]` - M[slot] = A
    Store { slot: u8 },
    /// `ld`/`ldh`/`ldb [x + offset]`
    Load { width: Width, offset: u32 },
    /// `or #value`
    OrImm(u32),
    /// `jneq #value, target`
    JumpIfNotEqual {
        width: Width,
        value: u32,
        target: BlockId,
    },
    /// `txa`
    CursorToAcc,
    /// `tax`
    AccToCursor,
    /// `add #value`
    AddImm(u32),
    /// `add x`
    AddCursor,
    /// `ret #value`
    Return(u32),
}

impl Instruction {
    #[inline]
    pub fn is_comment(&self) -> bool {
        matches!(self, Self::Comment(_))
    }

    /// Mismatch target when this is a conditional jump.
    pub fn jump_target(&self) -> Option<BlockId> {
        match self {
            Self::JumpIfNotEqual { target, .. } => Some(*target),
            _ => None,
        }
    }
}

/// Instructions testing one pattern, or the terminal default block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub instructions: Vec<Instruction>,
}

impl Block {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            instructions: Vec::new(),
        }
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub fn extend<I: IntoIterator<Item = Instruction>>(&mut self, instructions: I) {
        self.instructions.extend(instructions);
    }

    pub fn jump_targets(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.instructions.iter().filter_map(Instruction::jump_target)
    }

    pub fn return_values(&self) -> impl Iterator<Item = u32> + '_ {
        self.instructions.iter().filter_map(|insn| match insn {
            Instruction::Return(value) => Some(*value),
            _ => None,
        })
    }

    /// Executable instructions, comments excluded.
    pub fn len(&self) -> usize {
        self.instructions.iter().filter(|i| !i.is_comment()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A complete filter program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub prologue: Vec<Instruction>,
    /// Pattern blocks followed by exactly one terminal block.
    pub blocks: Vec<Block>,
    pub flags: CompileFlags,
}

impl Program {
    pub fn pattern_blocks(&self) -> &[Block] {
        match self.blocks.split_last() {
            Some((_, patterns)) => patterns,
            None => &[],
        }
    }

    pub fn terminal_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Executable instruction count, comments excluded.
    pub fn instruction_count(&self) -> usize {
        let prologue = self.prologue.iter().filter(|i| !i.is_comment()).count();
        prologue + self.blocks.iter().map(Block::len).sum::<usize>()
    }

    /// Flip both verdict constants, leaving every jump untouched.
    pub fn negated(&self) -> Self {
        let accept = self.flags.accept_verdict();
        let default = self.flags.default_verdict();
        let mut program = self.clone();
        for insn in program
            .blocks
            .iter_mut()
            .flat_map(|b| b.instructions.iter_mut())
        {
            if let Instruction::Return(value) = insn {
                *value = if *value == accept { default } else { accept };
            }
        }
        program.flags.toggle(CompileFlags::NEGATE);
        program
    }
}
