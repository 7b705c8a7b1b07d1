//! Block chaining
//!
//! Patterns are tried in order. Every block restarts from the base cursor
//! saved by the prologue, and any mismatch falls through to the next block.
//! The last block returns the default verdict.

use dnsbpf_core::program::BASE_CURSOR_SLOT;
use dnsbpf_core::{Block, BlockId, CompileFlags, Instruction, Program};

use crate::emitter::emit_segment;
use crate::pattern::Pattern;

/// Offset of the IPv4 version/IHL byte behind a 14-byte Ethernet header.
pub const IPV4_IHL_OFFSET: u32 = 14;

/// Bytes between the end of the IPv4 header and the DNS question name:
/// Ethernet header (14) + UDP header (8) + DNS header (12).
pub const QUESTION_OFFSET: u32 = 34;

pub fn build_program(patterns: &[Pattern], flags: CompileFlags) -> Program {
    let mut blocks = Vec::with_capacity(patterns.len() + 1);

    for (index, pattern) in patterns.iter().enumerate() {
        let id = BlockId(index);
        let mismatch = id.next();

        let mut block = Block::new(id);
        block.push(Instruction::Comment(pattern.source.clone()));
        block.push(Instruction::LoadCursorFromSlot {
            slot: BASE_CURSOR_SLOT,
        });
        let mut body = Vec::new();
        for segment in &pattern.segments {
            emit_segment(&mut body, segment, mismatch, flags);
        }
        block.extend(body);
        block.push(Instruction::Return(flags.accept_verdict()));

        log::debug!("Block {}: {} ({} instructions)", id, pattern.source, block.len());
        blocks.push(block);
    }

    let mut terminal = Block::new(BlockId(patterns.len()));
    terminal.push(Instruction::Return(flags.default_verdict()));
    blocks.push(terminal);

    Program {
        prologue: prologue(),
        blocks,
        flags,
    }
}

fn prologue() -> Vec<Instruction> {
    vec![
        Instruction::LoadHeaderLength {
            offset: IPV4_IHL_OFFSET,
        },
        Instruction::CursorToAcc,
        Instruction::AddImm(QUESTION_OFFSET),
        Instruction::Comment("M[0] = offset of first dns query byte".to_string()),
        Instruction::Store {
            slot: BASE_CURSOR_SLOT,
        },
    ]
}
