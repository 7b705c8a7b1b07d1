//! Segment emission
//!
//! Each segment becomes straight-line code relative to the cursor register.
//! Runs are compared in 4/2/1-byte chunks and then advance the cursor past
//! themselves; wildcards skip one length-prefixed label unconditionally.

use dnsbpf_core::{BlockId, CompileFlags, Instruction, Width};

use crate::pattern::Segment;

/// Greedy chunk decomposition of a run of `len` bytes.
pub fn chunk_widths(len: usize) -> Vec<Width> {
    let mut widths = Vec::new();
    let mut remaining = len;
    while let Some(width) = Width::largest_fitting(remaining) {
        widths.push(width);
        remaining -= width.bytes();
    }
    widths
}

pub fn emit_segment(
    out: &mut Vec<Instruction>,
    segment: &Segment,
    mismatch: BlockId,
    flags: CompileFlags,
) {
    match segment {
        Segment::Run(bytes) => emit_run(out, bytes, mismatch, flags),
        Segment::Wildcard => emit_wildcard(out),
    }
}

/// Compare `bytes` at the cursor, jumping to `mismatch` on the first
/// difference, then move the cursor past them.
pub fn emit_run(out: &mut Vec<Instruction>, bytes: &[u8], mismatch: BlockId, flags: CompileFlags) {
    if bytes.is_empty() {
        return;
    }

    let ignore_case = flags.contains(CompileFlags::IGNORE_CASE);
    out.push(Instruction::Comment(format!("'{}'", bytes.escape_ascii())));

    let mut offset = 0usize;
    for width in chunk_widths(bytes.len()) {
        let chunk = &bytes[offset..offset + width.bytes()];
        let mut value = chunk.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);

        out.push(Instruction::Load {
            width,
            offset: offset as u32,
        });
        // Length prefixes are masked too; see DESIGN.md
        if ignore_case {
            out.push(Instruction::OrImm(width.case_mask()));
            value |= width.case_mask();
        }
        out.push(Instruction::JumpIfNotEqual {
            width,
            value,
            target: mismatch,
        });
        offset += width.bytes();
    }

    out.push(Instruction::CursorToAcc);
    out.push(Instruction::AddImm(offset as u32));
    out.push(Instruction::AccToCursor);
}

/// `X = X + frame[X] + 1`
pub fn emit_wildcard(out: &mut Vec<Instruction>) {
    out.push(Instruction::Comment("Match: *".to_string()));
    out.push(Instruction::Load {
        width: Width::Byte,
        offset: 0,
    });
    out.push(Instruction::AddCursor);
    out.push(Instruction::AddImm(1));
    out.push(Instruction::AccToCursor);
}
