//! Assembled program codec
//!
//! The external assembler prints a program as a single line:
//! `count,code jt jf k,code jt jf k,...`. This is also the form accepted by
//! `iptables -m bpf --bytecode`.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

/// Largest program the kernel accepts.
pub const BPF_MAXINSNS: usize = 4096;

/// Error type for bytecode parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BytecodeError {
    #[error("Empty bytecode")]
    Empty,
    #[error("Invalid instruction count: {0:?}")]
    InvalidCount(String),
    #[error("Instruction {index}: expected 4 fields, found {found}")]
    FieldCount { index: usize, found: usize },
    #[error("Instruction {index}: invalid field {field:?}")]
    InvalidField { index: usize, field: String },
    #[error("Count mismatch: declared={declared}, found={found}")]
    CountMismatch { declared: usize, found: usize },
    #[error("Program too long: {0} instructions")]
    TooLong(usize),
}

/// One classic BPF instruction, laid out like `struct sock_filter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SockFilter {
    pub code: u16,
    pub jt: u8,
    pub jf: u8,
    pub k: u32,
}

pub fn parse_bytecode(text: &str) -> Result<Vec<SockFilter>, BytecodeError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(BytecodeError::Empty);
    }

    let mut parts = text.split(',').map(str::trim);
    let count_raw = parts.next().unwrap_or_default();
    let declared: usize = count_raw
        .parse()
        .map_err(|_| BytecodeError::InvalidCount(count_raw.to_string()))?;

    let mut program = Vec::with_capacity(declared.min(BPF_MAXINSNS));
    for (index, raw) in parts.enumerate() {
        // bpf_asm leaves a trailing comma on some versions
        if raw.is_empty() {
            continue;
        }
        program.push(parse_instruction(index, raw)?);
    }

    if program.len() != declared {
        return Err(BytecodeError::CountMismatch {
            declared,
            found: program.len(),
        });
    }
    if program.is_empty() {
        return Err(BytecodeError::Empty);
    }
    if program.len() > BPF_MAXINSNS {
        return Err(BytecodeError::TooLong(program.len()));
    }

    log::debug!("Parsed {} BPF instructions", program.len());
    Ok(program)
}

fn parse_instruction(index: usize, raw: &str) -> Result<SockFilter, BytecodeError> {
    let fields: Vec<&str> = raw.split_whitespace().collect();
    if fields.len() != 4 {
        return Err(BytecodeError::FieldCount {
            index,
            found: fields.len(),
        });
    }

    let invalid = |field: &str| BytecodeError::InvalidField {
        index,
        field: field.to_string(),
    };

    Ok(SockFilter {
        code: fields[0].parse().map_err(|_| invalid(fields[0]))?,
        jt: fields[1].parse().map_err(|_| invalid(fields[1]))?,
        jf: fields[2].parse().map_err(|_| invalid(fields[2]))?,
        k: fields[3].parse().map_err(|_| invalid(fields[3]))?,
    })
}

/// Encode as `count,code jt jf k,...`.
pub fn encode_bytecode(program: &[SockFilter]) -> String {
    let mut out = program.len().to_string();
    for insn in program {
        let _ = write!(out, ",{} {} {} {}", insn.code, insn.jt, insn.jf, insn.k);
    }
    out
}

/// Encode as C array initializer lines, one instruction per line.
pub fn encode_c_array(program: &[SockFilter]) -> String {
    let mut out = String::new();
    for insn in program {
        let _ = writeln!(
            out,
            "{{ 0x{:x}, {}, {}, 0x{:08x} }},",
            insn.code, insn.jt, insn.jf, insn.k
        );
    }
    out
}
