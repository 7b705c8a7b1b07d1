//! Program rendering in `bpf_asm` syntax.

use std::fmt::Write;

use dnsbpf_core::{Instruction, Program, Width};

const INDENT: &str = "    ";

pub fn render_program(program: &Program) -> String {
    let mut out = String::new();

    for insn in &program.prologue {
        render_line(&mut out, insn);
    }
    out.push('\n');

    let last = program.blocks.len().saturating_sub(1);
    for (index, block) in program.blocks.iter().enumerate() {
        let _ = writeln!(out, "{}:", block.id);
        for insn in &block.instructions {
            render_line(&mut out, insn);
        }
        if index != last {
            out.push('\n');
        }
    }

    out
}

fn render_line(out: &mut String, insn: &Instruction) {
    let _ = writeln!(out, "{INDENT}{}", render_instruction(insn));
}

pub fn render_instruction(insn: &Instruction) -> String {
    match insn {
        Instruction::Comment(text) => format!("; {text}"),
        Instruction::LoadHeaderLength { offset } => format!("ldx 4*([{offset}]&0xf)"),
        Instruction::LoadCursorFromSlot { slot } => format!("ldx M[{slot}]"),
        Instruction::Store { slot } => format!("st M[{slot}]"),
        Instruction::Load { width, offset } => {
            let mnemonic = match width {
                Width::Word => "ld",
                Width::Half => "ldh",
                Width::Byte => "ldb",
            };
            format!("{mnemonic} [x + {offset}]")
        }
        Instruction::OrImm(value) => format!("or #0x{value:x}"),
        Instruction::JumpIfNotEqual {
            width,
            value,
            target,
        } => {
            let digits = width.bytes() * 2;
            format!("jneq #0x{value:0digits$x}, {target}")
        }
        Instruction::CursorToAcc => "txa".to_string(),
        Instruction::AccToCursor => "tax".to_string(),
        Instruction::AddImm(value) => format!("add #{value}"),
        Instruction::AddCursor => "add x".to_string(),
        Instruction::Return(value) => format!("ret #{value}"),
    }
}
