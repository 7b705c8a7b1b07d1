//! Classic BPF interpreter over in-memory programs.
//!
//! Follows the kernel's semantics for the subset of instructions the compiler
//! emits: loads are big-endian, a load past the end of the frame aborts the
//! program with verdict 0, and falling off the end of a block continues with
//! the next block.

use crate::program::{Instruction, Program, MEMWORDS};

enum Flow {
    Next,
    Jump(usize),
    Return(u32),
}

struct Machine<'a> {
    frame: &'a [u8],
    a: u32,
    x: u32,
    mem: [u32; MEMWORDS],
}

impl<'a> Machine<'a> {
    fn new(frame: &'a [u8]) -> Self {
        Self {
            frame,
            a: 0,
            x: 0,
            mem: [0; MEMWORDS],
        }
    }

    /// `None` aborts the program.
    fn step(&mut self, insn: &Instruction) -> Option<Flow> {
        match insn {
            Instruction::Comment(_) => {}
            Instruction::LoadHeaderLength { offset } => {
                let byte = *self.frame.get(*offset as usize)?;
                self.x = 4 * (byte as u32 & 0xf);
            }
            Instruction::LoadCursorFromSlot { slot } => {
                self.x = *self.mem.get(*slot as usize)?;
            }
            Instruction::Store { slot } => {
                *self.mem.get_mut(*slot as usize)? = self.a;
            }
            Instruction::Load { width, offset } => {
                let start = self.x.checked_add(*offset)? as usize;
                self.a = width.read_be(self.frame.get(start..)?)?;
            }
            Instruction::OrImm(value) => self.a |= value,
            Instruction::JumpIfNotEqual { value, target, .. } => {
                if self.a != *value {
                    return Some(Flow::Jump(target.index()));
                }
            }
            Instruction::CursorToAcc => self.a = self.x,
            Instruction::AccToCursor => self.x = self.a,
            Instruction::AddImm(value) => self.a = self.a.wrapping_add(*value),
            Instruction::AddCursor => self.a = self.a.wrapping_add(self.x),
            Instruction::Return(value) => return Some(Flow::Return(*value)),
        }
        Some(Flow::Next)
    }
}

impl Program {
    /// Run the program against a raw frame and return its verdict.
    pub fn run(&self, frame: &[u8]) -> u32 {
        let mut machine = Machine::new(frame);

        for insn in &self.prologue {
            match machine.step(insn) {
                Some(Flow::Next) => {}
                Some(Flow::Return(value)) => return value,
                // Jumps out of the prologue are never emitted
                Some(Flow::Jump(_)) | None => return 0,
            }
        }

        let mut block = 0usize;
        'blocks: while let Some(current) = self.blocks.get(block) {
            for insn in &current.instructions {
                match machine.step(insn) {
                    Some(Flow::Next) => {}
                    Some(Flow::Jump(target)) => {
                        // Classic BPF only jumps forward
                        if target <= block {
                            return 0;
                        }
                        block = target;
                        continue 'blocks;
                    }
                    Some(Flow::Return(value)) => return value,
                    None => return 0,
                }
            }
            block += 1;
        }

        0
    }
}

#[cfg(test)]
mod tests {
    use crate::program::{Block, BlockId, Instruction, Program};
    use crate::types::{CompileFlags, Width};

    fn program(blocks: Vec<Block>) -> Program {
        Program {
            prologue: Vec::new(),
            blocks,
            flags: CompileFlags::empty(),
        }
    }

    fn block(id: usize, instructions: Vec<Instruction>) -> Block {
        Block {
            id: BlockId(id),
            instructions,
        }
    }

    #[test]
    fn test_compare_and_return() {
        let prog = program(vec![
            block(
                0,
                vec![
                    Instruction::Load { width: Width::Half, offset: 1 },
                    Instruction::JumpIfNotEqual {
                        width: Width::Half,
                        value: 0x6263,
                        target: BlockId(1),
                    },
                    Instruction::Return(1),
                ],
            ),
            block(1, vec![Instruction::Return(0)]),
        ]);

        assert_eq!(prog.run(b"abcd"), 1);
        assert_eq!(prog.run(b"abxd"), 0);
    }

    #[test]
    fn test_out_of_bounds_load_aborts() {
        let prog = program(vec![block(
            0,
            vec![
                Instruction::Load { width: Width::Word, offset: 2 },
                Instruction::Return(1),
            ],
        )]);
        assert_eq!(prog.run(b"abcd"), 0);
        assert_eq!(prog.run(b"abcdef"), 1);
    }

    #[test]
    fn test_scratch_memory_and_cursor() {
        let prog = Program {
            prologue: vec![
                Instruction::LoadHeaderLength { offset: 0 },
                Instruction::CursorToAcc,
                Instruction::AddImm(2),
                Instruction::Store { slot: 0 },
            ],
            blocks: vec![
                block(
                    0,
                    vec![
                        Instruction::LoadCursorFromSlot { slot: 0 },
                        Instruction::Load { width: Width::Byte, offset: 0 },
                        Instruction::AddCursor,
                        Instruction::AddImm(1),
                        Instruction::AccToCursor,
                        Instruction::CursorToAcc,
                        Instruction::JumpIfNotEqual {
                            width: Width::Word,
                            value: 10,
                            target: BlockId(1),
                        },
                        Instruction::Return(1),
                    ],
                ),
                block(1, vec![Instruction::Return(7)]),
            ],
            flags: CompileFlags::empty(),
        };

        // header length 4, base cursor 6, byte at 6 is 3: 6 + 3 + 1 == 10
        let frame = [0x41, 0, 0, 0, 0, 0, 3, 0, 0, 0];
        assert_eq!(prog.run(&frame), 1);

        let frame = [0x41, 0, 0, 0, 0, 0, 2, 0, 0, 0];
        assert_eq!(prog.run(&frame), 7);
    }

    #[test]
    fn test_fallthrough_to_next_block() {
        let prog = program(vec![
            block(0, vec![Instruction::Comment("empty".to_string())]),
            block(1, vec![Instruction::Return(5)]),
        ]);
        assert_eq!(prog.run(&[]), 5);
    }

    #[test]
    fn test_backward_jump_rejected() {
        let prog = program(vec![block(
            0,
            vec![Instruction::JumpIfNotEqual {
                width: Width::Byte,
                value: 1,
                target: BlockId(0),
            }],
        )]);
        assert_eq!(prog.run(&[]), 0);
    }
}
