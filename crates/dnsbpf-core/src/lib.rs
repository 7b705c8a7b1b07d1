//! dnsbpf Core Library
//!
//! This crate provides the program model shared by the dnsbpf compiler and CLI.
//!
//! # Architecture
//!
//! A compiled filter is an in-memory [`Program`]: a prologue that locates the
//! first byte of the DNS question name, one [`Block`] per domain pattern, and
//! a terminal block returning the default verdict. Programs are rendered to
//! assembler text by the compiler crate and can be executed directly by the
//! interpreter in [`vm`] for verification.
//!
//! # Modules
//!
//! - `types`: Compile flags and load widths
//! - `program`: Instructions, blocks and programs
//! - `vm`: Classic-BPF interpreter over in-memory programs
//! - `bytecode`: Codec for assembled `sock_filter` listings

pub mod bytecode;
pub mod program;
pub mod types;
pub mod vm;

// Re-export commonly used types
pub use bytecode::{parse_bytecode, BytecodeError, SockFilter};
pub use program::{Block, BlockId, Instruction, Program};
pub use types::{CompileFlags, Width};
