//! dnsbpf Pattern Compiler
//!
//! This crate compiles domain-name patterns such as `example.com` or
//! `*.www.fint.me` into a classic BPF program that matches DNS queries for
//! those names.

pub mod chainer;
pub mod emitter;
pub mod error;
pub mod pattern;
pub mod render;

pub use chainer::build_program;
pub use error::CompileError;
pub use pattern::{parse_labels, parse_pattern, Label, Pattern, Segment};
pub use render::render_program;

use dnsbpf_core::{CompileFlags, Program};

/// Parse every domain and chain them into one program, in argument order.
pub fn compile<S: AsRef<str>>(domains: &[S], flags: CompileFlags) -> Result<Program, CompileError> {
    if domains.is_empty() {
        return Err(CompileError::NoPatterns);
    }

    let patterns = domains
        .iter()
        .map(|domain| parse_pattern(domain.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    let program = build_program(&patterns, flags);
    log::debug!(
        "Compiled {} patterns into {} instructions",
        patterns.len(),
        program.instruction_count()
    );
    Ok(program)
}
