//! Core type definitions for dnsbpf
//!
//! These types are threaded through the compiler and map directly to
//! operands of the generated BPF program.

// =============================================================================
// Compile Flags
// =============================================================================

bitflags::bitflags! {
    /// Flags controlling program generation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CompileFlags: u8 {
        /// Swap the accept and default verdicts
        const NEGATE = 1 << 0;
        /// OR a 0x20 mask into every compared byte
        const IGNORE_CASE = 1 << 1;
    }
}

impl CompileFlags {
    /// Verdict returned when a pattern block matches.
    pub fn accept_verdict(self) -> u32 {
        if self.contains(Self::NEGATE) {
            0
        } else {
            1
        }
    }

    /// Verdict returned by the terminal block.
    pub fn default_verdict(self) -> u32 {
        if self.contains(Self::NEGATE) {
            1
        } else {
            0
        }
    }
}

// =============================================================================
// Load Width
// =============================================================================

/// Width of a single packet load and comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Width {
    /// `ldb` - one byte
    Byte = 1,
    /// `ldh` - two bytes, big-endian
    Half = 2,
    /// `ld` - four bytes, big-endian
    Word = 4,
}

impl Width {
    /// Widths tried in order when splitting a byte run.
    pub const DESCENDING: [Width; 3] = [Width::Word, Width::Half, Width::Byte];

    #[inline]
    pub fn bytes(self) -> usize {
        self as usize
    }

    /// Lowercase bit (0x20) set in every byte of this width.
    #[inline]
    pub fn case_mask(self) -> u32 {
        match self {
            Self::Byte => 0x20,
            Self::Half => 0x2020,
            Self::Word => 0x2020_2020,
        }
    }

    /// Largest width not exceeding `remaining`, or `None` when nothing is left.
    pub fn largest_fitting(remaining: usize) -> Option<Self> {
        Self::DESCENDING.into_iter().find(|w| w.bytes() <= remaining)
    }

    /// Read a big-endian value of this width from the start of `bytes`.
    pub fn read_be(self, bytes: &[u8]) -> Option<u32> {
        let chunk = bytes.get(..self.bytes())?;
        Some(chunk.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
    }
}
