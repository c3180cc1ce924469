use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JitError {
    /// A branch or jump was found in the delay slot of another branch. Nothing was emitted for
    /// it.
    #[error("branch in delay slot at {pc:#010x}")]
    BranchInDelaySlot { pc: u32 },
    /// The block driver cannot compile this instruction; the block ends before it.
    #[error("unsupported opcode {word:#010x} at {pc:#010x}")]
    UnsupportedOpcode { pc: u32, word: u32 },
}
