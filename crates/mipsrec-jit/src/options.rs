use crate::host::ALLOCATABLE;

/// Per-block translation limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLimits {
    /// Maximum guest instructions per block. A block that reaches the limit without a branch
    /// ends with a fallthrough exit to the next instruction.
    pub max_insts: u32,
}

impl Default for BlockLimits {
    fn default() -> Self {
        Self { max_insts: 256 }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct JitOptions {
    pub block_limits: BlockLimits,

    /// Number of host registers the register cache may allocate (clamped to `3..=9`).
    ///
    /// Lowering this forces spills, which is useful for exercising pin/eviction paths.
    pub host_regs: usize,
}

impl Default for JitOptions {
    fn default() -> Self {
        Self {
            block_limits: BlockLimits::default(),
            host_regs: ALLOCATABLE.len(),
        }
    }
}
