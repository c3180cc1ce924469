use core::fmt;

use crate::host::HostInst;

/// A fixed-target exit emitted by a compiled block, for later linking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitDescriptor {
    /// Guest address the exit continues at.
    pub target: u32,
    /// Exit slot: 0 for the taken/unconditional path, 1 for the not-taken fallthrough.
    pub slot: u8,
    /// Index of the [`HostInst::Exit`] within [`CompiledBlock::code`].
    pub code_offset: usize,
}

/// Output of [`crate::Jit::compile_block`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledBlock {
    pub entry_pc: u32,
    /// Guest instructions translated, delay slots included.
    pub num_insts: u32,
    pub code: Vec<HostInst>,
    pub exits: Vec<ExitDescriptor>,
}

impl CompiledBlock {
    /// Exit descriptor for `slot`, if the block has one.
    pub fn exit(&self, slot: u8) -> Option<&ExitDescriptor> {
        self.exits.iter().find(|exit| exit.slot == slot)
    }

    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CompiledBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "block {:#010x} ({} guest insts, {} exits)",
            self.entry_pc,
            self.num_insts,
            self.exits.len()
        )?;
        for (i, inst) in self.code.iter().enumerate() {
            writeln!(f, "{i:4}: {inst}")?;
        }
        Ok(())
    }
}
