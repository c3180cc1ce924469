use std::collections::HashMap;

use tracing::trace;

use crate::block::CompiledBlock;

/// Compiled blocks keyed by guest entry PC, plus the exit links between them.
///
/// A link records that exit `slot` of block `from` continues directly in the cached block at
/// its target. Links are maintained in both directions on insert and dropped on invalidation.
#[derive(Debug, Default)]
pub struct BlockCache {
    blocks: HashMap<u32, CompiledBlock>,
    links: HashMap<(u32, u8), u32>,
}

impl BlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, entry_pc: u32) -> bool {
        self.blocks.contains_key(&entry_pc)
    }

    pub fn get(&self, entry_pc: u32) -> Option<&CompiledBlock> {
        self.blocks.get(&entry_pc)
    }

    /// Inserts `block`, replacing any block at the same entry, and links it with its neighbours.
    pub fn insert(&mut self, block: CompiledBlock) -> Option<CompiledBlock> {
        let entry_pc = block.entry_pc;
        let replaced = self.invalidate(entry_pc);
        self.blocks.insert(entry_pc, block);

        self.link(entry_pc);
        let incoming: Vec<u32> = self
            .blocks
            .values()
            .filter(|b| b.entry_pc != entry_pc && b.exits.iter().any(|e| e.target == entry_pc))
            .map(|b| b.entry_pc)
            .collect();
        for from in incoming {
            self.link(from);
        }
        replaced
    }

    /// Resolves every exit of the block at `entry_pc` whose target is cached. Returns the number
    /// of links made.
    pub fn link(&mut self, entry_pc: u32) -> usize {
        let Some(block) = self.blocks.get(&entry_pc) else {
            return 0;
        };
        let mut linked = 0;
        for exit in &block.exits {
            if self.blocks.contains_key(&exit.target) {
                self.links.insert((entry_pc, exit.slot), exit.target);
                linked += 1;
            }
        }
        if linked > 0 {
            trace!(entry_pc, linked, "linked block exits");
        }
        linked
    }

    /// Cached block that exit `slot` of `from` is linked to.
    pub fn linked_target(&self, from: u32, slot: u8) -> Option<u32> {
        self.links.get(&(from, slot)).copied()
    }

    /// Removes the block at `entry_pc` and every link into or out of it.
    pub fn invalidate(&mut self, entry_pc: u32) -> Option<CompiledBlock> {
        let removed = self.blocks.remove(&entry_pc)?;
        self.links.retain(|&(from, _), to| from != entry_pc && *to != entry_pc);
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.links.clear();
    }
}
