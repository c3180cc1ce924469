//! Guest GPR → host register cache.
//!
//! Mappings are purely a compile-time notion: the cache tracks which host register currently
//! holds each guest register along the straight-line code being emitted, loading on first use
//! and writing dirty values back on eviction or [`GprCache::flush_all`]. Anything that emits a
//! control-flow split (a conditional branch, a native call, an exit) must flush first so every
//! path observes committed state in the context block.

use bitflags::bitflags;
use mipsrec_isa::Gpr;

use crate::context::MipsContext;
use crate::emitter::CodeBuffer;
use crate::host::{HostReg, ALLOCATABLE};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MapFlags: u8 {
        /// Load the guest value when the register is not already mapped.
        const INIT_VAL = 1 << 0;
        /// The caller will write the host register; write it back on flush.
        const DIRTY = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct GuestSlot {
    loc: Option<HostReg>,
    dirty: bool,
    spill_locked: bool,
    last_use: u32,
}

#[derive(Debug, Clone)]
pub struct GprCache {
    guest: [GuestSlot; Gpr::COUNT],
    owner: [Option<Gpr>; HostReg::COUNT],
    alloc_order: Vec<HostReg>,
    tick: u32,
}

impl GprCache {
    /// Creates a cache that allocates from the first `host_regs` entries of [`ALLOCATABLE`].
    pub fn new(host_regs: usize) -> Self {
        // A three-operand instruction pins three registers at once.
        let count = host_regs.clamp(3, ALLOCATABLE.len());
        Self {
            guest: [GuestSlot::default(); Gpr::COUNT],
            owner: [None; HostReg::COUNT],
            alloc_order: ALLOCATABLE[..count].to_vec(),
            tick: 0,
        }
    }

    /// Forgets every mapping without writing anything back. Only valid between blocks.
    pub fn reset(&mut self) {
        self.guest = [GuestSlot::default(); Gpr::COUNT];
        self.owner = [None; HostReg::COUNT];
        self.tick = 0;
    }

    pub fn is_mapped(&self, reg: Gpr) -> bool {
        self.guest[reg.index()].loc.is_some()
    }

    pub fn is_dirty(&self, reg: Gpr) -> bool {
        self.guest[reg.index()].dirty
    }

    pub fn mapped_count(&self) -> usize {
        self.guest.iter().filter(|slot| slot.loc.is_some()).count()
    }

    /// Host register currently holding `reg`.
    ///
    /// Panics if `reg` is not mapped; callers map first.
    pub fn r(&self, reg: Gpr) -> HostReg {
        match self.guest[reg.index()].loc {
            Some(host) => host,
            None => panic!("guest register {reg} used without being mapped"),
        }
    }

    /// Ensures `reg` lives in a host register and returns it.
    pub fn map_reg(&mut self, code: &mut CodeBuffer, reg: Gpr, flags: MapFlags) -> HostReg {
        self.tick = self.tick.wrapping_add(1);
        let tick = self.tick;
        // `zero` is materialized on demand and never written back.
        let dirty = flags.contains(MapFlags::DIRTY) && !reg.is_zero();

        if let Some(host) = self.guest[reg.index()].loc {
            let slot = &mut self.guest[reg.index()];
            slot.last_use = tick;
            slot.dirty |= dirty;
            return host;
        }

        let host = self.alloc(code);
        if reg.is_zero() {
            code.mov_imm(host, 0);
        } else if flags.contains(MapFlags::INIT_VAL) {
            code.ldr_ctx(host, MipsContext::gpr_offset(reg));
        }

        self.owner[host.index()] = Some(reg);
        let slot = &mut self.guest[reg.index()];
        slot.loc = Some(host);
        slot.dirty = dirty;
        slot.last_use = tick;
        host
    }

    /// Prevents the given registers from being evicted until [`Self::release_spill_locks`].
    pub fn spill_lock(&mut self, regs: &[Gpr]) {
        for reg in regs {
            self.guest[reg.index()].spill_locked = true;
        }
    }

    pub fn release_spill_locks(&mut self) {
        for slot in &mut self.guest {
            slot.spill_locked = false;
        }
    }

    /// Writes back `reg` if dirty and drops its mapping.
    pub fn flush(&mut self, code: &mut CodeBuffer, reg: Gpr) {
        let slot = &mut self.guest[reg.index()];
        let Some(host) = slot.loc.take() else {
            return;
        };
        if slot.dirty {
            code.str_ctx(host, MipsContext::gpr_offset(reg));
        }
        slot.dirty = false;
        self.owner[host.index()] = None;
    }

    /// Writes back every dirty register and drops all mappings.
    pub fn flush_all(&mut self, code: &mut CodeBuffer) {
        for reg in Gpr::ALL {
            self.flush(code, reg);
        }
    }

    fn alloc(&mut self, code: &mut CodeBuffer) -> HostReg {
        if let Some(free) = self
            .alloc_order
            .iter()
            .copied()
            .find(|host| self.owner[host.index()].is_none())
        {
            return free;
        }

        let victim = self
            .alloc_order
            .iter()
            .filter_map(|host| self.owner[host.index()])
            .filter(|guest| !self.guest[guest.index()].spill_locked)
            .min_by_key(|guest| self.guest[guest.index()].last_use);
        let Some(victim) = victim else {
            panic!(
                "register cache exhausted: all {} host registers are spill-locked",
                self.alloc_order.len()
            );
        };
        let host = self.r(victim);
        self.flush(code, victim);
        host
    }
}
