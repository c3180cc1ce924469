//! Per-block compiler state and the delay-slot tokens.

use mipsrec_isa::INST_BYTES;

use crate::error::JitError;

/// State of the block currently being translated.
///
/// Reset by the block driver at the start of every block; read and mutated by every compile
/// routine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JitState {
    /// Guest address of the instruction being compiled.
    pub compiler_pc: u32,
    /// Cleared by any routine that ends the block.
    pub compiling: bool,
    /// Guest instructions compiled into this block so far, delay slots included.
    pub num_insts: u32,
    in_delay_slot: bool,
    flags_saved: bool,
}

impl JitState {
    pub fn new(entry_pc: u32) -> Self {
        Self {
            compiler_pc: entry_pc,
            compiling: true,
            num_insts: 0,
            in_delay_slot: false,
            flags_saved: false,
        }
    }

    #[inline]
    pub fn in_delay_slot(&self) -> bool {
        self.in_delay_slot
    }

    #[inline]
    pub fn flags_saved(&self) -> bool {
        self.flags_saved
    }

    /// Rejects a branch or jump compiled while another branch's delay slot is open.
    pub fn ensure_not_in_delay_slot(&self) -> Result<(), JitError> {
        if self.in_delay_slot {
            tracing::error!(
                pc = self.compiler_pc,
                "branch in delay slot at {:#010x}",
                self.compiler_pc
            );
            return Err(JitError::BranchInDelaySlot {
                pc: self.compiler_pc,
            });
        }
        Ok(())
    }

    /// Opens the delay slot of the branch at `compiler_pc`.
    ///
    /// There is only ever one [`DelaySlot`] outstanding; callers check
    /// [`Self::ensure_not_in_delay_slot`] before emitting anything for the branch.
    pub(crate) fn enter_delay_slot(&mut self) -> DelaySlot {
        assert!(
            !self.in_delay_slot,
            "delay slot entered twice at {:#010x}",
            self.compiler_pc
        );
        self.in_delay_slot = true;
        DelaySlot {
            addr: self.compiler_pc.wrapping_add(INST_BYTES),
        }
    }

    pub(crate) fn leave_delay_slot(&mut self, _slot: DelaySlot) {
        debug_assert!(self.in_delay_slot);
        debug_assert!(!self.flags_saved, "delay slot closed with flags still saved");
        self.in_delay_slot = false;
    }

    pub(crate) fn take_flags_slot(&mut self, _slot: &DelaySlot) -> FlagsSnapshot {
        assert!(!self.flags_saved, "host flags saved twice");
        self.flags_saved = true;
        FlagsSnapshot { _private: () }
    }

    pub(crate) fn release_flags_slot(&mut self, _snapshot: FlagsSnapshot) {
        self.flags_saved = false;
    }
}

/// Proof that the delay slot of the branch being compiled is open.
///
/// Neither `Clone` nor `Copy`: it is created by [`JitState::enter_delay_slot`] and consumed by
/// [`JitState::leave_delay_slot`], so the delay-slot compile can only be reached once per branch.
#[derive(Debug)]
pub struct DelaySlot {
    addr: u32,
}

impl DelaySlot {
    /// Guest address of the delay-slot instruction.
    #[inline]
    pub fn addr(&self) -> u32 {
        self.addr
    }
}

/// Ownership of the single host-flags save slot ([`crate::host::FLAGS_SAVE`]).
#[must_use = "saved flags must be restored or discarded"]
#[derive(Debug)]
pub struct FlagsSnapshot {
    _private: (),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_slot_token_tracks_state() {
        let mut js = JitState::new(0x1000);
        assert!(js.ensure_not_in_delay_slot().is_ok());

        let slot = js.enter_delay_slot();
        assert_eq!(slot.addr(), 0x1004);
        assert!(js.in_delay_slot());
        assert_eq!(
            js.ensure_not_in_delay_slot(),
            Err(JitError::BranchInDelaySlot { pc: 0x1000 })
        );

        let flags = js.take_flags_slot(&slot);
        assert!(js.flags_saved());
        js.release_flags_slot(flags);

        js.leave_delay_slot(slot);
        assert!(!js.in_delay_slot());
        assert!(!js.flags_saved());
    }

    #[test]
    #[should_panic(expected = "saved twice")]
    fn flags_slot_does_not_stack() {
        let mut js = JitState::new(0);
        let slot = js.enter_delay_slot();
        let _a = js.take_flags_slot(&slot);
        let _b = js.take_flags_slot(&slot);
    }
}
