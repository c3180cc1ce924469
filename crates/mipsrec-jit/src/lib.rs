//! MIPS → host recompiler core.
//!
//! The heart of this crate is the delay-slot-aware branch compiler in [`Jit`]: every MIPS
//! branch and jump executes the instruction after it (the delay slot) before control transfers,
//! while the host has no delay slots and a single set of condition flags. The compiler therefore
//! sets up the host comparison, preserves the flags across the compiled delay slot, and only then
//! emits the conditional host branch and the block exits.
//!
//! Around it sit the collaborators needed to drive and verify it end to end:
//!
//! - [`host`]: the flag-based host instruction set and [`CodeBuffer`] with branch fixups,
//! - [`GprCache`]: guest GPR → host register cache with spill locks,
//! - [`MipsContext`]: the guest state block compiled code reads and writes,
//! - [`execute_block`]: an executor for compiled blocks with exact flag semantics,
//! - [`BlockCache`] / [`Dispatcher`]: exit linking and a compile-on-miss run loop.

pub mod host;

mod block;
mod cache;
mod compiler;
mod context;
mod dispatcher;
mod emitter;
mod error;
mod interp;
mod options;
mod regcache;
mod state;

pub use block::{CompiledBlock, ExitDescriptor};
pub use cache::BlockCache;
pub use compiler::Jit;
pub use context::MipsContext;
pub use dispatcher::{Dispatcher, StepOutcome};
pub use emitter::{CodeBuffer, FixupBranch};
pub use error::JitError;
pub use interp::{execute_block, BlockExit, CLOBBER_PATTERN};
pub use options::{BlockLimits, JitOptions};
pub use regcache::{GprCache, MapFlags};
pub use state::{DelaySlot, FlagsSnapshot, JitState};
