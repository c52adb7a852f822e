//! A two/three-pass action-stream encoder for ARM Thumb-2, modeled on the DynASM family of
//! dynamic assemblers.
//!
//! Rather than parse assembly text at run time, the caller builds a small, mostly-static *action
//! list*: a sequence of 16-bit half-words where most entries are literal Thumb-2 instruction
//! words and a rare escaped one (see [action::ESCAPE]) marks a place where a runtime value needs
//! to be folded in, a label needs to be tracked, or a section boundary falls. The encoder then
//! walks that list three times:
//!
//!  - [state::Encoder::put] (pass 1) walks the list once per emission site, consuming the
//!    caller's runtime arguments in order and recording enough bookkeeping (offsets, label
//!    chains, validated immediates) to reconstruct the same walk twice more without the
//!    arguments.
//!  - [state::Encoder::link] (pass 2) replays every recorded walk to settle alignment padding and
//!    resolve label offsets, and reports the final code size.
//!  - [state::Encoder::encode] (pass 3) replays the walk a final time, this time writing real
//!    Thumb-2 half-words into the caller's output buffer and patching branch/load displacements
//!    in place.
//!
//! This mirrors the "put now, fix up later" design LuaJIT's DynASM backends use to let a single
//! static action table serve an arbitrary number of runtime call sites, adapted here to run
//! entirely in safe Rust with an explicit label table and per-section buffers instead of a
//! shared, pointer-biased one.

pub mod action;
pub mod emit;
pub mod error;
pub mod imm;
pub mod labels;
pub mod reloc;
pub mod section;
pub mod state;

pub use crate::action::{Action, ActionKind, ActionListBuilder, ImmField, ESCAPE};
pub use crate::error::{EncodeError, Result};
pub use crate::imm::{k12, thumb_expand_imm, thumb_expand_imm_decode, K12, OpFamily};
pub use crate::section::BufPos;
pub use crate::state::{Encoder, ExternalRelocator};
