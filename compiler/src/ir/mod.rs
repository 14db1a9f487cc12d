//! Typed SSA intermediate representation
//!
//! This module defines the program model the middle end rewrites: functions
//! lowered to structured SSA, the types attached to SSA names, block
//! synthesis helpers, and the analyses derived from a function body.
//!
//! Control flow is structural rather than edge-listed. Loop and branch
//! instructions name the blocks that participate in their construct, and the
//! control-flow graph is recovered from those references on demand.

pub mod blocks;
pub mod builder;
pub mod cfg;
pub mod dump;
pub mod functions;
pub mod instance;
pub mod instructions;
pub mod interp;
pub mod types;
pub mod validation;

pub use blocks::{SsaBlock, SsaBlockId};
pub use builder::{BlockEditor, BranchBlocks, ForLoopBlocks};
pub use cfg::ControlFlowGraph;
pub use dump::{dump_body, dump_instance, DumpFormat};
pub use functions::{FunctionBody, TemporaryAllocator};
pub use instance::{DerivedDataKind, SizeGroupInfo, TypedInstance};
pub use instructions::{CallKind, Constant, SsaInstruction};
pub use types::{FunctionType, MatlabType, NumericClass, Shape};
pub use validation::{validate_body, validate_instance, SsaViolation};
