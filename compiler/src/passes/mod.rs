//! Rewrite Passes
//!
//! Passes transform one function at a time, in the order a recipe lists
//! them. The driver hands each pass the function's `TypedInstance` and the
//! session, and afterwards drops every derived cache the pass did not
//! declare preserved.
//!
//! Most passes here are instruction eliminations built on the template in
//! [`elimination`]: they scan for one eligible call per block and replace
//! it with explicit SSA control flow. The remainder resolve call types or
//! inspect the function without rewriting it.

pub mod call_resolution;
pub mod cumulative;
pub mod elimination;
pub mod min_reduction;
pub mod reductions;
pub mod registry;
pub mod utility;

pub use call_resolution::CallTypeResolutionPass;
pub use cumulative::CumulativeReductionEliminationPass;
pub use elimination::{detach_at, reattach_tail, run_elimination, DetachedSite, InstructionElimination};
pub use min_reduction::MinEliminationPass;
pub use reductions::{DotEliminationPass, MeanEliminationPass, SumEliminationPass};
pub use registry::{ParamKind, PassDescriptor, PassRegistry};
pub use utility::{DumpSsaPass, ValidateSsaPass};

use crate::ir::{DerivedDataKind, TypedInstance};
use crate::session::{CompilationSession, CompileError};

pub type PassResult = Result<(), CompileError>;

/// One step of a recipe
pub trait Pass {
    /// The name the recipe format and skip directives refer to
    fn name(&self) -> &str;

    /// Derived-data kinds this pass never invalidates. The driver drops
    /// everything else from the instance's caches after the pass runs.
    fn preserved_data(&self) -> &[DerivedDataKind] {
        &[]
    }

    fn run(&self, session: &CompilationSession, instance: &mut TypedInstance) -> PassResult;
}

impl std::fmt::Debug for dyn Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pass").field("name", &self.name()).finish()
    }
}
