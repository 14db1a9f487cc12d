//! Instruction-Elimination Framework
//!
//! The template shared by every pass that replaces a single instruction
//! with explicit SSA control flow. A concrete elimination supplies the
//! eligibility check and the rewrite; the template drives the per-block
//! scan and the skip directive.
//!
//! The rewrite protocol is fixed. `detach_at` declares cache invalidation,
//! removes the candidate and everything after it from its block, and hands
//! both back. The elimination then grows the body through a `BlockEditor`
//! and finally re-appends the detached tail to its last synthesized block
//! with `reattach_tail`, so control resumes exactly where it left off.
//! Dropping the tail is a caller bug the framework cannot catch.

use super::{Pass, PassResult};
use crate::ir::{DerivedDataKind, SsaBlockId, SsaInstruction, TypedInstance};
use crate::session::CompilationSession;

/// A pass that eliminates one instruction shape
pub trait InstructionElimination {
    fn pass_name(&self) -> &str;

    /// See [`Pass::preserved_data`]
    fn preserved_data(&self) -> &[DerivedDataKind] {
        &[]
    }

    /// Pure eligibility check. Must return false whenever operand types or
    /// shapes are unknown, the arity is unexpected, or the instruction is
    /// not this pass's shape. Unsupported candidates are simply left alone.
    fn can_eliminate(&self, instance: &TypedInstance, instruction: &SsaInstruction) -> bool;

    /// Rewrite the eligible instruction at `block[position]`
    fn remove_instruction(
        &self,
        session: &CompilationSession,
        instance: &mut TypedInstance,
        block: SsaBlockId,
        position: usize,
    ) -> PassResult;
}

impl<E: InstructionElimination> Pass for E {
    fn name(&self) -> &str {
        self.pass_name()
    }

    fn preserved_data(&self) -> &[DerivedDataKind] {
        InstructionElimination::preserved_data(self)
    }

    fn run(&self, session: &CompilationSession, instance: &mut TypedInstance) -> PassResult {
        run_elimination(self, session, instance)
    }
}

/// Scan every block once for this elimination's shape and rewrite the
/// first eligible instruction per block.
///
/// Blocks synthesized by a rewrite get ids past the snapshot taken here
/// and are not rescanned; instructions they contain belong to the next
/// pass generation.
pub fn run_elimination<E: InstructionElimination + ?Sized>(
    elimination: &E,
    session: &CompilationSession,
    instance: &mut TypedInstance,
) -> PassResult {
    if instance.body().skips_pass(elimination.pass_name()) {
        log::debug!(
            "{} skipped for `{}` by directive",
            elimination.pass_name(),
            instance.identity()
        );
        return Ok(());
    }

    let snapshot = instance.body().block_count();
    for index in 0..snapshot {
        let block = SsaBlockId::new(index);
        let candidate = instance
            .body()
            .block(block)
            .instructions()
            .iter()
            .position(|instruction| elimination.can_eliminate(instance, instruction));
        if let Some(position) = candidate {
            elimination.remove_instruction(session, instance, block, position)?;
        }
    }
    Ok(())
}

/// An instruction detached from its block, with the tail that followed it
#[derive(Debug)]
pub struct DetachedSite {
    pub instruction: SsaInstruction,
    pub tail: Vec<SsaInstruction>,
}

/// Remove `block[position]` and everything after it, invalidating the
/// instance's derived caches first
pub fn detach_at(instance: &mut TypedInstance, block: SsaBlockId, position: usize) -> DetachedSite {
    instance.invalidate_all();
    let mut removed = instance
        .body_mut()
        .block_mut(block)
        .remove_instructions_from(position)
        .into_iter();
    let instruction = removed.next().expect("detach position out of range");
    DetachedSite {
        instruction,
        tail: removed.collect(),
    }
}

/// Append a detached tail to `block`, the final block of a rewrite
pub fn reattach_tail(instance: &mut TypedInstance, block: SsaBlockId, tail: Vec<SsaInstruction>) {
    let target = instance.body_mut().block_mut(block);
    for instruction in tail {
        target.add_instruction(instruction);
    }
}
