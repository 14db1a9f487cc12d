//! SSA Validation
//!
//! Structural checks over a function body: instruction placement, single
//! assignment, operand definedness, block references, and the phi
//! contract. Checks collect every violation rather than stopping at the
//! first, so a report can show the whole picture.
//!
//! Definedness here means defined somewhere in the body. Dominance is not
//! checked; the structural builders cannot produce a use before its
//! definition without also breaking one of the checked invariants.

use super::blocks::SsaBlockId;
use super::cfg::ControlFlowGraph;
use super::functions::FunctionBody;
use super::instance::TypedInstance;
use super::instructions::SsaInstruction;
use fxhash::FxHashSet;
use std::fmt;

/// One violation of SSA well-formedness
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsaViolation {
    /// A terminator somewhere other than the last position of its block
    MisplacedTerminator { block: SsaBlockId, index: usize },

    /// A phi after the leading phi group of its block
    MisplacedPhi { block: SsaBlockId, index: usize },

    /// A phi whose value and source lists have different lengths
    PhiArityMismatch {
        block: SsaBlockId,
        output: String,
        values: usize,
        sources: usize,
    },

    /// A phi whose sources are not exactly the predecessors of its block
    PhiPredecessorMismatch {
        block: SsaBlockId,
        output: String,
        expected: Vec<SsaBlockId>,
        found: Vec<SsaBlockId>,
    },

    /// An SSA name defined more than once
    DuplicateDefinition { name: String, block: SsaBlockId },

    /// An operand that no instruction or parameter defines
    UndefinedVariable { name: String, block: SsaBlockId },

    /// A declared return name that nothing defines
    UndefinedReturn { name: String },

    /// An instruction referring to a block the body never issued
    UnknownBlockReference {
        block: SsaBlockId,
        index: usize,
        target: SsaBlockId,
    },
}

impl fmt::Display for SsaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SsaViolation::MisplacedTerminator { block, index } => {
                write!(f, "{}[{}]: terminator not in last position", block, index)
            }
            SsaViolation::MisplacedPhi { block, index } => {
                write!(f, "{}[{}]: phi after non-phi instruction", block, index)
            }
            SsaViolation::PhiArityMismatch {
                block,
                output,
                values,
                sources,
            } => write!(
                f,
                "{}: phi `{}` has {} values but {} sources",
                block, output, values, sources
            ),
            SsaViolation::PhiPredecessorMismatch {
                block,
                output,
                expected,
                found,
            } => {
                write!(
                    f,
                    "{}: phi `{}` sources {:?} do not match predecessors {:?}",
                    block,
                    output,
                    found.iter().map(|b| b.to_string()).collect::<Vec<_>>(),
                    expected.iter().map(|b| b.to_string()).collect::<Vec<_>>()
                )
            }
            SsaViolation::DuplicateDefinition { name, block } => {
                write!(f, "{}: `{}` defined more than once", block, name)
            }
            SsaViolation::UndefinedVariable { name, block } => {
                write!(f, "{}: use of undefined name `{}`", block, name)
            }
            SsaViolation::UndefinedReturn { name } => {
                write!(f, "return value `{}` is never defined", name)
            }
            SsaViolation::UnknownBlockReference {
                block,
                index,
                target,
            } => write!(
                f,
                "{}[{}]: reference to unknown block {}",
                block, index, target
            ),
        }
    }
}

/// Check a body, reporting every violation found
pub fn validate_body(body: &FunctionBody) -> Result<(), Vec<SsaViolation>> {
    let mut violations = Vec::new();
    let block_count = body.block_count();

    // Single assignment across the whole body.
    let mut defined: FxHashSet<&str> = body.parameters().iter().map(|p| p.as_str()).collect();
    for (block, _, instruction) in body.all_instructions() {
        for output in instruction.outputs() {
            if !defined.insert(output) {
                violations.push(SsaViolation::DuplicateDefinition {
                    name: output.to_string(),
                    block,
                });
            }
        }
    }

    let mut references_valid = true;
    for id in body.block_ids() {
        let block = body.block(id);
        let last = block.len().saturating_sub(1);
        let phi_head = block.leading_phi_count();

        for (index, instruction) in block.instructions().iter().enumerate() {
            if instruction.is_terminator() && index != last {
                violations.push(SsaViolation::MisplacedTerminator { block: id, index });
            }
            if instruction.is_phi() && index >= phi_head {
                violations.push(SsaViolation::MisplacedPhi { block: id, index });
            }

            for target in instruction.referenced_blocks() {
                if target.index() >= block_count {
                    references_valid = false;
                    violations.push(SsaViolation::UnknownBlockReference {
                        block: id,
                        index,
                        target,
                    });
                }
            }

            for input in instruction.input_variables() {
                if !defined.contains(input) {
                    violations.push(SsaViolation::UndefinedVariable {
                        name: input.to_string(),
                        block: id,
                    });
                }
            }

            if let SsaInstruction::Phi {
                output,
                values,
                sources,
            } = instruction
            {
                if values.len() != sources.len() {
                    violations.push(SsaViolation::PhiArityMismatch {
                        block: id,
                        output: output.clone(),
                        values: values.len(),
                        sources: sources.len(),
                    });
                }
            }
        }
    }

    // Edge recovery walks the blocks that terminators name, so the phi
    // contract is only checkable once every reference is in range.
    if references_valid {
        let graph = ControlFlowGraph::compute(body);
        for id in body.block_ids() {
            for instruction in body.block(id).instructions() {
                let SsaInstruction::Phi {
                    output, sources, ..
                } = instruction
                else {
                    continue;
                };
                let mut expected: Vec<SsaBlockId> = graph.predecessors(id).to_vec();
                expected.sort();
                expected.dedup();
                let mut found: Vec<SsaBlockId> = sources.clone();
                found.sort();
                found.dedup();
                if expected != found {
                    violations.push(SsaViolation::PhiPredecessorMismatch {
                        block: id,
                        output: output.clone(),
                        expected,
                        found,
                    });
                }
            }
        }
    }

    for name in body.returns() {
        if !defined.contains(name.as_str()) {
            violations.push(SsaViolation::UndefinedReturn { name: name.clone() });
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Check the body of an instance
pub fn validate_instance(instance: &TypedInstance) -> Result<(), Vec<SsaViolation>> {
    validate_body(instance.body())
}
