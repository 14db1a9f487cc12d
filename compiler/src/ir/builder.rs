//! Block Editor
//!
//! This module provides the editing interface passes use to synthesize SSA.
//! The editor keeps an insert point (the block it currently appends to) and
//! provides helpers for the patterns rewrites emit over and over: minting a
//! typed temporary, wiring a counted loop, merging values with a phi.
//!
//! Helpers that mint a name return it; helpers that take an output name
//! define exactly that name and leave its type to the caller.

use super::blocks::SsaBlockId;
use super::instance::TypedInstance;
use super::instructions::{CallKind, Constant, SsaInstruction};
use super::types::MatlabType;

/// Blocks of a synthesized `for` construct
#[derive(Debug, Clone, Copy)]
pub struct ForLoopBlocks {
    pub loop_block: SsaBlockId,
    pub end_block: SsaBlockId,
}

/// Blocks of a synthesized branch construct
#[derive(Debug, Clone, Copy)]
pub struct BranchBlocks {
    pub then_block: SsaBlockId,
    pub else_block: SsaBlockId,
    pub end_block: SsaBlockId,
}

/// Appends instructions to one block of an instance at a time
pub struct BlockEditor<'a> {
    instance: &'a mut TypedInstance,
    block: SsaBlockId,
}

impl<'a> BlockEditor<'a> {
    pub fn new(instance: &'a mut TypedInstance, block: SsaBlockId) -> Self {
        Self { instance, block }
    }

    pub fn block_id(&self) -> SsaBlockId {
        self.block
    }

    /// Move the insert point to another block
    pub fn seek(&mut self, block: SsaBlockId) {
        self.block = block;
    }

    pub fn make_temporary(&mut self, suggested: &str) -> String {
        self.instance.make_temporary(suggested)
    }

    pub fn make_typed_temporary(&mut self, suggested: &str, ty: MatlabType) -> String {
        self.instance.make_typed_temporary(suggested, ty)
    }

    pub fn variable_type(&self, name: &str) -> Option<&MatlabType> {
        self.instance.variable_type(name)
    }

    pub fn register_type(&mut self, name: impl Into<String>, ty: MatlabType) {
        self.instance.register_type(name, ty);
    }

    /// Append a raw instruction at the insert point
    pub fn add_instruction(&mut self, instruction: SsaInstruction) {
        self.instance
            .body_mut()
            .block_mut(self.block)
            .add_instruction(instruction);
    }

    /// Append an untyped call defining the given output names
    pub fn add_call(&mut self, function: &str, outputs: &[&str], inputs: &[&str]) {
        self.add_instruction(SsaInstruction::FunctionCall {
            function: function.to_string(),
            kind: CallKind::Untyped,
            outputs: outputs.iter().map(|o| o.to_string()).collect(),
            inputs: inputs.iter().map(|i| i.to_string()).collect(),
        });
    }

    /// Append a single-output call, minting and typing the output
    pub fn add_simple_call_to_output(
        &mut self,
        function: &str,
        suggested: &str,
        ty: MatlabType,
        inputs: &[&str],
    ) -> String {
        let output = self.make_typed_temporary(suggested, ty);
        self.add_call(function, &[output.as_str()], inputs);
        output
    }

    /// Bind an integer constant to a fresh name
    pub fn add_make_integer_instruction(&mut self, value: i64, suggested: &str) -> String {
        let output = self.make_typed_temporary(suggested, MatlabType::int());
        self.add_instruction(SsaInstruction::Assignment {
            output: output.clone(),
            value: Constant::Int(value),
        });
        output
    }

    /// Bind a double constant to a fresh name
    pub fn add_make_double_instruction(&mut self, value: f64, suggested: &str) -> String {
        let output = self.make_typed_temporary(suggested, MatlabType::double());
        self.add_instruction(SsaInstruction::Assignment {
            output: output.clone(),
            value: Constant::Double(value),
        });
        output
    }

    /// Materialize the induction value of the innermost enclosing loop
    pub fn add_int_iters_instruction(&mut self, suggested: &str) -> String {
        let output = self.make_typed_temporary(suggested, MatlabType::int());
        self.add_instruction(SsaInstruction::Iter {
            output: output.clone(),
        });
        output
    }

    /// Read one element of `matrix`. The output gets the matrix's element
    /// type when the matrix is typed.
    pub fn add_simple_get(&mut self, matrix: &str, indices: &[&str], suggested: &str) -> String {
        let element_ty = self.variable_type(matrix).map(|ty| ty.element());
        let output = match element_ty {
            Some(ty) => self.make_typed_temporary(suggested, ty),
            None => self.make_temporary(suggested),
        };
        self.add_instruction(SsaInstruction::SimpleGet {
            output: output.clone(),
            matrix: matrix.to_string(),
            indices: indices.iter().map(|i| i.to_string()).collect(),
        });
        output
    }

    /// Write one element of `matrix`, producing a fresh matrix value of the
    /// same type
    pub fn add_simple_set(
        &mut self,
        matrix: &str,
        indices: &[&str],
        value: &str,
        suggested: &str,
    ) -> String {
        let matrix_ty = self.variable_type(matrix).cloned();
        let output = match matrix_ty {
            Some(ty) => self.make_typed_temporary(suggested, ty),
            None => self.make_temporary(suggested),
        };
        self.add_set_into(&output, matrix, indices, value);
        output
    }

    /// Write one element, defining the given output name
    pub fn add_set_into(&mut self, output: &str, matrix: &str, indices: &[&str], value: &str) {
        self.add_instruction(SsaInstruction::SimpleSet {
            output: output.to_string(),
            matrix: matrix.to_string(),
            indices: indices.iter().map(|i| i.to_string()).collect(),
            value: value.to_string(),
        });
    }

    /// Insert a phi at the head of the insert-point block, after any phis
    /// already there
    pub fn add_phi(&mut self, output: &str, values: &[&str], sources: &[SsaBlockId]) {
        debug_assert_eq!(values.len(), sources.len(), "phi arity mismatch");
        let block = self.instance.body_mut().block_mut(self.block);
        let position = block.leading_phi_count();
        block.insert_instruction(
            position,
            SsaInstruction::Phi {
                output: output.to_string(),
                values: values.iter().map(|v| v.to_string()).collect(),
                sources: sources.to_vec(),
            },
        );
    }

    pub fn add_validate_equal(&mut self, left: &str, right: &str) {
        self.add_instruction(SsaInstruction::ValidateEqual {
            left: left.to_string(),
            right: right.to_string(),
        });
    }

    /// Terminate the insert-point block with a counted loop over
    /// `start : step : end`. Creates the loop and end blocks; the insert
    /// point stays on the now-terminated block, so callers seek next.
    pub fn make_for_loop(&mut self, start: &str, step: &str, end: &str) -> ForLoopBlocks {
        let loop_block = self.instance.body_mut().add_block();
        let end_block = self.instance.body_mut().add_block();
        self.add_instruction(SsaInstruction::For {
            start: start.to_string(),
            step: step.to_string(),
            end: end.to_string(),
            loop_block,
            end_block,
        });
        ForLoopBlocks {
            loop_block,
            end_block,
        }
    }

    /// Terminate the insert-point block with a two-way branch on
    /// `condition`, creating the arm blocks and the merge block
    pub fn make_branch(&mut self, condition: &str) -> BranchBlocks {
        let then_block = self.instance.body_mut().add_block();
        let else_block = self.instance.body_mut().add_block();
        let end_block = self.instance.body_mut().add_block();
        self.add_instruction(SsaInstruction::Branch {
            condition: condition.to_string(),
            then_block,
            else_block,
            end_block,
        });
        BranchBlocks {
            then_block,
            else_block,
            end_block,
        }
    }
}
