//! Cumulative Reduction Elimination
//!
//! `cumsum` and `cumprod` produce a vector the same size as their operand,
//! so unlike the scalar reductions the loop carries two values: the running
//! accumulator and the partially written result matrix. A zero-trip loop
//! leaves the freshly allocated result untouched, which matches the builtin
//! on empty operands.

use super::elimination::{detach_at, reattach_tail, InstructionElimination};
use super::PassResult;
use crate::ir::{
    BlockEditor, CallKind, Constant, MatlabType, NumericClass, Shape, SsaBlockId, SsaInstruction,
    TypedInstance,
};
use crate::session::CompilationSession;

/// Replaces `cumsum` and `cumprod` calls on vectors with a scan loop
pub struct CumulativeReductionEliminationPass;

impl CumulativeReductionEliminationPass {
    pub const NAME: &'static str = "CumulativeReductionEliminationPass";
}

fn scan_operation(function: &str) -> Option<(i64, &'static str)> {
    match function {
        "cumsum" => Some((0, "plus")),
        "cumprod" => Some((1, "times")),
        _ => None,
    }
}

impl InstructionElimination for CumulativeReductionEliminationPass {
    fn pass_name(&self) -> &str {
        Self::NAME
    }

    fn can_eliminate(&self, instance: &TypedInstance, instruction: &SsaInstruction) -> bool {
        let SsaInstruction::FunctionCall {
            function,
            kind: CallKind::Untyped,
            outputs,
            inputs,
        } = instruction
        else {
            return false;
        };
        scan_operation(function).is_some()
            && outputs.len() == 1
            && inputs.len() == 1
            && instance
                .variable_type(&inputs[0])
                .map(|ty| ty.is_known_vector())
                .unwrap_or(false)
    }

    fn remove_instruction(
        &self,
        _session: &CompilationSession,
        instance: &mut TypedInstance,
        block: SsaBlockId,
        position: usize,
    ) -> PassResult {
        let site = detach_at(instance, block, position);
        let SsaInstruction::FunctionCall {
            function,
            outputs,
            inputs,
            ..
        } = site.instruction
        else {
            panic!("eliminating a non-call instruction");
        };
        let (seed, combine) =
            scan_operation(&function).expect("candidate is not a cumulative reduction");
        let output = &outputs[0];
        let input = &inputs[0];

        let input_ty = instance
            .variable_type(input)
            .expect("eligible cumulative input lost its type")
            .clone();
        // Logical operands accumulate as doubles, everything else keeps
        // its class and shape.
        let result_ty = if input_ty.class() == NumericClass::Logical {
            MatlabType::double_matrix(input_ty.shape())
        } else {
            input_ty
        };
        let element_ty = result_ty.element();
        let seed_value = if element_ty.class().is_integer() {
            Constant::Int(seed)
        } else {
            Constant::Double(seed as f64)
        };

        let mut editor = BlockEditor::new(instance, block);
        let count = editor.add_simple_call_to_output("numel", "numel", MatlabType::int(), &[input]);
        let dims = editor.add_simple_call_to_output(
            "size",
            "sz",
            MatlabType::double_matrix(Shape::row(None)),
            &[input],
        );
        let initial_out =
            editor.add_simple_call_to_output("zeros", "out", result_ty.clone(), &[&dims]);
        let initial_acc = editor.make_typed_temporary("acc", element_ty.clone());
        editor.add_instruction(SsaInstruction::Assignment {
            output: initial_acc.clone(),
            value: seed_value,
        });
        let one = editor.add_make_integer_instruction(1, "one");
        let blocks = editor.make_for_loop(&one, &one, &count);

        editor.seek(blocks.loop_block);
        let carried_out = editor.make_typed_temporary("out", result_ty.clone());
        let carried_acc = editor.make_typed_temporary("acc", element_ty.clone());
        let iter = editor.add_int_iters_instruction("i");
        let element = editor.add_simple_get(input, &[&iter], "v");
        let next_acc = editor.make_typed_temporary("acc", element_ty);
        editor.add_call(combine, &[&next_acc], &[&carried_acc, &element]);
        let next_out = editor.add_simple_set(&carried_out, &[&iter], &next_acc, "out");
        editor.add_phi(
            &carried_out,
            &[&initial_out, &next_out],
            &[block, blocks.loop_block],
        );
        editor.add_phi(
            &carried_acc,
            &[&initial_acc, &next_acc],
            &[block, blocks.loop_block],
        );

        editor.seek(blocks.end_block);
        editor.register_type(output.clone(), result_ty);
        editor.add_phi(
            output,
            &[&initial_out, &next_out],
            &[block, blocks.loop_block],
        );
        reattach_tail(instance, blocks.end_block, site.tail);
        Ok(())
    }
}
