//! Reduction Eliminations
//!
//! Rewrites of full-vector reductions into explicit counted loops. Given
//! `out = sum(in)` with `in` statically known to be a vector, the call is
//! replaced by
//!
//! ```text
//! $numel$1 = numel(in)
//! $acc$1 = 0
//! $one$1 = 1
//! for $one$1:$one$1:$numel$1 loop bb1 end bb2
//! bb1: $acc$2 = phi [bb0: $acc$1, bb1: $acc$3]
//!      $i$1 = iter
//!      $v$1 = in($i$1)
//!      $acc$3 = plus($acc$2, $v$1)
//! bb2: out = phi [bb0: $acc$1, bb1: $acc$3]
//! ```
//!
//! `mean` appends a divide by the element count after the loop. `dot`
//! gathers from both operands and multiplies before accumulating, guarded
//! by a runtime length check that is inserted whether or not the operand
//! sizes are statically known to agree.

use super::elimination::{detach_at, reattach_tail, InstructionElimination};
use super::PassResult;
use crate::ir::{
    BlockEditor, CallKind, Constant, MatlabType, SsaBlockId, SsaInstruction, TypedInstance,
};
use crate::session::CompilationSession;
use diagnostics::Diagnostic;

/// The blocks and names of one synthesized accumulation loop
struct AccumulationLoop {
    preheader: SsaBlockId,
    loop_block: SsaBlockId,
    end_block: SsaBlockId,
    /// Accumulator value entering the loop
    initial: String,
    /// Accumulator value after one iteration
    result: String,
}

/// Open a `1:1:count` loop at `block` and accumulate whatever `gather`
/// reads per element. The caller places the merge phi in `end_block`.
fn accumulate_elements(
    instance: &mut TypedInstance,
    block: SsaBlockId,
    count: &str,
    element_ty: MatlabType,
    gather: impl FnOnce(&mut BlockEditor<'_>, &str) -> String,
) -> AccumulationLoop {
    let mut editor = BlockEditor::new(instance, block);

    let initial = editor.make_typed_temporary("acc", element_ty.clone());
    let zero = if element_ty.class().is_integer() {
        Constant::Int(0)
    } else {
        Constant::Double(0.0)
    };
    editor.add_instruction(SsaInstruction::Assignment {
        output: initial.clone(),
        value: zero,
    });

    let one = editor.add_make_integer_instruction(1, "one");
    let blocks = editor.make_for_loop(&one, &one, count);

    editor.seek(blocks.loop_block);
    let carried = editor.make_typed_temporary("acc", element_ty.clone());
    let iter = editor.add_int_iters_instruction("i");
    let element = gather(&mut editor, &iter);
    let result = editor.make_typed_temporary("acc", element_ty);
    editor.add_call("plus", &[&result], &[&carried, &element]);
    editor.add_phi(&carried, &[&initial, &result], &[block, blocks.loop_block]);

    AccumulationLoop {
        preheader: block,
        loop_block: blocks.loop_block,
        end_block: blocks.end_block,
        initial,
        result,
    }
}

fn as_vector_reduction<'i>(
    instance: &TypedInstance,
    instruction: &'i SsaInstruction,
    name: &str,
) -> Option<&'i str> {
    let SsaInstruction::FunctionCall {
        function,
        kind: CallKind::Untyped,
        outputs,
        inputs,
    } = instruction
    else {
        return None;
    };
    if function != name || outputs.len() != 1 || inputs.len() != 1 {
        return None;
    }
    let known_vector = instance
        .variable_type(&inputs[0])
        .map(|ty| ty.is_known_vector())
        .unwrap_or(false);
    known_vector.then(|| inputs[0].as_str())
}

fn into_call_parts(instruction: SsaInstruction) -> (Vec<String>, Vec<String>) {
    match instruction {
        SsaInstruction::FunctionCall {
            outputs, inputs, ..
        } => (outputs, inputs),
        other => panic!("eliminating a non-call instruction {}", other),
    }
}

/// Replaces whole-vector `sum` calls with an explicit accumulation loop
pub struct SumEliminationPass;

impl SumEliminationPass {
    pub const NAME: &'static str = "SumEliminationPass";
}

impl InstructionElimination for SumEliminationPass {
    fn pass_name(&self) -> &str {
        Self::NAME
    }

    fn can_eliminate(&self, instance: &TypedInstance, instruction: &SsaInstruction) -> bool {
        as_vector_reduction(instance, instruction, "sum").is_some()
    }

    fn remove_instruction(
        &self,
        _session: &CompilationSession,
        instance: &mut TypedInstance,
        block: SsaBlockId,
        position: usize,
    ) -> PassResult {
        let site = detach_at(instance, block, position);
        let (outputs, inputs) = into_call_parts(site.instruction);
        let output = &outputs[0];
        let input = &inputs[0];
        let element_ty = instance
            .variable_type(input)
            .expect("eligible sum input lost its type")
            .element();

        let count = {
            let mut editor = BlockEditor::new(instance, block);
            editor.add_simple_call_to_output("numel", "numel", MatlabType::int(), &[input])
        };
        let lowered = accumulate_elements(instance, block, &count, element_ty.clone(), |editor, iter| {
            editor.add_simple_get(input, &[iter], "v")
        });

        let mut editor = BlockEditor::new(instance, lowered.end_block);
        editor.register_type(output.clone(), element_ty);
        editor.add_phi(
            output,
            &[&lowered.initial, &lowered.result],
            &[lowered.preheader, lowered.loop_block],
        );
        reattach_tail(instance, lowered.end_block, site.tail);
        Ok(())
    }
}

/// Replaces whole-vector `mean` calls with a sum loop and a final divide
pub struct MeanEliminationPass;

impl MeanEliminationPass {
    pub const NAME: &'static str = "MeanEliminationPass";
}

impl InstructionElimination for MeanEliminationPass {
    fn pass_name(&self) -> &str {
        Self::NAME
    }

    fn can_eliminate(&self, instance: &TypedInstance, instruction: &SsaInstruction) -> bool {
        as_vector_reduction(instance, instruction, "mean").is_some()
    }

    fn remove_instruction(
        &self,
        _session: &CompilationSession,
        instance: &mut TypedInstance,
        block: SsaBlockId,
        position: usize,
    ) -> PassResult {
        let site = detach_at(instance, block, position);
        let (outputs, inputs) = into_call_parts(site.instruction);
        let output = &outputs[0];
        let input = &inputs[0];
        let element_ty = instance
            .variable_type(input)
            .expect("eligible mean input lost its type")
            .element();

        let count = {
            let mut editor = BlockEditor::new(instance, block);
            editor.add_simple_call_to_output("numel", "numel", MatlabType::int(), &[input])
        };
        let lowered = accumulate_elements(instance, block, &count, element_ty.clone(), |editor, iter| {
            editor.add_simple_get(input, &[iter], "v")
        });

        let mut editor = BlockEditor::new(instance, lowered.end_block);
        let total = editor.make_typed_temporary("acc", element_ty);
        editor.add_phi(
            &total,
            &[&lowered.initial, &lowered.result],
            &[lowered.preheader, lowered.loop_block],
        );
        // mean is a double even for integer operands.
        editor.register_type(output.clone(), MatlabType::double());
        editor.add_call("rdivide", &[output], &[&total, &count]);
        reattach_tail(instance, lowered.end_block, site.tail);
        Ok(())
    }
}

/// Replaces `dot` calls on two vectors with a multiply-accumulate loop
pub struct DotEliminationPass;

impl DotEliminationPass {
    pub const NAME: &'static str = "DotEliminationPass";
}

impl InstructionElimination for DotEliminationPass {
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
        function == "dot"
            && outputs.len() == 1
            && inputs.len() == 2
            && inputs.iter().all(|input| {
                instance
                    .variable_type(input)
                    .map(|ty| ty.is_known_vector())
                    .unwrap_or(false)
            })
    }

    fn remove_instruction(
        &self,
        session: &CompilationSession,
        instance: &mut TypedInstance,
        block: SsaBlockId,
        position: usize,
    ) -> PassResult {
        // Size groups come from the body as it stands, so read them before
        // the site is detached.
        let (left, right) = {
            let instruction = instance
                .body()
                .block(block)
                .instruction(position)
                .expect("candidate position out of range");
            let SsaInstruction::FunctionCall { inputs, .. } = instruction else {
                panic!("eliminating a non-call instruction");
            };
            (inputs[0].clone(), inputs[1].clone())
        };
        let statically_equal = instance.size_groups().same_size(&left, &right);
        if statically_equal {
            session.report(
                Diagnostic::trace("operand sizes statically agree; length guard retained")
                    .with_pass(Self::NAME)
                    .with_function(instance.identity().to_string()),
            );
        }

        let site = detach_at(instance, block, position);
        let (outputs, _) = into_call_parts(site.instruction);
        let output = &outputs[0];

        let left_class = instance
            .variable_type(&left)
            .expect("eligible dot input lost its type")
            .class();
        let right_class = instance
            .variable_type(&right)
            .expect("eligible dot input lost its type")
            .class();
        let element_ty = if left_class == right_class {
            MatlabType::Scalar(left_class)
        } else {
            MatlabType::double()
        };

        let count = {
            let mut editor = BlockEditor::new(instance, block);
            let left_count =
                editor.add_simple_call_to_output("numel", "numel", MatlabType::int(), &[&left]);
            let right_count =
                editor.add_simple_call_to_output("numel", "numel", MatlabType::int(), &[&right]);
            editor.add_validate_equal(&left_count, &right_count);
            left_count
        };

        let gather_ty = element_ty.clone();
        let lowered = accumulate_elements(instance, block, &count, element_ty.clone(), |editor, iter| {
            let a = editor.add_simple_get(&left, &[iter], "a");
            let b = editor.add_simple_get(&right, &[iter], "b");
            editor.add_simple_call_to_output("times", "prod", gather_ty, &[&a, &b])
        });

        let mut editor = BlockEditor::new(instance, lowered.end_block);
        editor.register_type(output.clone(), element_ty);
        editor.add_phi(
            output,
            &[&lowered.initial, &lowered.result],
            &[lowered.preheader, lowered.loop_block],
        );
        reattach_tail(instance, lowered.end_block, site.tail);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::interp::{evaluate_body, EvalError, MatrixValue, Value};
    use crate::ir::{validate_body, FunctionBody, Shape};
    use crate::passes::Pass;
    use crate::session::test_session;
    use crate::units::FunctionIdentity;
    use fxhash::FxHashMap;

    fn reduction_body(function: &str, inputs: &[&str]) -> FunctionBody {
        let mut body = FunctionBody::new(
            inputs.iter().map(|i| i.to_string()).collect(),
            vec!["out".to_string()],
        );
        let entry = body.entry_block();
        body.block_mut(entry).add_instruction(SsaInstruction::FunctionCall {
            function: function.to_string(),
            kind: CallKind::Untyped,
            outputs: vec!["out".to_string()],
            inputs: inputs.iter().map(|i| i.to_string()).collect(),
        });
        body
    }

    fn vector_instance(body: FunctionBody, vectors: &[&str]) -> TypedInstance {
        let mut types = FxHashMap::default();
        for name in vectors {
            types.insert(
                name.to_string(),
                MatlabType::double_matrix(Shape::row(None)),
            );
        }
        TypedInstance::new(FunctionIdentity::new("lib.m", "reduce"), body, types)
    }

    fn row(data: &[f64]) -> Value {
        Value::Matrix(MatrixValue::row_vector(data))
    }

    #[test]
    fn test_sum_gating_requires_known_vector_type() {
        let pass = SumEliminationPass;
        let untyped = vector_instance(reduction_body("sum", &["in"]), &[]);
        let call = untyped.body().block(untyped.body().entry_block()).instructions()[0].clone();
        assert!(!pass.can_eliminate(&untyped, &call));

        let typed = vector_instance(reduction_body("sum", &["in"]), &["in"]);
        assert!(pass.can_eliminate(&typed, &call));

        let mut matrix_types = FxHashMap::default();
        matrix_types.insert(
            "in".to_string(),
            MatlabType::double_matrix(Shape::known(&[2, 3])),
        );
        let matrix = TypedInstance::new(
            FunctionIdentity::new("lib.m", "reduce"),
            reduction_body("sum", &["in"]),
            matrix_types,
        );
        assert!(!pass.can_eliminate(&matrix, &call));
    }

    #[test]
    fn test_sum_elimination_evaluates_like_the_builtin() {
        let session = test_session();
        let mut instance = vector_instance(reduction_body("sum", &["in"]), &["in"]);
        SumEliminationPass.run(&session, &mut instance).unwrap();

        assert!(validate_body(instance.body()).is_ok());
        assert!(!instance
            .body()
            .all_instructions()
            .any(|(_, _, i)| matches!(i, SsaInstruction::FunctionCall { function, .. } if function == "sum")));

        let results = evaluate_body(instance.body(), &[row(&[1.0, 2.0, 3.0])]).unwrap();
        assert_eq!(results, vec![Value::Num(6.0)]);
        let results = evaluate_body(instance.body(), &[Value::Matrix(MatrixValue::empty())]).unwrap();
        assert_eq!(results, vec![Value::Num(0.0)]);
    }

    #[test]
    fn test_mean_elimination_divides_by_count() {
        let session = test_session();
        let mut instance = vector_instance(reduction_body("mean", &["in"]), &["in"]);
        MeanEliminationPass.run(&session, &mut instance).unwrap();

        assert!(validate_body(instance.body()).is_ok());
        let results = evaluate_body(instance.body(), &[row(&[2.0, 4.0, 6.0])]).unwrap();
        assert_eq!(results, vec![Value::Num(4.0)]);
    }

    #[test]
    fn test_dot_elimination_keeps_length_guard() {
        let session = test_session();
        let mut instance = vector_instance(reduction_body("dot", &["a", "b"]), &["a", "b"]);
        DotEliminationPass.run(&session, &mut instance).unwrap();

        assert!(validate_body(instance.body()).is_ok());
        assert!(instance
            .body()
            .all_instructions()
            .any(|(_, _, i)| matches!(i, SsaInstruction::ValidateEqual { .. })));

        let results = evaluate_body(
            instance.body(),
            &[row(&[1.0, 2.0, 3.0]), row(&[4.0, 5.0, 6.0])],
        )
        .unwrap();
        assert_eq!(results, vec![Value::Num(32.0)]);

        // The guard fires on a runtime length mismatch.
        let err = evaluate_body(instance.body(), &[row(&[1.0, 2.0]), row(&[1.0])]);
        assert!(matches!(err, Err(EvalError::ValidationFailed { .. })));
    }

    #[test]
    fn test_gathered_elements_are_typed() {
        let session = test_session();
        let mut instance = vector_instance(reduction_body("sum", &["in"]), &["in"]);
        SumEliminationPass.run(&session, &mut instance).unwrap();

        let gets: Vec<String> = instance
            .body()
            .all_instructions()
            .filter_map(|(_, _, i)| match i {
                SsaInstruction::SimpleGet { output, .. } => Some(output.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(gets.len(), 1);
        assert_eq!(
            instance.variable_type(&gets[0]),
            Some(&MatlabType::double())
        );
    }
}
