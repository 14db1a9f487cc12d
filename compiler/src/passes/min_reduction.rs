//! Min-Along-Dimension Elimination
//!
//! Rewrites `[m, i] = min(in, [], d)` into nested counted loops: one loop
//! per retained dimension, an inner scan along dimension `d`, and a
//! replace-if-smaller branch in the scan. The scan carries the best value
//! and the 1-based position where it was first seen, so ties keep the
//! lowest index like the builtin.
//!
//! The rewrite fires only when the operand shape is fully known with no
//! zero extent, the second argument is a known-empty placeholder, and the
//! third is a compile-time integer naming a dimension in range. Every
//! other call shape is left alone.

use super::elimination::{detach_at, reattach_tail, InstructionElimination};
use super::PassResult;
use crate::ir::cfg::tail;
use crate::ir::{
    BlockEditor, CallKind, MatlabType, Shape, SsaBlockId, SsaInstruction, TypedInstance,
};
use crate::session::CompilationSession;
use fxhash::FxHashMap;

/// Replaces eligible 3-argument `min` calls with explicit scan loops
pub struct MinEliminationPass;

impl MinEliminationPass {
    pub const NAME: &'static str = "MinEliminationPass";
}

/// One synthesized loop over a retained dimension
struct LoopLevel {
    preheader: SsaBlockId,
    loop_block: SsaBlockId,
    end_block: SsaBlockId,
    carried_val: String,
    carried_idx: String,
    entering_val: String,
    entering_idx: String,
}

/// The operand dims and the reduced dimension, when the call matches the
/// supported pattern
fn min_candidate(
    instance: &TypedInstance,
    instruction: &SsaInstruction,
) -> Option<(Vec<usize>, usize)> {
    let SsaInstruction::FunctionCall {
        function,
        kind: CallKind::Untyped,
        outputs,
        inputs,
    } = instruction
    else {
        return None;
    };
    if function != "min" || inputs.len() != 3 || outputs.is_empty() || outputs.len() > 2 {
        return None;
    }
    let dims = instance.variable_type(&inputs[0])?.shape().known_dims()?;
    if dims.is_empty() || dims.iter().any(|&extent| extent == 0) {
        return None;
    }
    if !instance.variable_type(&inputs[1])?.is_known_empty() {
        return None;
    }
    let (_, _, definition) = instance.body().find_definition(&inputs[2])?;
    let SsaInstruction::Assignment { value, .. } = definition else {
        return None;
    };
    let dimension = value.as_integer()?;
    if dimension < 1 || dimension as usize > dims.len() {
        return None;
    }
    Some((dims, dimension as usize))
}

fn lane_subscripts(
    rank: usize,
    reduced: usize,
    iters: &FxHashMap<usize, String>,
    at_reduced: &str,
) -> Vec<String> {
    (1..=rank)
        .map(|dim| {
            if dim == reduced {
                at_reduced.to_string()
            } else {
                iters[&dim].clone()
            }
        })
        .collect()
}

impl InstructionElimination for MinEliminationPass {
    fn pass_name(&self) -> &str {
        Self::NAME
    }

    fn can_eliminate(&self, instance: &TypedInstance, instruction: &SsaInstruction) -> bool {
        min_candidate(instance, instruction).is_some()
    }

    fn remove_instruction(
        &self,
        _session: &CompilationSession,
        instance: &mut TypedInstance,
        block: SsaBlockId,
        position: usize,
    ) -> PassResult {
        let (dims, reduced) = {
            let instruction = instance
                .body()
                .block(block)
                .instruction(position)
                .expect("candidate position out of range");
            min_candidate(instance, instruction).expect("candidate stopped matching")
        };
        let site = detach_at(instance, block, position);
        let SsaInstruction::FunctionCall {
            outputs, inputs, ..
        } = site.instruction
        else {
            panic!("eliminating a non-call instruction");
        };
        let operand = &inputs[0];
        let rank = dims.len();
        let out_dims: Vec<usize> = dims
            .iter()
            .enumerate()
            .map(|(index, &extent)| if index + 1 == reduced { 1 } else { extent })
            .collect();
        let class = instance
            .variable_type(operand)
            .expect("eligible min operand lost its type")
            .class();
        let element_ty = MatlabType::Scalar(class);
        let value_out_ty = MatlabType::matrix(class, Shape::known(&out_dims));
        let index_out_ty = MatlabType::double_matrix(Shape::known(&out_dims));

        let mut editor = BlockEditor::new(instance, block);
        let one = editor.add_make_integer_instruction(1, "one");
        let dim_args: Vec<String> = out_dims
            .iter()
            .map(|&extent| {
                if extent == 1 {
                    one.clone()
                } else {
                    editor.add_make_integer_instruction(extent as i64, "c")
                }
            })
            .collect();
        let dim_refs: Vec<&str> = dim_args.iter().map(|arg| arg.as_str()).collect();
        let initial_val =
            editor.add_simple_call_to_output("zeros", "minval", value_out_ty.clone(), &dim_refs);
        let initial_idx =
            editor.add_simple_call_to_output("zeros", "minidx", index_out_ty.clone(), &dim_refs);

        // Descend: one counted loop per retained dimension, innermost last.
        // The head phis are filled in on the way back up, once the loop
        // tails exist.
        let mut levels: Vec<LoopLevel> = Vec::new();
        let mut iters: FxHashMap<usize, String> = FxHashMap::default();
        let mut cursor = block;
        let mut entering_val = initial_val;
        let mut entering_idx = initial_idx;
        for dim in (1..=rank).filter(|&dim| dim != reduced) {
            editor.seek(cursor);
            let carried_val = editor.make_typed_temporary("minval", value_out_ty.clone());
            let carried_idx = editor.make_typed_temporary("minidx", index_out_ty.clone());
            let bound = if dims[dim - 1] == 1 {
                one.clone()
            } else {
                editor.add_make_integer_instruction(dims[dim - 1] as i64, "n")
            };
            let blocks = editor.make_for_loop(&one, &one, &bound);
            editor.seek(blocks.loop_block);
            iters.insert(dim, editor.add_int_iters_instruction("i"));
            levels.push(LoopLevel {
                preheader: cursor,
                loop_block: blocks.loop_block,
                end_block: blocks.end_block,
                carried_val: carried_val.clone(),
                carried_idx: carried_idx.clone(),
                entering_val,
                entering_idx,
            });
            entering_val = carried_val;
            entering_idx = carried_idx;
            cursor = blocks.loop_block;
        }

        // Innermost scan along the reduced dimension. Element 1 seeds the
        // best value, the loop runs from 2 so a length-1 dimension takes
        // the seed unchanged.
        editor.seek(cursor);
        let first_subs = lane_subscripts(rank, reduced, &iters, &one);
        let first_refs: Vec<&str> = first_subs.iter().map(|sub| sub.as_str()).collect();
        let first_best = editor.add_simple_get(operand, &first_refs, "best");
        let carried_best = editor.make_typed_temporary("best", element_ty.clone());
        let carried_best_idx = editor.make_typed_temporary("bestidx", MatlabType::int());
        let two = editor.add_make_integer_instruction(2, "two");
        let scan_bound = editor.add_make_integer_instruction(dims[reduced - 1] as i64, "n");
        let scan = editor.make_for_loop(&two, &one, &scan_bound);

        editor.seek(scan.loop_block);
        let scan_iter = editor.add_int_iters_instruction("k");
        let cand_subs = lane_subscripts(rank, reduced, &iters, &scan_iter);
        let cand_refs: Vec<&str> = cand_subs.iter().map(|sub| sub.as_str()).collect();
        let cand = editor.add_simple_get(operand, &cand_refs, "cand");
        let smaller =
            editor.add_simple_call_to_output("lt", "smaller", MatlabType::logical(), &[&cand, &carried_best]);
        let arms = editor.make_branch(&smaller);

        editor.seek(arms.end_block);
        let next_best = editor.make_typed_temporary("best", element_ty.clone());
        editor.add_phi(
            &next_best,
            &[&cand, &carried_best],
            &[arms.then_block, arms.else_block],
        );
        let next_best_idx = editor.make_typed_temporary("bestidx", MatlabType::int());
        editor.add_phi(
            &next_best_idx,
            &[&scan_iter, &carried_best_idx],
            &[arms.then_block, arms.else_block],
        );

        editor.seek(scan.loop_block);
        editor.add_phi(
            &carried_best,
            &[&first_best, &next_best],
            &[cursor, arms.end_block],
        );
        editor.add_phi(
            &carried_best_idx,
            &[&one, &next_best_idx],
            &[cursor, arms.end_block],
        );

        editor.seek(scan.end_block);
        let lane_val = editor.make_typed_temporary("best", element_ty);
        editor.add_phi(
            &lane_val,
            &[&first_best, &next_best],
            &[cursor, arms.end_block],
        );
        let lane_idx = editor.make_typed_temporary("bestidx", MatlabType::int());
        editor.add_phi(
            &lane_idx,
            &[&one, &next_best_idx],
            &[cursor, arms.end_block],
        );

        let write_subs = lane_subscripts(rank, reduced, &iters, &one);
        let write_refs: Vec<&str> = write_subs.iter().map(|sub| sub.as_str()).collect();
        if levels.is_empty() {
            editor.register_type(outputs[0].clone(), value_out_ty);
            editor.add_set_into(&outputs[0], &entering_val, &write_refs, &lane_val);
            if let Some(index_out) = outputs.get(1) {
                editor.register_type(index_out.clone(), index_out_ty);
                editor.add_set_into(index_out, &entering_idx, &write_refs, &lane_idx);
            }
            reattach_tail(instance, scan.end_block, site.tail);
            return Ok(());
        }
        let mut updated_val = editor.add_simple_set(&entering_val, &write_refs, &lane_val, "minval");
        let mut updated_idx = editor.add_simple_set(&entering_idx, &write_refs, &lane_idx, "minidx");
        drop(editor);

        // Ascend: now that each loop body is complete its tail block is
        // known, so the head and end phis can be wired.
        for (depth, level) in levels.iter().enumerate().rev() {
            let level_tail = tail(instance.body(), level.loop_block);
            let mut editor = BlockEditor::new(instance, level.loop_block);
            editor.add_phi(
                &level.carried_val,
                &[&level.entering_val, &updated_val],
                &[level.preheader, level_tail],
            );
            editor.add_phi(
                &level.carried_idx,
                &[&level.entering_idx, &updated_idx],
                &[level.preheader, level_tail],
            );
            editor.seek(level.end_block);
            if depth == 0 {
                editor.register_type(outputs[0].clone(), value_out_ty.clone());
                editor.add_phi(
                    &outputs[0],
                    &[&level.entering_val, &updated_val],
                    &[level.preheader, level_tail],
                );
                let index_name = match outputs.get(1) {
                    Some(name) => {
                        editor.register_type(name.clone(), index_out_ty.clone());
                        name.clone()
                    }
                    None => editor.make_typed_temporary("minidx", index_out_ty.clone()),
                };
                editor.add_phi(
                    &index_name,
                    &[&level.entering_idx, &updated_idx],
                    &[level.preheader, level_tail],
                );
            } else {
                let val = editor.make_typed_temporary("minval", value_out_ty.clone());
                editor.add_phi(
                    &val,
                    &[&level.entering_val, &updated_val],
                    &[level.preheader, level_tail],
                );
                let idx = editor.make_typed_temporary("minidx", index_out_ty.clone());
                editor.add_phi(
                    &idx,
                    &[&level.entering_idx, &updated_idx],
                    &[level.preheader, level_tail],
                );
                updated_val = val;
                updated_idx = idx;
            }
        }
        reattach_tail(instance, levels[0].end_block, site.tail);
        Ok(())
    }
}
