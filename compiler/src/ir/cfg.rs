//! Control-Flow Graph
//!
//! Derives block-level edges from the structural terminators of a function
//! body. The graph is a cache owned by the instance; any structural edit
//! invalidates it and the next user recomputes from scratch.
//!
//! Edge recovery follows the fallthrough chain of each construct. The tail
//! of a block is the block where control sits after the block's construct
//! finishes: a block without a terminator is its own tail, and a block
//! ending in a loop or branch has the tail of the construct's end block.

use super::blocks::SsaBlockId;
use super::functions::FunctionBody;
use super::instructions::SsaInstruction;

#[derive(Debug, Clone, Default)]
pub struct ControlFlowGraph {
    predecessors: Vec<Vec<SsaBlockId>>,
    successors: Vec<Vec<SsaBlockId>>,
}

impl ControlFlowGraph {
    /// Build the graph for the current state of `body`
    pub fn compute(body: &FunctionBody) -> Self {
        let count = body.block_count();
        let mut graph = ControlFlowGraph {
            predecessors: vec![Vec::new(); count],
            successors: vec![Vec::new(); count],
        };

        for id in body.block_ids() {
            match body.block(id).ending_instruction() {
                Some(SsaInstruction::For {
                    loop_block,
                    end_block,
                    ..
                }) => {
                    let last = tail(body, *loop_block);
                    // Predecessor order of the loop block and of the end
                    // block is [preheader, loop tail]; phi sources built by
                    // the block editor rely on it.
                    graph.add_edge(id, *loop_block);
                    graph.add_edge(id, *end_block);
                    graph.add_edge(last, *loop_block);
                    graph.add_edge(last, *end_block);
                }
                Some(SsaInstruction::Branch {
                    then_block,
                    else_block,
                    end_block,
                    ..
                }) => {
                    let then_tail = tail(body, *then_block);
                    let else_tail = tail(body, *else_block);
                    graph.add_edge(id, *then_block);
                    graph.add_edge(id, *else_block);
                    graph.add_edge(then_tail, *end_block);
                    graph.add_edge(else_tail, *end_block);
                }
                _ => {}
            }
        }

        graph
    }

    fn add_edge(&mut self, from: SsaBlockId, to: SsaBlockId) {
        self.successors[from.index()].push(to);
        self.predecessors[to.index()].push(from);
    }

    pub fn predecessors(&self, id: SsaBlockId) -> &[SsaBlockId] {
        &self.predecessors[id.index()]
    }

    pub fn successors(&self, id: SsaBlockId) -> &[SsaBlockId] {
        &self.successors[id.index()]
    }

    pub fn block_count(&self) -> usize {
        self.predecessors.len()
    }
}

/// Follow the fallthrough chain from `id` to the block where control rests
/// once the construct starting there has finished
pub fn tail(body: &FunctionBody, id: SsaBlockId) -> SsaBlockId {
    let mut current = id;
    loop {
        match body.block(current).ending_instruction() {
            Some(SsaInstruction::For { end_block, .. })
            | Some(SsaInstruction::Branch { end_block, .. }) => current = *end_block,
            _ => return current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instructions::Constant;

    /// Body shaped like a sum loop: bb0 runs a counted loop whose body is
    /// bb1 and whose end block is bb2.
    fn loop_body() -> FunctionBody {
        let mut body = FunctionBody::new(vec![], vec![]);
        let loop_block = body.add_block();
        let end_block = body.add_block();
        let entry = body.entry_block();
        body.block_mut(entry).add_instruction(SsaInstruction::Assignment {
            output: "n".to_string(),
            value: Constant::Int(3),
        });
        body.block_mut(entry).add_instruction(SsaInstruction::For {
            start: "n".to_string(),
            step: "n".to_string(),
            end: "n".to_string(),
            loop_block,
            end_block,
        });
        body
    }

    #[test]
    fn test_loop_edges() {
        let body = loop_body();
        let graph = ControlFlowGraph::compute(&body);
        let entry = SsaBlockId::new(0);
        let loop_block = SsaBlockId::new(1);
        let end_block = SsaBlockId::new(2);

        assert_eq!(graph.successors(entry), [loop_block, end_block]);
        // The loop block has no terminator, so it is its own tail and
        // loops back to itself.
        assert_eq!(graph.predecessors(loop_block), [entry, loop_block]);
        assert_eq!(graph.predecessors(end_block), [entry, loop_block]);
        assert!(graph.predecessors(entry).is_empty());
    }

    #[test]
    fn test_branch_edges() {
        let mut body = FunctionBody::new(vec![], vec![]);
        let then_block = body.add_block();
        let else_block = body.add_block();
        let end_block = body.add_block();
        let entry = body.entry_block();
        body.block_mut(entry).add_instruction(SsaInstruction::Branch {
            condition: "c".to_string(),
            then_block,
            else_block,
            end_block,
        });

        let graph = ControlFlowGraph::compute(&body);
        assert_eq!(graph.successors(entry), [then_block, else_block]);
        assert_eq!(graph.predecessors(end_block), [then_block, else_block]);
    }

    #[test]
    fn test_tail_of_nested_construct() {
        // bb0 ends in a loop over bb1; bb1 ends in a branch merging at bb4.
        let mut body = FunctionBody::new(vec![], vec![]);
        let loop_block = body.add_block();
        let outer_end = body.add_block();
        let then_block = body.add_block();
        let else_block = body.add_block();
        let merge = body.add_block();
        let entry = body.entry_block();
        body.block_mut(entry).add_instruction(SsaInstruction::For {
            start: "s".to_string(),
            step: "s".to_string(),
            end: "s".to_string(),
            loop_block,
            end_block: outer_end,
        });
        body.block_mut(loop_block)
            .add_instruction(SsaInstruction::Branch {
                condition: "c".to_string(),
                then_block,
                else_block,
                end_block: merge,
            });

        assert_eq!(tail(&body, loop_block), merge);

        // The back edge and the loop exit both come from the branch merge.
        let graph = ControlFlowGraph::compute(&body);
        assert_eq!(graph.predecessors(loop_block), [entry, merge]);
        assert_eq!(graph.predecessors(outer_end), [entry, merge]);
    }
}
