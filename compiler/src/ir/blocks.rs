//! SSA Basic Blocks
//!
//! This module defines the blocks a function body is made of. Blocks are
//! identified by their position in the body's block list, which only ever
//! grows, so a block id stays valid for the life of the function.

use super::instructions::SsaInstruction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a block within one function body
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SsaBlockId(usize);

impl SsaBlockId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// The entry block of every function
    pub fn entry() -> Self {
        Self(0)
    }

    pub fn index(&self) -> usize {
        self.0
    }

    pub fn is_entry(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SsaBlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A straight-line sequence of instructions
///
/// A well-formed block carries its phis first and at most one terminator,
/// in last position. Blocks without a terminator fall through to whatever
/// the enclosing construct runs next.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SsaBlock {
    instructions: Vec<SsaInstruction>,
}

impl SsaBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instructions(&self) -> &[SsaInstruction] {
        &self.instructions
    }

    pub fn instruction(&self, index: usize) -> Option<&SsaInstruction> {
        self.instructions.get(index)
    }

    pub fn instruction_mut(&mut self, index: usize) -> Option<&mut SsaInstruction> {
        self.instructions.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Append an instruction. The caller must not append past a terminator.
    pub fn add_instruction(&mut self, instruction: SsaInstruction) {
        debug_assert!(
            !self.has_terminator(),
            "appending past a terminator in a block"
        );
        self.instructions.push(instruction);
    }

    pub fn insert_instruction(&mut self, index: usize, instruction: SsaInstruction) {
        self.instructions.insert(index, instruction);
    }

    /// Detach every instruction from `index` to the end, preserving order
    pub fn remove_instructions_from(&mut self, index: usize) -> Vec<SsaInstruction> {
        self.instructions.split_off(index)
    }

    /// The block's terminator, when it has one
    pub fn ending_instruction(&self) -> Option<&SsaInstruction> {
        self.instructions.last().filter(|i| i.is_terminator())
    }

    pub fn has_terminator(&self) -> bool {
        self.ending_instruction().is_some()
    }

    /// Number of phis at the head of the block
    pub fn leading_phi_count(&self) -> usize {
        self.instructions
            .iter()
            .take_while(|i| i.is_phi())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instructions::Constant;

    fn assign(output: &str, value: i64) -> SsaInstruction {
        SsaInstruction::Assignment {
            output: output.to_string(),
            value: Constant::Int(value),
        }
    }

    #[test]
    fn test_block_id_display() {
        assert_eq!(SsaBlockId::new(0).to_string(), "bb0");
        assert_eq!(SsaBlockId::new(7).to_string(), "bb7");
        assert!(SsaBlockId::entry().is_entry());
        assert!(!SsaBlockId::new(1).is_entry());
    }

    #[test]
    fn test_tail_capture() {
        let mut block = SsaBlock::new();
        block.add_instruction(assign("a", 1));
        block.add_instruction(assign("b", 2));
        block.add_instruction(assign("c", 3));

        let tail = block.remove_instructions_from(1);
        assert_eq!(tail.len(), 2);
        assert_eq!(block.len(), 1);
        assert_eq!(tail[0].outputs().as_slice(), ["b"]);
        assert_eq!(tail[1].outputs().as_slice(), ["c"]);
    }

    #[test]
    fn test_ending_instruction() {
        let mut block = SsaBlock::new();
        block.add_instruction(assign("n", 5));
        assert!(block.ending_instruction().is_none());

        block.add_instruction(SsaInstruction::For {
            start: "one".to_string(),
            step: "one".to_string(),
            end: "n".to_string(),
            loop_block: SsaBlockId::new(1),
            end_block: SsaBlockId::new(2),
        });
        assert!(block.has_terminator());
    }

    #[test]
    fn test_leading_phi_count() {
        let mut block = SsaBlock::new();
        block.add_instruction(SsaInstruction::Phi {
            output: "x".to_string(),
            values: vec!["a".to_string(), "b".to_string()],
            sources: vec![SsaBlockId::new(0), SsaBlockId::new(1)],
        });
        block.add_instruction(assign("y", 1));
        assert_eq!(block.leading_phi_count(), 1);

        let empty = SsaBlock::new();
        assert_eq!(empty.leading_phi_count(), 0);
    }
}
