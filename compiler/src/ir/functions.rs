//! SSA Function Bodies
//!
//! This module defines the function body that passes rewrite, plus the
//! allocator that mints fresh SSA names for synthesized code.
//!
//! The block list is append-only. Rewrites never delete or renumber blocks,
//! so block ids held across an edit stay valid, and blocks a construct no
//! longer reaches simply become unreachable.

use super::blocks::{SsaBlock, SsaBlockId};
use super::instructions::SsaInstruction;
use fxhash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One function lowered to structured SSA
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionBody {
    blocks: Vec<SsaBlock>,
    parameters: Vec<String>,
    returns: Vec<String>,
    /// Names of passes this function opts out of
    directives: BTreeSet<String>,
}

impl FunctionBody {
    /// Create a body with an empty entry block
    pub fn new(parameters: Vec<String>, returns: Vec<String>) -> Self {
        Self {
            blocks: vec![SsaBlock::new()],
            parameters,
            returns,
            directives: BTreeSet::new(),
        }
    }

    pub fn entry_block(&self) -> SsaBlockId {
        SsaBlockId::entry()
    }

    /// Append a fresh empty block and return its id
    pub fn add_block(&mut self) -> SsaBlockId {
        let id = SsaBlockId::new(self.blocks.len());
        self.blocks.push(SsaBlock::new());
        id
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_ids(&self) -> impl Iterator<Item = SsaBlockId> {
        (0..self.blocks.len()).map(SsaBlockId::new)
    }

    pub fn get_block(&self, id: SsaBlockId) -> Option<&SsaBlock> {
        self.blocks.get(id.index())
    }

    pub fn get_block_mut(&mut self, id: SsaBlockId) -> Option<&mut SsaBlock> {
        self.blocks.get_mut(id.index())
    }

    /// Panics on an id this body never issued
    pub fn block(&self, id: SsaBlockId) -> &SsaBlock {
        self.get_block(id).expect("block id out of range")
    }

    pub fn block_mut(&mut self, id: SsaBlockId) -> &mut SsaBlock {
        self.get_block_mut(id).expect("block id out of range")
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn returns(&self) -> &[String] {
        &self.returns
    }

    pub fn add_directive(&mut self, pass_name: impl Into<String>) {
        self.directives.insert(pass_name.into());
    }

    pub fn directives(&self) -> impl Iterator<Item = &str> {
        self.directives.iter().map(|d| d.as_str())
    }

    /// True when this function opts out of the named pass
    pub fn skips_pass(&self, pass_name: &str) -> bool {
        self.directives.contains(pass_name)
    }

    /// Every instruction in block order, with its position
    pub fn all_instructions(
        &self,
    ) -> impl Iterator<Item = (SsaBlockId, usize, &SsaInstruction)> {
        self.blocks.iter().enumerate().flat_map(|(b, block)| {
            block
                .instructions()
                .iter()
                .enumerate()
                .map(move |(i, instruction)| (SsaBlockId::new(b), i, instruction))
        })
    }

    /// Every SSA name defined somewhere in the body
    pub fn defined_names(&self) -> impl Iterator<Item = &str> {
        self.blocks
            .iter()
            .flat_map(|block| block.instructions().iter())
            .flat_map(|instruction| instruction.outputs())
    }

    /// Locate the instruction defining `name`, if any does
    pub fn find_definition(&self, name: &str) -> Option<(SsaBlockId, usize, &SsaInstruction)> {
        self.all_instructions()
            .find(|(_, _, instruction)| instruction.outputs().iter().any(|o| *o == name))
    }
}

/// Mints SSA names that are guaranteed unused in one function
///
/// Synthesized names have the form `$base$n`, which the lowering frontend
/// never produces for user variables, so a minted name can only collide
/// with earlier minted names and the counter skips those.
#[derive(Debug, Clone, Default)]
pub struct TemporaryAllocator {
    reserved: FxHashSet<String>,
    counters: FxHashMap<String, u32>,
    suggestions: FxHashMap<String, String>,
}

impl TemporaryAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a name as in use. Returns false if it already was.
    pub fn reserve(&mut self, name: &str) -> bool {
        self.reserved.insert(name.to_string())
    }

    pub fn reserve_all<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            self.reserve(name);
        }
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains(name)
    }

    /// Mint a fresh name, keeping `suggested` recognizable in dumps
    pub fn make_temporary(&mut self, suggested: &str) -> String {
        let base = sanitize_base(suggested);
        let counter = self.counters.entry(base.clone()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("${}${}", base, counter);
            if self.reserved.insert(candidate.clone()) {
                self.suggestions.insert(candidate.clone(), base);
                return candidate;
            }
        }
    }

    /// The suggestion a minted name was derived from
    pub fn suggested_base(&self, name: &str) -> Option<&str> {
        self.suggestions.get(name).map(|s| s.as_str())
    }
}

fn sanitize_base(suggested: &str) -> String {
    let cleaned: String = suggested
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        "tmp".to_string()
    } else {
        trimmed.to_string()
    }
}
