//! Typed Function Instances
//!
//! A `TypedInstance` bundles everything the driver tracks per function: the
//! SSA body, the type map, the temporary allocator, the pass progress
//! counter, and caches of data derived from the body.
//!
//! Derived data is valid only for the body it was computed from. Rewrites
//! must invalidate before editing; the driver additionally drops whatever a
//! pass does not declare as preserved once the pass returns.

use super::cfg::ControlFlowGraph;
use super::functions::{FunctionBody, TemporaryAllocator};
use super::instructions::SsaInstruction;
use super::types::MatlabType;
use crate::units::FunctionIdentity;
use fxhash::FxHashMap;

/// Kinds of derived data an instance caches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedDataKind {
    ControlFlowGraph,
    SizeGroups,
}

impl DerivedDataKind {
    pub const ALL: [DerivedDataKind; 2] =
        [DerivedDataKind::ControlFlowGraph, DerivedDataKind::SizeGroups];
}

#[derive(Debug, Default)]
struct DerivedData {
    cfg: Option<ControlFlowGraph>,
    size_groups: Option<SizeGroupInfo>,
}

/// One function under compilation
#[derive(Debug)]
pub struct TypedInstance {
    identity: FunctionIdentity,
    body: FunctionBody,
    types: FxHashMap<String, MatlabType>,
    temporaries: TemporaryAllocator,
    completed_passes: usize,
    derived: DerivedData,
}

impl TypedInstance {
    pub fn new(
        identity: FunctionIdentity,
        body: FunctionBody,
        types: FxHashMap<String, MatlabType>,
    ) -> Self {
        let mut temporaries = TemporaryAllocator::new();
        temporaries.reserve_all(body.parameters().iter().map(|p| p.as_str()));
        temporaries.reserve_all(body.returns().iter().map(|r| r.as_str()));
        let defined: Vec<String> = body.defined_names().map(|n| n.to_string()).collect();
        temporaries.reserve_all(defined.iter().map(|n| n.as_str()));

        Self {
            identity,
            body,
            types,
            temporaries,
            completed_passes: 0,
            derived: DerivedData::default(),
        }
    }

    pub fn identity(&self) -> &FunctionIdentity {
        &self.identity
    }

    pub fn function_name(&self) -> &str {
        self.identity.function()
    }

    pub fn body(&self) -> &FunctionBody {
        &self.body
    }

    /// Mutable access to the body. Structural edits leave the derived
    /// caches stale; the editor declares invalidation before touching
    /// anything.
    pub fn body_mut(&mut self) -> &mut FunctionBody {
        &mut self.body
    }

    pub fn variable_type(&self, name: &str) -> Option<&MatlabType> {
        self.types.get(name)
    }

    pub fn register_type(&mut self, name: impl Into<String>, ty: MatlabType) {
        self.types.insert(name.into(), ty);
    }

    /// Decompose the instance once compilation is over
    pub fn into_parts(self) -> (FunctionIdentity, FunctionBody, FxHashMap<String, MatlabType>) {
        (self.identity, self.body, self.types)
    }

    pub fn types(&self) -> &FxHashMap<String, MatlabType> {
        &self.types
    }

    /// Mint a fresh SSA name for synthesized code
    pub fn make_temporary(&mut self, suggested: &str) -> String {
        self.temporaries.make_temporary(suggested)
    }

    /// Mint a fresh SSA name and record its type in one step
    pub fn make_typed_temporary(&mut self, suggested: &str, ty: MatlabType) -> String {
        let name = self.temporaries.make_temporary(suggested);
        self.types.insert(name.clone(), ty);
        name
    }

    pub fn temporaries(&self) -> &TemporaryAllocator {
        &self.temporaries
    }

    /// Number of recipe passes already applied to this function
    pub fn completed_passes(&self) -> usize {
        self.completed_passes
    }

    pub fn mark_pass_completed(&mut self) {
        self.completed_passes += 1;
    }

    /// Control-flow graph for the current body, computed on first use
    pub fn cfg(&mut self) -> &ControlFlowGraph {
        self.derived
            .cfg
            .get_or_insert_with(|| ControlFlowGraph::compute(&self.body))
    }

    /// Size-group information for the current body, computed on first use
    pub fn size_groups(&mut self) -> &SizeGroupInfo {
        self.derived
            .size_groups
            .get_or_insert_with(|| SizeGroupInfo::compute(&self.body, &self.types))
    }

    pub fn invalidate(&mut self, kinds: &[DerivedDataKind]) {
        for kind in kinds {
            match kind {
                DerivedDataKind::ControlFlowGraph => self.derived.cfg = None,
                DerivedDataKind::SizeGroups => self.derived.size_groups = None,
            }
        }
    }

    pub fn invalidate_all(&mut self) {
        self.invalidate(&DerivedDataKind::ALL);
    }

    /// Drop every cache whose kind is not in `preserved`
    pub fn invalidate_except(&mut self, preserved: &[DerivedDataKind]) {
        let stale: Vec<DerivedDataKind> = DerivedDataKind::ALL
            .iter()
            .copied()
            .filter(|kind| !preserved.contains(kind))
            .collect();
        self.invalidate(&stale);
    }
}

/// Binary builtins whose result has the size of their non-scalar operand
const ELEMENTWISE_BINARY: &[&str] = &[
    "plus", "minus", "times", "rdivide", "ldivide", "power", "lt", "le", "gt", "ge", "eq",
    "ne", "and", "or", "rem", "mod",
];

/// Unary builtins whose result has the size of their operand
const ELEMENTWISE_UNARY: &[&str] = &[
    "uminus", "uplus", "abs", "sqrt", "exp", "log", "floor", "ceil", "round", "sin", "cos",
    "tan", "not",
];

/// Partition of SSA names into groups statically known to share a size
///
/// The partition is conservative. Two names land in one group only when
/// some local rule guarantees equal sizes; names left apart may still be
/// equal at runtime.
#[derive(Debug, Clone)]
pub struct SizeGroupInfo {
    groups: FxHashMap<String, usize>,
}

impl SizeGroupInfo {
    pub fn compute(body: &FunctionBody, types: &FxHashMap<String, MatlabType>) -> Self {
        let mut names: Vec<String> = body.parameters().to_vec();
        for name in body.defined_names() {
            names.push(name.to_string());
        }
        names.sort();
        names.dedup();

        let index: FxHashMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        let mut parent: Vec<usize> = (0..names.len()).collect();

        fn find(parent: &mut Vec<usize>, mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }
        fn union(parent: &mut Vec<usize>, a: usize, b: usize) -> bool {
            let ra = find(parent, a);
            let rb = find(parent, b);
            if ra == rb {
                return false;
            }
            parent[ra.max(rb)] = ra.min(rb);
            true
        }

        let is_scalar = |name: &str| {
            types
                .get(name)
                .map(|ty| ty.is_scalar())
                .unwrap_or(false)
        };

        // Rules can cascade through phis, so iterate to a fixed point.
        let mut changed = true;
        while changed {
            changed = false;
            for (_, _, instruction) in body.all_instructions() {
                match instruction {
                    SsaInstruction::Phi { output, values, .. } => {
                        let roots: Vec<usize> = values
                            .iter()
                            .filter_map(|v| index.get(v.as_str()).copied())
                            .map(|i| find(&mut parent, i))
                            .collect();
                        if roots.len() == values.len()
                            && roots.windows(2).all(|w| w[0] == w[1])
                        {
                            if let (Some(&out), Some(&first)) =
                                (index.get(output.as_str()), roots.first())
                            {
                                changed |= union(&mut parent, out, first);
                            }
                        }
                    }
                    SsaInstruction::FunctionCall {
                        function,
                        outputs,
                        inputs,
                        ..
                    } if outputs.len() == 1 => {
                        let name = function.as_str();
                        if ELEMENTWISE_UNARY.contains(&name) && inputs.len() == 1 {
                            if let (Some(&out), Some(&arg)) = (
                                index.get(outputs[0].as_str()),
                                index.get(inputs[0].as_str()),
                            ) {
                                changed |= union(&mut parent, out, arg);
                            }
                        } else if ELEMENTWISE_BINARY.contains(&name) && inputs.len() == 2 {
                            let left = index.get(inputs[0].as_str()).copied();
                            let right = index.get(inputs[1].as_str()).copied();
                            let out = index.get(outputs[0].as_str()).copied();
                            let (Some(left), Some(right), Some(out)) = (left, right, out)
                            else {
                                continue;
                            };
                            if is_scalar(&inputs[0]) {
                                changed |= union(&mut parent, out, right);
                            } else if is_scalar(&inputs[1]) {
                                changed |= union(&mut parent, out, left);
                            } else if find(&mut parent, left) == find(&mut parent, right) {
                                changed |= union(&mut parent, out, left);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        let groups = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), find(&mut parent, i)))
            .collect();
        Self { groups }
    }

    /// True when the two names are statically known to have equal sizes
    pub fn same_size(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        match (self.groups.get(a), self.groups.get(b)) {
            (Some(ga), Some(gb)) => ga == gb,
            _ => false,
        }
    }
}
