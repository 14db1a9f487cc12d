//! Compilation Units
//!
//! The driver does not scan directories or parse source itself; it asks a
//! `UnitProvider` for functions by identity. Providers front whatever the
//! embedder has: a directory of lowered files, an in-memory project, a
//! test fixture.

use crate::ir::{FunctionBody, MatlabType};
use fxhash::FxHashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of one function: the unit it lives in plus its name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionIdentity {
    source: String,
    function: String,
}

impl FunctionIdentity {
    pub fn new(source: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            function: function.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn function(&self) -> &str {
        &self.function
    }
}

impl fmt::Display for FunctionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.source, self.function)
    }
}

/// A function as delivered by the frontend: lowered body plus whatever
/// types lowering already knew
#[derive(Debug, Clone)]
pub struct LoadedUnit {
    pub body: FunctionBody,
    pub types: FxHashMap<String, MatlabType>,
}

/// Source of compilation units, queried on demand
pub trait UnitProvider {
    /// Map a bare callee name at some call site to a function identity.
    /// Returns None for names the provider does not know, builtins
    /// included.
    fn resolve(&self, caller: &FunctionIdentity, callee: &str) -> Option<FunctionIdentity>;

    /// Deliver the unit for an identity, if the provider has it
    fn load(&self, identity: &FunctionIdentity) -> Option<LoadedUnit>;
}

/// Provider backed by a map, used by tests and by embedders that already
/// hold everything in memory
#[derive(Debug, Default)]
pub struct MemoryUnitProvider {
    units: IndexMap<FunctionIdentity, LoadedUnit>,
}

impl MemoryUnitProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_unit(
        &mut self,
        identity: FunctionIdentity,
        body: FunctionBody,
        types: FxHashMap<String, MatlabType>,
    ) {
        self.units.insert(identity, LoadedUnit { body, types });
    }

    pub fn identities(&self) -> impl Iterator<Item = &FunctionIdentity> {
        self.units.keys()
    }
}

impl UnitProvider for MemoryUnitProvider {
    fn resolve(&self, caller: &FunctionIdentity, callee: &str) -> Option<FunctionIdentity> {
        // A function in the caller's own unit shadows one elsewhere.
        let local = self
            .units
            .keys()
            .find(|id| id.source() == caller.source() && id.function() == callee);
        local
            .or_else(|| self.units.keys().find(|id| id.function() == callee))
            .cloned()
    }

    fn load(&self, identity: &FunctionIdentity) -> Option<LoadedUnit> {
        self.units.get(identity).cloned()
    }
}
