//! Pass Registry
//!
//! Static table of every pass a recipe may name. Each entry carries the
//! parameter schema the recipe loader validates against and a factory that
//! builds the pass from parsed values. Factories treat `<null>` and
//! `<empty>` parameters as absent and fall back to the pass defaults.

use super::call_resolution::CallTypeResolutionPass;
use super::cumulative::CumulativeReductionEliminationPass;
use super::min_reduction::MinEliminationPass;
use super::reductions::{DotEliminationPass, MeanEliminationPass, SumEliminationPass};
use super::utility::{DumpSsaPass, ValidateSsaPass};
use super::Pass;
use crate::ir::DumpFormat;
use crate::recipe::ParamMap;
use std::fmt;

/// Kind of value a pass parameter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Int,
    Bool,
    Str,
    Class,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Int => write!(f, "an integer"),
            ParamKind::Bool => write!(f, "a boolean"),
            ParamKind::Str => write!(f, "a string"),
            ParamKind::Class => write!(f, "a class reference"),
        }
    }
}

type PassFactory = fn(&ParamMap) -> Result<Box<dyn Pass>, String>;

/// Schema and constructor for one registered pass
pub struct PassDescriptor {
    name: &'static str,
    parameters: &'static [(&'static str, ParamKind)],
    factory: PassFactory,
}

impl PassDescriptor {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parameter_kind(&self, key: &str) -> Option<ParamKind> {
        self.parameters
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, kind)| *kind)
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters
            .iter()
            .map(|(name, _)| name.to_string())
            .collect()
    }

    pub fn construct(&self, params: &ParamMap) -> Result<Box<dyn Pass>, String> {
        (self.factory)(params)
    }
}

impl fmt::Debug for PassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassDescriptor")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// The set of passes recipes may reference
#[derive(Debug)]
pub struct PassRegistry {
    descriptors: Vec<PassDescriptor>,
}

impl PassRegistry {
    /// Registry holding every pass this crate ships
    pub fn standard() -> Self {
        Self {
            descriptors: vec![
                PassDescriptor {
                    name: CallTypeResolutionPass::NAME,
                    parameters: &[],
                    factory: |_| Ok(Box::new(CallTypeResolutionPass)),
                },
                PassDescriptor {
                    name: SumEliminationPass::NAME,
                    parameters: &[],
                    factory: |_| Ok(Box::new(SumEliminationPass)),
                },
                PassDescriptor {
                    name: MeanEliminationPass::NAME,
                    parameters: &[],
                    factory: |_| Ok(Box::new(MeanEliminationPass)),
                },
                PassDescriptor {
                    name: DotEliminationPass::NAME,
                    parameters: &[],
                    factory: |_| Ok(Box::new(DotEliminationPass)),
                },
                PassDescriptor {
                    name: MinEliminationPass::NAME,
                    parameters: &[],
                    factory: |_| Ok(Box::new(MinEliminationPass)),
                },
                PassDescriptor {
                    name: CumulativeReductionEliminationPass::NAME,
                    parameters: &[],
                    factory: |_| Ok(Box::new(CumulativeReductionEliminationPass)),
                },
                PassDescriptor {
                    name: ValidateSsaPass::NAME,
                    parameters: &[("strict", ParamKind::Bool), ("max_reported", ParamKind::Int)],
                    factory: |params| {
                        let strict = params
                            .get("strict")
                            .and_then(|value| value.as_bool())
                            .unwrap_or(true);
                        // A negative limit means unlimited.
                        let max_reported = match params
                            .get("max_reported")
                            .and_then(|value| value.as_int())
                        {
                            Some(limit) if limit < 0 => usize::MAX,
                            Some(limit) => limit as usize,
                            None => 16,
                        };
                        Ok(Box::new(ValidateSsaPass::new(strict, max_reported)))
                    },
                },
                PassDescriptor {
                    name: DumpSsaPass::NAME,
                    parameters: &[("label", ParamKind::Str), ("format", ParamKind::Class)],
                    factory: |params| {
                        let label = params
                            .get("label")
                            .and_then(|value| value.as_str())
                            .unwrap_or("ssa");
                        let format = match params.get("format").and_then(|value| value.as_class())
                        {
                            None => DumpFormat::Compact,
                            Some("CompactFormat") => DumpFormat::Compact,
                            Some("VerboseFormat") => DumpFormat::Verbose,
                            Some(other) => {
                                return Err(format!("unknown dump format class `{}`", other))
                            }
                        };
                        Ok(Box::new(DumpSsaPass::new(label, format)))
                    },
                },
            ],
        }
    }

    pub fn descriptor(&self, name: &str) -> Option<&PassDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &PassDescriptor> {
        self.descriptors.iter()
    }
}
