//! Compilation Sessions
//!
//! A session drives one multi-function compilation: it owns the recipe,
//! pulls functions from a `UnitProvider` as they are discovered, and
//! applies the recipe's passes in lockstep across every function it knows.
//!
//! The master counter advances one pass at a time. Applying master pass
//! `n` means running recipe entry `n` over every known function, and a
//! pass may request further functions while it runs; the sweep repeats
//! until no new functions appear, so by the time the counter moves past
//! `n`, every function in the session has completed passes `0..=n`. A
//! function requested mid-flight is caught up to the master counter on
//! the spot, which keeps every inter-function observation consistent: no
//! pass ever sees a callee that is behind it.
//!
//! Sessions are single-threaded. Functions live in `Rc<RefCell<..>>` so a
//! pass holding its own function mutably can still read the others;
//! re-entrant requests for a function currently being transformed are
//! detected and returned unprocessed rather than deadlocking.

use crate::ir::{FunctionBody, MatlabType, SsaViolation, TypedInstance};
use crate::recipe::{Recipe, RecipeError};
use crate::units::{FunctionIdentity, UnitProvider};
use diagnostics::{Diagnostic, ReportSink};
use indexmap::IndexMap;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Fatal failure of a compilation session
#[derive(Debug)]
pub enum CompileError {
    /// The provider has no unit for a requested identity
    UnitNotFound { identity: FunctionIdentity },
    /// Strict SSA validation found violations
    Validation {
        function: FunctionIdentity,
        violations: Vec<SsaViolation>,
    },
    /// The recipe failed to load
    Recipe(RecipeError),
    /// A driver invariant broke
    Internal { detail: String },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UnitNotFound { identity } => {
                write!(f, "no compilation unit provides `{}`", identity)
            }
            CompileError::Validation {
                function,
                violations,
            } => write!(
                f,
                "SSA validation failed in `{}` with {} violation(s)",
                function,
                violations.len()
            ),
            CompileError::Recipe(error) => write!(f, "recipe error: {}", error),
            CompileError::Internal { detail } => write!(f, "internal error: {}", detail),
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::Recipe(error) => Some(error),
            _ => None,
        }
    }
}

impl From<RecipeError> for CompileError {
    fn from(error: RecipeError) -> Self {
        CompileError::Recipe(error)
    }
}

/// Final result for one function, in a form embedders can serialize
#[derive(Debug, Clone, Serialize)]
pub struct CompiledFunction {
    pub identity: FunctionIdentity,
    pub body: FunctionBody,
    pub types: BTreeMap<String, MatlabType>,
}

/// Drives the recipe over a growing set of functions
pub struct CompilationSession {
    recipe: Rc<Recipe>,
    provider: Box<dyn UnitProvider>,
    functions: RefCell<IndexMap<FunctionIdentity, Rc<RefCell<TypedInstance>>>>,
    num_applied_passes: Cell<usize>,
    /// Functions currently inside a pass application, innermost last
    in_progress: RefCell<Vec<FunctionIdentity>>,
    reporter: RefCell<Box<dyn ReportSink>>,
}

impl CompilationSession {
    pub fn new(
        recipe: Rc<Recipe>,
        provider: Box<dyn UnitProvider>,
        reporter: Box<dyn ReportSink>,
    ) -> Self {
        Self {
            recipe,
            provider,
            functions: RefCell::new(IndexMap::new()),
            num_applied_passes: Cell::new(0),
            in_progress: RefCell::new(Vec::new()),
            reporter: RefCell::new(reporter),
        }
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    /// Master passes applied so far
    pub fn num_applied_passes(&self) -> usize {
        self.num_applied_passes.get()
    }

    /// Identities known to the session, in discovery order
    pub fn functions(&self) -> Vec<FunctionIdentity> {
        self.functions.borrow().keys().cloned().collect()
    }

    pub fn instance(&self, identity: &FunctionIdentity) -> Option<Rc<RefCell<TypedInstance>>> {
        self.functions.borrow().get(identity).cloned()
    }

    /// Write a diagnostic to the session's report stream
    pub fn report(&self, diagnostic: Diagnostic) {
        self.reporter.borrow_mut().report(diagnostic);
    }

    /// Map a callee name at a call site to an identity, if the provider
    /// knows the name
    pub fn resolve(&self, caller: &FunctionIdentity, callee: &str) -> Option<FunctionIdentity> {
        self.provider.resolve(caller, callee)
    }

    fn load_instance(
        &self,
        identity: &FunctionIdentity,
    ) -> Result<Rc<RefCell<TypedInstance>>, CompileError> {
        let existing = self.functions.borrow().get(identity).cloned();
        if let Some(instance) = existing {
            return Ok(instance);
        }
        let unit = self
            .provider
            .load(identity)
            .ok_or_else(|| CompileError::UnitNotFound {
                identity: identity.clone(),
            })?;
        let instance = Rc::new(RefCell::new(TypedInstance::new(
            identity.clone(),
            unit.body,
            unit.types,
        )));
        self.functions
            .borrow_mut()
            .insert(identity.clone(), Rc::clone(&instance));
        log::debug!("loaded {}", identity);
        Ok(instance)
    }

    /// Pull a function into the session and catch it up to the master
    /// pass count. Requesting a function that is currently inside a pass
    /// application returns it as-is.
    pub fn request_instance(
        &self,
        identity: &FunctionIdentity,
    ) -> Result<Rc<RefCell<TypedInstance>>, CompileError> {
        let instance = self.load_instance(identity)?;
        if self.in_progress.borrow().contains(identity) {
            return Ok(instance);
        }
        self.catch_up(identity, &instance)?;
        Ok(instance)
    }

    fn catch_up(
        &self,
        identity: &FunctionIdentity,
        instance: &Rc<RefCell<TypedInstance>>,
    ) -> Result<(), CompileError> {
        loop {
            let completed = instance.borrow().completed_passes();
            if completed > self.num_applied_passes.get() || completed >= self.recipe.len() {
                return Ok(());
            }
            self.apply_pass(completed, identity, instance)?;
        }
    }

    fn apply_pass(
        &self,
        index: usize,
        identity: &FunctionIdentity,
        instance: &Rc<RefCell<TypedInstance>>,
    ) -> Result<(), CompileError> {
        let entry = self.recipe.entry(index);
        debug_assert_eq!(
            instance.borrow().completed_passes(),
            index,
            "pass applied out of order"
        );
        self.report(Diagnostic::trace(format!(
            "Applying pass {} `{}` to `{}`",
            index,
            entry.name(),
            identity
        )));
        log::trace!("applying pass {} `{}` to {}", index, entry.name(), identity);

        self.in_progress.borrow_mut().push(identity.clone());
        let result = {
            let mut borrowed = instance.borrow_mut();
            entry.pass().run(self, &mut borrowed)
        };
        self.in_progress.borrow_mut().pop();
        result?;

        let mut borrowed = instance.borrow_mut();
        borrowed.invalidate_except(entry.pass().preserved_data());
        borrowed.mark_pass_completed();
        Ok(())
    }

    /// Apply the next recipe entry across every known function, sweeping
    /// again whenever the sweep itself discovered new functions
    fn apply_one_more_master_pass(&self) -> Result<(), CompileError> {
        let index = self.num_applied_passes.get();
        debug_assert!(index < self.recipe.len(), "recipe already exhausted");
        loop {
            let snapshot: Vec<FunctionIdentity> = self.functions.borrow().keys().cloned().collect();
            for identity in &snapshot {
                let instance = self
                    .functions
                    .borrow()
                    .get(identity)
                    .cloned()
                    .ok_or_else(|| CompileError::Internal {
                        detail: format!("function `{}` disappeared mid-pass", identity),
                    })?;
                while instance.borrow().completed_passes() <= index {
                    let completed = instance.borrow().completed_passes();
                    self.apply_pass(completed, identity, &instance)?;
                }
            }
            let known = self.functions.borrow().len();
            if known == snapshot.len() {
                break;
            }
            log::debug!(
                "pass {} discovered new functions, sweeping again over {} units",
                index,
                known
            );
        }
        self.num_applied_passes.set(index + 1);
        Ok(())
    }

    /// Run the remaining master passes to completion
    pub fn apply_all(&self) -> Result<(), CompileError> {
        while self.num_applied_passes.get() < self.recipe.len() {
            self.apply_one_more_master_pass()?;
        }
        Ok(())
    }

    /// Compile everything reachable from `entry`
    pub fn run(&self, entry: &FunctionIdentity) -> Result<(), CompileError> {
        self.load_instance(entry)?;
        self.apply_all()
    }

    /// Consume the session, yielding every function in discovery order
    pub fn finish(self) -> Vec<CompiledFunction> {
        self.functions
            .into_inner()
            .into_iter()
            .map(|(identity, instance)| {
                let instance = Rc::try_unwrap(instance)
                    .expect("function instance retained outside the session")
                    .into_inner();
                let (identity_again, body, types) = instance.into_parts();
                debug_assert_eq!(identity, identity_again);
                CompiledFunction {
                    identity,
                    body,
                    types: types.into_iter().collect(),
                }
            })
            .collect()
    }
}

/// Session over an empty provider and a discarding reporter, enough for
/// running a pass against a hand-built instance
#[cfg(test)]
pub(crate) fn test_session() -> CompilationSession {
    let recipe = Recipe::parse(
        "!typed-ssa v2\n",
        &crate::passes::registry::PassRegistry::standard(),
    )
    .expect("empty recipe parses");
    CompilationSession::new(
        Rc::new(recipe),
        Box::new(crate::units::MemoryUnitProvider::new()),
        Box::new(diagnostics::NullReporter),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CallKind, Constant, SsaInstruction};
    use crate::passes::registry::PassRegistry;
    use crate::units::MemoryUnitProvider;
    use diagnostics::{CollectingReporter, DiagnosticSeverity, NullReporter};
    use fxhash::FxHashMap;

    fn unit_calling(callee: Option<&str>) -> (FunctionBody, FxHashMap<String, MatlabType>) {
        let mut body = FunctionBody::new(vec!["x".to_string()], vec!["y".to_string()]);
        let entry = body.entry_block();
        match callee {
            Some(callee) => {
                body.block_mut(entry)
                    .add_instruction(SsaInstruction::FunctionCall {
                        function: callee.to_string(),
                        kind: CallKind::Untyped,
                        outputs: vec!["y".to_string()],
                        inputs: vec!["x".to_string()],
                    });
            }
            None => {
                body.block_mut(entry)
                    .add_instruction(SsaInstruction::Assignment {
                        output: "y".to_string(),
                        value: Constant::Double(1.0),
                    });
            }
        }
        let mut types = FxHashMap::default();
        types.insert("x".to_string(), MatlabType::double());
        types.insert("y".to_string(), MatlabType::double());
        (body, types)
    }

    fn session_with(
        units: &[(&str, &str, Option<&str>)],
        recipe_text: &str,
    ) -> CompilationSession {
        let mut provider = MemoryUnitProvider::new();
        for (source, function, callee) in units {
            let (body, types) = unit_calling(*callee);
            provider.add_unit(FunctionIdentity::new(*source, *function), body, types);
        }
        let recipe = Recipe::parse(recipe_text, &PassRegistry::standard()).unwrap();
        CompilationSession::new(Rc::new(recipe), Box::new(provider), Box::new(NullReporter))
    }

    #[test]
    fn test_run_applies_every_pass_to_the_entry() {
        let session = session_with(
            &[("main.m", "main", None)],
            "!typed-ssa v2\nCallTypeResolutionPass\nValidateSsaPass\n",
        );
        let entry = FunctionIdentity::new("main.m", "main");
        session.run(&entry).unwrap();

        assert_eq!(session.num_applied_passes(), 2);
        let instance = session.instance(&entry).unwrap();
        assert_eq!(instance.borrow().completed_passes(), 2);
    }

    #[test]
    fn test_discovered_callees_are_caught_up() {
        let session = session_with(
            &[
                ("main.m", "main", Some("helper")),
                ("lib.m", "helper", None),
            ],
            "!typed-ssa v2\nCallTypeResolutionPass\nValidateSsaPass\n",
        );
        let entry = FunctionIdentity::new("main.m", "main");
        session.run(&entry).unwrap();

        let helper = FunctionIdentity::new("lib.m", "helper");
        assert_eq!(
            session.functions(),
            vec![entry.clone(), helper.clone()],
            "discovery order"
        );
        let helper_instance = session.instance(&helper).unwrap();
        assert_eq!(helper_instance.borrow().completed_passes(), 2);

        let main_instance = session.instance(&entry).unwrap();
        let main = main_instance.borrow();
        let call = &main.body().block(main.body().entry_block()).instructions()[0];
        assert!(
            matches!(call, SsaInstruction::FunctionCall { kind: CallKind::Typed(_), .. }),
            "call should resolve against the discovered helper"
        );
    }

    #[test]
    fn test_mutual_recursion_settles_over_two_applications() {
        let session = session_with(
            &[("a.m", "ping", Some("pong")), ("b.m", "pong", Some("ping"))],
            "!typed-ssa v2\nCallTypeResolutionPass\nCallTypeResolutionPass\n",
        );
        let ping = FunctionIdentity::new("a.m", "ping");
        session.run(&ping).unwrap();

        for identity in session.functions() {
            let instance = session.instance(&identity).unwrap();
            let instance = instance.borrow();
            assert_eq!(instance.completed_passes(), 2);
            let call = &instance.body().block(instance.body().entry_block()).instructions()[0];
            assert!(
                matches!(call, SsaInstruction::FunctionCall { kind: CallKind::Typed(_), .. }),
                "both directions should resolve after the second application"
            );
        }
    }

    #[test]
    fn test_missing_unit_is_fatal() {
        let session = session_with(&[], "!typed-ssa v2\nValidateSsaPass\n");
        let missing = FunctionIdentity::new("main.m", "main");
        let error = session.run(&missing).unwrap_err();
        assert!(matches!(
            &error,
            CompileError::UnitNotFound { identity } if *identity == missing
        ));
        assert_eq!(
            error.to_string(),
            "no compilation unit provides `main.m::main`"
        );
    }

    #[test]
    fn test_pass_applications_are_traced() {
        let reporter = Rc::new(RefCell::new(CollectingReporter::new()));
        let mut provider = MemoryUnitProvider::new();
        let (body, types) = unit_calling(None);
        provider.add_unit(FunctionIdentity::new("main.m", "main"), body, types);
        let recipe =
            Recipe::parse("!typed-ssa v2\nValidateSsaPass\n", &PassRegistry::standard()).unwrap();
        let session = CompilationSession::new(
            Rc::new(recipe),
            Box::new(provider),
            Box::new(Rc::clone(&reporter)),
        );
        session.run(&FunctionIdentity::new("main.m", "main")).unwrap();

        let collected = reporter.borrow();
        let trace: Vec<&str> = collected
            .diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Trace)
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(
            trace,
            vec!["Applying pass 0 `ValidateSsaPass` to `main.m::main`"]
        );
    }

    #[test]
    fn test_finish_decomposes_in_discovery_order() {
        let session = session_with(
            &[
                ("main.m", "main", Some("helper")),
                ("lib.m", "helper", None),
            ],
            "!typed-ssa v2\nCallTypeResolutionPass\n",
        );
        session.run(&FunctionIdentity::new("main.m", "main")).unwrap();

        let compiled = session.finish();
        assert_eq!(compiled.len(), 2);
        assert_eq!(compiled[0].identity, FunctionIdentity::new("main.m", "main"));
        assert_eq!(compiled[1].identity, FunctionIdentity::new("lib.m", "helper"));
        assert_eq!(compiled[0].types.get("x"), Some(&MatlabType::double()));
        assert!(serde_json::to_string(&compiled[0]).is_ok());
    }

    #[test]
    fn test_late_requests_catch_up_without_overrunning_the_recipe() {
        let session = session_with(
            &[("main.m", "main", None), ("lib.m", "late", None)],
            "!typed-ssa v2\nValidateSsaPass\n",
        );
        session.run(&FunctionIdentity::new("main.m", "main")).unwrap();

        let late = FunctionIdentity::new("lib.m", "late");
        let instance = session.request_instance(&late).unwrap();
        assert_eq!(instance.borrow().completed_passes(), 1);
        assert_eq!(session.num_applied_passes(), 1);
    }
}
