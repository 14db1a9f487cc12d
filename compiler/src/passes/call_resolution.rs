//! Call Type Resolution
//!
//! Binds untyped call sites to the signatures of the functions they name.
//! Callee names go through the session's unit provider, so builtins (which
//! the provider does not know) stay untyped for the eliminations to match
//! on. Requesting a callee pulls it into the session and catches it up to
//! the master pass count, which is how compilation spreads from the entry
//! function to everything reachable.
//!
//! A callee that is itself mid-catch-up cannot be inspected this round;
//! the call site stays untyped and a later application picks it up once
//! the callee has settled.

use super::{Pass, PassResult};
use crate::ir::{CallKind, DerivedDataKind, FunctionType, SsaBlockId, SsaInstruction, TypedInstance};
use crate::session::CompilationSession;

/// Resolves untyped call sites against the session's unit provider
pub struct CallTypeResolutionPass;

impl CallTypeResolutionPass {
    pub const NAME: &'static str = "CallTypeResolutionPass";
}

struct CallSite {
    block: SsaBlockId,
    position: usize,
    function: String,
    outputs: Vec<String>,
    input_count: usize,
}

/// The callee's signature, when every parameter and return type is known
fn signature_of(instance: &TypedInstance) -> Option<FunctionType> {
    let body = instance.body();
    let inputs = body
        .parameters()
        .iter()
        .map(|name| instance.variable_type(name).cloned())
        .collect::<Option<Vec<_>>>()?;
    let outputs = body
        .returns()
        .iter()
        .map(|name| instance.variable_type(name).cloned())
        .collect::<Option<Vec<_>>>()?;
    Some(FunctionType::new(inputs, outputs))
}

impl Pass for CallTypeResolutionPass {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn preserved_data(&self) -> &[DerivedDataKind] {
        // Only instruction payloads change, never the block structure.
        &[DerivedDataKind::ControlFlowGraph]
    }

    fn run(&self, session: &CompilationSession, instance: &mut TypedInstance) -> PassResult {
        if instance.body().skips_pass(Self::NAME) {
            log::debug!("{} skipped by directive in {}", Self::NAME, instance.identity());
            return Ok(());
        }

        let sites: Vec<CallSite> = instance
            .body()
            .all_instructions()
            .filter_map(|(block, position, instruction)| match instruction {
                SsaInstruction::FunctionCall {
                    function,
                    kind: CallKind::Untyped,
                    outputs,
                    inputs,
                } => Some(CallSite {
                    block,
                    position,
                    function: function.clone(),
                    outputs: outputs.clone(),
                    input_count: inputs.len(),
                }),
                _ => None,
            })
            .collect();

        for site in sites {
            let Some(callee) = session.resolve(instance.identity(), &site.function) else {
                continue;
            };
            let signature = if callee == *instance.identity() {
                signature_of(instance)
            } else {
                let shared = session.request_instance(&callee)?;
                let Ok(callee_instance) = shared.try_borrow() else {
                    continue;
                };
                signature_of(&callee_instance)
            };
            let Some(signature) = signature else {
                continue;
            };
            if site.input_count != signature.inputs.len()
                || site.outputs.len() > signature.outputs.len()
            {
                continue;
            }

            log::trace!(
                "{}: call to {} in {} resolved as {}",
                Self::NAME,
                callee,
                instance.identity(),
                signature
            );
            for (name, ty) in site.outputs.iter().zip(signature.outputs.iter()) {
                if instance.variable_type(name).is_none() {
                    instance.register_type(name.clone(), ty.clone());
                }
            }
            if let Some(SsaInstruction::FunctionCall { kind, .. }) = instance
                .body_mut()
                .block_mut(site.block)
                .instruction_mut(site.position)
            {
                *kind = CallKind::Typed(signature);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBody, MatlabType, Shape};
    use crate::recipe::Recipe;
    use crate::session::CompilationSession;
    use crate::units::{FunctionIdentity, MemoryUnitProvider};
    use diagnostics::NullReporter;
    use fxhash::FxHashMap;
    use std::rc::Rc;

    fn helper_unit() -> (FunctionBody, FxHashMap<String, MatlabType>) {
        let body = FunctionBody::new(vec!["x".to_string()], vec!["y".to_string()]);
        let mut types = FxHashMap::default();
        types.insert("x".to_string(), MatlabType::double());
        types.insert(
            "y".to_string(),
            MatlabType::double_matrix(Shape::known(&[1, 3])),
        );
        (body, types)
    }

    fn caller_body(callee: &str) -> FunctionBody {
        let mut body = FunctionBody::new(vec!["a".to_string()], vec!["out".to_string()]);
        let entry = body.entry_block();
        body.block_mut(entry)
            .add_instruction(SsaInstruction::FunctionCall {
                function: callee.to_string(),
                kind: CallKind::Untyped,
                outputs: vec!["out".to_string()],
                inputs: vec!["a".to_string()],
            });
        body
    }

    fn resolution_session(provider: MemoryUnitProvider) -> CompilationSession {
        let recipe = Recipe::parse(
            "!typed-ssa v2\nCallTypeResolutionPass\n",
            &crate::passes::PassRegistry::standard(),
        )
        .unwrap();
        CompilationSession::new(Rc::new(recipe), Box::new(provider), Box::new(NullReporter))
    }

    #[test]
    fn test_resolution_types_the_call_and_its_outputs() {
        let mut provider = MemoryUnitProvider::new();
        let (body, types) = helper_unit();
        provider.add_unit(FunctionIdentity::new("lib.m", "helper"), body, types);
        let session = resolution_session(provider);

        let mut caller = TypedInstance::new(
            FunctionIdentity::new("main.m", "main"),
            caller_body("helper"),
            FxHashMap::default(),
        );
        CallTypeResolutionPass.run(&session, &mut caller).unwrap();

        let entry = caller.body().entry_block();
        let SsaInstruction::FunctionCall { kind, .. } =
            &caller.body().block(entry).instructions()[0]
        else {
            panic!("call disappeared");
        };
        assert!(matches!(kind, CallKind::Typed(_)));
        assert_eq!(
            caller.variable_type("out"),
            Some(&MatlabType::double_matrix(Shape::known(&[1, 3])))
        );
    }

    #[test]
    fn test_builtins_stay_untyped() {
        let session = resolution_session(MemoryUnitProvider::new());
        let mut caller = TypedInstance::new(
            FunctionIdentity::new("main.m", "main"),
            caller_body("numel"),
            FxHashMap::default(),
        );
        CallTypeResolutionPass.run(&session, &mut caller).unwrap();

        let entry = caller.body().entry_block();
        let SsaInstruction::FunctionCall { kind, .. } =
            &caller.body().block(entry).instructions()[0]
        else {
            panic!("call disappeared");
        };
        assert!(matches!(kind, CallKind::Untyped));
    }

    #[test]
    fn test_incomplete_callee_types_defer_resolution() {
        let mut provider = MemoryUnitProvider::new();
        let (body, mut types) = helper_unit();
        types.remove("y");
        provider.add_unit(FunctionIdentity::new("lib.m", "helper"), body, types);
        let session = resolution_session(provider);

        let mut caller = TypedInstance::new(
            FunctionIdentity::new("main.m", "main"),
            caller_body("helper"),
            FxHashMap::default(),
        );
        CallTypeResolutionPass.run(&session, &mut caller).unwrap();

        let entry = caller.body().entry_block();
        let SsaInstruction::FunctionCall { kind, .. } =
            &caller.body().block(entry).instructions()[0]
        else {
            panic!("call disappeared");
        };
        assert!(matches!(kind, CallKind::Untyped));
    }

    #[test]
    fn test_self_recursion_resolves_from_the_local_body() {
        let mut provider = MemoryUnitProvider::new();
        let mut types = FxHashMap::default();
        types.insert("a".to_string(), MatlabType::double());
        types.insert("out".to_string(), MatlabType::double());
        provider.add_unit(
            FunctionIdentity::new("main.m", "main"),
            caller_body("main"),
            types.clone(),
        );
        let session = resolution_session(provider);

        let mut caller = TypedInstance::new(
            FunctionIdentity::new("main.m", "main"),
            caller_body("main"),
            types,
        );
        CallTypeResolutionPass.run(&session, &mut caller).unwrap();

        let entry = caller.body().entry_block();
        let SsaInstruction::FunctionCall { kind, .. } =
            &caller.body().block(entry).instructions()[0]
        else {
            panic!("call disappeared");
        };
        let CallKind::Typed(signature) = kind else {
            panic!("self call left untyped");
        };
        assert_eq!(signature.inputs, vec![MatlabType::double()]);
        assert_eq!(signature.outputs, vec![MatlabType::double()]);
    }

    #[test]
    fn test_arity_mismatch_is_left_alone() {
        let mut provider = MemoryUnitProvider::new();
        let body = FunctionBody::new(
            vec!["x".to_string(), "w".to_string()],
            vec!["y".to_string()],
        );
        let mut types = FxHashMap::default();
        types.insert("x".to_string(), MatlabType::double());
        types.insert("w".to_string(), MatlabType::double());
        types.insert("y".to_string(), MatlabType::double());
        provider.add_unit(FunctionIdentity::new("lib.m", "helper"), body, types);
        let session = resolution_session(provider);

        let mut caller = TypedInstance::new(
            FunctionIdentity::new("main.m", "main"),
            caller_body("helper"),
            FxHashMap::default(),
        );
        CallTypeResolutionPass.run(&session, &mut caller).unwrap();

        let entry = caller.body().entry_block();
        let SsaInstruction::FunctionCall { kind, .. } =
            &caller.body().block(entry).instructions()[0]
        else {
            panic!("call disappeared");
        };
        assert!(matches!(kind, CallKind::Untyped));
    }
}
