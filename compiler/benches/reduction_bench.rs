//! Benchmarks for reduction elimination and driver overhead

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::rc::Rc;

use compiler::ir::{
    CallKind, Constant, FunctionBody, MatlabType, Shape, SsaInstruction, TypedInstance,
};
use compiler::passes::{MinEliminationPass, Pass, PassRegistry, SumEliminationPass};
use compiler::recipe::Recipe;
use compiler::session::CompilationSession;
use compiler::units::{FunctionIdentity, MemoryUnitProvider};
use diagnostics::NullReporter;
use fxhash::FxHashMap;

fn untyped_call(function: &str, outputs: &[&str], inputs: &[&str]) -> SsaInstruction {
    SsaInstruction::FunctionCall {
        function: function.to_string(),
        kind: CallKind::Untyped,
        outputs: outputs.iter().map(|s| s.to_string()).collect(),
        inputs: inputs.iter().map(|s| s.to_string()).collect(),
    }
}

fn row_types(names: &[&str]) -> FxHashMap<String, MatlabType> {
    let mut types = FxHashMap::default();
    for name in names {
        types.insert(
            name.to_string(),
            MatlabType::double_matrix(Shape::row(None)),
        );
    }
    types
}

/// A dummy session for direct pass application
fn empty_session(recipe_text: &str) -> CompilationSession {
    let recipe = Rc::new(
        Recipe::parse(recipe_text, &PassRegistry::standard()).expect("bench recipe parses"),
    );
    CompilationSession::new(
        recipe,
        Box::new(MemoryUnitProvider::new()),
        Box::new(NullReporter),
    )
}

/// One `sum` call followed by `tail` unrelated instructions that the
/// rewrite has to detach and re-append
fn sum_with_tail(tail: usize) -> FunctionBody {
    let mut body = FunctionBody::new(vec!["v".to_string()], vec!["s".to_string()]);
    let entry = body.entry_block();
    body.block_mut(entry)
        .add_instruction(untyped_call("sum", &["s"], &["v"]));
    for i in 0..tail {
        body.block_mut(entry).add_instruction(SsaInstruction::Assignment {
            output: format!("t{}", i),
            value: Constant::Double(i as f64),
        });
    }
    body
}

fn benchmark_sum_elimination(c: &mut Criterion) {
    let session = empty_session("!typed-ssa v2\nSumEliminationPass\n");
    let identity = FunctionIdentity::new("bench.m", "reduce");

    let mut group = c.benchmark_group("sum_elimination_tail");
    for tail in [8usize, 64, 512] {
        let template = sum_with_tail(tail);
        group.bench_with_input(BenchmarkId::from_parameter(tail), &tail, |b, _| {
            b.iter(|| {
                let mut instance = TypedInstance::new(
                    identity.clone(),
                    template.clone(),
                    row_types(&["v"]),
                );
                SumEliminationPass
                    .run(&session, &mut instance)
                    .expect("elimination succeeds");
                black_box(&instance);
            });
        });
    }
    group.finish();
}

/// `min` over a cube of the given rank, reducing the first dimension.
/// Synthesis cost scales with the retained-dimension loop nest.
fn min_of_rank(rank: usize) -> (FunctionBody, FxHashMap<String, MatlabType>) {
    let mut body = FunctionBody::new(
        vec!["in".to_string(), "e".to_string()],
        vec!["m".to_string()],
    );
    let entry = body.entry_block();
    body.block_mut(entry).add_instruction(SsaInstruction::Assignment {
        output: "$d$1".to_string(),
        value: Constant::Int(1),
    });
    body.block_mut(entry)
        .add_instruction(untyped_call("min", &["m"], &["in", "e", "$d$1"]));

    let dims = vec![4usize; rank];
    let mut types = FxHashMap::default();
    types.insert(
        "in".to_string(),
        MatlabType::double_matrix(Shape::known(&dims)),
    );
    types.insert("e".to_string(), MatlabType::double_matrix(Shape::empty()));
    (body, types)
}

fn benchmark_min_elimination(c: &mut Criterion) {
    let session = empty_session("!typed-ssa v2\nMinEliminationPass\n");
    let identity = FunctionIdentity::new("bench.m", "reduce_min");

    let mut group = c.benchmark_group("min_elimination_rank");
    for rank in [2usize, 3, 4] {
        let (template, types) = min_of_rank(rank);
        group.bench_with_input(BenchmarkId::from_parameter(rank), &rank, |b, _| {
            b.iter(|| {
                let mut instance =
                    TypedInstance::new(identity.clone(), template.clone(), types.clone());
                MinEliminationPass
                    .run(&session, &mut instance)
                    .expect("elimination succeeds");
                black_box(&instance);
            });
        });
    }
    group.finish();
}

fn benchmark_full_recipe(c: &mut Criterion) {
    let registry = PassRegistry::standard();
    let recipe = Rc::new(
        Recipe::parse(
            "!typed-ssa v2\n\
             SumEliminationPass\n\
             MeanEliminationPass\n\
             DotEliminationPass\n\
             CumulativeReductionEliminationPass\n\
             ValidateSsaPass\n",
            &registry,
        )
        .expect("bench recipe parses"),
    );

    let mut body = FunctionBody::new(
        vec!["v".to_string(), "w".to_string()],
        vec![
            "s".to_string(),
            "m".to_string(),
            "d".to_string(),
            "c".to_string(),
        ],
    );
    let entry = body.entry_block();
    body.block_mut(entry).add_instruction(untyped_call("sum", &["s"], &["v"]));
    body.block_mut(entry).add_instruction(untyped_call("mean", &["m"], &["v"]));
    body.block_mut(entry).add_instruction(untyped_call("dot", &["d"], &["v", "w"]));
    body.block_mut(entry).add_instruction(untyped_call("cumsum", &["c"], &["v"]));
    let main = FunctionIdentity::new("bench.m", "main");

    c.bench_function("full_reduction_recipe", |b| {
        b.iter(|| {
            let mut provider = MemoryUnitProvider::new();
            provider.add_unit(main.clone(), body.clone(), row_types(&["v", "w"]));
            let session = CompilationSession::new(
                Rc::clone(&recipe),
                Box::new(provider),
                Box::new(NullReporter),
            );
            session.run(&main).expect("compilation succeeds");
            black_box(session.finish());
        });
    });
}

criterion_group!(
    benches,
    benchmark_sum_elimination,
    benchmark_min_elimination,
    benchmark_full_recipe
);

criterion_main!(benches);
