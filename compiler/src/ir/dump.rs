//! SSA Dump Utility
//!
//! Pretty-prints function bodies in a human-readable block-per-block form.
//! Useful when staring at what a rewrite actually did.

use super::cfg::ControlFlowGraph;
use super::functions::FunctionBody;
use super::instance::TypedInstance;
use super::types::MatlabType;
use fxhash::FxHashMap;
use std::fmt::Write;

/// How much detail a dump carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpFormat {
    /// Instructions only
    Compact,
    /// Instructions plus types and block predecessors
    Verbose,
}

/// Dump a bare body without type annotations
pub fn dump_body(body: &FunctionBody, format: DumpFormat) -> String {
    render(None, body, None, format)
}

/// Dump an instance, annotating types when the format asks for them
pub fn dump_instance(instance: &TypedInstance, format: DumpFormat) -> String {
    render(
        Some(&instance.identity().to_string()),
        instance.body(),
        Some(instance.types()),
        format,
    )
}

fn render(
    name: Option<&str>,
    body: &FunctionBody,
    types: Option<&FxHashMap<String, MatlabType>>,
    format: DumpFormat,
) -> String {
    let mut out = String::new();

    let _ = write!(out, "function");
    if let Some(name) = name {
        let _ = write!(out, " {}", name);
    }
    let _ = writeln!(
        out,
        "({}) -> ({})",
        body.parameters().join(", "),
        body.returns().join(", ")
    );

    if format == DumpFormat::Verbose {
        for directive in body.directives() {
            let _ = writeln!(out, "; skip {}", directive);
        }
    }

    let graph = match format {
        DumpFormat::Verbose => Some(ControlFlowGraph::compute(body)),
        DumpFormat::Compact => None,
    };

    for id in body.block_ids() {
        let _ = write!(out, "{}:", id);
        if let Some(graph) = &graph {
            let preds = graph.predecessors(id);
            if !preds.is_empty() {
                let names: Vec<String> = preds.iter().map(|p| p.to_string()).collect();
                let _ = write!(out, "  ; preds: {}", names.join(", "));
            }
        }
        let _ = writeln!(out);

        for instruction in body.block(id).instructions() {
            let _ = write!(out, "    {}", instruction);
            if format == DumpFormat::Verbose {
                if let Some(types) = types {
                    let outputs = instruction.outputs();
                    if outputs.len() == 1 {
                        if let Some(ty) = types.get(outputs[0]) {
                            let _ = write!(out, "  ; {}", ty);
                        }
                    }
                }
            }
            let _ = writeln!(out);
        }
    }

    out
}
