//! Matlc - MATLAB middle-end pass driver
//!
//! # Usage
//!
//! ```bash
//! # Validate a recipe file against the pass registry
//! matlc check pipeline.recipe
//!
//! # Rewrite a recipe file into canonical form
//! matlc rewrite pipeline.recipe -o canonical.recipe
//!
//! # List the registered passes and their parameters
//! matlc passes
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use compiler::passes::PassRegistry;
use compiler::recipe::Recipe;

#[derive(Parser)]
#[command(name = "matlc")]
#[command(version = "0.1.0")]
#[command(about = "Matlc - MATLAB middle-end pass driver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a recipe file against the pass registry
    Check {
        /// Path to the recipe file
        file: PathBuf,

        /// List the parsed passes and their retained parameters
        #[arg(short, long)]
        verbose: bool,
    },

    /// Rewrite a recipe file into canonical form
    Rewrite {
        /// Path to the recipe file
        file: PathBuf,

        /// Output file path (prints to stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the registered passes and their parameters
    Passes,
}

fn main() {
    compiler::logging::init_from_env();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { file, verbose } => check_recipe(file, verbose),
        Commands::Rewrite { file, output } => rewrite_recipe(file, output),
        Commands::Passes => {
            list_passes();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_recipe(file: &PathBuf) -> Result<Recipe, String> {
    let text = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
    let registry = PassRegistry::standard();
    Recipe::parse(&text, &registry).map_err(|e| format!("{}: {}", file.display(), e))
}

fn check_recipe(file: PathBuf, verbose: bool) -> Result<(), String> {
    let recipe = load_recipe(&file)?;

    println!("✓ {} ({} passes)", file.display(), recipe.len());
    if verbose {
        for (index, entry) in recipe.entries().iter().enumerate() {
            if entry.params().is_empty() {
                println!("  {:2}: {}", index, entry.name());
            } else {
                let rendered: Vec<String> = entry
                    .params()
                    .iter()
                    .map(|(key, value)| format!("{}={}", key, value))
                    .collect();
                println!("  {:2}: {} ({})", index, entry.name(), rendered.join(", "));
            }
        }
    }
    Ok(())
}

fn rewrite_recipe(file: PathBuf, output: Option<PathBuf>) -> Result<(), String> {
    let recipe = load_recipe(&file)?;
    let canonical = recipe.write();

    match output {
        Some(path) => {
            std::fs::write(&path, canonical)
                .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
            println!("✓ {} -> {}", file.display(), path.display());
        }
        None => print!("{}", canonical),
    }
    Ok(())
}

fn list_passes() {
    let registry = PassRegistry::standard();

    println!("Registered passes:");
    for descriptor in registry.descriptors() {
        let names = descriptor.parameter_names();
        if names.is_empty() {
            println!("  {}", descriptor.name());
        } else {
            println!("  {}:", descriptor.name());
            for name in names {
                let kind = descriptor
                    .parameter_kind(&name)
                    .expect("declared parameter has a kind");
                println!("    {:<14} {}", name, kind);
            }
        }
    }
}
