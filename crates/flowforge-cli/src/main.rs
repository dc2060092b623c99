//! Command-line front end: a thin `clap` wrapper over
//! `flowforge_core::analyze_from_json` (spec.md §6 "CLI surface").

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;

#[derive(Parser)]
#[command(name = "flowforge", about = "Factory supply-chain analyzer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a save file and print its issue list as JSON.
    Analyze {
        /// Path to the parsed save JSON (machines, conduits, connections).
        save_file: PathBuf,
        /// Path to the recipe database JSON.
        #[arg(long, default_value = "recipes.json")]
        recipes: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Analyze { save_file, recipes } => run_analyze(&save_file, &recipes),
    }
}

fn run_analyze(save_file: &PathBuf, recipes_file: &PathBuf) -> ExitCode {
    let factory_json = match std::fs::read_to_string(save_file) {
        Ok(s) => s,
        Err(e) => {
            error!(path = %save_file.display(), error = %e, "failed to read save file");
            return ExitCode::FAILURE;
        }
    };
    let recipe_json = match std::fs::read_to_string(recipes_file) {
        Ok(s) => s,
        Err(e) => {
            error!(path = %recipes_file.display(), error = %e, "failed to read recipe database");
            return ExitCode::FAILURE;
        }
    };

    let snapshot = match flowforge_core::analyze_from_json(&factory_json, &recipe_json) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "analysis failed");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&snapshot.issues) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "failed to serialize issue list");
            ExitCode::FAILURE
        }
    }
}
