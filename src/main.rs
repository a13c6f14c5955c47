//! Pipeline Creator - command line entry point
//!
//! `pipeline-creator describe <unit.rhai>` loads a generated unit into an
//! empty host and prints its metadata and the arities of its run function.

use anyhow::Context;
use clap::{Parser, Subcommand};
use pipeline_creator::{config::GeneratorConfig, PipelineHost, Registry};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the metadata of a generated unit
    Describe { path: PathBuf },
}

fn describe(path: PathBuf) -> anyhow::Result<()> {
    let config = GeneratorConfig::default_path()
        .map(GeneratorConfig::load_or_default)
        .unwrap_or_default();

    let mut host = PipelineHost::new(Registry::new());
    host.set_run_function(config.run_function_name.clone());
    let unit = host
        .load_file(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let info = unit
        .module_info()
        .with_context(|| format!("{} has no usable module_info()", path.display()))?;

    println!("{}", info.title);
    println!("  categories:    {}", info.categories.join(", "));
    println!("  dependencies:  {}", info.dependencies.join(", "));
    println!("  contributors:  {}", info.contributors.join(", "));
    if let Some(icon) = &info.icon {
        println!("  icon:          {}", icon);
    }
    let arities: Vec<String> = unit.run_arities().iter().map(ToString::to_string).collect();
    println!("  {} arities:    {}", config.run_function_name, arities.join(", "));
    println!();
    println!("{}", info.help_text);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,pipeline_creator=debug")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Describe { path } => describe(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_describe() {
        let args = Args::try_parse_from(["pipeline-creator", "describe", "units/Doubler.rhai"]).unwrap();
        let Commands::Describe { path } = args.command;
        assert_eq!(path, PathBuf::from("units/Doubler.rhai"));
    }

    #[test]
    fn test_describe_requires_path() {
        assert!(Args::try_parse_from(["pipeline-creator", "describe"]).is_err());
        assert!(Args::try_parse_from(["pipeline-creator", "run", "x"]).is_err());
    }
}
