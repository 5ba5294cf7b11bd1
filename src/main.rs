use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use csdl_link::config::{get_config_path, load_config, save_config, LinkerConfig};
use csdl_link::errors::{LinkerError, Result};
use csdl_link::types::ParserOutput;
use csdl_link::{AnnotationLinker, ConvertedModel};

/// Annotation linking for OData CSDL metadata.
#[derive(Parser)]
#[command(name = "csdl-link", about = "Annotation linking for OData CSDL metadata")]
struct Cli {
    /// Log linking progress at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Link a parsed metadata document and print a summary
    Link {
        /// Parser output (JSON)
        input: PathBuf,
        /// Configuration file (JSON or TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Show what a path denotes relative to an element
    Resolve {
        /// Parser output (JSON)
        input: PathBuf,
        /// Fully qualified name of the starting element
        #[arg(short, long)]
        from: String,
        /// Relative path to resolve
        path: String,
        /// Configuration file (JSON or TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Write a default configuration file
    InitConfig {
        /// Target file (default: ./csdl-link.json)
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Link {
            input,
            config,
            json,
        } => {
            let model = link_file(&input, config.as_deref())?;
            let report = model.report();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Linked {}", input.display());
                println!("  Objects:     {}", report.object_count);
                println!("  Annotations: {}", report.annotation_count);
                println!("  Records:     {}", report.record_count);
                println!(
                    "  References:  {} ({} resolved)",
                    report.reference_count, report.resolved_reference_count
                );
                println!("  Time:        {}ms", report.duration_ms);
                if !report.objects_by_kind.is_empty() {
                    println!("\n  Objects by kind:");
                    for (kind, count) in &report.objects_by_kind {
                        println!("    {}: {}", kind, count);
                    }
                }
                if !report.unresolved_targets.is_empty() {
                    println!("\n  Unresolved annotation targets:");
                    for target in &report.unresolved_targets {
                        println!("    {}", target);
                    }
                }
                if !report.unresolved_references.is_empty() {
                    println!("\n  Unresolved references:");
                    for key in &report.unresolved_references {
                        println!("    {}", key);
                    }
                }
            }
        }
        Commands::Resolve {
            input,
            from,
            path,
            config,
        } => {
            let model = link_file(&input, config.as_deref())?;
            match model.resolve_from(&from, &path) {
                Some(target) => println!(
                    "{} ({})",
                    model.fqn_of(target).unwrap_or("<anonymous>"),
                    target.kind().as_str()
                ),
                None => println!("'{}' does not resolve from '{}'", path, from),
            }
        }
        Commands::InitConfig { path, force } => {
            let path = path.unwrap_or_else(|| get_config_path(&current_dir()));
            if path.exists() && !force {
                return Err(LinkerError::Config {
                    message: format!(
                        "'{}' already exists; pass --force to overwrite",
                        path.display()
                    ),
                });
            }
            save_config(&path, &LinkerConfig::default())?;
            println!("Wrote default configuration to {}", path.display());
        }
    }
    Ok(())
}

/// Reads parser output from `input` and links it.
///
/// Without an explicit config, a `csdl-link.json` next to the input is used
/// when present.
fn link_file(input: &Path, config: Option<&Path>) -> Result<ConvertedModel> {
    let config_path = match config {
        Some(p) => p.to_path_buf(),
        None => get_config_path(input.parent().unwrap_or_else(|| Path::new("."))),
    };
    let config = load_config(&config_path)?;
    let contents = fs::read_to_string(input)?;
    let output: ParserOutput = serde_json::from_str(&contents)?;
    AnnotationLinker::new(config).convert_types(output)
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
