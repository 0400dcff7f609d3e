//! dataevents CLI - dispatch events over YAML documents

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

use dataevents::{DataEventError, Engine, FixSuggestion, MemoryDocument, NodeId, Options};

#[derive(Parser)]
#[command(name = "dataevents")]
#[command(about = "Recompute attribute bindings of a YAML document from named events")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch an event with a value
    Trigger {
        #[command(flatten)]
        target: Target,

        /// Event name
        event: String,

        /// Value (parsed as JSON when possible, otherwise taken as text)
        value: String,
    },

    /// Dispatch an event without a value (advance each binding)
    Cycle {
        #[command(flatten)]
        target: Target,

        /// Event name
        event: String,
    },

    /// Resolve every binding without dispatching
    Check {
        /// Path to the document YAML file
        file: PathBuf,

        /// Options file (.yaml, .yml or .toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct Target {
    /// Path to the document YAML file
    file: PathBuf,

    /// Options file (.yaml, .yml or .toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Record and print the trace log (JSON on stderr)
    #[arg(short, long)]
    debug: bool,

    /// Write the updated document back to the file instead of stdout
    #[arg(short, long)]
    in_place: bool,
}

fn main() {
    let cli = Cli::parse();

    let debug = matches!(
        &cli.command,
        Commands::Trigger { target, .. } | Commands::Cycle { target, .. } if target.debug
    );
    let level = if debug { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    let result = match cli.command {
        Commands::Trigger { target, event, value } => dispatch(&target, &event, Some(parse_value(&value))),
        Commands::Cycle { target, event } => dispatch(&target, &event, None),
        Commands::Check { file, config } => check(&file, config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn load(file: &Path, config: Option<&Path>) -> Result<(MemoryDocument, NodeId, Options), DataEventError> {
    let yaml = fs::read_to_string(file)?;
    let (doc, root) = MemoryDocument::from_yaml(&yaml)?;
    let options = match config {
        Some(path) => Options::load(path)?,
        None => Options::default(),
    };
    Ok((doc, root, options))
}

fn dispatch(target: &Target, event: &str, value: Option<Value>) -> Result<(), DataEventError> {
    let (doc, root, options) = load(&target.file, target.config.as_deref())?;
    let engine = Engine::new(options.with_debug(target.debug))?;

    let result = match value {
        Some(value) => engine.trigger_event(&doc, root, event, value),
        None => engine.advance_cycle(&doc, root, event),
    };

    if target.debug {
        let trace = serde_json::to_string_pretty(&engine.trace().to_json()).unwrap_or_default();
        eprintln!("{}", trace);
    }
    result?;

    let output = doc.to_yaml(root)?;
    if target.in_place {
        fs::write(&target.file, output)?;
        println!("{} Updated '{}'", "✓".green(), target.file.display());
    } else {
        print!("{}", output);
    }
    Ok(())
}

fn check(file: &Path, config: Option<&Path>) -> Result<(), DataEventError> {
    let (doc, root, options) = load(file, config)?;
    let engine = Engine::new(options)?;
    let resolved = engine.resolve(&doc, root)?;

    let roots = engine.dispatch_roots(&doc, root).len();
    let bindings: usize = resolved.iter().map(|n| n.bindings.len()).sum();
    println!("{} Document '{}' is valid", "✓".green(), file.display());
    println!("  Roots: {}", roots);
    println!("  Bound nodes: {}", resolved.len());
    println!("  Bindings: {}", bindings);

    for node in &resolved {
        for slot in &node.bindings {
            let events: Vec<&str> = slot.binding.events.iter().collect();
            let via = if slot.hops > 0 {
                format!(" (via {} after {} hop(s))", slot.source, slot.hops)
            } else {
                String::new()
            };
            println!(
                "  {} {} ← [{}] {}{}",
                node.node.to_string().cyan(),
                slot.key.bold(),
                events.join(", "),
                slot.binding.handler.kind(),
                via
            );
        }
    }
    Ok(())
}

/// JSON when it parses, otherwise the raw text
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
