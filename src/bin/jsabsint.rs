//! CLI front end for the analyzer
//!
//! Usage: jsabsint [--config <file.json>] <ast.json>
//!
//! Reads an ESTree JSON document (as produced by esprima or acorn), analyzes
//! it and prints the report as JSON on stdout. On failure the structured
//! error `{kind, message, sourceLocation?}` is printed instead and the exit
//! status is 1.
//!
//! Logging goes to stderr and is only enabled when `JSABSINT_LOG` or
//! `RUST_LOG` is set.

use std::env;
use std::fs;
use std::path::PathBuf;

use jsabsint::{AnalysisError, Analyzer, AnalyzerConfig};
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Build a filter from `JSABSINT_LOG`, falling back to `RUST_LOG`
fn init_tracing() {
    let filter = if let Ok(val) = env::var("JSABSINT_LOG") {
        EnvFilter::builder().parse_lossy(val)
    } else if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        return;
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// CLI configuration
struct Options {
    input: PathBuf,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();
    let program_name = args.first().map_or("jsabsint", |s| s.as_str());

    let mut config: Option<PathBuf> = None;
    let mut input: Option<&str> = None;

    let mut i = 1;
    while i < args.len() {
        let Some(arg) = args.get(i) else {
            break;
        };
        if arg == "--config" {
            i += 1;
            config = Some(PathBuf::from(
                args.get(i)
                    .ok_or_else(|| "--config requires a file".to_string())?,
            ));
        } else if arg.starts_with('-') {
            return Err(format!("Unknown option: {}", arg));
        } else {
            input = Some(arg);
        }
        i += 1;
    }

    let input = input.ok_or_else(|| {
        format!("Usage: {} [--config <file.json>] <ast.json>", program_name)
    })?;

    Ok(Options {
        input: PathBuf::from(input),
        config,
    })
}

/// Returns whether the analysis succeeded
fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let options = parse_args()?;

    let config = match &options.config {
        Some(path) => {
            let source = fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
            AnalyzerConfig::from_json(&source)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?
        }
        None => AnalyzerConfig::default(),
    };

    let source = fs::read_to_string(&options.input)
        .map_err(|e| format!("Cannot read {}: {}", options.input.display(), e))?;

    let analyzer = Analyzer::with_config(config);
    let (output, ok) = match analyzer.analyze_json(&source) {
        Ok(analysis) => (serde_json::to_string_pretty(analysis.report())?, true),
        Err(error) => (error_json(&error)?, false),
    };
    println!("{}", output);
    Ok(ok)
}

fn error_json(error: &AnalysisError) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&error.to_report())
}
