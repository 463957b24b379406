//! runlink CLI: replay run scripts through the binding and inspect settings.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use runlink::{EngineCall, RecordingEngine, Session, Settings};

mod script;

use script::{Discipline, Script};

#[derive(Parser)]
#[command(
    name = "runlink",
    about = "runlink: drive the experiment-tracking binding from the command line",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a YAML run script against the in-memory engine and print the engine calls
    Replay {
        /// Path to the run script
        script: PathBuf,
        /// Logging discipline for the run
        #[arg(long, short, default_value = "atomic", value_parser = ["atomic", "partial"])]
        discipline: String,
        /// Output format
        #[arg(long, short, default_value = "table", value_parser = ["table", "json"])]
        format: String,
        /// Settings file (YAML); RUNLINK_* environment variables override it
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    /// Show the resolved settings
    Settings {
        /// Settings file (YAML)
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            script,
            discipline,
            format,
            settings,
        } => {
            cmd_replay(script, discipline.parse()?, format, settings)?;
        }
        Commands::Settings { file } => {
            cmd_settings(file)?;
        }
    }

    Ok(())
}

// ─── Command implementations ──────────────────────────────────────────────────

fn load_settings(file: Option<PathBuf>) -> Result<Settings> {
    let base = match file {
        Some(path) => Settings::from_yaml_file(&path)?,
        None => Settings::default(),
    };
    Ok(base.with_env()?)
}

#[derive(Serialize)]
struct Journal<'a> {
    calls: &'a [EngineCall],
    violations: &'a [String],
}

fn cmd_replay(
    path: PathBuf,
    discipline: Discipline,
    format: String,
    settings: Option<PathBuf>,
) -> Result<()> {
    let script = Script::load(&path)?;
    let settings = match settings {
        Some(file) => Some(load_settings(Some(file))?),
        None => None,
    };

    let engine = Arc::new(RecordingEngine::new());
    let session = Session::new(engine.clone());
    let outcome = script.replay(&session, discipline, settings);
    session.shutdown();

    let calls = engine.calls();
    let violations = engine.violations();
    match format.as_str() {
        "json" => {
            let journal = Journal {
                calls: &calls,
                violations: &violations,
            };
            println!("{}", serde_json::to_string_pretty(&journal)?);
        }
        "table" => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(["#", "Call", "Run", "Data", "Details"]);
            for (i, call) in calls.iter().enumerate() {
                let (run, data, details) = describe(call);
                table.add_row([
                    (i + 1).to_string(),
                    call.op().to_string(),
                    run,
                    data,
                    details,
                ]);
            }
            println!("Script: {}", path.display());
            println!("{}", table);
            if !violations.is_empty() {
                println!("── Protocol violations ({}) ─────────────", violations.len());
                for v in &violations {
                    println!("  {}", v);
                }
            }
        }
        _ => anyhow::bail!("Unknown format: {}", format),
    }

    outcome
}

fn cmd_settings(file: Option<PathBuf>) -> Result<()> {
    let settings = load_settings(file)?;
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["Setting", "Value"]);
    table.add_row(["offline", &settings.offline().to_string()]);
    table.add_row([
        "api_key",
        if settings.api_key().is_some() {
            "<set>"
        } else {
            "-"
        },
    ]);
    println!("{}", table);
    Ok(())
}

// ─── Utilities ────────────────────────────────────────────────────────────────

fn pairs<T: std::fmt::Display>(keys: &[String], values: &[T]) -> String {
    keys.iter()
        .zip(values)
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe(call: &EngineCall) -> (String, String, String) {
    let dash = || "-".to_string();
    match call {
        EngineCall::Setup | EngineCall::Teardown => (dash(), dash(), String::new()),
        EngineCall::InitRun {
            run,
            config,
            name,
            run_id,
            project,
            binding_tag,
        } => (
            run.to_string(),
            config.to_string(),
            format!(
                "name={:?} run_id={:?} project={:?} tag={}",
                name, run_id, project, binding_tag
            ),
        ),
        EngineCall::CreateData { data } | EngineCall::FreeData { data } => {
            (dash(), data.to_string(), String::new())
        }
        EngineCall::AddInts { data, keys, values } => (dash(), data.to_string(), pairs(keys, values)),
        EngineCall::AddDoubles { data, keys, values } => {
            (dash(), data.to_string(), pairs(keys, values))
        }
        EngineCall::AddStrings { data, keys, values } => {
            (dash(), data.to_string(), pairs(keys, values))
        }
        EngineCall::LogData { run, data } => (run.to_string(), data.to_string(), String::new()),
        EngineCall::LogInts {
            run,
            commit,
            keys,
            values,
        } => (
            run.to_string(),
            dash(),
            format!("commit={} {}", commit, pairs(keys, values)),
        ),
        EngineCall::LogDoubles {
            run,
            commit,
            keys,
            values,
        } => (
            run.to_string(),
            dash(),
            format!("commit={} {}", commit, pairs(keys, values)),
        ),
        EngineCall::LogCommit { run } | EngineCall::Finish { run } => {
            (run.to_string(), dash(), String::new())
        }
    }
}
