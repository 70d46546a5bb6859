//! `tia-replay`: feed a recorded protocol transcript through the engine
//!
//! A transcript is JSON lines, one agent message or action per line:
//!
//! ```text
//! {"agent":"petclinic","build":"1.0","message":{"type":"INIT","data":{"buildVersion":"1.0"}}}
//! {"agent":"petclinic","build":"1.0","action":{"type":"DROP_SCOPE"}}
//! ```
//!
//! Every fragment the engine pushes is printed to stdout as a JSON line.

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tia_analysis::ManifestAnalyzer;
use tia_engine::{init_tracing, Controller, EngineConfig, MemorySender};
use tia_types::AgentInfo;

#[derive(Debug, Deserialize)]
struct TranscriptEntry {
    agent: String,
    #[serde(default)]
    build: String,
    #[serde(default)]
    message: Option<serde_json::Value>,
    #[serde(default)]
    action: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct PrintedDelivery<'a> {
    agent: &'a str,
    destination: &'a str,
    payload: serde_json::Value,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ReplaySummary {
    lines: usize,
    applied: usize,
    ignored: usize,
}

fn cli() -> Command {
    Command::new("tia-replay")
        .version(tia_engine::VERSION)
        .about("Replay a coverage protocol transcript through the session engine")
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .default_value("info")
                .global(true)
                .help("Tracing filter used when RUST_LOG is unset"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Emit logs as JSON lines"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("replay")
                .about("Replay a JSON-lines transcript")
                .arg(
                    Arg::new("transcript")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Transcript file"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Engine configuration (TOML)"),
                ),
        )
        .subcommand(Command::new("config").about("Print the default configuration as TOML"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let log_level = matches
        .get_one::<String>("log-level")
        .map_or("info", String::as_str);
    init_tracing(log_level, matches.get_flag("json-logs"))?;

    match matches.subcommand() {
        Some(("replay", args)) => {
            let Some(transcript) = args.get_one::<PathBuf>("transcript") else {
                bail!("missing transcript path");
            };
            let config = match args.get_one::<PathBuf>("config") {
                Some(path) => EngineConfig::from_file(path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => EngineConfig::default(),
            };
            let source = std::fs::read_to_string(transcript)
                .with_context(|| format!("reading {}", transcript.display()))?;

            let sender = Arc::new(MemorySender::new());
            let controller =
                Controller::new(sender.clone(), Arc::new(ManifestAnalyzer::new()), config)?;
            let summary = replay(&controller, &source).await?;
            controller.shutdown().await;

            for delivery in sender.deliveries() {
                let printed = PrintedDelivery {
                    agent: delivery.agent_id.as_str(),
                    destination: &delivery.destination,
                    payload: delivery.json()?,
                };
                println!("{}", serde_json::to_string(&printed)?);
            }
            tracing::info!(
                transcript = %transcript.display(),
                lines = summary.lines,
                applied = summary.applied,
                ignored = summary.ignored,
                "replay finished"
            );
        }
        Some(("config", _)) => {
            print!("{}", toml::to_string_pretty(&EngineConfig::default())?);
        }
        _ => bail!("unknown command"),
    }
    Ok(())
}

/// Apply every transcript line in order
async fn replay(controller: &Controller, source: &str) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for (index, line) in source.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        summary.lines += 1;

        let entry: TranscriptEntry = serde_json::from_str(line)
            .with_context(|| format!("transcript line {}", index + 1))?;
        let info = AgentInfo::new(entry.agent, entry.build);

        let outcome = match (entry.message, entry.action) {
            (Some(message), None) => controller.process_raw(&info, &message.to_string()).await?,
            (None, Some(action)) => controller.do_raw_action(&info, &action.to_string()).await?,
            _ => bail!(
                "transcript line {}: expected exactly one of `message` or `action`",
                index + 1
            ),
        };
        if outcome.applied {
            summary.applied += 1;
        } else {
            summary.ignored += 1;
        }
    }
    Ok(summary)
}
