//! Mapstudio CLI
//!
//! Command-line driver over the mapping core:
//! - Converting paths between canonical, XML and JSON notation
//! - Projecting a saved studio response into the diagram graph
//! - Building the confirmation-gated export snapshot

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use mapstudio_core::paths::{
    from_json_path, from_xml_path, leaf, sanitize_token, to_canonical, to_json_path, to_xml_path,
};
use mapstudio_core::{EditOutcome, GraphGesture, GraphProjection, NodeRole};
use mapstudio_sync::{
    build_export_request, AuditEvent, ExportError, ExportSummary, StudioConfig, StudioResponse,
    StudioSession,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mapstudio")]
#[command(author, version, about = "Mapper Studio: review and correct field mappings")]
struct Cli {
    /// Log debug output to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a path between notations.
    Path {
        #[arg(value_enum)]
        mode: PathMode,
        /// Path or token to convert
        raw: String,
    },

    /// Project a studio response into diagram nodes and edges.
    Project {
        #[command(flatten)]
        input: SessionInput,
        /// Print the projection as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Build the export snapshot of a studio response.
    ///
    /// Refused unless `--confirm` is given, mirroring the manual
    /// confirmation the studio requires before export.
    Snapshot {
        #[command(flatten)]
        input: SessionInput,
        /// Confirm the reviewed mapping set
        #[arg(long)]
        confirm: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PathMode {
    Canonical,
    Xml,
    Json,
    FromXml,
    FromJson,
    Leaf,
    Sanitize,
}

#[derive(Args)]
struct SessionInput {
    /// Studio response JSON
    #[arg(long)]
    response: PathBuf,
    /// Audit events JSON array used as the suggestion fallback
    #[arg(long)]
    audit: Option<PathBuf>,
    /// Diagram gestures JSON array replayed after loading
    #[arg(long)]
    gestures: Option<PathBuf>,
    /// Studio config JSON
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Path { mode, raw } => {
            println!("{}", convert_path(mode, &raw));
        }
        Commands::Project { input, json } => {
            let mut session = load_session(&input)?;
            let graph = session.mapping_mut().projection().clone();
            if json {
                println!("{}", serde_json::to_string_pretty(&graph)?);
            } else {
                print_projection(&graph);
            }
        }
        Commands::Snapshot { input, confirm } => {
            let mut session = load_session(&input)?;
            if confirm {
                session.mapping_mut().confirm();
            }
            cmd_snapshot(&session)?;
        }
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn convert_path(mode: PathMode, raw: &str) -> String {
    match mode {
        PathMode::Canonical => to_canonical(raw),
        PathMode::Xml => to_xml_path(raw),
        PathMode::Json => to_json_path(raw),
        PathMode::FromXml => from_xml_path(raw),
        PathMode::FromJson => from_json_path(raw),
        PathMode::Leaf => leaf(raw),
        PathMode::Sanitize => sanitize_token(raw),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn load_session(input: &SessionInput) -> Result<StudioSession> {
    let config = match &input.config {
        Some(path) => StudioConfig::from_path(path)?,
        None => StudioConfig::default(),
    };
    let response: StudioResponse = read_json(&input.response)?;
    let mut session = StudioSession::new(config);
    session.apply_response(response);

    if let Some(path) = &input.audit {
        let events: Vec<AuditEvent> = read_json(path)?;
        session.apply_audit_events(events);
    }

    if let Some(path) = &input.gestures {
        let gestures: Vec<GraphGesture> = read_json(path)?;
        for gesture in gestures {
            match session.mapping_mut().apply(gesture) {
                EditOutcome::Applied { message } => debug!(%message, "replayed gesture"),
                EditOutcome::Ignored { reason } => warn!(%reason, "gesture ignored"),
            }
        }
    }
    Ok(session)
}

fn print_projection(graph: &GraphProjection) {
    for (role, title) in [(NodeRole::Source, "Sources"), (NodeRole::Target, "Targets")] {
        println!("{}", title.bold());
        for node in graph.nodes_with_role(role) {
            let mut line = format!("  {}", node.display_path);
            if node.missing {
                line = format!("{line} {}", "missing".red());
            }
            if node.orphan {
                line = format!("{line} {}", "orphan".yellow());
            }
            println!("{line}");
        }
    }
    println!("{}", "Edges".bold());
    for edge in &graph.edges {
        println!("  {} -> {}  {}", edge.source, edge.target, edge.label.cyan());
    }
}

fn cmd_snapshot(session: &StudioSession) -> Result<()> {
    let store = session.mapping().store();
    if let Err(blocked) = store.ensure_exportable() {
        let err = ExportError::from(blocked);
        eprintln!("{} {}", "refused:".red().bold(), err);
        return Err(err.into());
    }
    let request = build_export_request(store.list(), session.config());
    if request.selected_count() == 0 {
        let err = ExportError::NoSelectedRows;
        eprintln!("{} {}", "refused:".red().bold(), err);
        return Err(err.into());
    }

    let summary = ExportSummary::of(&request);
    eprintln!(
        "{} {} v{}: {} of {} mapping(s) selected, {} edited",
        "ok".green().bold(),
        summary.project_code,
        summary.mapping_version,
        summary.selected,
        summary.total,
        summary.edited
    );
    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}
