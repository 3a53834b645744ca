//! vulngraph command-line ingester
//!
//! Loads a dataset file, ingests it into the chosen backend, and prints a
//! per-phase summary.

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{ContentArrangement, Table};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use vulngraph::{
    load_dataset, CypherScriptBackend, IdCollisionPolicy, IngestConfig, IngestReport, Ingestor,
    MatchMode, MemoryBackend,
};

#[derive(Parser)]
#[command(name = "vulngraph", version, about = "Build a vehicle security knowledge graph")]
struct Cli {
    /// Dataset file (.json, .yaml or .yml)
    #[arg(long)]
    data: PathBuf,

    /// Ingestion config (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write Cypher statements to this file instead of building the graph in memory
    #[arg(long, conflicts_with = "snapshot_out")]
    cypher_out: Option<PathBuf>,

    /// Write the resulting graph as JSON
    #[arg(long)]
    snapshot_out: Option<PathBuf>,

    /// Write the run report as JSON
    #[arg(long)]
    report_out: Option<PathBuf>,

    /// Interface matching mode for vulnerability links
    #[arg(long, value_enum)]
    match_mode: Option<MatchMode>,

    /// Ingest even when component and vulnerability IDs overlap
    #[arg(long)]
    allow_id_collisions: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => IngestConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => IngestConfig::default(),
    };
    if let Some(mode) = cli.match_mode {
        config.interface_match = mode;
    }
    if cli.allow_id_collisions {
        config.id_collision = IdCollisionPolicy::Warn;
    }

    let dataset = load_dataset(&cli.data)
        .with_context(|| format!("loading dataset {}", cli.data.display()))?;
    let ingestor = Ingestor::new(config);

    let report = match &cli.cypher_out {
        Some(path) => {
            let mut backend = CypherScriptBackend::new(create(path)?);
            let report = ingestor.run(&mut backend, &dataset)?;
            println!(
                "Wrote {} statements to {}",
                backend.statements_written(),
                path.display()
            );
            report
        }
        None => {
            let mut backend = MemoryBackend::new();
            let report = ingestor.run(&mut backend, &dataset)?;
            let stats = backend.store().statistics();
            println!("Graph: {} nodes, {} edges", stats.node_count, stats.edge_count);
            if let Some(path) = &cli.snapshot_out {
                let file = create(path)?;
                backend
                    .snapshot()
                    .write_json(file)
                    .with_context(|| format!("writing snapshot {}", path.display()))?;
            }
            report
        }
    };

    print_summary(&report);

    if let Some(path) = &cli.report_out {
        let file = create(path)?;
        report
            .write_json(file)
            .with_context(|| format!("writing report {}", path.display()))?;
    }

    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn print_summary(report: &IngestReport) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Phase",
        "Rows",
        "Succeeded",
        "Skipped",
        "Failed",
        "Nodes created",
        "Nodes updated",
        "Edges created",
        "Edges existing",
        "Unresolved",
    ]);

    for phase in report.phases() {
        table.add_row(vec![
            phase.phase.to_string(),
            phase.rows_total.to_string(),
            phase.succeeded.to_string(),
            phase.skipped.to_string(),
            phase.failed.to_string(),
            phase.nodes_created.to_string(),
            phase.nodes_updated.to_string(),
            phase.edges_created.to_string(),
            phase.edges_existing.to_string(),
            phase.unresolved.len().to_string(),
        ]);
    }
    println!("{}", table);

    for phase in report.phases() {
        for diagnostic in phase.failures().chain(phase.skips()) {
            println!(
                "  [{}] row {} (id {}): {}",
                diagnostic.phase,
                diagnostic.row_index,
                diagnostic.id.as_deref().unwrap_or("-"),
                diagnostic.detail
            );
        }
    }
    if !report.id_collisions.is_empty() {
        println!("{} ID(s) shared by components and vulnerabilities", report.id_collisions.len());
    }
}
