use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sql_draw_engine::result_format::render_table;
use sql_draw_engine::{DrawConfig, DrawError, DrawSeed, DrawSession, QueryTranslator};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sql-draw", about = "Draw winners from a table using a plain-language condition")]
struct Args {
    /// Candidate table (XLSX/XLS/ODS or CSV).
    data: PathBuf,

    /// Two-column alias mapping table (column name / label).
    #[arg(long)]
    mapping: Option<PathBuf>,

    /// Condition in plain language, translated to SQL by the configured model.
    #[arg(long, conflicts_with = "query")]
    condition: Option<String>,

    /// SQL to run directly instead of translating a condition.
    #[arg(long)]
    query: Option<String>,

    /// Number of winners to draw.
    #[arg(short = 'k', long, default_value_t = 1)]
    winners: usize,

    /// Seed for a reproducible draw.
    #[arg(long)]
    seed: Option<u64>,

    /// Write the winners as CSV (UTF-8 with BOM).
    #[arg(long)]
    out: Option<PathBuf>,

    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rows shown when previewing candidates.
    #[arg(long, default_value_t = 10)]
    preview: usize,

    /// Write the session audit log as JSON.
    #[arg(long)]
    audit_log: Option<PathBuf>,
}

/// Errors reach the operator as their user-facing message
fn boundary(err: DrawError) -> anyhow::Error {
    anyhow::anyhow!(err.user_message())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => DrawConfig::load(path),
        None => DrawConfig::from_env(),
    }
    .map_err(boundary)?;

    let bytes = fs::read(&args.data).with_context(|| format!("reading {}", args.data.display()))?;
    let mut session = DrawSession::from_upload(&bytes, &config).map_err(boundary)?;
    println!(
        "Loaded {} rows x {} columns",
        session.dataset().num_rows(),
        session.dataset().num_columns()
    );

    if let Some(path) = &args.mapping {
        let mapping_bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        match session.apply_alias_mapping_bytes(&mapping_bytes) {
            Ok(report) => println!(
                "Alias columns added: {} (skipped {})",
                report.added.len(),
                report.skipped.len()
            ),
            Err(err) if err.is_recoverable() => warn!("{}", err.user_message()),
            Err(err) => return Err(boundary(err)),
        }
    }

    if let Some(condition) = &args.condition {
        let translator = QueryTranslator::from_config(&config).map_err(boundary)?;
        session.filter(condition, &translator).await.map_err(boundary)?;
    } else if let Some(query) = &args.query {
        session.filter_with_query(query).map_err(boundary)?;
    }

    if let Some(sql) = session.current_query() {
        println!("Query: {}", sql);
    }
    match session.filtered_result() {
        Some(result) => {
            println!("Candidates: {}", result.num_rows());
            println!("{}\n", render_table(&result.dataset, args.preview));
        }
        None => println!("Candidates: {} (no condition)", session.candidate_count()),
    }

    let drawn = session
        .draw(args.winners, args.seed.map(DrawSeed))
        .map_err(boundary)?
        .map(|draw| (draw.seed, render_table(&draw.rows, draw.len())));
    match drawn {
        Some((seed, table)) => {
            println!("Winners (seed {}):", seed);
            println!("{}", table);
        }
        None => println!("No candidates match the condition; nothing to draw."),
    }

    if let Some(path) = &args.out {
        if let Some(csv) = session.export_draw_csv().map_err(boundary)? {
            fs::write(path, csv).with_context(|| format!("writing {}", path.display()))?;
            println!("Saved winners to {}", path.display());
        }
    }

    if let Some(path) = &args.audit_log {
        let json = session.audit_log().to_json()?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }

    Ok(())
}
