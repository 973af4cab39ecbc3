use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use draft_oracle::config;
use draft_oracle::match_store;
use draft_oracle::normalize::OutcomePolicy;

/// Normalize a directory of raw match JSON documents into the match store.
#[derive(Parser, Debug)]
#[command(name = "ingest_matches", version)]
struct Args {
    /// Directory scanned recursively for `*.json` match documents
    #[arg(long, env = "DRAFT_RAW_DIR")]
    raw_dir: PathBuf,

    /// SQLite match store (defaults to the data directory)
    #[arg(long, env = "DRAFT_DB")]
    db: Option<PathBuf>,

    /// Handling of matches without a blue team entry: assume_loss or reject
    #[arg(long, env = "DRAFT_OUTCOME_POLICY", default_value_t = OutcomePolicy::AssumeLoss)]
    outcome_policy: OutcomePolicy,

    /// Also export every stored match to this Parquet file
    #[arg(long)]
    export_parquet: Option<PathBuf>,
}

fn main() -> Result<()> {
    config::load_dotenv();
    config::init_tracing();
    let args = Args::parse();

    let db_path = args
        .db
        .or_else(match_store::default_db_path)
        .context("unable to resolve sqlite path")?;
    let mut conn = match_store::open_db(&db_path)?;
    let summary =
        match_store::ingest_raw_dir(&mut conn, db_path.clone(), &args.raw_dir, args.outcome_policy)?;
    let report = &summary.report;

    println!("Match ingest complete (run {})", summary.run_id);
    println!("DB: {}", summary.db_path.display());
    println!(
        "Files: {} ({} unreadable)",
        summary.files_total, summary.files_unreadable
    );
    println!(
        "Documents: {} accepted={} degraded={} malformed={} missing_outcome={}",
        report.documents, report.accepted, report.degraded, report.malformed, report.missing_outcome
    );
    println!(
        "Participants: accepted={} rejected={} (role={} duplicate={} side={} champion={})",
        report.participants_accepted,
        report.rejected_participants(),
        report.rejected_unknown_role,
        report.rejected_duplicate_role,
        report.rejected_unknown_side,
        report.rejected_missing_champion
    );
    println!("Matches upserted: {}", summary.matches_upserted);
    if !report.errors.is_empty() {
        println!("errors: {}", report.errors.len());
        for err in report.errors.iter().take(6) {
            println!("   - {err}");
        }
    }

    if let Some(path) = args.export_parquet {
        let records = match_store::load_records(&conn, None)?;
        let rows = match_store::write_matches_parquet(&records, &path)?;
        println!("Exported {rows} matches to {}", path.display());
    }
    Ok(())
}
