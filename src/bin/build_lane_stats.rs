use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use draft_oracle::config;
use draft_oracle::lane_stats::LaneStatsTable;
use draft_oracle::match_store;

/// Aggregate lane-matchup win rates from stored matches.
#[derive(Parser, Debug)]
#[command(name = "build_lane_stats", version)]
struct Args {
    /// SQLite match store (ignored when --matches is given)
    #[arg(long, env = "DRAFT_DB")]
    db: Option<PathBuf>,

    /// Read matches from a Parquet export instead of the store
    #[arg(long)]
    matches: Option<PathBuf>,

    /// Only use matches from this patch
    #[arg(long)]
    patch: Option<String>,

    /// Output Parquet file
    #[arg(long, env = "DRAFT_LANE_STATS")]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    config::load_dotenv();
    config::init_tracing();
    let args = Args::parse();

    let mut records = match &args.matches {
        Some(path) => match_store::read_matches_parquet(path)?,
        None => {
            let db_path = args
                .db
                .clone()
                .or_else(match_store::default_db_path)
                .context("unable to resolve sqlite path")?;
            let conn = match_store::open_db(&db_path)?;
            match_store::load_records(&conn, args.patch.as_deref())?
        }
    };
    if let Some(patch) = &args.patch {
        records.retain(|r| &r.patch == patch);
    }

    let table = LaneStatsTable::build(&records);
    let out = args
        .out
        .unwrap_or_else(|| config::data_file(config::LANE_STATS_FILE));
    let rows = table.write_parquet(&out)?;

    println!("Lane stats built from {} matches", records.len());
    println!("Keys: {rows}");
    println!("Wrote {}", out.display());
    let mut busiest = table.rows();
    busiest.sort_by(|a, b| b.entry.samples.cmp(&a.entry.samples));
    for row in busiest.iter().take(5) {
        println!(
            "  {} {:7} {} vs {}: n={} wr_blue={:.3}",
            row.key.patch,
            row.key.role.key(),
            row.key.blue,
            row.key.red,
            row.entry.samples,
            row.entry.win_rate()
        );
    }
    Ok(())
}
