use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use draft_oracle::champion_table::ChampionAttributeTable;
use draft_oracle::config;
use draft_oracle::dataset::Dataset;
use draft_oracle::lane_stats::LaneStatsTable;
use draft_oracle::match_store;

/// Assemble one feature row per stored match.
#[derive(Parser, Debug)]
#[command(name = "build_training_set", version)]
struct Args {
    /// SQLite match store (ignored when --matches is given)
    #[arg(long, env = "DRAFT_DB")]
    db: Option<PathBuf>,

    /// Read matches from a Parquet export instead of the store
    #[arg(long)]
    matches: Option<PathBuf>,

    /// Champion attribute table (.json or .parquet)
    #[arg(long, env = "DRAFT_CHAMPIONS")]
    champions: PathBuf,

    /// Precomputed lane stats; rebuilt from the matches when omitted
    #[arg(long, env = "DRAFT_LANE_STATS")]
    lane_stats: Option<PathBuf>,

    /// Pseudo-games at 50% blended into every lane win rate
    #[arg(long, default_value_t = 0.0)]
    prior_strength: f64,

    /// Output Parquet file
    #[arg(long, env = "DRAFT_TRAINING_SET")]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    config::load_dotenv();
    config::init_tracing();
    let args = Args::parse();

    let records = match &args.matches {
        Some(path) => match_store::read_matches_parquet(path)?,
        None => {
            let db_path = args
                .db
                .clone()
                .or_else(match_store::default_db_path)
                .context("unable to resolve sqlite path")?;
            let conn = match_store::open_db(&db_path)?;
            match_store::load_records(&conn, None)?
        }
    };
    let champions = ChampionAttributeTable::load(&args.champions)?;
    let lanes = match &args.lane_stats {
        Some(path) => LaneStatsTable::read_parquet(path)?,
        None => LaneStatsTable::build(&records),
    }
    .with_prior_strength(args.prior_strength);

    let dataset = Dataset::build(&records, &champions, &lanes);
    let out = args
        .out
        .unwrap_or_else(|| config::data_file(config::TRAINING_SET_FILE));
    let rows = dataset.write_parquet(&out)?;

    let positives = dataset.rows.iter().filter(|r| r.blue_win).count();
    println!("Training set assembled");
    println!("Champions: {} Lane keys: {}", champions.len(), lanes.len());
    println!(
        "Rows: {rows} (blue wins {positives}, rate {:.3})",
        positives as f64 / rows.max(1) as f64
    );
    println!("Features: {}", dataset.feature_names.len());
    println!("Wrote {}", out.display());
    Ok(())
}
