use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use draft_oracle::champion_table::ChampionAttributeTable;
use draft_oracle::config;
use draft_oracle::lane_stats::LaneStatsTable;
use draft_oracle::match_record::DraftContext;
use draft_oracle::model::DraftScorer;

/// Score one draft with a trained model.
#[derive(Parser, Debug)]
#[command(name = "predict_draft", version)]
struct Args {
    /// Draft JSON: patch, blue_team, red_team, optional blue_side
    #[arg(long)]
    draft: PathBuf,

    #[arg(long, env = "DRAFT_MODEL")]
    model: Option<PathBuf>,

    #[arg(long, env = "DRAFT_CHAMPIONS")]
    champions: PathBuf,

    #[arg(long, env = "DRAFT_LANE_STATS")]
    lane_stats: Option<PathBuf>,

    /// Must match the value used when the training set was built
    #[arg(long, default_value_t = 0.0)]
    prior_strength: f64,

    /// Report the red side's win probability
    #[arg(long)]
    red: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    config::load_dotenv();
    config::init_tracing();
    let args = Args::parse();

    let raw = fs::read_to_string(&args.draft)
        .with_context(|| format!("read draft {}", args.draft.display()))?;
    let mut draft: DraftContext = serde_json::from_str(&raw)
        .with_context(|| format!("parse draft {}", args.draft.display()))?;
    if args.red {
        draft.blue_side = false;
    }

    let model_path = args
        .model
        .unwrap_or_else(|| config::data_file(config::MODEL_FILE));
    let scorer = DraftScorer::load(&model_path)?;
    let champions = ChampionAttributeTable::load(&args.champions)?;
    let lanes = LaneStatsTable::read_parquet(
        &args
            .lane_stats
            .unwrap_or_else(|| config::data_file(config::LANE_STATS_FILE)),
    )?
    .with_prior_strength(args.prior_strength);

    let prediction = scorer.predict_draft(&draft, &champions, &lanes)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&prediction)?);
        return Ok(());
    }
    let side = if draft.blue_side { "blue" } else { "red" };
    println!(
        "{side} win probability: {:.3} (blue {:.3})",
        prediction.probability, prediction.blue_probability
    );
    println!("model: {}", prediction.model_version);
    Ok(())
}
