use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use draft_oracle::config;
use draft_oracle::dataset::{Dataset, FillPolicy};
use draft_oracle::trainer::{SplitStrategy, TrainConfig, train_model};

/// Fit the scaler and boosted trees on a training set and report held-out
/// metrics.
#[derive(Parser, Debug)]
#[command(name = "train_model", version)]
struct Args {
    /// Training feature Parquet file
    #[arg(long, env = "DRAFT_TRAINING_SET")]
    input: Option<PathBuf>,

    /// Model artifact output
    #[arg(long, env = "DRAFT_MODEL")]
    out: Option<PathBuf>,

    /// stratified or patch_holdout
    #[arg(long, default_value_t = SplitStrategy::Stratified)]
    split: SplitStrategy,

    /// Value for absent lane features: neutral or zero
    #[arg(long, default_value_t = FillPolicy::Neutral)]
    fill: FillPolicy,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 600)]
    n_trees: usize,

    #[arg(long, default_value_t = 0.03)]
    learning_rate: f64,

    #[arg(long, default_value_t = 64)]
    num_leaves: usize,

    /// Model version tag (generated from the crate version and time if unset)
    #[arg(long, env = "DRAFT_MODEL_VERSION")]
    version_tag: Option<String>,
}

fn main() -> Result<()> {
    config::load_dotenv();
    config::init_tracing();
    let args = Args::parse();

    let input = args
        .input
        .unwrap_or_else(|| config::data_file(config::TRAINING_SET_FILE));
    let dataset = Dataset::read_parquet(&input)?;

    let mut train_config = TrainConfig {
        seed: args.seed,
        split: args.split,
        fill: args.fill,
        version: args.version_tag,
        ..TrainConfig::default()
    };
    train_config.booster.seed = args.seed;
    train_config.booster.n_trees = args.n_trees;
    train_config.booster.learning_rate = args.learning_rate;
    train_config.booster.num_leaves = args.num_leaves;

    let (model, report) = train_model(&dataset, &train_config)?;
    let out = args
        .out
        .unwrap_or_else(|| config::data_file(config::MODEL_FILE));
    model.save(&out)?;

    println!("Model trained: {}", model.version);
    println!("Input: {} ({} rows)", input.display(), dataset.len());
    println!(
        "Split: {} train={} val={}",
        report.split, report.n_train, report.n_val
    );
    println!("Features ({}):", model.feature_names.len());
    for name in &model.feature_names {
        println!("  {name}");
    }
    let m = report.metrics;
    println!(
        "Validation: auc={} brier={:.4} log_loss={:.4} accuracy={:.3}",
        m.auc.map_or_else(|| "n/a".to_string(), |auc| format!("{auc:.4}")),
        m.brier,
        m.log_loss,
        m.accuracy
    );
    println!("Calibration:");
    for bin in report.calibration.iter().filter(|b| b.count > 0) {
        println!(
            "  [{:.1}, {:.1}) n={:4} pred={:.3} actual={:.3}",
            bin.bucket_start, bin.bucket_end, bin.count, bin.avg_pred, bin.actual_rate
        );
    }
    println!("Wrote {}", out.display());
    Ok(())
}
