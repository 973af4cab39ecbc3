//! Process-level setup shared by the binaries: environment files, logging and
//! default artifact locations.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

const DATA_DIR: &str = "draft_oracle";

pub const MATCH_DB_FILE: &str = "matches.sqlite";
pub const MATCHES_PARQUET_FILE: &str = "matches.parquet";
pub const LANE_STATS_FILE: &str = "lane_stats.parquet";
pub const TRAINING_SET_FILE: &str = "training_features.parquet";
pub const MODEL_FILE: &str = "draft_model.json";

/// Loads `.env.local` first so it wins over `.env`.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

/// `RUST_LOG` controls the filter; default is `info`. Logs go to stderr so
/// stdout stays free for summaries.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn default_data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("DRAFT_ORACLE_DATA_DIR")
        && !dir.trim().is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    if let Ok(base) = std::env::var("XDG_DATA_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(DATA_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".local").join("share").join(DATA_DIR))
}

/// `name` inside the data directory, or in the working directory when no
/// data directory can be resolved.
pub fn data_file(name: &str) -> PathBuf {
    default_data_dir()
        .map(|dir| dir.join(name))
        .unwrap_or_else(|| PathBuf::from(name))
}
