pub mod champion_table;
pub mod config;
pub mod dataset;
pub mod error;
pub mod gbdt;
pub mod lane_stats;
pub mod match_record;
pub mod match_store;
pub mod matchup_features;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod parquet_io;
pub mod raw_match;
pub mod roles;
pub mod scaler;
pub mod side_features;
pub mod trainer;

pub use error::DraftError;
