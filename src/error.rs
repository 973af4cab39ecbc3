use thiserror::Error;

/// Named failure modes of the draft pipeline.
///
/// I/O boundaries return `anyhow::Result`; these variants travel inside it and
/// can be recovered with `downcast_ref::<DraftError>()`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DraftError {
    #[error("training dataset is empty")]
    EmptyDataset,

    #[error("training labels contain a single class only (blue_win={class})")]
    SingleClass { class: bool },

    #[error("class blue_win={class} has {count} rows, need at least 2 for a stratified split")]
    TooFewClassMembers { class: bool, count: usize },

    #[error("feature set mismatch: missing {missing:?}, unexpected {unexpected:?}")]
    FeatureSetMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("match {match_id} has no blue team outcome")]
    MissingOutcome { match_id: String },

    #[error("malformed match document: {reason}")]
    MalformedMatch { reason: String },

    #[error("unknown role key: {0}")]
    UnknownRole(String),

    #[error("training dataset has no feature columns")]
    NoFeatures,

    #[error("patch holdout needs at least two patches, found {found}")]
    NotEnoughPatches { found: usize },
}
