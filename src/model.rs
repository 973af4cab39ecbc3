//! Trained model artifact and the scoring handle built from it.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::champion_table::ChampionAttributeTable;
use crate::dataset::{FeatureMap, FillPolicy, align_features, draft_features};
use crate::error::DraftError;
use crate::gbdt::GradientBoostedTrees;
use crate::lane_stats::LaneStatsTable;
use crate::match_record::DraftContext;
use crate::metrics::{CalibrationBin, Metrics};
use crate::scaler::VarianceScaler;
use crate::trainer::{EvalReport, SplitStrategy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub version: String,
    pub generated_at: String,
    /// Column order the scaler and trees were fitted on.
    pub feature_names: Vec<String>,
    pub fill: FillPolicy,
    pub scaler: VarianceScaler,
    pub booster: GradientBoostedTrees,
    pub split: SplitStrategy,
    pub n_train: usize,
    pub n_val: usize,
    pub metrics: Metrics,
    #[serde(default)]
    pub calibration: Vec<CalibrationBin>,
}

impl TrainedModel {
    pub fn new(
        feature_names: Vec<String>,
        fill: FillPolicy,
        scaler: VarianceScaler,
        booster: GradientBoostedTrees,
        report: &EvalReport,
        version: Option<String>,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            version: version.unwrap_or_else(|| {
                format!(
                    "draft-gbdt-{}-{}",
                    env!("CARGO_PKG_VERSION"),
                    now.format("%Y%m%d%H%M%S")
                )
            }),
            generated_at: now.to_rfc3339(),
            feature_names,
            fill,
            scaler,
            booster,
            split: report.split,
            n_train: report.n_train,
            n_val: report.n_val,
            metrics: report.metrics,
            calibration: report.calibration.clone(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok();
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self).context("serialize model artifact")?;
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
        info!(path = %path.display(), version = %self.version, "model artifact saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parse model artifact {}", path.display()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DraftPrediction<'a> {
    /// Win probability for the side the request was made for.
    pub probability: f64,
    pub blue_probability: f64,
    pub model_version: &'a str,
}

/// Loaded once and shared by reference between scoring calls.
#[derive(Debug, Clone)]
pub struct DraftScorer {
    model: TrainedModel,
    expected: BTreeSet<String>,
}

impl DraftScorer {
    pub fn new(model: TrainedModel) -> Self {
        let expected = model.feature_names.iter().cloned().collect();
        Self { model, expected }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(TrainedModel::load(path)?))
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    pub fn version(&self) -> &str {
        &self.model.version
    }

    /// Blue-side win probability. The feature names must equal the trained
    /// set exactly.
    pub fn score(&self, features: &FeatureMap) -> Result<f64, DraftError> {
        let given: BTreeSet<&str> = features.keys().map(String::as_str).collect();
        let missing: Vec<String> = self
            .expected
            .iter()
            .filter(|name| !given.contains(name.as_str()))
            .cloned()
            .collect();
        let unexpected: Vec<String> = given
            .iter()
            .filter(|name| !self.expected.contains(**name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(DraftError::FeatureSetMismatch {
                missing,
                unexpected,
            });
        }
        Ok(self.score_aligned(features))
    }

    /// Builds features for a live draft and aligns them to the trained
    /// columns. Lane features for roles not filled on both sides take the
    /// model's fill value; anything the model never saw is an error.
    /// The draft's runes and summoner spells are not model inputs and are
    /// ignored here.
    pub fn predict_draft(
        &self,
        draft: &DraftContext,
        champions: &ChampionAttributeTable,
        lanes: &LaneStatsTable,
    ) -> Result<DraftPrediction<'_>, DraftError> {
        let features = draft_features(
            &draft.blue_team,
            &draft.red_team,
            &draft.patch,
            champions,
            lanes,
        );
        let unexpected: Vec<String> = features
            .keys()
            .filter(|name| !self.expected.contains(*name))
            .cloned()
            .collect();
        if !unexpected.is_empty() {
            return Err(DraftError::FeatureSetMismatch {
                missing: Vec::new(),
                unexpected,
            });
        }
        let blue = self.score_aligned(&features);
        Ok(DraftPrediction {
            probability: if draft.blue_side { blue } else { 1.0 - blue },
            blue_probability: blue,
            model_version: self.version(),
        })
    }

    fn score_aligned(&self, features: &FeatureMap) -> f64 {
        let row = align_features(features, &self.model.feature_names, self.model.fill);
        let scaled = self.model.scaler.transform_row(&row);
        self.model.booster.predict_proba(&scaled)
    }
}
