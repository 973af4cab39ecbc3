//! Train/validation split, model fitting and held-out evaluation.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::{Dataset, FillPolicy};
use crate::error::DraftError;
use crate::gbdt::{BoosterParams, GradientBoostedTrees};
use crate::metrics::{CalibrationBin, Metrics, calibration_bins, evaluate_probs};
use crate::model::TrainedModel;
use crate::normalize::patch_order_key;
use crate::scaler::VarianceScaler;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_VAL_FRACTION: f64 = 0.2;
pub const CALIBRATION_BUCKETS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    /// Random split that keeps the label ratio in both partitions.
    #[default]
    Stratified,
    /// Every row of the most recent patch is held out.
    PatchHoldout,
}

impl FromStr for SplitStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "stratified" => Ok(Self::Stratified),
            "patch_holdout" | "patch" => Ok(Self::PatchHoldout),
            other => Err(format!("unknown split strategy: {other}")),
        }
    }
}

impl fmt::Display for SplitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stratified => f.write_str("stratified"),
            Self::PatchHoldout => f.write_str("patch_holdout"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub seed: u64,
    pub val_fraction: f64,
    pub split: SplitStrategy,
    pub fill: FillPolicy,
    pub booster: BoosterParams,
    /// Overrides the generated model version tag.
    pub version: Option<String>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            val_fraction: DEFAULT_VAL_FRACTION,
            split: SplitStrategy::default(),
            fill: FillPolicy::default(),
            booster: BoosterParams::default(),
            version: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub val: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub n_train: usize,
    pub n_val: usize,
    pub split: SplitStrategy,
    pub metrics: Metrics,
    pub calibration: Vec<CalibrationBin>,
}

fn check_classes(labels: &[bool]) -> Result<(), DraftError> {
    if labels.is_empty() {
        return Err(DraftError::EmptyDataset);
    }
    let positives = labels.iter().filter(|y| **y).count();
    if positives == 0 || positives == labels.len() {
        return Err(DraftError::SingleClass {
            class: positives == labels.len(),
        });
    }
    Ok(())
}

/// Per-class shuffle, then the first `round(val_fraction * n_class)` rows of
/// each class go to validation. Every class keeps at least one row on each
/// side.
pub fn stratified_split(labels: &[bool], val_fraction: f64, seed: u64) -> Result<Split, DraftError> {
    check_classes(labels)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut val = Vec::new();
    for class in [false, true] {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, y)| **y == class)
            .map(|(i, _)| i)
            .collect();
        if members.len() < 2 {
            return Err(DraftError::TooFewClassMembers {
                class,
                count: members.len(),
            });
        }
        members.shuffle(&mut rng);
        let n_val = ((members.len() as f64 * val_fraction.clamp(0.0, 1.0)).round() as usize)
            .clamp(1, members.len() - 1);
        val.extend_from_slice(&members[..n_val]);
        train.extend_from_slice(&members[n_val..]);
    }
    train.sort_unstable();
    val.sort_unstable();
    Ok(Split { train, val })
}

/// Rows of the latest patch become validation; everything older trains.
pub fn patch_holdout_split(patches: &[String]) -> Result<Split, DraftError> {
    if patches.is_empty() {
        return Err(DraftError::EmptyDataset);
    }
    let distinct: BTreeSet<&str> = patches.iter().map(String::as_str).collect();
    if distinct.len() < 2 {
        return Err(DraftError::NotEnoughPatches {
            found: distinct.len(),
        });
    }
    let latest = distinct
        .iter()
        .copied()
        .max_by(|a, b| patch_order_key(a).cmp(&patch_order_key(b)))
        .unwrap_or_default();
    let (val, train): (Vec<usize>, Vec<usize>) =
        (0..patches.len()).partition(|&i| patches[i] == latest);
    Ok(Split { train, val })
}

pub fn split_dataset(dataset: &Dataset, config: &TrainConfig) -> Result<Split, DraftError> {
    let labels = dataset.labels();
    match config.split {
        SplitStrategy::Stratified => stratified_split(&labels, config.val_fraction, config.seed),
        SplitStrategy::PatchHoldout => {
            check_classes(&labels)?;
            let patches: Vec<String> = dataset.rows.iter().map(|r| r.patch.clone()).collect();
            patch_holdout_split(&patches)
        }
    }
}

/// Fits scaler and booster on the training partition and scores the held-out
/// rows. Named failures surface as [`DraftError`] inside the `anyhow` error.
pub fn train_model(dataset: &Dataset, config: &TrainConfig) -> Result<(TrainedModel, EvalReport)> {
    let split = split_dataset(dataset, config)?;
    if dataset.feature_names.is_empty() {
        return Err(DraftError::NoFeatures.into());
    }
    let matrix = dataset.matrix(config.fill);
    let labels = dataset.labels();

    let pick = |idx: &[usize]| -> (Vec<Vec<f64>>, Vec<bool>) {
        (
            idx.iter().map(|&i| matrix[i].clone()).collect(),
            idx.iter().map(|&i| labels[i]).collect(),
        )
    };
    let (x_train, y_train) = pick(&split.train);
    let (x_val, y_val) = pick(&split.val);
    info!(
        train = x_train.len(),
        val = x_val.len(),
        features = dataset.feature_names.len(),
        split = %config.split,
        "training booster"
    );

    let scaler = VarianceScaler::fit(&x_train);
    let booster = GradientBoostedTrees::fit(&scaler.transform(&x_train), &y_train, &config.booster)?;

    let val_probs: Vec<f64> = scaler
        .transform(&x_val)
        .iter()
        .map(|row| booster.predict_proba(row))
        .collect();
    let metrics = evaluate_probs(&val_probs, &y_val);
    let calibration = calibration_bins(&val_probs, &y_val, CALIBRATION_BUCKETS);
    info!(
        auc = metrics.auc.unwrap_or(f64::NAN),
        brier = metrics.brier,
        log_loss = metrics.log_loss,
        "validation scored"
    );

    let report = EvalReport {
        n_train: x_train.len(),
        n_val: x_val.len(),
        split: config.split,
        metrics,
        calibration,
    };
    let model = TrainedModel::new(
        dataset.feature_names.clone(),
        config.fill,
        scaler,
        booster,
        &report,
        config.version.clone(),
    );
    Ok((model, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stratified_split_keeps_both_classes_on_both_sides() {
        let labels: Vec<bool> = (0..50).map(|i| i % 5 == 0).collect();
        let split = stratified_split(&labels, 0.2, 42).unwrap();
        assert_eq!(split.train.len() + split.val.len(), 50);
        assert_eq!(split.val.iter().filter(|&&i| labels[i]).count(), 2);
        assert_eq!(split.val.iter().filter(|&&i| !labels[i]).count(), 8);
        assert!(split.train.iter().any(|&i| labels[i]));
    }

    #[test]
    fn split_is_seeded() {
        let labels: Vec<bool> = (0..40).map(|i| i % 3 == 0).collect();
        assert_eq!(
            stratified_split(&labels, 0.2, 7).unwrap(),
            stratified_split(&labels, 0.2, 7).unwrap()
        );
    }

    #[test]
    fn tiny_class_is_rejected() {
        let labels = vec![true, false, false, false];
        assert_eq!(
            stratified_split(&labels, 0.2, 42),
            Err(DraftError::TooFewClassMembers {
                class: true,
                count: 1
            })
        );
    }

    #[test]
    fn patch_holdout_uses_numeric_patch_order() {
        let patches: Vec<String> = ["14.9", "14.10", "14.9", "14.10"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let split = patch_holdout_split(&patches).unwrap();
        assert_eq!(split.val, vec![1, 3]);
        assert_eq!(split.train, vec![0, 2]);
        assert_eq!(
            patch_holdout_split(&patches[..1]),
            Err(DraftError::NotEnoughPatches { found: 1 })
        );
    }
}
