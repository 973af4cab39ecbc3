use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub samples: usize,
    /// `None` when only one class is present.
    pub auc: Option<f64>,
    pub brier: f64,
    pub log_loss: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationBin {
    pub bucket_start: f64,
    pub bucket_end: f64,
    pub count: usize,
    pub avg_pred: f64,
    pub actual_rate: f64,
}

pub fn evaluate_probs(predictions: &[f64], outcomes: &[bool]) -> Metrics {
    if predictions.is_empty() || predictions.len() != outcomes.len() {
        return Metrics::default();
    }

    let mut log_loss_sum = 0.0_f64;
    let mut correct = 0usize;
    for (p, y) in predictions.iter().zip(outcomes) {
        let actual_prob = if *y { *p } else { 1.0 - p }.clamp(1e-12, 1.0);
        log_loss_sum += -actual_prob.ln();
        if (*p >= 0.5) == *y {
            correct += 1;
        }
    }

    let n = predictions.len() as f64;
    Metrics {
        samples: predictions.len(),
        auc: roc_auc(predictions, outcomes),
        brier: brier_score(predictions, outcomes),
        log_loss: log_loss_sum / n,
        accuracy: correct as f64 / n,
    }
}

/// Mean squared difference between prediction and 0/1 outcome.
pub fn brier_score(predictions: &[f64], outcomes: &[bool]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let sum: f64 = predictions
        .iter()
        .zip(outcomes)
        .map(|(p, y)| (p - if *y { 1.0 } else { 0.0 }).powi(2))
        .sum();
    sum / predictions.len() as f64
}

/// Probability that a random positive is scored above a random negative,
/// ties counting one half. Computed from average ranks.
pub fn roc_auc(predictions: &[f64], outcomes: &[bool]) -> Option<f64> {
    let positives = outcomes.iter().filter(|y| **y).count();
    let negatives = outcomes.len() - positives;
    if positives == 0 || negatives == 0 || predictions.len() != outcomes.len() {
        return None;
    }

    let mut order: Vec<usize> = (0..predictions.len()).collect();
    order.sort_by(|&a, &b| predictions[a].total_cmp(&predictions[b]));

    let mut positive_rank_sum = 0.0_f64;
    let mut i = 0usize;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && predictions[order[j + 1]] == predictions[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; tied block shares the mean rank.
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if outcomes[idx] {
                positive_rank_sum += avg_rank;
            }
        }
        i = j + 1;
    }

    let pos = positives as f64;
    let neg = negatives as f64;
    Some((positive_rank_sum - pos * (pos + 1.0) / 2.0) / (pos * neg))
}

pub fn calibration_bins(predictions: &[f64], outcomes: &[bool], bins: usize) -> Vec<CalibrationBin> {
    let bins = bins.max(2);
    let mut counts = vec![0usize; bins];
    let mut pred_sum = vec![0.0_f64; bins];
    let mut actual_sum = vec![0.0_f64; bins];

    for (p, y) in predictions.iter().zip(outcomes) {
        let p = p.clamp(0.0, 1.0);
        let idx = ((p * bins as f64).floor() as usize).min(bins - 1);
        counts[idx] += 1;
        pred_sum[idx] += p;
        if *y {
            actual_sum[idx] += 1.0;
        }
    }

    (0..bins)
        .map(|i| {
            let count = counts[i];
            let (avg_pred, actual_rate) = if count > 0 {
                (pred_sum[i] / count as f64, actual_sum[i] / count as f64)
            } else {
                (0.0, 0.0)
            };
            CalibrationBin {
                bucket_start: i as f64 / bins as f64,
                bucket_end: (i + 1) as f64 / bins as f64,
                count,
                avg_pred,
                actual_rate,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_ranking_has_unit_auc() {
        let p = [0.1, 0.2, 0.8, 0.9];
        let y = [false, false, true, true];
        assert_eq!(roc_auc(&p, &y), Some(1.0));
        assert_eq!(roc_auc(&p, &[true, true, false, false]), Some(0.0));
    }

    #[test]
    fn ties_count_half() {
        let p = [0.5, 0.5];
        let y = [true, false];
        assert_eq!(roc_auc(&p, &y), Some(0.5));
        let p = [0.3, 0.5, 0.5, 0.9];
        let y = [false, true, false, true];
        // pairs: (0.5+,0.3-)=1, (0.5+,0.5-)=0.5, (0.9+,0.3-)=1, (0.9+,0.5-)=1
        assert_eq!(roc_auc(&p, &y), Some(3.5 / 4.0));
    }

    #[test]
    fn auc_is_undefined_for_one_class() {
        assert_eq!(roc_auc(&[0.2, 0.4], &[true, true]), None);
    }

    #[test]
    fn brier_of_exact_predictions_is_zero() {
        assert_eq!(brier_score(&[1.0, 0.0], &[true, false]), 0.0);
        assert!((brier_score(&[0.5, 0.5], &[true, false]) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn calibration_buckets_cover_unit_interval() {
        let bins = calibration_bins(&[0.05, 0.95, 1.0], &[false, true, true], 10);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[9].count, 2);
        assert_eq!(bins[9].actual_rate, 1.0);
    }
}
