//! Gradient-boosted decision trees for binary logistic loss.
//!
//! Trees are grown leaf-wise over per-feature quantile histograms. Split
//! thresholds are stored as raw feature values: a row goes left when
//! `x[feature] <= threshold`.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DraftError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterParams {
    pub n_trees: usize,
    pub learning_rate: f64,
    pub num_leaves: usize,
    /// `None` is unlimited depth.
    pub max_depth: Option<usize>,
    /// Fraction of rows drawn without replacement for each tree.
    pub subsample: f64,
    /// Fraction of features drawn for each tree.
    pub colsample: f64,
    pub reg_lambda: f64,
    pub min_child_samples: usize,
    pub min_child_weight: f64,
    pub max_bins: usize,
    pub seed: u64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            n_trees: 600,
            learning_rate: 0.03,
            num_leaves: 64,
            max_depth: None,
            subsample: 0.8,
            colsample: 0.8,
            reg_lambda: 1.0,
            min_child_samples: 20,
            min_child_weight: 1e-3,
            max_bins: 255,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Flat node arena; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = row.get(*feature).copied().unwrap_or(0.0);
                    idx = if x <= *threshold { *left } else { *right };
                }
                Some(Node::Leaf { value }) => return *value,
                None => return 0.0,
            }
        }
    }

    pub fn leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    pub n_features: usize,
    /// Log-odds of the training positive rate.
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl GradientBoostedTrees {
    pub fn fit(
        rows: &[Vec<f64>],
        labels: &[bool],
        params: &BoosterParams,
    ) -> Result<Self, DraftError> {
        if rows.is_empty() || rows.len() != labels.len() {
            return Err(DraftError::EmptyDataset);
        }
        let n = rows.len();
        let positives = labels.iter().filter(|y| **y).count();
        if positives == 0 || positives == n {
            return Err(DraftError::SingleClass {
                class: positives == n,
            });
        }
        let n_features = rows[0].len();
        let rate = positives as f64 / n as f64;
        let base_score = (rate / (1.0 - rate)).ln();

        let bins = BinnedMatrix::build(rows, n_features, params.max_bins.clamp(2, 256));
        let targets: Vec<f64> = labels.iter().map(|y| if *y { 1.0 } else { 0.0 }).collect();
        let mut raw = vec![base_score; n];
        let mut rng = StdRng::seed_from_u64(params.seed);

        let bag_size = ((n as f64 * params.subsample.clamp(0.0, 1.0)).round() as usize).clamp(1, n);
        let col_count = if n_features == 0 {
            0
        } else {
            ((n_features as f64 * params.colsample.clamp(0.0, 1.0)).round() as usize)
                .clamp(1, n_features)
        };

        let mut trees = Vec::with_capacity(params.n_trees);
        let mut grad = vec![0.0_f64; n];
        let mut hess = vec![0.0_f64; n];
        for round in 0..params.n_trees {
            for i in 0..n {
                let p = sigmoid(raw[i]);
                grad[i] = p - targets[i];
                hess[i] = p * (1.0 - p);
            }
            let mut sample = if bag_size == n {
                (0..n).collect::<Vec<_>>()
            } else {
                index::sample(&mut rng, n, bag_size).into_vec()
            };
            sample.sort_unstable();
            let mut features = if col_count == n_features {
                (0..n_features).collect::<Vec<_>>()
            } else {
                index::sample(&mut rng, n_features, col_count).into_vec()
            };
            features.sort_unstable();

            let tree = TreeGrower {
                bins: &bins,
                grad: &grad,
                hess: &hess,
                features: &features,
                params,
            }
            .grow(sample);
            for (r, row) in raw.iter_mut().zip(rows) {
                *r += tree.predict(row);
            }
            if round % 100 == 0 {
                debug!(round, leaves = tree.leaves(), "boosting round");
            }
            trees.push(tree);
        }

        Ok(Self {
            n_features,
            base_score,
            trees,
        })
    }

    pub fn predict_raw(&self, row: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    /// Probability of the positive class.
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        sigmoid(self.predict_raw(row))
    }
}

/// Column-major bin indices plus the upper edge of every bin.
struct BinnedMatrix {
    bins: Vec<Vec<u8>>,
    upper: Vec<Vec<f64>>,
}

impl BinnedMatrix {
    fn build(rows: &[Vec<f64>], n_features: usize, max_bins: usize) -> Self {
        let (bins, upper): (Vec<_>, Vec<_>) = (0..n_features)
            .into_par_iter()
            .map(|f| {
                let column: Vec<f64> =
                    rows.iter().map(|r| r.get(f).copied().unwrap_or(0.0)).collect();
                let upper = bin_edges(&column, max_bins);
                let binned: Vec<u8> = column
                    .iter()
                    .map(|x| upper.partition_point(|e| e < x).min(upper.len() - 1) as u8)
                    .collect();
                (binned, upper)
            })
            .unzip();
        Self { bins, upper }
    }
}

/// Upper edges of up to `max_bins` quantile bins. The last edge is always
/// infinite so every value lands in a bin.
fn bin_edges(column: &[f64], max_bins: usize) -> Vec<f64> {
    let mut sorted: Vec<f64> = column.iter().copied().filter(|x| x.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    let mut distinct = sorted.clone();
    distinct.dedup();

    let mut edges: Vec<f64> = if distinct.len() <= max_bins {
        distinct
    } else {
        let mut out = Vec::with_capacity(max_bins);
        for k in 1..max_bins {
            let pos = (k * sorted.len()) / max_bins;
            out.push(sorted[pos.min(sorted.len() - 1)]);
        }
        out.dedup();
        out
    };
    if edges.len() >= max_bins {
        edges.pop();
    }
    edges.push(f64::INFINITY);
    edges
}

#[derive(Debug, Clone, Copy, Default)]
struct BinStat {
    grad: f64,
    hess: f64,
    count: usize,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

struct GrowingLeaf {
    node: usize,
    depth: usize,
    rows: Vec<usize>,
    best: Option<SplitCandidate>,
}

struct TreeGrower<'a> {
    bins: &'a BinnedMatrix,
    grad: &'a [f64],
    hess: &'a [f64],
    features: &'a [usize],
    params: &'a BoosterParams,
}

impl TreeGrower<'_> {
    fn grow(&self, rows: Vec<usize>) -> Tree {
        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut leaves = vec![self.leaf(0, 0, rows)];

        while leaves.len() < self.params.num_leaves.max(1) {
            let pick = leaves
                .iter()
                .enumerate()
                .filter_map(|(i, l)| l.best.map(|b| (i, b.gain)))
                .fold(None, |acc: Option<(usize, f64)>, (i, g)| match acc {
                    Some((_, best)) if best >= g => acc,
                    _ => Some((i, g)),
                });
            let Some((pos, _)) = pick else {
                break;
            };
            let leaf = leaves.swap_remove(pos);
            let Some(split) = leaf.best else {
                break;
            };

            let column = &self.bins.bins[split.feature];
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = leaf
                .rows
                .into_iter()
                .partition(|&i| usize::from(column[i]) <= split.bin);

            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf { value: 0.0 });
            nodes.push(Node::Leaf { value: 0.0 });
            nodes[leaf.node] = Node::Split {
                feature: split.feature,
                threshold: self.bins.upper[split.feature][split.bin],
                left,
                right,
            };
            leaves.push(self.leaf(left, leaf.depth + 1, left_rows));
            leaves.push(self.leaf(right, leaf.depth + 1, right_rows));
        }

        for leaf in &leaves {
            let (g, h) = leaf
                .rows
                .iter()
                .fold((0.0, 0.0), |(g, h), &i| (g + self.grad[i], h + self.hess[i]));
            nodes[leaf.node] = Node::Leaf {
                value: -g / (h + self.params.reg_lambda) * self.params.learning_rate,
            };
        }
        Tree { nodes }
    }

    fn leaf(&self, node: usize, depth: usize, rows: Vec<usize>) -> GrowingLeaf {
        let depth_ok = self.params.max_depth.is_none_or(|d| depth < d);
        let best = if depth_ok && rows.len() >= 2 * self.params.min_child_samples.max(1) {
            self.best_split(&rows)
        } else {
            None
        };
        GrowingLeaf {
            node,
            depth,
            rows,
            best,
        }
    }

    fn best_split(&self, rows: &[usize]) -> Option<SplitCandidate> {
        let candidates: Vec<Option<SplitCandidate>> = self
            .features
            .par_iter()
            .map(|&f| self.best_split_for_feature(f, rows))
            .collect();
        // Sequential fold keeps ties on the lowest feature index.
        candidates.into_iter().flatten().fold(None, |acc, c| match acc {
            Some(best) if best.gain >= c.gain => Some(best),
            _ => Some(c),
        })
    }

    fn best_split_for_feature(&self, feature: usize, rows: &[usize]) -> Option<SplitCandidate> {
        let n_bins = self.bins.upper[feature].len();
        if n_bins < 2 {
            return None;
        }
        let column = &self.bins.bins[feature];
        let mut hist = vec![BinStat::default(); n_bins];
        for &i in rows {
            let b = &mut hist[usize::from(column[i])];
            b.grad += self.grad[i];
            b.hess += self.hess[i];
            b.count += 1;
        }
        let total = hist.iter().fold(BinStat::default(), |acc, b| BinStat {
            grad: acc.grad + b.grad,
            hess: acc.hess + b.hess,
            count: acc.count + b.count,
        });

        let lambda = self.params.reg_lambda;
        let min_count = self.params.min_child_samples.max(1);
        let min_hess = self.params.min_child_weight;
        let parent = total.grad * total.grad / (total.hess + lambda);

        let mut left = BinStat::default();
        let mut best: Option<SplitCandidate> = None;
        for (bin, stat) in hist.iter().enumerate().take(n_bins - 1) {
            left.grad += stat.grad;
            left.hess += stat.hess;
            left.count += stat.count;
            let right_count = total.count - left.count;
            let right_hess = total.hess - left.hess;
            if left.count < min_count || left.hess < min_hess {
                continue;
            }
            if right_count < min_count || right_hess < min_hess {
                break;
            }
            let right_grad = total.grad - left.grad;
            let gain = left.grad * left.grad / (left.hess + lambda)
                + right_grad * right_grad / (right_hess + lambda)
                - parent;
            if gain > 0.0 && best.is_none_or(|b| gain > b.gain) {
                best = Some(SplitCandidate { feature, bin, gain });
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable(n: usize) -> (Vec<Vec<f64>>, Vec<bool>) {
        let rows: Vec<Vec<f64>> = (0..n)
            .map(|i| vec![i as f64 / n as f64, ((i * 7) % 11) as f64])
            .collect();
        let labels = rows.iter().map(|r| r[0] > 0.5).collect();
        (rows, labels)
    }

    #[test]
    fn bin_edges_cap_the_bin_count() {
        let column: Vec<f64> = (0..1000).map(f64::from).collect();
        let edges = bin_edges(&column, 16);
        assert!(edges.len() <= 16);
        assert_eq!(edges.last().copied(), Some(f64::INFINITY));
        let few = bin_edges(&[3.0, 1.0, 3.0, 2.0], 255);
        assert_eq!(few, vec![1.0, 2.0, 3.0, f64::INFINITY]);
    }

    #[test]
    fn learns_a_threshold() {
        let (rows, labels) = separable(400);
        let params = BoosterParams {
            n_trees: 60,
            learning_rate: 0.2,
            ..Default::default()
        };
        let model = GradientBoostedTrees::fit(&rows, &labels, &params).unwrap();
        assert!(model.predict_proba(&[0.9, 3.0]) > 0.8);
        assert!(model.predict_proba(&[0.1, 3.0]) < 0.2);
    }

    #[test]
    fn too_few_rows_to_split_predicts_the_base_rate() {
        let rows = vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]];
        let labels = vec![true, false, false, false];
        let params = BoosterParams {
            n_trees: 5,
            subsample: 1.0,
            ..Default::default()
        };
        let model = GradientBoostedTrees::fit(&rows, &labels, &params).unwrap();
        assert!(model.trees.iter().all(|t| t.leaves() == 1));
        assert!((model.predict_proba(&[0.0]) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn same_seed_same_model() {
        let (rows, labels) = separable(200);
        let params = BoosterParams {
            n_trees: 10,
            ..Default::default()
        };
        let a = GradientBoostedTrees::fit(&rows, &labels, &params).unwrap();
        let b = GradientBoostedTrees::fit(&rows, &labels, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn single_class_is_rejected() {
        let rows = vec![vec![0.0], vec![1.0]];
        let err = GradientBoostedTrees::fit(&rows, &[true, true], &BoosterParams::default())
            .unwrap_err();
        assert_eq!(err, DraftError::SingleClass { class: true });
    }
}
