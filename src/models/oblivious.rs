//! Симметричное (oblivious) дерево: одно и то же разбиение на всём уровне

#![allow(non_snake_case)]

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::binning::BinBorders;
use super::family::MAX_DEPTH;
use crate::error::{ErrorKind, HousingError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObliviousTree {
    /// (признак, порог) для каждого уровня
    splits: Vec<(usize, f64)>,
    /// 2^depth листьев, индекс собирается из битов `x > threshold`
    leaf_values: Vec<f64>,
}

impl ObliviousTree {
    pub fn fit(X: &Array2<f64>, targets: &[f64], rows: &[usize], depth: usize, lambda: f64, bins: &BinBorders) -> Self {
        // Порядок строк по каждому признаку не меняется между уровнями
        let sorted: Vec<Vec<usize>> = (0..X.ncols())
            .map(|feature| {
                let mut order = rows.to_vec();
                order.sort_by(|&a, &b| X[[a, feature]].total_cmp(&X[[b, feature]]));
                order
            })
            .collect();

        let mut leaf_of = vec![0usize; X.nrows()];
        let mut splits = Vec::with_capacity(depth);

        for level in 0..depth {
            let n_leaves = 1usize << level;
            let mut sums = vec![0.0; n_leaves];
            let mut counts = vec![0.0; n_leaves];
            for &i in rows {
                sums[leaf_of[i]] += targets[i];
                counts[leaf_of[i]] += 1.0;
            }

            let mut best: Option<(usize, f64, f64)> = None;
            let mut left_sums = vec![0.0; n_leaves];
            let mut left_counts = vec![0.0; n_leaves];

            for (feature, order) in sorted.iter().enumerate() {
                left_sums.iter_mut().for_each(|v| *v = 0.0);
                left_counts.iter_mut().for_each(|v| *v = 0.0);

                for pos in 0..order.len().saturating_sub(1) {
                    let i = order[pos];
                    left_sums[leaf_of[i]] += targets[i];
                    left_counts[leaf_of[i]] += 1.0;

                    let (a, b) = (X[[i, feature]], X[[order[pos + 1], feature]]);
                    if a >= b {
                        continue;
                    }
                    let Some(threshold) = bins.threshold_between(feature, a, b) else {
                        continue;
                    };

                    let score: f64 = (0..n_leaves)
                        .map(|leaf| {
                            let (ls, lc) = (left_sums[leaf], left_counts[leaf]);
                            let (rs, rc) = (sums[leaf] - ls, counts[leaf] - lc);
                            leaf_score(ls, lc, lambda) + leaf_score(rs, rc, lambda)
                        })
                        .sum();

                    if best.map_or(true, |(_, _, best_score)| score > best_score) {
                        best = Some((feature, threshold, score));
                    }
                }
            }

            // Все признаки константны на выборке: дерево остаётся мельче
            let Some((feature, threshold, _)) = best else {
                break;
            };
            for &i in rows {
                if X[[i, feature]] > threshold {
                    leaf_of[i] |= 1 << level;
                }
            }
            splits.push((feature, threshold));
        }

        let n_leaves = 1usize << splits.len();
        let mut sums = vec![0.0; n_leaves];
        let mut counts = vec![0.0; n_leaves];
        for &i in rows {
            sums[leaf_of[i]] += targets[i];
            counts[leaf_of[i]] += 1.0;
        }
        let leaf_values = sums
            .iter()
            .zip(&counts)
            .map(|(sum, count)| if *count > 0.0 { sum / (count + lambda) } else { 0.0 })
            .collect();

        Self { splits, leaf_values }
    }

    pub fn predict_row(&self, sample: ArrayView1<f64>) -> f64 {
        let leaf = self
            .splits
            .iter()
            .enumerate()
            .fold(0usize, |leaf, (level, &(feature, threshold))| {
                if sample[feature] > threshold {
                    leaf | (1 << level)
                } else {
                    leaf
                }
            });
        self.leaf_values[leaf]
    }

    pub fn depth(&self) -> usize {
        self.splits.len()
    }

    pub fn validate(&self, n_features: usize) -> Result<()> {
        if self.splits.len() > MAX_DEPTH {
            return Err(HousingError::new(
                ErrorKind::Artifact,
                format!("oblivious tree has {} levels, at most {} allowed", self.splits.len(), MAX_DEPTH),
            ));
        }
        if let Some((feature, _)) = self.splits.iter().find(|(feature, _)| *feature >= n_features) {
            return Err(HousingError::new(
                ErrorKind::Artifact,
                format!("oblivious tree splits on feature {} of {}", feature, n_features),
            ));
        }
        if self.leaf_values.len() != 1 << self.splits.len() {
            return Err(HousingError::new(
                ErrorKind::Artifact,
                format!("oblivious tree of depth {} has {} leaves", self.splits.len(), self.leaf_values.len()),
            ));
        }
        if self.leaf_values.iter().any(|v| !v.is_finite()) {
            return Err(HousingError::new(ErrorKind::Artifact, "oblivious tree has a non-finite leaf"));
        }
        Ok(())
    }
}

/// Пустая половина листа ничего не добавляет (и не даёт 0/0 при lambda = 0)
fn leaf_score(sum: f64, count: f64, lambda: f64) -> f64 {
    if count > 0.0 {
        sum * sum / (count + lambda)
    } else {
        0.0
    }
}
