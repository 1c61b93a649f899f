//! Регрессионное дерево с L2-регуляризацией листьев

#![allow(non_snake_case)]

use std::collections::VecDeque;

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::binning::BinBorders;
use crate::error::{ErrorKind, HousingError, Result};

/// Относительный минимальный прирост, ниже которого разбиение не делается
const MIN_RELATIVE_GAIN: f64 = 1e-12;

/// Как выбираются кандидаты в пороги
#[derive(Debug, Clone)]
pub enum Thresholds {
    /// Середины между всеми соседними значениями
    Exact,
    /// Только границы гистограммы
    Binned(BinBorders),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    /// Ограничение на число листьев включает рост "лучший лист первым"
    pub max_leaves: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// L2-штраф на вес листа: value = sum / (n + lambda)
    pub lambda: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            max_leaves: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            lambda: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Бинарное дерево; узлы хранятся плоско, корень под индексом 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct Pending {
    node: usize,
    depth: usize,
    rows: Vec<usize>,
    split: SplitCandidate,
}

impl RegressionTree {
    /// Обучение на целевых значениях `targets` (для бустинга это остатки) по строкам `rows`.
    /// Строки могут повторяться (бутстрэп).
    pub fn fit(X: &Array2<f64>, targets: &[f64], rows: &[usize], params: &TreeParams, thresholds: &Thresholds) -> Self {
        let builder = Builder {
            X,
            targets,
            params,
            thresholds,
        };
        builder.build(rows)
    }

    pub fn predict_row(&self, sample: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if sample[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Проверка дерева из артефакта: дети всегда правее родителя, так что обход конечен
    pub fn validate(&self, n_features: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(HousingError::new(ErrorKind::Artifact, "tree has no nodes"));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { value } if !value.is_finite() => {
                    return Err(HousingError::new(ErrorKind::Artifact, format!("leaf {} has a non-finite value", idx)));
                }
                TreeNode::Leaf { .. } => {}
                TreeNode::Split {
                    feature, left, right, ..
                } => {
                    if *feature >= n_features {
                        return Err(HousingError::new(
                            ErrorKind::Artifact,
                            format!("node {} splits on feature {} of {}", idx, feature, n_features),
                        ));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(HousingError::new(
                                ErrorKind::Artifact,
                                format!("node {} points to child {} of {} nodes", idx, child, self.nodes.len()),
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, TreeNode::Leaf { .. })).count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

struct Builder<'a> {
    X: &'a Array2<f64>,
    targets: &'a [f64],
    params: &'a TreeParams,
    thresholds: &'a Thresholds,
}

impl Builder<'_> {
    fn build(&self, rows: &[usize]) -> RegressionTree {
        let mut nodes = vec![TreeNode::Leaf {
            value: self.leaf_value(rows),
        }];
        let mut n_leaves = 1;

        let mut frontier: VecDeque<Pending> = VecDeque::new();
        if let Some(split) = self.best_split(rows, 0) {
            frontier.push_back(Pending {
                node: 0,
                depth: 0,
                rows: rows.to_vec(),
                split,
            });
        }

        while let Some(pending) = self.next_pending(&mut frontier) {
            if self.params.max_leaves.is_some_and(|max| n_leaves >= max) {
                break;
            }

            let SplitCandidate { feature, threshold, .. } = pending.split;
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
                pending.rows.iter().partition(|&&i| self.X[[i, feature]] <= threshold);

            let left = nodes.len();
            nodes.push(TreeNode::Leaf {
                value: self.leaf_value(&left_rows),
            });
            let right = nodes.len();
            nodes.push(TreeNode::Leaf {
                value: self.leaf_value(&right_rows),
            });
            nodes[pending.node] = TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            };
            n_leaves += 1;

            let depth = pending.depth + 1;
            for (node, child_rows) in [(left, left_rows), (right, right_rows)] {
                if let Some(split) = self.best_split(&child_rows, depth) {
                    frontier.push_back(Pending {
                        node,
                        depth,
                        rows: child_rows,
                        split,
                    });
                }
            }
        }

        RegressionTree { nodes }
    }

    /// Без ограничения на листья порядок раскрытия не влияет на дерево, берём FIFO.
    /// С ограничением раскрываем лист с максимальным приростом (первый при равенстве).
    fn next_pending(&self, frontier: &mut VecDeque<Pending>) -> Option<Pending> {
        if self.params.max_leaves.is_none() {
            return frontier.pop_front();
        }
        let mut best: Option<usize> = None;
        for (i, pending) in frontier.iter().enumerate() {
            if best.map_or(true, |b| pending.split.gain > frontier[b].split.gain) {
                best = Some(i);
            }
        }
        best.and_then(|i| frontier.remove(i))
    }

    fn leaf_value(&self, rows: &[usize]) -> f64 {
        if rows.is_empty() {
            return 0.0;
        }
        let sum: f64 = rows.iter().map(|&i| self.targets[i]).sum();
        sum / (rows.len() as f64 + self.params.lambda)
    }

    fn score(&self, sum: f64, count: f64) -> f64 {
        sum * sum / (count + self.params.lambda)
    }

    fn best_split(&self, rows: &[usize], depth: usize) -> Option<SplitCandidate> {
        let n = rows.len();
        if self.params.max_depth.is_some_and(|max| depth >= max)
            || n < self.params.min_samples_split.max(2)
            || n < 2 * self.params.min_samples_leaf.max(1)
        {
            return None;
        }

        let total: f64 = rows.iter().map(|&i| self.targets[i]).sum();
        let parent = self.score(total, n as f64);
        let min_gain = MIN_RELATIVE_GAIN * (1.0 + parent.abs());
        let min_leaf = self.params.min_samples_leaf.max(1);

        let mut best: Option<SplitCandidate> = None;
        let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);

        for feature in 0..self.X.ncols() {
            pairs.clear();
            pairs.extend(rows.iter().map(|&i| (self.X[[i, feature]], self.targets[i])));
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_sum = 0.0;
            for pos in 0..n - 1 {
                left_sum += pairs[pos].1;
                let left_n = pos + 1;
                let (a, b) = (pairs[pos].0, pairs[pos + 1].0);

                if a >= b || left_n < min_leaf || n - left_n < min_leaf {
                    continue;
                }
                let threshold = match self.thresholds {
                    Thresholds::Exact => {
                        let mid = (a + b) / 2.0;
                        if mid < b { mid } else { a }
                    }
                    Thresholds::Binned(bins) => match bins.threshold_between(feature, a, b) {
                        Some(threshold) => threshold,
                        None => continue,
                    },
                };

                let gain = self.score(left_sum, left_n as f64) + self.score(total - left_sum, (n - left_n) as f64) - parent;
                if gain > min_gain && best.as_ref().map_or(true, |s| gain > s.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }

        best
    }
}
