//! Ансамбли деревьев и сохраняемая обученная модель

#![allow(non_snake_case)]

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::family::ModelParams;
use super::oblivious::ObliviousTree;
use super::tree::RegressionTree;
use crate::error::{ErrorKind, HousingError, Result, ResultExt};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Tree {
    Binary(RegressionTree),
    Oblivious(ObliviousTree),
}

impl Tree {
    pub fn validate(&self, n_features: usize) -> Result<()> {
        match self {
            Tree::Binary(tree) => tree.validate(n_features),
            Tree::Oblivious(tree) => tree.validate(n_features),
        }
    }

    pub fn predict_row(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            Tree::Binary(tree) => tree.predict_row(sample),
            Tree::Oblivious(tree) => tree.predict_row(sample),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Aggregation {
    /// base_score + learning_rate * сумма деревьев
    Boosted { base_score: f64, learning_rate: f64 },
    /// Среднее по деревьям
    Averaged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    aggregation: Aggregation,
    trees: Vec<Tree>,
}

impl TreeEnsemble {
    pub fn new(aggregation: Aggregation, trees: Vec<Tree>) -> Self {
        Self { aggregation, trees }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn validate(&self, n_features: usize) -> Result<()> {
        if self.trees.is_empty() {
            return Err(HousingError::new(ErrorKind::Artifact, "ensemble has no trees"));
        }
        if let Aggregation::Boosted {
            base_score,
            learning_rate,
        } = self.aggregation
        {
            if !base_score.is_finite() || !learning_rate.is_finite() {
                return Err(HousingError::new(ErrorKind::Artifact, "boosted ensemble has non-finite coefficients"));
            }
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(n_features)
                .wrap_err_with(ErrorKind::Artifact, || format!("tree {} is inconsistent", i))?;
        }
        Ok(())
    }

    fn combine(&self, sum: f64, n_trees: usize) -> f64 {
        match self.aggregation {
            Aggregation::Boosted {
                base_score,
                learning_rate,
            } => base_score + learning_rate * sum,
            Aggregation::Averaged if n_trees > 0 => sum / n_trees as f64,
            Aggregation::Averaged => 0.0,
        }
    }

    pub fn predict(&self, X: &Array2<f64>) -> Array1<f64> {
        X.rows()
            .into_iter()
            .map(|row| {
                let sum: f64 = self.trees.iter().map(|tree| tree.predict_row(row)).sum();
                self.combine(sum, self.trees.len())
            })
            .collect()
    }

    /// Предсказания первых `counts[k]` деревьев для каждого k за один проход.
    /// `counts` должны быть отсортированы по возрастанию и не превышать число деревьев.
    pub fn staged_predict(&self, X: &Array2<f64>, counts: &[usize]) -> Vec<Array1<f64>> {
        let mut stages = vec![Array1::zeros(X.nrows()); counts.len()];

        for (i, row) in X.rows().into_iter().enumerate() {
            let mut sum = 0.0;
            let mut used = 0;
            for (stage, &count) in counts.iter().enumerate() {
                while used < count.min(self.trees.len()) {
                    sum += self.trees[used].predict_row(row);
                    used += 1;
                }
                stages[stage][i] = self.combine(sum, used);
            }
        }

        stages
    }
}

/// Победившая модель вместе с параметрами, с которыми она обучалась
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub params: ModelParams,
    pub n_features: usize,
    pub ensemble: TreeEnsemble,
}

impl TrainedModel {
    /// Модель из артефакта не должна паниковать при предсказании
    pub fn validate(&self) -> Result<()> {
        if self.n_features == 0 {
            return Err(HousingError::new(ErrorKind::Artifact, "model expects zero features"));
        }
        self.ensemble.validate(self.n_features)
    }

    pub fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        if X.ncols() != self.n_features {
            return Err(HousingError::new(
                ErrorKind::Inference,
                format!("model expects {} features, got {}", self.n_features, X.ncols()),
            ));
        }
        Ok(self.ensemble.predict(X))
    }
}
