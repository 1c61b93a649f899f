//! Семейства регрессоров, их сетки гиперпараметров и обучение

#![allow(non_snake_case)]

use std::fmt;

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::binning::BinBorders;
use super::ensemble::{Aggregation, Tree, TreeEnsemble};
use super::oblivious::ObliviousTree;
use super::tree::{RegressionTree, Thresholds, TreeParams};
use crate::error::{ErrorKind, HousingError, Result};

/// Потолок глубины: у симметричного дерева 2^depth листьев
pub const MAX_DEPTH: usize = 16;

const ESTIMATOR_STEPS: [usize; 6] = [8, 16, 32, 64, 128, 256];
const BOOST_RATES: [f64; 4] = [0.1, 0.01, 0.05, 0.001];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Бустинг с L2-регуляризацией листьев, точные разбиения по глубине
    RegularizedBoost,
    /// Бустинг симметричных деревьев на гистограммных границах
    ObliviousBoost,
    /// Бустинг с ростом по листьям (best-first) на гистограммах
    LeafwiseBoost,
    /// Классический градиентный бустинг со случайной подвыборкой строк
    GradientBoosting,
    /// Бэггинг полностью выращенных деревьев
    RandomForest,
}

impl ModelFamily {
    /// Порядок перечисления задаёт и порядок при равенстве скоров
    pub const ALL: [ModelFamily; 5] = [
        ModelFamily::RegularizedBoost,
        ModelFamily::ObliviousBoost,
        ModelFamily::LeafwiseBoost,
        ModelFamily::GradientBoosting,
        ModelFamily::RandomForest,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::RegularizedBoost => "regularized_boost",
            ModelFamily::ObliviousBoost => "oblivious_boost",
            ModelFamily::LeafwiseBoost => "leafwise_boost",
            ModelFamily::GradientBoosting => "gradient_boosting",
            ModelFamily::RandomForest => "random_forest",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Одна конкретная конфигурация регрессора
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub family: ModelFamily,
    pub learning_rate: f64,
    /// None: значение семейства по умолчанию (для леса и leaf-wise без ограничения)
    pub max_depth: Option<usize>,
    pub subsample: f64,
    pub n_estimators: usize,
}

impl ModelParams {
    pub fn default_for(family: ModelFamily) -> Self {
        Self {
            family,
            learning_rate: 0.1,
            max_depth: None,
            subsample: 1.0,
            n_estimators: 100,
        }
    }
}

impl fmt::Display for ModelParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} n_estimators={}", self.family, self.n_estimators)?;
        if self.family != ModelFamily::RandomForest {
            write!(f, " learning_rate={}", self.learning_rate)?;
        }
        if let Some(depth) = self.max_depth {
            write!(f, " max_depth={}", depth)?;
        }
        if self.subsample < 1.0 {
            write!(f, " subsample={}", self.subsample)?;
        }
        Ok(())
    }
}

/// Сетка перебора для одного семейства. Пустой список означает значение по умолчанию.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub family: ModelFamily,
    #[serde(default)]
    pub learning_rate: Vec<f64>,
    #[serde(default)]
    pub max_depth: Vec<Option<usize>>,
    #[serde(default)]
    pub subsample: Vec<f64>,
    pub n_estimators: Vec<usize>,
}

impl ParamGrid {
    pub fn default_for(family: ModelFamily) -> Self {
        let mut grid = Self {
            family,
            learning_rate: Vec::new(),
            max_depth: Vec::new(),
            subsample: Vec::new(),
            n_estimators: ESTIMATOR_STEPS.to_vec(),
        };

        match family {
            ModelFamily::RegularizedBoost => {
                grid.learning_rate = BOOST_RATES.to_vec();
            }
            ModelFamily::ObliviousBoost => {
                grid.max_depth = vec![Some(6), Some(8), Some(10)];
                grid.learning_rate = vec![0.01, 0.05, 0.1];
                grid.n_estimators = vec![30, 50, 100];
            }
            ModelFamily::LeafwiseBoost => {
                grid.learning_rate = vec![0.1, 0.01, 0.5, 0.001];
                grid.max_depth = vec![Some(6), Some(8), Some(10)];
            }
            ModelFamily::GradientBoosting => {
                grid.learning_rate = BOOST_RATES.to_vec();
                grid.subsample = vec![0.6, 0.7, 0.75, 0.8, 0.85, 0.9];
            }
            ModelFamily::RandomForest => {}
        }

        grid
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(HousingError::new(ErrorKind::Config, message));

        if self.n_estimators.is_empty() || self.n_estimators.contains(&0) {
            return invalid(format!("{}: n_estimators must be a non-empty list of positive counts", self.family));
        }
        if let Some(rate) = self.learning_rate.iter().find(|r| !(**r > 0.0 && r.is_finite())) {
            return invalid(format!("{}: learning_rate must be positive, got {}", self.family, rate));
        }
        if let Some(ratio) = self.subsample.iter().find(|s| !(**s > 0.0 && **s <= 1.0)) {
            return invalid(format!("{}: subsample must be in (0, 1], got {}", self.family, ratio));
        }
        if let Some(depth) = self.max_depth.iter().flatten().find(|d| **d == 0 || **d > MAX_DEPTH) {
            return invalid(format!("{}: max_depth must be in 1..={}, got {}", self.family, MAX_DEPTH, depth));
        }
        Ok(())
    }

    /// Число деревьев по возрастанию, без повторов
    pub fn estimator_counts(&self) -> Vec<usize> {
        let mut counts = self.n_estimators.clone();
        counts.sort_unstable();
        counts.dedup();
        counts
    }

    /// Все комбинации кроме n_estimators (он перебирается через staged-предсказания).
    /// У каждой комбинации n_estimators равен максимуму сетки.
    pub fn base_params(&self) -> Vec<ModelParams> {
        let defaults = ModelParams::default_for(self.family);
        let n_estimators = self.n_estimators.iter().copied().max().unwrap_or(defaults.n_estimators);

        let rates = or_default(&self.learning_rate, defaults.learning_rate);
        let depths = or_default(&self.max_depth, defaults.max_depth);
        let ratios = or_default(&self.subsample, defaults.subsample);

        let mut combinations = Vec::with_capacity(rates.len() * depths.len() * ratios.len());
        for &learning_rate in &rates {
            for &max_depth in &depths {
                for &subsample in &ratios {
                    combinations.push(ModelParams {
                        family: self.family,
                        learning_rate,
                        max_depth,
                        subsample,
                        n_estimators,
                    });
                }
            }
        }
        combinations
    }
}

fn or_default<T: Copy>(values: &[T], default: T) -> Vec<T> {
    if values.is_empty() {
        vec![default]
    } else {
        values.to_vec()
    }
}

/// Слабый learner одной итерации бустинга
enum Learner {
    Binary { params: TreeParams, thresholds: Thresholds },
    Oblivious { depth: usize, lambda: f64, bins: BinBorders },
}

impl Learner {
    fn fit(&self, X: &Array2<f64>, targets: &[f64], rows: &[usize]) -> Tree {
        match self {
            Learner::Binary { params, thresholds } => {
                Tree::Binary(RegressionTree::fit(X, targets, rows, params, thresholds))
            }
            Learner::Oblivious { depth, lambda, bins } => {
                Tree::Oblivious(ObliviousTree::fit(X, targets, rows, *depth, *lambda, bins))
            }
        }
    }
}

/// Обучает ансамбль с `params.n_estimators` деревьями.
/// Первые k деревьев совпадают с ансамблем, обученным с n_estimators = k.
pub fn fit_ensemble(params: &ModelParams, X: &Array2<f64>, y: &Array1<f64>, seed: u64) -> Result<TreeEnsemble> {
    check_training_data(X, y)?;
    debug!("Fitting {} on {} rows", params, X.nrows());

    let ensemble = match params.family {
        ModelFamily::RegularizedBoost => {
            let learner = Learner::Binary {
                params: TreeParams {
                    max_depth: Some(params.max_depth.unwrap_or(6)),
                    lambda: 1.0,
                    ..TreeParams::default()
                },
                thresholds: Thresholds::Exact,
            };
            boost(X, y, params, &learner, seed)
        }
        ModelFamily::ObliviousBoost => {
            let learner = Learner::Oblivious {
                depth: params.max_depth.unwrap_or(6),
                lambda: 3.0,
                bins: BinBorders::fit(X, 255),
            };
            boost(X, y, params, &learner, seed)
        }
        ModelFamily::LeafwiseBoost => {
            let learner = Learner::Binary {
                params: TreeParams {
                    max_depth: params.max_depth,
                    max_leaves: Some(31),
                    min_samples_leaf: 20,
                    ..TreeParams::default()
                },
                thresholds: Thresholds::Binned(BinBorders::fit(X, 255)),
            };
            boost(X, y, params, &learner, seed)
        }
        ModelFamily::GradientBoosting => {
            let learner = Learner::Binary {
                params: TreeParams {
                    max_depth: Some(params.max_depth.unwrap_or(3)),
                    ..TreeParams::default()
                },
                thresholds: Thresholds::Exact,
            };
            boost(X, y, params, &learner, seed)
        }
        ModelFamily::RandomForest => forest(X, y, params, seed),
    };

    Ok(ensemble)
}

fn check_training_data(X: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if X.nrows() == 0 || X.ncols() == 0 {
        return Err(HousingError::new(ErrorKind::Training, "cannot fit a model on an empty matrix"));
    }
    if X.nrows() != y.len() {
        return Err(HousingError::new(
            ErrorKind::Training,
            format!("feature matrix has {} rows but target has {}", X.nrows(), y.len()),
        ));
    }
    if X.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(HousingError::new(ErrorKind::Training, "training data contains non-finite values"));
    }
    Ok(())
}

fn boost(X: &Array2<f64>, y: &Array1<f64>, params: &ModelParams, learner: &Learner, seed: u64) -> TreeEnsemble {
    let n = X.nrows();
    let base_score = y.sum() / n as f64;
    let mut predictions = vec![base_score; n];
    let mut rng = StdRng::seed_from_u64(seed);

    let sample_size = ((n as f64 * params.subsample).round() as usize).clamp(1, n);
    let all_rows: Vec<usize> = (0..n).collect();

    let mut trees = Vec::with_capacity(params.n_estimators);
    for _ in 0..params.n_estimators {
        let residuals: Vec<f64> = y.iter().zip(&predictions).map(|(target, pred)| target - pred).collect();

        let rows = if sample_size < n {
            let mut rows = index::sample(&mut rng, n, sample_size).into_vec();
            rows.sort_unstable();
            rows
        } else {
            all_rows.clone()
        };

        let tree = learner.fit(X, &residuals, &rows);
        for (i, row) in X.rows().into_iter().enumerate() {
            predictions[i] += params.learning_rate * tree.predict_row(row);
        }
        trees.push(tree);
    }

    TreeEnsemble::new(
        Aggregation::Boosted {
            base_score,
            learning_rate: params.learning_rate,
        },
        trees,
    )
}

fn forest(X: &Array2<f64>, y: &Array1<f64>, params: &ModelParams, seed: u64) -> TreeEnsemble {
    let n = X.nrows();
    let targets = y.to_vec();
    let tree_params = TreeParams {
        max_depth: params.max_depth,
        ..TreeParams::default()
    };

    let trees = (0..params.n_estimators)
        .map(|t| {
            // Своё зерно на каждое дерево: лес из k деревьев является префиксом большего
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
            let mut rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            rows.sort_unstable();
            Tree::Binary(RegressionTree::fit(X, &targets, &rows, &tree_params, &Thresholds::Exact))
        })
        .collect();

    TreeEnsemble::new(Aggregation::Averaged, trees)
}
