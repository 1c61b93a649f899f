//! Подбор гиперпараметров по семействам и выбор лучшей модели

#![allow(non_snake_case)]

use std::path::PathBuf;

use linfa::prelude::SingleTargetRegression;
use linfa::Dataset;
use ndarray::{s, Array1, Array2, Axis};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::artifact::{self, ArtifactKind};
use crate::config::{ArtifactPaths, TrainerConfig};
use crate::error::{ErrorKind, HousingError, Result, ResultExt};
use crate::models::{fit_ensemble, ModelFamily, ModelParams, ParamGrid, TrainedModel};

/// Результат подбора для одного семейства
#[derive(Debug, Clone, Serialize)]
pub struct FamilyReport {
    pub family: ModelFamily,
    pub params: ModelParams,
    /// Средний R² по фолдам кросс-валидации
    pub cv_score: f64,
    /// R² на отложенной выборке после дообучения на всём train
    pub test_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub best: FamilyReport,
    pub families: Vec<FamilyReport>,
    pub model_path: PathBuf,
}

impl TrainingReport {
    pub fn best_score(&self) -> f64 {
        self.best.test_score
    }
}

pub struct ModelTrainer<'a> {
    paths: &'a ArtifactPaths,
    config: &'a TrainerConfig,
}

impl<'a> ModelTrainer<'a> {
    pub fn new(paths: &'a ArtifactPaths, config: &'a TrainerConfig) -> Self {
        Self { paths, config }
    }

    /// Принимает матрицы с целевой переменной в последней колонке
    pub fn initiate(&self, train: &Array2<f64>, test: &Array2<f64>) -> Result<TrainingReport> {
        info!("Running model trainer");

        let train = split_target(train)?;
        let test = split_target(test)?;
        if train.records.ncols() != test.records.ncols() {
            return Err(HousingError::new(
                ErrorKind::Training,
                format!(
                    "train has {} features but test has {}",
                    train.records.ncols(),
                    test.records.ncols()
                ),
            ));
        }

        let mut families: Vec<FamilyReport> = Vec::with_capacity(self.config.grids.len());
        let mut best: Option<(usize, TrainedModel)> = None;

        for grid in &self.config.grids {
            let (params, cv_score) = self.search(grid, &train.records, &train.targets)?;
            let ensemble = fit_ensemble(&params, &train.records, &train.targets, self.config.seed)?;
            let model = TrainedModel {
                params,
                n_features: train.records.ncols(),
                ensemble,
            };
            let test_score = r2(&model.predict(&test.records)?, &test.targets)?;
            info!("{}: cv R2 = {:.4}, test R2 = {:.4} ({})", grid.family, cv_score, test_score, params);

            let report = FamilyReport {
                family: grid.family,
                params,
                cv_score,
                test_score,
            };
            // Строгое сравнение: при равенстве остаётся семейство, перечисленное раньше
            let improves = match &best {
                Some((index, _)) => test_score > families[*index].test_score,
                None => test_score.is_finite(),
            };
            families.push(report);
            if improves {
                best = Some((families.len() - 1, model));
            }
        }

        let Some((best_index, model)) = best else {
            return Err(HousingError::new(ErrorKind::Training, "no adequate model found: every candidate failed to score"));
        };
        let best = families[best_index].clone();

        if best.test_score < self.config.acceptance_threshold {
            warn!(
                "Best model {} scored {:.4}, below threshold {}",
                best.family, best.test_score, self.config.acceptance_threshold
            );
            return Err(HousingError::new(
                ErrorKind::Training,
                format!(
                    "no adequate model found: best R2 {:.4} ({}) is below {}",
                    best.test_score, best.family, self.config.acceptance_threshold
                ),
            ));
        }

        artifact::save(&self.paths.model, ArtifactKind::Model, &model)?;
        info!("Best model {} with test R2 {:.4} saved to {}", best.family, best.test_score, self.paths.model.display());

        Ok(TrainingReport {
            best,
            families,
            model_path: self.paths.model.clone(),
        })
    }

    /// Перебор сетки одного семейства; n_estimators оценивается через staged-предсказания
    fn search(&self, grid: &ParamGrid, X: &Array2<f64>, y: &Array1<f64>) -> Result<(ModelParams, f64)> {
        let folds = kfold(X.nrows(), self.config.cv_folds)?;
        let counts = grid.estimator_counts();
        let mut best: Option<(ModelParams, f64)> = None;

        for base in grid.base_params() {
            let mut totals = vec![0.0; counts.len()];

            for (train_rows, valid_rows) in &folds {
                let X_fold = X.select(Axis(0), train_rows);
                let y_fold = y.select(Axis(0), train_rows);
                let X_valid = X.select(Axis(0), valid_rows);
                let y_valid = y.select(Axis(0), valid_rows);

                let ensemble = fit_ensemble(&base, &X_fold, &y_fold, self.config.seed)?;
                for (total, predictions) in totals.iter_mut().zip(ensemble.staged_predict(&X_valid, &counts)) {
                    *total += r2(&predictions, &y_valid)?;
                }
            }

            for (&n_estimators, total) in counts.iter().zip(&totals) {
                let score = total / folds.len() as f64;
                let candidate = ModelParams { n_estimators, ..base };
                debug!("{}: cv R2 = {:.4}", candidate, score);

                let improves = match &best {
                    Some((_, best_score)) => score > *best_score,
                    None => score.is_finite(),
                };
                if improves {
                    best = Some((candidate, score));
                }
            }
        }

        best.ok_or_else(|| {
            HousingError::new(
                ErrorKind::Training,
                format!("{}: no configuration produced a finite cross-validation score", grid.family),
            )
        })
    }
}

/// Отделяет последнюю колонку как целевую переменную
fn split_target(data: &Array2<f64>) -> Result<Dataset<f64, f64, ndarray::Ix1>> {
    if data.ncols() < 2 || data.nrows() == 0 {
        return Err(HousingError::new(
            ErrorKind::Training,
            format!("expected at least one feature column plus target, got shape {:?}", data.dim()),
        ));
    }
    let records = data.slice(s![.., ..-1]).to_owned();
    let targets = data.column(data.ncols() - 1).to_owned();
    Ok(Dataset::new(records, targets))
}

fn r2(predictions: &Array1<f64>, targets: &Array1<f64>) -> Result<f64> {
    predictions.r2(targets).wrap_err(ErrorKind::Training, "cannot compute R2 score")
}

/// Последовательные фолды: первые n % k фолдов на одну строку длиннее
fn kfold(n: usize, k: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
    if k < 2 || n < k {
        return Err(HousingError::new(
            ErrorKind::Training,
            format!("cannot split {} rows into {} folds", n, k),
        ));
    }

    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = n / k + usize::from(fold < n % k);
        let valid: Vec<usize> = (start..start + size).collect();
        let train: Vec<usize> = (0..start).chain(start + size..n).collect();
        folds.push((train, valid));
        start += size;
    }
    Ok(folds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::load;
    use ndarray::Array;

    fn linear_data(n: usize, offset: usize) -> Array2<f64> {
        Array::from_shape_fn((n, 3), |(i, j)| {
            let x0 = ((i + offset) % 17) as f64;
            let x1 = ((i + offset) % 5) as f64;
            match j {
                0 => x0,
                1 => x1,
                _ => 4.0 * x0 + 7.0 * x1 + 100.0,
            }
        })
    }

    fn small_config(acceptance_threshold: f64) -> TrainerConfig {
        TrainerConfig {
            acceptance_threshold,
            grids: vec![
                ParamGrid {
                    learning_rate: vec![0.3],
                    n_estimators: vec![10, 30],
                    ..ParamGrid::default_for(ModelFamily::RegularizedBoost)
                },
                ParamGrid {
                    n_estimators: vec![5, 10],
                    ..ParamGrid::default_for(ModelFamily::RandomForest)
                },
            ],
            ..TrainerConfig::default()
        }
    }

    #[test]
    fn test_kfold_sizes() {
        let folds = kfold(10, 3).unwrap();
        let sizes: Vec<usize> = folds.iter().map(|(_, valid)| valid.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
        assert_eq!(folds[1].1, vec![4, 5, 6]);
        for (train, valid) in &folds {
            assert_eq!(train.len() + valid.len(), 10);
            assert!(valid.iter().all(|i| !train.contains(i)));
        }
        assert!(kfold(2, 3).is_err());
    }

    #[test]
    fn test_split_target_takes_last_column() {
        let data = linear_data(4, 0);
        let dataset = split_target(&data).unwrap();
        assert_eq!(dataset.records.ncols(), 2);
        assert_eq!(dataset.targets[1], 4.0 + 7.0 + 100.0);
    }

    #[test]
    fn test_trains_and_saves_best_model() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path(), dir.path().join("rent.csv"));
        let config = small_config(0.6);

        let report = ModelTrainer::new(&paths, &config)
            .initiate(&linear_data(120, 0), &linear_data(30, 3))
            .unwrap();

        assert_eq!(report.families.len(), 2);
        assert!(report.best_score() >= 0.6);
        assert!(report.families.iter().all(|f| report.best_score() >= f.test_score));

        let model: TrainedModel = load(&paths.model, ArtifactKind::Model).unwrap();
        assert_eq!(model.params, report.best.params);
        assert_eq!(model.n_features, 2);
    }

    #[test]
    fn test_unreachable_threshold_leaves_no_model() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path(), dir.path().join("rent.csv"));
        let config = small_config(1.5);

        let err = ModelTrainer::new(&paths, &config)
            .initiate(&linear_data(60, 0), &linear_data(20, 1))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Training);
        assert!(err.message().contains("no adequate model found"));
        assert!(!paths.model.exists());
    }

    #[test]
    fn test_tie_keeps_first_grid() {
        // Глубина 16 на 40 строках не достигается: обе сетки дают одинаковые деревья
        let forest = |max_depth| ParamGrid {
            max_depth: vec![max_depth],
            n_estimators: vec![5],
            ..ParamGrid::default_for(ModelFamily::RandomForest)
        };
        let config = TrainerConfig {
            acceptance_threshold: -1e12,
            grids: vec![forest(None), forest(Some(16))],
            ..TrainerConfig::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path(), dir.path().join("rent.csv"));

        let report = ModelTrainer::new(&paths, &config)
            .initiate(&linear_data(40, 0), &linear_data(10, 2))
            .unwrap();
        assert_eq!(report.families[0].test_score, report.families[1].test_score);
        assert_eq!(report.best.params.max_depth, None);
    }
}
