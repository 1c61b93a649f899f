//! Нормализация числовых признаков

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use super::Transform;
use crate::error::{ErrorKind, HousingError, Result};

/// Натуральный логарифм площади. Состояния нет, размер должен быть > 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogScale;

impl Transform for LogScale {
    type Input = Option<f64>;
    type Output = f64;
    type State = ();

    fn fit(&self, _batch: &[Option<f64>]) -> Result<()> {
        Ok(())
    }

    fn apply(&self, _state: &(), record: &Option<f64>) -> Result<f64> {
        match record {
            Some(value) if *value > 0.0 && value.is_finite() => Ok(value.ln()),
            Some(value) => Err(HousingError::new(
                ErrorKind::Transformation,
                format!("size must be positive for log scaling, got {}", value),
            )),
            None => Err(HousingError::new(ErrorKind::Transformation, "size is missing, cannot log-scale it")),
        }
    }
}

/// Заполнение пропусков медианой и стандартизация (x - mean) / std
#[derive(Debug, Clone)]
pub struct ImputeScale {
    columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputeScaleState {
    pub columns: Vec<String>,
    pub medians: Vec<f64>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl ImputeScaleState {
    /// Согласованность загруженного состояния: по одному значению каждой статистики на колонку
    pub fn validate(&self) -> Result<()> {
        let n = self.columns.len();
        for (name, values) in [("medians", &self.medians), ("mean", &self.mean), ("std", &self.std)] {
            if values.len() != n {
                return Err(HousingError::new(
                    ErrorKind::Artifact,
                    format!("numeric state has {} {} for {} columns", values.len(), name, n),
                ));
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(HousingError::new(ErrorKind::Artifact, format!("numeric state has non-finite {}", name)));
            }
        }
        if self.std.iter().any(|v| *v <= 0.0) {
            return Err(HousingError::new(ErrorKind::Artifact, "numeric state has non-positive std"));
        }
        Ok(())
    }
}

impl ImputeScale {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    fn check_width(&self, record: &[Option<f64>]) -> Result<()> {
        if record.len() != self.columns.len() {
            return Err(HousingError::new(
                ErrorKind::Transformation,
                format!("expected {} numeric values, got {}", self.columns.len(), record.len()),
            ));
        }
        Ok(())
    }
}

/// NaN и бесконечности считаются пропуском и при обучении, и при применении
fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

impl Transform for ImputeScale {
    type Input = Vec<Option<f64>>;
    type Output = Vec<f64>;
    type State = ImputeScaleState;

    fn fit(&self, batch: &[Vec<Option<f64>>]) -> Result<ImputeScaleState> {
        if batch.is_empty() {
            return Err(HousingError::new(ErrorKind::Transformation, "Empty dataset"));
        }
        for record in batch {
            self.check_width(record)?;
        }

        let medians = self
            .columns
            .iter()
            .enumerate()
            .map(|(col, name)| {
                let mut observed: Vec<f64> = batch.iter().filter_map(|record| finite(record[col])).collect();
                median(&mut observed).ok_or_else(|| {
                    HousingError::new(
                        ErrorKind::Transformation,
                        format!("column '{}' has no observed values to compute a median", name),
                    )
                })
            })
            .collect::<Result<Vec<f64>>>()?;

        // Статистики считаются уже после заполнения пропусков
        let imputed = Array2::from_shape_fn((batch.len(), self.columns.len()), |(i, col)| {
            finite(batch[i][col]).unwrap_or(medians[col])
        });
        let mean = imputed
            .mean_axis(Axis(0))
            .ok_or_else(|| HousingError::new(ErrorKind::Transformation, "Empty dataset"))?;
        let mut std = imputed.std_axis(Axis(0), 0.0);

        // Избегаем деления на ноль
        for val in std.iter_mut() {
            if *val < 1e-10 {
                *val = 1.0;
            }
        }

        Ok(ImputeScaleState {
            columns: self.columns.clone(),
            medians,
            mean: mean.to_vec(),
            std: std.to_vec(),
        })
    }

    fn apply(&self, state: &ImputeScaleState, record: &Vec<Option<f64>>) -> Result<Vec<f64>> {
        self.check_width(record)?;
        if state.columns != self.columns {
            return Err(HousingError::new(
                ErrorKind::Artifact,
                "numeric columns of the fitted state do not match the transformer",
            ));
        }
        state.validate()?;

        Ok(record
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let value = finite(*value).unwrap_or(state.medians[i]);
                (value - state.mean[i]) / state.std[i]
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_log_scale() {
        assert_close(LogScale.apply(&(), &Some(std::f64::consts::E)).unwrap(), 1.0);
        assert_close(LogScale.apply(&(), &Some(1.0)).unwrap(), 0.0);
    }

    #[test]
    fn test_log_scale_rejects_non_positive_and_missing() {
        for value in [Some(0.0), Some(-5.0), None] {
            let err = LogScale.apply(&(), &value).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Transformation);
        }
    }

    #[test]
    fn test_median_imputation_then_standardization() {
        let scaler = ImputeScale::new(["a", "b"]);
        let batch = vec![
            vec![Some(1.0), Some(10.0)],
            vec![Some(3.0), None],
            vec![Some(5.0), Some(20.0)],
            vec![None, Some(30.0)],
        ];
        let state = scaler.fit(&batch).unwrap();

        // Медиана колонки a по [1, 3, 5] = 3, колонки b по [10, 20, 30] = 20
        assert_eq!(state.medians, vec![3.0, 20.0]);
        assert_close(state.mean[0], 3.0);
        assert_close(state.mean[1], 20.0);

        let out = scaler.apply(&state, &vec![None, None]).unwrap();
        assert_close(out[0], 0.0);
        assert_close(out[1], 0.0);

        let out = scaler.apply_batch(&state, &batch).unwrap();
        let mean_a: f64 = out.iter().map(|row| row[0]).sum::<f64>() / 4.0;
        let var_a: f64 = out.iter().map(|row| row[0].powi(2)).sum::<f64>() / 4.0;
        assert_close(mean_a, 0.0);
        assert_close(var_a, 1.0);
    }

    #[test]
    fn test_constant_column_keeps_unit_std() {
        let scaler = ImputeScale::new(["quarter"]);
        let state = scaler.fit(&[vec![Some(2.0)], vec![Some(2.0)]]).unwrap();
        assert_eq!(state.std, vec![1.0]);
        assert_eq!(scaler.apply(&state, &vec![Some(3.0)]).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_fit_errors() {
        let scaler = ImputeScale::new(["a"]);
        assert!(scaler.fit(&[]).is_err());
        assert!(scaler.fit(&[vec![None], vec![None]]).is_err());
        assert!(scaler.fit(&[vec![Some(1.0), Some(2.0)]]).is_err());
    }

    #[test]
    fn test_apply_does_not_refit() {
        let scaler = ImputeScale::new(["a"]);
        let state = scaler.fit(&[vec![Some(1.0)], vec![Some(3.0)]]).unwrap();
        let first = scaler.apply(&state, &vec![Some(100.0)]).unwrap();
        let second = scaler.apply(&state, &vec![Some(100.0)]).unwrap();
        assert_eq!(first, second);
        assert_close(first[0], 98.0);
    }

    #[test]
    fn test_nan_cell_is_imputed_not_propagated() {
        let scaler = ImputeScale::new(["size"]);
        let state = scaler.fit(&[vec![Some(800.0)], vec![Some(f64::NAN)], vec![Some(1200.0)]]).unwrap();

        assert_eq!(state.medians, vec![1000.0]);
        assert_close(state.mean[0], 1000.0);
        assert!(state.std[0].is_finite());
        assert_close(scaler.apply(&state, &vec![Some(1000.0)]).unwrap()[0], 0.0);
        assert_close(scaler.apply(&state, &vec![Some(f64::INFINITY)]).unwrap()[0], 0.0);
    }

    #[test]
    fn test_inconsistent_state_is_artifact_error() {
        let scaler = ImputeScale::new(["a", "b"]);
        let mut state = scaler.fit(&[vec![Some(1.0), Some(2.0)], vec![Some(3.0), Some(4.0)]]).unwrap();
        state.medians.clear();

        assert_eq!(state.validate().unwrap_err().kind(), ErrorKind::Artifact);
        let err = scaler.apply(&state, &vec![None, None]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Artifact);
    }
}
