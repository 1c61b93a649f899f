//! Поколоночный препроцессор: [log(Size) | числовые | one-hot]

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::{EncodeState, ImputeEncodeScale, ImputeScale, ImputeScaleState, LogScale, Transform};
use crate::error::{ErrorKind, HousingError, Result};
use crate::types::{DerivedListing, CATEGORICAL_COLUMNS, NUMERIC_COLUMNS};

#[derive(Debug, Clone)]
pub struct ColumnPreprocessor {
    log: LogScale,
    numeric: ImputeScale,
    categorical: ImputeEncodeScale,
}

/// Замороженные статистики всех трёх веток
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessorState {
    pub numeric: ImputeScaleState,
    pub categorical: EncodeState,
}

impl PreprocessorState {
    /// 1 (log) + числовые + сумма мощностей категориальных колонок
    pub fn n_features_out(&self) -> usize {
        1 + self.numeric.columns.len() + self.categorical.n_features_out()
    }

    pub fn validate(&self) -> Result<()> {
        self.numeric.validate()?;
        self.categorical.validate()
    }

    pub fn feature_names(&self) -> Vec<String> {
        let mut names = vec!["log_size".to_string()];
        names.extend(self.numeric.columns.iter().cloned());
        names.extend(self.categorical.feature_names());
        names
    }
}

impl ColumnPreprocessor {
    pub fn new() -> Self {
        Self {
            log: LogScale,
            numeric: ImputeScale::new(NUMERIC_COLUMNS),
            categorical: ImputeEncodeScale::new(CATEGORICAL_COLUMNS),
        }
    }

    /// Применяет замороженное состояние к батчу и собирает плотную матрицу
    pub fn transform(&self, state: &PreprocessorState, batch: &[DerivedListing]) -> Result<Array2<f64>> {
        let n_features = state.n_features_out();
        let mut features = Array2::zeros((batch.len(), n_features));

        for (i, record) in batch.iter().enumerate() {
            let row = self.apply(state, record)?;
            if row.len() != n_features {
                return Err(HousingError::new(
                    ErrorKind::Transformation,
                    format!("row {} has {} features, expected {}", i, row.len(), n_features),
                ));
            }
            for (j, value) in row.into_iter().enumerate() {
                features[[i, j]] = value;
            }
        }

        Ok(features)
    }
}

impl Default for ColumnPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for ColumnPreprocessor {
    type Input = DerivedListing;
    type Output = Vec<f64>;
    type State = PreprocessorState;

    fn fit(&self, batch: &[DerivedListing]) -> Result<PreprocessorState> {
        let numeric: Vec<_> = batch.iter().map(DerivedListing::numeric_values).collect();
        let categorical: Vec<_> = batch.iter().map(DerivedListing::categorical_values).collect();

        Ok(PreprocessorState {
            numeric: self.numeric.fit(&numeric)?,
            categorical: self.categorical.fit(&categorical)?,
        })
    }

    fn apply(&self, state: &PreprocessorState, record: &DerivedListing) -> Result<Vec<f64>> {
        let mut row = Vec::with_capacity(state.n_features_out());
        row.push(self.log.apply(&(), &record.size)?);
        row.extend(self.numeric.apply(&state.numeric, &record.numeric_values())?);
        row.extend(self.categorical.apply(&state.categorical, &record.categorical_values())?);
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derived(city: &str, area_type: &str, size: f64, floor_level: i32) -> DerivedListing {
        DerivedListing {
            bhk: Some(2.0),
            size: Some(size),
            bathroom: Some(1.0),
            month: 5,
            day: 18,
            day_of_week: 0,
            quarter: 2,
            total_floors: 4,
            floor_level,
            area_type: Some(area_type.to_string()),
            city: Some(city.to_string()),
            furnishing_status: Some("Semi-Furnished".to_string()),
            tenant_preferred: Some("Bachelors/Family".to_string()),
        }
    }

    fn training_batch() -> Vec<DerivedListing> {
        vec![
            derived("Kolkata", "Super Area", 800.0, 2),
            derived("Mumbai", "Carpet Area", 1200.0, 3),
            derived("Delhi", "Super Area", 650.0, 0),
            derived("Mumbai", "Super Area", 900.0, -1),
        ]
    }

    #[test]
    fn test_column_count_matches_cardinalities() {
        let preprocessor = ColumnPreprocessor::new();
        let state = preprocessor.fit(&training_batch()).unwrap();

        // 3 города + 2 типа площади + 1 + 1
        let expected = 1 + NUMERIC_COLUMNS.len() + 3 + 2 + 1 + 1;
        assert_eq!(state.n_features_out(), expected);
        assert_eq!(state.feature_names().len(), expected);

        let matrix = preprocessor.transform(&state, &training_batch()).unwrap();
        assert_eq!(matrix.dim(), (4, expected));
        assert!(matrix.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_column_order_is_log_numeric_categorical() {
        let preprocessor = ColumnPreprocessor::new();
        let state = preprocessor.fit(&training_batch()).unwrap();
        let names = state.feature_names();

        assert_eq!(names[0], "log_size");
        assert_eq!(names[1], "BHK");
        assert_eq!(names[NUMERIC_COLUMNS.len()], "Floor Level");
        assert_eq!(names[NUMERIC_COLUMNS.len() + 1], "Area Type=Carpet Area");

        let row = preprocessor.apply(&state, &training_batch()[0]).unwrap();
        assert!((row[0] - 800.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_transform_is_idempotent() {
        let preprocessor = ColumnPreprocessor::new();
        let state = preprocessor.fit(&training_batch()).unwrap();
        let query = vec![derived("Chennai", "Carpet Area", 1500.0, 7)];

        let first = preprocessor.transform(&state, &query).unwrap();
        let second = preprocessor.transform(&state, &query).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unseen_city_is_all_zero_block() {
        let preprocessor = ColumnPreprocessor::new();
        let state = preprocessor.fit(&training_batch()).unwrap();
        let row = preprocessor.apply(&state, &derived("Chennai", "Carpet Area", 1000.0, 1)).unwrap();

        let names = state.feature_names();
        for (name, value) in names.iter().zip(&row) {
            if name.starts_with("City=") {
                assert_eq!(*value, 0.0, "{} should be zero", name);
            }
        }
    }

    #[test]
    fn test_non_positive_size_fails() {
        let preprocessor = ColumnPreprocessor::new();
        let state = preprocessor.fit(&training_batch()).unwrap();
        let err = preprocessor.apply(&state, &derived("Mumbai", "Carpet Area", 0.0, 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transformation);
    }

    #[test]
    fn test_truncated_state_fails_validation() {
        let preprocessor = ColumnPreprocessor::new();
        let mut state = preprocessor.fit(&training_batch()).unwrap();
        assert!(state.validate().is_ok());

        state.numeric.medians.truncate(2);
        assert_eq!(state.validate().unwrap_err().kind(), ErrorKind::Artifact);
        let err = preprocessor.transform(&state, &training_batch()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Artifact);
    }
}
