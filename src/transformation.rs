//! Стадия трансформации: обучение препроцессоров на train и построение матриц

#![allow(non_snake_case)]

use std::path::Path;

use ndarray::{concatenate, Array1, Array2, Axis};
use tracing::info;

use crate::artifact::{self, ArtifactKind};
use crate::config::ArtifactPaths;
use crate::error::{ErrorKind, Result, ResultExt};
use crate::ingestion::read_records;
use crate::preprocessing::{ColumnPreprocessor, FeaturesGenerator, Transform};
use crate::types::Listing;

/// Матрицы признаков с целевой переменной в последней колонке
#[derive(Debug, Clone)]
pub struct TransformedData {
    pub train: Array2<f64>,
    pub test: Array2<f64>,
    pub feature_names: Vec<String>,
}

pub struct DataTransformation<'a> {
    paths: &'a ArtifactPaths,
    features: FeaturesGenerator,
    preprocessor: ColumnPreprocessor,
}

impl<'a> DataTransformation<'a> {
    pub fn new(paths: &'a ArtifactPaths) -> Self {
        Self {
            paths,
            features: FeaturesGenerator::new(),
            preprocessor: ColumnPreprocessor::new(),
        }
    }

    pub fn initiate(&self, train_path: &Path, test_path: &Path) -> Result<TransformedData> {
        info!("Running data transformation");

        let (train_listings, y_train) = load_split(train_path)?;
        let (test_listings, y_test) = load_split(test_path)?;
        info!("Read {} train and {} test rows", train_listings.len(), test_listings.len());

        // Статистики считаются только по train
        let (features_state, train_derived) = self.features.fit_apply(&train_listings)?;
        let test_derived = self.features.apply_batch(&features_state, &test_listings)?;

        let preprocessor_state = self.preprocessor.fit(&train_derived)?;
        let X_train = self.preprocessor.transform(&preprocessor_state, &train_derived)?;
        let X_test = self.preprocessor.transform(&preprocessor_state, &test_derived)?;
        info!("Preprocessor produces {} features", preprocessor_state.n_features_out());

        let features_encoded = artifact::encode(ArtifactKind::FeaturesPreprocessor, &features_state)?;
        let preprocessor_encoded = artifact::encode(ArtifactKind::Preprocessor, &preprocessor_state)?;
        artifact::write_all(&[
            (self.paths.features_preprocessor.as_path(), features_encoded.as_str()),
            (self.paths.preprocessor.as_path(), preprocessor_encoded.as_str()),
        ])?;
        info!("Saved preprocessing artifacts");

        Ok(TransformedData {
            train: with_target(&X_train, &y_train)?,
            test: with_target(&X_test, &y_test)?,
            feature_names: preprocessor_state.feature_names(),
        })
    }
}

fn load_split(path: &Path) -> Result<(Vec<Listing>, Array1<f64>)> {
    let records = read_records(path, ErrorKind::Transformation)?;
    let (listings, targets): (Vec<Listing>, Vec<f64>) = records.into_iter().map(|r| r.into_listing()).unzip();
    Ok((listings, Array1::from(targets)))
}

fn with_target(X: &Array2<f64>, y: &Array1<f64>) -> Result<Array2<f64>> {
    let target = y.view().insert_axis(Axis(1));
    concatenate(Axis(1), &[X.view(), target]).wrap_err(ErrorKind::Transformation, "cannot append target column")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::load;
    use crate::preprocessing::{FeatureSchema, PreprocessorState};

    const HEADER: &str = "Posted On,BHK,Rent,Size,Floor,Area Type,City,Furnishing Status,Tenant Preferred,Bathroom\n";

    #[test]
    fn test_target_is_last_column_and_artifacts_are_saved() {
        let dir = tempfile::tempdir().unwrap();
        let train = dir.path().join("train.csv");
        let test = dir.path().join("test.csv");
        std::fs::write(
            &train,
            format!(
                "{HEADER}2022-05-18,2,10000,800,1 out of 3,Super Area,Delhi,Furnished,Family,1\n\
                 2022-06-01,3,25000,1500,Ground out of 2,Carpet Area,Mumbai,Unfurnished,Bachelors,2\n\
                 2022-07-11,1,7000,600,Upper Basement out of 4,,Delhi,Semi-Furnished,Family,\n"
            ),
        )
        .unwrap();
        std::fs::write(&test, format!("{HEADER}2022-05-20,2,12000,900,2,Super Area,Pune,Furnished,Family,1\n")).unwrap();

        let paths = ArtifactPaths::in_dir(dir.path().join("artifacts"), dir.path().join("rent.csv"));

        let data = DataTransformation::new(&paths).initiate(&train, &test).unwrap();

        let state: PreprocessorState = load(&paths.preprocessor, ArtifactKind::Preprocessor).unwrap();
        let schema: FeatureSchema = load(&paths.features_preprocessor, ArtifactKind::FeaturesPreprocessor).unwrap();
        assert_eq!(schema, FeatureSchema::current());

        assert_eq!(data.train.dim(), (3, state.n_features_out() + 1));
        assert_eq!(data.test.dim(), (1, state.n_features_out() + 1));
        assert_eq!(data.train.column(data.train.ncols() - 1).to_vec(), vec![10000.0, 25000.0, 7000.0]);
        assert_eq!(data.test[[0, data.test.ncols() - 1]], 12000.0);
        assert_eq!(data.feature_names.len(), state.n_features_out());
        assert!(data.train.iter().chain(data.test.iter()).all(|v| v.is_finite()));
    }

    #[test]
    fn test_bad_floor_fails_without_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let train = dir.path().join("train.csv");
        std::fs::write(&train, format!("{HEADER}2022-05-18,2,10000,800,Penthouse out of 3,Super Area,Delhi,Furnished,Family,1\n")).unwrap();

        let paths = ArtifactPaths::in_dir(dir.path().join("artifacts"), dir.path().join("rent.csv"));
        let err = DataTransformation::new(&paths).initiate(&train, &train).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transformation);
        assert!(!paths.preprocessor.exists());
        assert!(!paths.features_preprocessor.exists());
    }

    #[test]
    fn test_failed_second_write_keeps_first_artifact_out() {
        let dir = tempfile::tempdir().unwrap();
        let train = dir.path().join("train.csv");
        std::fs::write(
            &train,
            format!(
                "{HEADER}2022-05-18,2,10000,800,1 out of 3,Super Area,Delhi,Furnished,Family,1\n\
                 2022-06-01,3,25000,1500,Ground out of 2,Carpet Area,Mumbai,Unfurnished,Bachelors,2\n"
            ),
        )
        .unwrap();

        let mut paths = ArtifactPaths::in_dir(dir.path().join("artifacts"), dir.path().join("rent.csv"));
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        paths.preprocessor = blocker.join("preprocessor.json");

        let err = DataTransformation::new(&paths).initiate(&train, &train).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Artifact);
        assert!(!paths.features_preprocessor.exists());
    }
}
