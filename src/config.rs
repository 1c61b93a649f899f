//! Конфигурация пайплайна: пути к артефактам и параметры стадий

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, HousingError, Result, ResultExt};
use crate::models::{ModelFamily, ParamGrid};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub paths: ArtifactPaths,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub trainer: TrainerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl PipelineConfig {
    /// Читает JSON-конфиг; отсутствующие поля заполняются значениями по умолчанию
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .wrap_err_with(ErrorKind::Config, || format!("cannot read config {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&text)
            .wrap_err_with(ErrorKind::Config, || format!("invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Конфиг из файла, если путь передан, иначе значения по умолчанию
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.ingestion.validate()?;
        self.trainer.validate()
    }
}

/// Пути ко всем файлам, которые читает и пишет пайплайн
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactPaths {
    #[serde(default = "default_dataset")]
    pub dataset: PathBuf,
    #[serde(default = "default_raw_data")]
    pub raw_data: PathBuf,
    #[serde(default = "default_train_data")]
    pub train_data: PathBuf,
    #[serde(default = "default_test_data")]
    pub test_data: PathBuf,
    #[serde(default = "default_preprocessor")]
    pub preprocessor: PathBuf,
    #[serde(default = "default_features_preprocessor")]
    pub features_preprocessor: PathBuf,
    #[serde(default = "default_model")]
    pub model: PathBuf,
}

fn default_dataset() -> PathBuf { PathBuf::from("Data").join("rent.csv") }
fn default_raw_data() -> PathBuf { PathBuf::from("artifacts").join("data.csv") }
fn default_train_data() -> PathBuf { PathBuf::from("artifacts").join("train.csv") }
fn default_test_data() -> PathBuf { PathBuf::from("artifacts").join("test.csv") }
fn default_preprocessor() -> PathBuf { PathBuf::from("artifacts").join("preprocessor.json") }
fn default_features_preprocessor() -> PathBuf { PathBuf::from("artifacts").join("features_preprocessor.json") }
fn default_model() -> PathBuf { PathBuf::from("artifacts").join("model.json") }

impl ArtifactPaths {
    /// Все артефакты в одной директории, исходный датасет отдельно
    pub fn in_dir(artifacts_dir: impl AsRef<Path>, dataset: impl Into<PathBuf>) -> Self {
        let dir = artifacts_dir.as_ref();
        Self {
            dataset: dataset.into(),
            raw_data: dir.join("data.csv"),
            train_data: dir.join("train.csv"),
            test_data: dir.join("test.csv"),
            preprocessor: dir.join("preprocessor.json"),
            features_preprocessor: dir.join("features_preprocessor.json"),
            model: dir.join("model.json"),
        }
    }
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            dataset: default_dataset(),
            raw_data: default_raw_data(),
            train_data: default_train_data(),
            test_data: default_test_data(),
            preprocessor: default_preprocessor(),
            features_preprocessor: default_features_preprocessor(),
            model: default_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "default_test_ratio")]
    pub test_ratio: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_drop_outlier")]
    pub drop_max_rent_outlier: bool,
}

fn default_test_ratio() -> f64 { 0.2 }
fn default_seed() -> u64 { 42 }
fn default_drop_outlier() -> bool { true }

impl IngestionConfig {
    fn validate(&self) -> Result<()> {
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(HousingError::new(
                ErrorKind::Config,
                format!("test_ratio must be in (0, 1), got {}", self.test_ratio),
            ));
        }
        Ok(())
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            test_ratio: default_test_ratio(),
            seed: default_seed(),
            drop_max_rent_outlier: default_drop_outlier(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    #[serde(default = "default_threshold")]
    pub acceptance_threshold: f64,
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_grids")]
    pub grids: Vec<ParamGrid>,
}

fn default_threshold() -> f64 { 0.6 }
fn default_cv_folds() -> usize { 3 }
fn default_grids() -> Vec<ParamGrid> {
    ModelFamily::ALL.iter().map(|family| ParamGrid::default_for(*family)).collect()
}

impl TrainerConfig {
    fn validate(&self) -> Result<()> {
        if self.cv_folds < 2 {
            return Err(HousingError::new(
                ErrorKind::Config,
                format!("cv_folds must be at least 2, got {}", self.cv_folds),
            ));
        }
        if self.grids.is_empty() {
            return Err(HousingError::new(ErrorKind::Config, "no model grids configured"));
        }
        for grid in &self.grids {
            grid.validate()?;
        }
        Ok(())
    }
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: default_threshold(),
            cv_folds: default_cv_folds(),
            seed: default_seed(),
            grids: default_grids(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String { "0.0.0.0:8000".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}
