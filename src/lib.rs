//! House Rent - пайплайн предсказания арендной платы

pub mod error;
pub mod types;
pub mod config;
pub mod artifact;
pub mod preprocessing;
pub mod models;
pub mod ingestion;
pub mod transformation;
pub mod trainer;
pub mod prediction;
pub mod server;

pub use error::{ErrorKind, HousingError, Result};
pub use types::*;
pub use config::{ArtifactPaths, PipelineConfig};

// Re-export стадий для удобства
pub use ingestion::DataIngestion;
pub use transformation::{DataTransformation, TransformedData};
pub use trainer::{ModelTrainer, TrainingReport};
pub use prediction::{format_prediction, PredictionPipeline};
