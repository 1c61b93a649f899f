//! Инференс: features -> preprocessor -> model на сохранённых артефактах

use ndarray::Array1;
use tracing::debug;

use crate::artifact::{self, ArtifactKind};
use crate::config::ArtifactPaths;
use crate::error::{ErrorKind, HousingError, Result, ResultExt};
use crate::models::TrainedModel;
use crate::preprocessing::{ColumnPreprocessor, FeatureSchema, FeaturesGenerator, PreprocessorState, Transform};
use crate::types::Listing;

pub struct PredictionPipeline {
    features: FeaturesGenerator,
    features_state: FeatureSchema,
    preprocessor: ColumnPreprocessor,
    preprocessor_state: PreprocessorState,
    model: TrainedModel,
}

impl PredictionPipeline {
    /// Загружает все три артефакта и проверяет, что они согласованы между собой
    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        let features_state: FeatureSchema = artifact::load(&paths.features_preprocessor, ArtifactKind::FeaturesPreprocessor)?;
        let preprocessor_state: PreprocessorState = artifact::load(&paths.preprocessor, ArtifactKind::Preprocessor)?;
        let model: TrainedModel = artifact::load(&paths.model, ArtifactKind::Model)?;
        preprocessor_state
            .validate()
            .wrap_err_with(ErrorKind::Artifact, || format!("invalid preprocessor at {}", paths.preprocessor.display()))?;
        model
            .validate()
            .wrap_err_with(ErrorKind::Artifact, || format!("invalid model at {}", paths.model.display()))?;

        if preprocessor_state.n_features_out() != model.n_features {
            return Err(HousingError::new(
                ErrorKind::Artifact,
                format!(
                    "preprocessor produces {} features but model expects {}",
                    preprocessor_state.n_features_out(),
                    model.n_features
                ),
            ));
        }
        debug!("Loaded {} model over {} features", model.params.family, model.n_features);

        Ok(Self {
            features: FeaturesGenerator::new(),
            features_state,
            preprocessor: ColumnPreprocessor::new(),
            preprocessor_state,
            model,
        })
    }

    pub fn predict(&self, listings: &[Listing]) -> Result<Array1<f64>> {
        if listings.is_empty() {
            return Err(HousingError::new(ErrorKind::Inference, "nothing to predict"));
        }
        let derived = self
            .features
            .apply_batch(&self.features_state, listings)
            .map_err(|e| HousingError::with_source(ErrorKind::Inference, "invalid listing", e))?;
        let features = self
            .preprocessor
            .transform(&self.preprocessor_state, &derived)
            .map_err(|e| HousingError::with_source(ErrorKind::Inference, "cannot preprocess listing", e))?;
        self.model.predict(&features)
    }

    pub fn predict_one(&self, listing: Listing) -> Result<f64> {
        let predictions = self.predict(std::slice::from_ref(&listing))?;
        predictions
            .first()
            .copied()
            .ok_or_else(|| HousingError::new(ErrorKind::Inference, "model returned no prediction"))
    }
}

/// Строка для показа пользователю, два знака после запятой
pub fn format_prediction(rent: f64) -> String {
    format!("Predicted rent of the house is: ₹{:.2}", rent)
}
