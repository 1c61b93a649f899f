/// Модуль предобработки данных

pub mod column;
pub mod encoding;
pub mod feature_engineering;
pub mod normalization;

pub use column::{ColumnPreprocessor, PreprocessorState};
pub use encoding::{EncodeState, ImputeEncodeScale};
pub use feature_engineering::{parse_floor, CalendarExpand, CalendarFeatures, FeatureSchema, FeaturesGenerator};
pub use normalization::{ImputeScale, ImputeScaleState, LogScale};

use crate::error::Result;

/// Преобразование с явным разделением обучения и применения.
///
/// `fit` вычисляет состояние по обучающему батчу, `apply` использует его без
/// изменений, поэтому тестовые данные и инференс проходят через то же состояние.
pub trait Transform {
    type Input;
    type Output;
    type State;

    fn fit(&self, batch: &[Self::Input]) -> Result<Self::State>;

    fn apply(&self, state: &Self::State, record: &Self::Input) -> Result<Self::Output>;

    fn apply_batch(&self, state: &Self::State, batch: &[Self::Input]) -> Result<Vec<Self::Output>> {
        batch.iter().map(|record| self.apply(state, record)).collect()
    }

    fn fit_apply(&self, batch: &[Self::Input]) -> Result<(Self::State, Vec<Self::Output>)> {
        let state = self.fit(batch)?;
        let output = self.apply_batch(&state, batch)?;
        Ok((state, output))
    }
}
