//! Кодирование категориальных признаков

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Transform;
use crate::error::{ErrorKind, HousingError, Result};

/// Заполнение самым частым значением, one-hot и масштабирование без центрирования.
///
/// Категория, не встречавшаяся при обучении, кодируется нулевым блоком.
#[derive(Debug, Clone)]
pub struct ImputeEncodeScale {
    columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeState {
    pub columns: Vec<String>,
    pub fill_values: Vec<String>,
    /// Отсортированный словарь категорий для каждой колонки
    pub vocabularies: Vec<Vec<String>>,
    /// Делитель для каждой one-hot колонки (std по обучающей выборке)
    pub scales: Vec<Vec<f64>>,
}

impl EncodeState {
    pub fn n_features_out(&self) -> usize {
        self.vocabularies.iter().map(Vec::len).sum()
    }

    /// Длины словарей, заполнений и делителей должны сходиться с колонками
    pub fn validate(&self) -> Result<()> {
        let n = self.columns.len();
        if self.fill_values.len() != n || self.vocabularies.len() != n || self.scales.len() != n {
            return Err(HousingError::new(
                ErrorKind::Artifact,
                format!(
                    "categorical state has {} fill values, {} vocabularies, {} scale lists for {} columns",
                    self.fill_values.len(),
                    self.vocabularies.len(),
                    self.scales.len(),
                    n
                ),
            ));
        }
        for ((column, vocabulary), scales) in self.columns.iter().zip(&self.vocabularies).zip(&self.scales) {
            if vocabulary.len() != scales.len() {
                return Err(HousingError::new(
                    ErrorKind::Artifact,
                    format!("column '{}' has {} categories but {} scales", column, vocabulary.len(), scales.len()),
                ));
            }
            if scales.iter().any(|scale| !scale.is_finite() || *scale <= 0.0) {
                return Err(HousingError::new(ErrorKind::Artifact, format!("column '{}' has an invalid scale", column)));
            }
        }
        Ok(())
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .zip(&self.vocabularies)
            .flat_map(|(column, vocabulary)| vocabulary.iter().map(move |category| format!("{}={}", column, category)))
            .collect()
    }
}

impl ImputeEncodeScale {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    fn check_width(&self, record: &[Option<String>]) -> Result<()> {
        if record.len() != self.columns.len() {
            return Err(HousingError::new(
                ErrorKind::Transformation,
                format!("expected {} categorical values, got {}", self.columns.len(), record.len()),
            ));
        }
        Ok(())
    }
}

fn normalise(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Самое частое значение; при равенстве берётся меньшее лексикографически
fn most_frequent(counts: &BTreeMap<String, usize>) -> Option<String> {
    let mut best: Option<(&String, usize)> = None;
    for (value, &count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.clone())
}

impl Transform for ImputeEncodeScale {
    type Input = Vec<Option<String>>;
    type Output = Vec<f64>;
    type State = EncodeState;

    fn fit(&self, batch: &[Vec<Option<String>>]) -> Result<EncodeState> {
        if batch.is_empty() {
            return Err(HousingError::new(ErrorKind::Transformation, "Empty dataset"));
        }
        for record in batch {
            self.check_width(record)?;
        }

        let n = batch.len() as f64;
        let mut fill_values = Vec::with_capacity(self.columns.len());
        let mut vocabularies = Vec::with_capacity(self.columns.len());
        let mut scales = Vec::with_capacity(self.columns.len());

        for (col, name) in self.columns.iter().enumerate() {
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for record in batch {
                if let Some(value) = normalise(&record[col]) {
                    *counts.entry(value.to_string()).or_default() += 1;
                }
            }

            let fill = most_frequent(&counts).ok_or_else(|| {
                HousingError::new(
                    ErrorKind::Transformation,
                    format!("column '{}' has no observed categories", name),
                )
            })?;

            // Пропуски заполняются до подсчёта словаря и дисперсий
            let missing = batch.iter().filter(|record| normalise(&record[col]).is_none()).count();
            *counts.entry(fill.clone()).or_default() += missing;

            let vocabulary: Vec<String> = counts.keys().cloned().collect();
            let column_scales: Vec<f64> = vocabulary
                .iter()
                .map(|category| {
                    // Для 0/1 колонки с долей p дисперсия равна p(1 - p)
                    let p = counts[category] as f64 / n;
                    let std = (p * (1.0 - p)).sqrt();
                    if std < 1e-10 { 1.0 } else { std }
                })
                .collect();

            fill_values.push(fill);
            vocabularies.push(vocabulary);
            scales.push(column_scales);
        }

        Ok(EncodeState {
            columns: self.columns.clone(),
            fill_values,
            vocabularies,
            scales,
        })
    }

    fn apply(&self, state: &EncodeState, record: &Vec<Option<String>>) -> Result<Vec<f64>> {
        self.check_width(record)?;
        if state.columns != self.columns {
            return Err(HousingError::new(
                ErrorKind::Artifact,
                "categorical columns of the fitted state do not match the transformer",
            ));
        }
        state.validate()?;

        let mut encoded = Vec::with_capacity(state.n_features_out());
        for (col, value) in record.iter().enumerate() {
            let value = normalise(value).unwrap_or(state.fill_values[col].as_str());
            let vocabulary = &state.vocabularies[col];
            let hit = vocabulary.binary_search_by(|category| category.as_str().cmp(value)).ok();

            for (i, scale) in state.scales[col].iter().enumerate() {
                encoded.push(if hit == Some(i) { 1.0 / scale } else { 0.0 });
            }
        }
        Ok(encoded)
    }
}
