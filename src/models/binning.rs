//! Гистограммные границы для поиска разбиений

#![allow(non_snake_case)]

use ndarray::Array2;

/// Границы бинов по каждому признаку.
///
/// Значение `v` попадает в бин `i`, если `v <= borders[i]` и `v > borders[i - 1]`.
#[derive(Debug, Clone)]
pub struct BinBorders {
    borders: Vec<Vec<f64>>,
}

impl BinBorders {
    /// Квантильные границы, не больше `max_bins - 1` на признак
    pub fn fit(X: &Array2<f64>, max_bins: usize) -> Self {
        let max_bins = max_bins.max(2);
        let borders = X
            .columns()
            .into_iter()
            .map(|column| {
                let mut values: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();
                values.sort_by(|a, b| a.total_cmp(b));
                values.dedup();

                if values.len() <= max_bins {
                    // Мало уникальных значений: граница между каждой парой соседей
                    return values.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
                }

                let mut borders: Vec<f64> = (1..max_bins)
                    .map(|k| {
                        let idx = k * values.len() / max_bins;
                        (values[idx - 1] + values[idx]) / 2.0
                    })
                    .collect();
                borders.dedup();
                borders
            })
            .collect();

        Self { borders }
    }

    pub fn bin(&self, feature: usize, value: f64) -> usize {
        self.borders[feature].partition_point(|&border| border < value)
    }

    /// Порог между соседними отсортированными значениями `a < b`, если они в разных бинах
    pub fn threshold_between(&self, feature: usize, a: f64, b: f64) -> Option<f64> {
        let bin_a = self.bin(feature, a);
        if bin_a < self.bin(feature, b) {
            Some(self.borders[feature][bin_a])
        } else {
            None
        }
    }

    pub fn n_borders(&self, feature: usize) -> usize {
        self.borders[feature].len()
    }
}
