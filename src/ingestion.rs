//! Загрузка исходного датасета и разбиение на train/test

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use crate::artifact;
use crate::config::{ArtifactPaths, IngestionConfig};
use crate::error::{ErrorKind, HousingError, Result, ResultExt};
use crate::types::RawRecord;

pub struct DataIngestion<'a> {
    paths: &'a ArtifactPaths,
    config: &'a IngestionConfig,
}

impl<'a> DataIngestion<'a> {
    pub fn new(paths: &'a ArtifactPaths, config: &'a IngestionConfig) -> Self {
        Self { paths, config }
    }

    /// Читает датасет, сохраняет очищенную копию и train/test, возвращает пути train и test
    pub fn initiate(&self) -> Result<(PathBuf, PathBuf)> {
        info!("Running data ingestion on {}", self.paths.dataset.display());

        let mut records = read_records(&self.paths.dataset, ErrorKind::Ingestion)?;
        info!("Read {} rows", records.len());

        if self.config.drop_max_rent_outlier {
            if let Some(dropped) = drop_max_rent(&mut records) {
                info!("Dropped outlier row with rent {}", dropped.rent);
            }
        }

        let (train, test) = split(&records, self.config.test_ratio, self.config.seed)?;

        // Всё кодируется в память до первой записи на диск
        let raw_csv = encode_records(&records)?;
        let train_csv = encode_records(&train)?;
        let test_csv = encode_records(&test)?;

        write_table(&self.paths.raw_data, &raw_csv)?;
        write_table(&self.paths.train_data, &train_csv)?;
        write_table(&self.paths.test_data, &test_csv)?;

        info!("Data ingestion completed: {} train rows, {} test rows", train.len(), test.len());
        Ok((self.paths.train_data.clone(), self.paths.test_data.clone()))
    }
}

/// Читает CSV в схеме исходного датасета; лишние колонки игнорируются
pub fn read_records(path: &Path, kind: ErrorKind) -> Result<Vec<RawRecord>> {
    let mut reader = csv::Reader::from_path(path).wrap_err_with(kind, || format!("cannot open {}", path.display()))?;

    reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| row.wrap_err_with(kind, || format!("{}: malformed row {}", path.display(), i + 1)))
        .collect()
}

/// Убирает первую строку с максимальной арендой
fn drop_max_rent(records: &mut Vec<RawRecord>) -> Option<RawRecord> {
    let position = records
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, record)| match best {
            Some((_, rent)) if rent >= record.rent => best,
            _ => Some((i, record.rent)),
        })
        .map(|(i, _)| i)?;
    Some(records.remove(position))
}

/// Перемешивание с фиксированным зерном; тест получает ceil(n * ratio) строк
fn split(records: &[RawRecord], test_ratio: f64, seed: u64) -> Result<(Vec<RawRecord>, Vec<RawRecord>)> {
    let n = records.len();
    if n < 2 {
        return Err(HousingError::new(
            ErrorKind::Ingestion,
            format!("need at least 2 rows to split, got {}", n),
        ));
    }

    let n_test = ((n as f64 * test_ratio).ceil() as usize).clamp(1, n - 1);

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let test = order[..n_test].iter().map(|&i| records[i].clone()).collect();
    let train = order[n_test..].iter().map(|&i| records[i].clone()).collect();
    Ok((train, test))
}

fn encode_records(records: &[RawRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer
            .serialize(record)
            .wrap_err(ErrorKind::Ingestion, "cannot serialize row")?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| HousingError::new(ErrorKind::Ingestion, format!("cannot flush csv buffer: {}", e)))?;
    String::from_utf8(bytes).wrap_err(ErrorKind::Ingestion, "csv output is not valid UTF-8")
}

fn write_table(path: &Path, contents: &str) -> Result<()> {
    artifact::write_encoded(path, contents).map_err(|e| HousingError::with_source(ErrorKind::Ingestion, format!("cannot persist {}", path.display()), e))
}
