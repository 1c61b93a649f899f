/// Обучение: ingestion -> transformation -> trainer

use std::path::PathBuf;

use anyhow::Context;

use house_rent::{DataIngestion, DataTransformation, ModelTrainer, PipelineConfig};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = PipelineConfig::load(config_path.as_deref()).context("failed to load configuration")?;

    let (train_path, test_path) = DataIngestion::new(&config.paths, &config.ingestion)
        .initiate()
        .context("data ingestion failed")?;

    let data = DataTransformation::new(&config.paths)
        .initiate(&train_path, &test_path)
        .context("data transformation failed")?;

    let report = ModelTrainer::new(&config.paths, &config.trainer)
        .initiate(&data.train, &data.test)
        .context("model training failed")?;

    for family in &report.families {
        println!("{:<20} cv R2 {:>8.4}  test R2 {:>8.4}", family.family.name(), family.cv_score, family.test_score);
    }
    println!("Best model: {} ({})", report.best.family, report.best.params);
    println!("{}", report.best_score());

    Ok(())
}
