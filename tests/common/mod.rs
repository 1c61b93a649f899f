#![allow(dead_code)]

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use house_rent::config::TrainerConfig;
use house_rent::models::{ModelFamily, ParamGrid};
use house_rent::{
    ArtifactPaths, DataIngestion, DataTransformation, ModelTrainer, PipelineConfig, Result, TrainingReport,
};

pub const HEADER: &str = "Posted On,BHK,Rent,Size,Floor,Area Type,Area Locality,City,Furnishing Status,Tenant Preferred,Bathroom,Point of Contact";

/// Строка из реального датасета, на которой раньше появлялись пропуски
pub const KOLKATA_ROW: &str =
    "2020-05-18,2,10000,800,2 out of 4,Super Area,Bandel,Kolkata,Semi-Furnished,Bachelors/Family,2,Contact Owner";

const CITIES: [(&str, f64); 6] = [
    ("Mumbai", 40000.0),
    ("Delhi", 20000.0),
    ("Bangalore", 18000.0),
    ("Hyderabad", 12000.0),
    ("Chennai", 10000.0),
    ("Kolkata", 5000.0),
];
const AREA_TYPES: [&str; 2] = ["Super Area", "Carpet Area"];
const FURNISHING: [&str; 3] = ["Furnished", "Semi-Furnished", "Unfurnished"];
const TENANTS: [&str; 3] = ["Bachelors/Family", "Bachelors", "Family"];

/// Синтетический датасет в схеме исходного CSV.
/// `structured = false` делает аренду независимой от признаков.
pub fn dataset_csv(n: usize, structured: bool, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut lines = vec![HEADER.to_string(), KOLKATA_ROW.to_string()];

    for i in 0..n {
        let (city, premium) = CITIES[i % CITIES.len()];
        let bhk = rng.gen_range(1..=4);
        let size = 300 * bhk + rng.gen_range(0..400);
        let total_floors = rng.gen_range(1..=20);
        let floor = match i % 10 {
            0 => format!("Ground out of {}", total_floors),
            1 => format!("Upper Basement out of {}", total_floors),
            2 => format!("{}", rng.gen_range(1..=5)),
            _ => format!("{} out of {}", rng.gen_range(1..=total_floors), total_floors),
        };
        let rent = if structured {
            premium + 20.0 * size as f64 + 3000.0 * bhk as f64 + rng.gen_range(-1000.0..1000.0)
        } else {
            rng.gen_range(5000.0..100000.0)
        };
        // Время от времени пропуски, чтобы работала импутация
        let bathroom = if i % 13 == 0 { String::new() } else { bhk.to_string() };
        let area_type = if i % 17 == 0 { "" } else { AREA_TYPES[i % AREA_TYPES.len()] };

        lines.push(format!(
            "2022-{:02}-{:02},{},{:.0},{},{},{},Locality {},{},{},{},{},Contact Owner",
            4 + i % 4,
            1 + i % 28,
            bhk,
            rent,
            size,
            floor,
            area_type,
            i,
            city,
            FURNISHING[i % FURNISHING.len()],
            TENANTS[(i / 3) % TENANTS.len()],
            bathroom,
        ));
    }

    lines.join("\n") + "\n"
}

pub fn write_dataset(path: &Path, n: usize, structured: bool) {
    std::fs::write(path, dataset_csv(n, structured, 7)).unwrap();
}

/// Небольшие сетки, чтобы тесты не перебирали полный набор конфигураций
pub fn quick_trainer() -> TrainerConfig {
    TrainerConfig {
        grids: vec![
            ParamGrid {
                learning_rate: vec![0.3],
                n_estimators: vec![10, 30],
                ..ParamGrid::default_for(ModelFamily::RegularizedBoost)
            },
            ParamGrid {
                learning_rate: vec![0.3],
                subsample: vec![0.8],
                n_estimators: vec![10, 30],
                ..ParamGrid::default_for(ModelFamily::GradientBoosting)
            },
            ParamGrid {
                n_estimators: vec![10],
                ..ParamGrid::default_for(ModelFamily::RandomForest)
            },
        ],
        ..TrainerConfig::default()
    }
}

pub fn config_in(dir: &Path, structured: bool) -> PipelineConfig {
    let dataset = dir.join("rent.csv");
    write_dataset(&dataset, 240, structured);
    PipelineConfig {
        paths: ArtifactPaths::in_dir(dir.join("artifacts"), dataset),
        trainer: quick_trainer(),
        ..PipelineConfig::default()
    }
}

pub fn run_pipeline(config: &PipelineConfig) -> Result<TrainingReport> {
    let (train, test) = DataIngestion::new(&config.paths, &config.ingestion).initiate()?;
    let data = DataTransformation::new(&config.paths).initiate(&train, &test)?;
    ModelTrainer::new(&config.paths, &config.trainer).initiate(&data.train, &data.test)
}
