mod common;

use house_rent::artifact::{self, ArtifactKind};
use house_rent::ingestion::read_records;
use house_rent::models::TrainedModel;
use house_rent::preprocessing::{ColumnPreprocessor, FeatureSchema, FeaturesGenerator, PreprocessorState, Transform};
use house_rent::types::RawRecord;
use house_rent::{format_prediction, ErrorKind, Floor, Listing, PredictionPipeline};

fn mumbai_listing() -> Listing {
    Listing {
        posted_on: "2021-03-10".to_string(),
        bhk: Some(3.0),
        size: Some(1200.0),
        floor: Floor::Levels {
            floor_level: 3,
            total_floors: 10,
        },
        area_type: Some("Carpet Area".to_string()),
        city: Some("Mumbai".to_string()),
        furnishing_status: Some("Furnished".to_string()),
        tenant_preferred: Some("Family".to_string()),
        bathroom: Some(2.0),
    }
}

#[test]
fn test_full_pipeline_trains_and_predicts() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::config_in(dir.path(), true);

    let report = common::run_pipeline(&config).unwrap();
    assert!(report.best_score() >= 0.6, "best R2 {}", report.best_score());
    assert_eq!(report.families.len(), 3);
    assert!(config.paths.model.exists());

    let pipeline = PredictionPipeline::load(&config.paths).unwrap();
    let rent = pipeline.predict_one(mumbai_listing()).unwrap();
    assert!(rent.is_finite());

    let message = format_prediction(rent);
    let amount = message.strip_prefix("Predicted rent of the house is: ₹").unwrap();
    let decimals = amount.split('.').nth(1).unwrap();
    assert_eq!(decimals.len(), 2);

    // Mumbai дороже Kolkata при прочих равных
    let mut kolkata = mumbai_listing();
    kolkata.city = Some("Kolkata".to_string());
    assert!(rent > pipeline.predict_one(kolkata).unwrap());
}

#[test]
fn test_noise_dataset_yields_no_model() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::config_in(dir.path(), false);

    let err = common::run_pipeline(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Training);
    assert!(err.message().contains("no adequate model found"));

    // Препроцессоры сохранены, модель нет
    assert!(config.paths.preprocessor.exists());
    assert!(!config.paths.model.exists());
    assert_eq!(PredictionPipeline::load(&config.paths).err().unwrap().kind(), ErrorKind::Artifact);
}

#[test]
fn test_kolkata_row_has_no_missing_features() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::config_in(dir.path(), true);
    common::run_pipeline(&config).unwrap();

    let text = format!("{}\n{}\n", common::HEADER, common::KOLKATA_ROW);
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let record: RawRecord = reader.deserialize().next().unwrap().unwrap();
    let (listing, _) = record.into_listing();

    let schema: FeatureSchema = artifact::load(&config.paths.features_preprocessor, ArtifactKind::FeaturesPreprocessor).unwrap();
    let state: PreprocessorState = artifact::load(&config.paths.preprocessor, ArtifactKind::Preprocessor).unwrap();

    let derived = FeaturesGenerator::new().apply(&schema, &listing).unwrap();
    assert_eq!((derived.floor_level, derived.total_floors), (2, 4));
    // 2020-05-18 понедельник
    assert_eq!((derived.month, derived.day, derived.day_of_week, derived.quarter), (5, 18, 0, 2));
    assert_eq!(derived.size, Some(800.0));
    assert_eq!(derived.furnishing_status.as_deref(), Some("Semi-Furnished"));

    let row = ColumnPreprocessor::new().apply(&state, &derived).unwrap();
    assert_eq!(row.len(), state.n_features_out());
    assert!(row.iter().all(|v| v.is_finite()));
}

#[test]
fn test_artifacts_stay_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::config_in(dir.path(), true);
    let report = common::run_pipeline(&config).unwrap();

    let state: PreprocessorState = artifact::load(&config.paths.preprocessor, ArtifactKind::Preprocessor).unwrap();
    let model: TrainedModel = artifact::load(&config.paths.model, ArtifactKind::Model).unwrap();
    assert_eq!(model.n_features, state.n_features_out());
    assert_eq!(model.params, report.best.params);

    // Ingestion выкидывает неиспользуемые колонки и строку с максимальной арендой
    let raw = read_records(&config.paths.raw_data, ErrorKind::Ingestion).unwrap();
    let train = read_records(&config.paths.train_data, ErrorKind::Ingestion).unwrap();
    let test = read_records(&config.paths.test_data, ErrorKind::Ingestion).unwrap();
    assert_eq!(raw.len(), 240);
    assert_eq!(test.len(), 48);
    assert_eq!(train.len() + test.len(), raw.len());
}

#[test]
fn test_inconsistent_artifacts_fail_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::config_in(dir.path(), true);
    common::run_pipeline(&config).unwrap();
    PredictionPipeline::load(&config.paths).unwrap();

    let original: PreprocessorState = artifact::load(&config.paths.preprocessor, ArtifactKind::Preprocessor).unwrap();
    let mut truncated = original.clone();
    truncated.numeric.medians.clear();
    artifact::save(&config.paths.preprocessor, ArtifactKind::Preprocessor, &truncated).unwrap();
    assert_eq!(PredictionPipeline::load(&config.paths).err().unwrap().kind(), ErrorKind::Artifact);
    artifact::save(&config.paths.preprocessor, ArtifactKind::Preprocessor, &original).unwrap();

    // Признак за пределами ширины матрицы в первом дереве
    let model: TrainedModel = artifact::load(&config.paths.model, ArtifactKind::Model).unwrap();
    let mut value = serde_json::to_value(&model).unwrap();
    let first_tree = &mut value["ensemble"]["trees"][0];
    let broken_feature = serde_json::json!(model.n_features + 5);
    if first_tree.get("Binary").is_some() {
        first_tree["Binary"]["nodes"] = serde_json::json!([
            {"Split": {"feature": broken_feature, "threshold": 0.0, "left": 1, "right": 2}},
            {"Leaf": {"value": 1.0}},
            {"Leaf": {"value": 2.0}}
        ]);
    } else {
        first_tree["Oblivious"]["splits"] = serde_json::json!([[broken_feature, 0.0]]);
        first_tree["Oblivious"]["leaf_values"] = serde_json::json!([1.0, 2.0]);
    }
    let broken: TrainedModel = serde_json::from_value(value).unwrap();
    artifact::save(&config.paths.model, ArtifactKind::Model, &broken).unwrap();
    assert_eq!(PredictionPipeline::load(&config.paths).err().unwrap().kind(), ErrorKind::Artifact);
}

#[test]
fn test_rerun_is_deterministic() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let a = common::run_pipeline(&common::config_in(first.path(), true)).unwrap();
    let b = common::run_pipeline(&common::config_in(second.path(), true)).unwrap();

    assert_eq!(a.best.params, b.best.params);
    assert_eq!(a.best_score(), b.best_score());
}
