//! HTTP-слой: форма предсказания аренды и JSON API

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, Json},
    routing::get,
    Form, Router,
};
use tracing::{info, warn};

use crate::config::ArtifactPaths;
use crate::error::{ErrorKind, HousingError};
use crate::prediction::{format_prediction, PredictionPipeline};
use crate::types::{Listing, PredictionOutput, RentQuery};

#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<ArtifactPaths>,
}

impl AppState {
    pub fn new(paths: ArtifactPaths) -> Self {
        Self { paths: Arc::new(paths) }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/predict", get(home).post(predict_form))
        .route("/api/predict", axum::routing::post(predict_json))
        .route("/health", get(health))
        .with_state(state)
}

async fn home() -> Html<String> {
    Html(render_page(None))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn predict_form(
    State(state): State<AppState>,
    Form(query): Form<RentQuery>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    info!("Form prediction request for {}", query.city);

    match run_prediction(&state, query).await {
        Ok(rent) => Ok(Html(render_page(Some(&format_prediction(rent))))),
        Err((status, message)) => Err((status, Html(render_page(Some(&message))))),
    }
}

async fn predict_json(
    State(state): State<AppState>,
    Json(query): Json<RentQuery>,
) -> Result<Json<PredictionOutput>, (StatusCode, String)> {
    info!("API prediction request for {}", query.city);

    let rent = run_prediction(&state, query).await?;
    Ok(Json(PredictionOutput {
        rent,
        message: format_prediction(rent),
    }))
}

/// Артефакты читаются на каждый запрос, чтобы переобучение подхватывалось без рестарта
async fn run_prediction(state: &AppState, query: RentQuery) -> Result<f64, (StatusCode, String)> {
    let paths = Arc::clone(&state.paths);
    let listing = Listing::from(query);

    let outcome = tokio::task::spawn_blocking(move || {
        let pipeline = PredictionPipeline::load(&paths)?;
        pipeline.predict_one(listing)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Prediction task failed: {}", e)))?;

    outcome.map_err(|e| {
        warn!("Prediction failed: {}", e);
        (status_for(&e), format!("Prediction error: {}", e.message()))
    })
}

fn status_for(error: &HousingError) -> StatusCode {
    match error.kind() {
        ErrorKind::Inference => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Artifact => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

const CITIES: [&str; 6] = ["Mumbai", "Chennai", "Bangalore", "Hyderabad", "Delhi", "Kolkata"];
const FURNISHING: [&str; 3] = ["Furnished", "Semi-Furnished", "Unfurnished"];
const TENANTS: [&str; 3] = ["Bachelors/Family", "Bachelors", "Family"];
const AREA_TYPES: [&str; 3] = ["Super Area", "Carpet Area", "Built Area"];

fn render_page(result: Option<&str>) -> String {
    let select = |name: &str, options: &[&str]| {
        let options: String = options
            .iter()
            .map(|option| format!("<option value=\"{0}\">{0}</option>", escape_html(option)))
            .collect();
        format!("<label>{name}<select name=\"{name}\">{options}</select></label>")
    };
    let number = |name: &str, min: i32| format!("<label>{name}<input type=\"number\" name=\"{name}\" min=\"{min}\" required></label>");

    let result = result
        .map(|text| format!("<h2 class=\"result\">{}</h2>", escape_html(text)))
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>House Rent Prediction</title></head>\n<body>\n\
         <h1>House Rent Prediction</h1>\n\
         <form action=\"/predict\" method=\"post\">\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n\
         <label>date<input type=\"date\" name=\"date\" required></label>\n\
         <button type=\"submit\">Predict</button>\n</form>\n{}\n</body>\n</html>\n",
        select("city", &CITIES),
        select("furnishing_status", &FURNISHING),
        select("tenants_preferred", &TENANTS),
        select("area_type", &AREA_TYPES),
        number("bhk", 1),
        number("size", 1),
        number("bathrooms", 1),
        number("floor_level", -2),
        number("total_floors", 0),
        result
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
