/// Типы данных пайплайна

use serde::{Deserialize, Serialize};

/// Числовые колонки в порядке, в котором они попадают в матрицу признаков
pub const NUMERIC_COLUMNS: [&str; 9] = [
    "BHK",
    "Size",
    "Bathroom",
    "month posted",
    "day posted",
    "day of week posted",
    "quarter posted",
    "Total Floors",
    "Floor Level",
];

pub const CATEGORICAL_COLUMNS: [&str; 4] = ["Area Type", "City", "Furnishing Status", "Tenant Preferred"];

pub const TARGET_COLUMN: &str = "Rent";

/// Строка исходного CSV (лишние колонки вроде Area Locality отбрасываются при чтении)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "Posted On")]
    pub posted_on: String,
    #[serde(rename = "BHK")]
    pub bhk: Option<f64>,
    #[serde(rename = "Rent")]
    pub rent: f64,
    #[serde(rename = "Size")]
    pub size: Option<f64>,
    #[serde(rename = "Floor")]
    pub floor: String,
    #[serde(rename = "Area Type")]
    pub area_type: Option<String>,
    #[serde(rename = "City")]
    pub city: Option<String>,
    #[serde(rename = "Furnishing Status")]
    pub furnishing_status: Option<String>,
    #[serde(rename = "Tenant Preferred")]
    pub tenant_preferred: Option<String>,
    #[serde(rename = "Bathroom")]
    pub bathroom: Option<f64>,
}

impl RawRecord {
    /// Отделяет целевую переменную от признаков
    pub fn into_listing(self) -> (Listing, f64) {
        let rent = self.rent;
        let listing = Listing {
            posted_on: self.posted_on,
            bhk: self.bhk,
            size: self.size,
            floor: Floor::Descriptor(self.floor),
            area_type: self.area_type,
            city: self.city,
            furnishing_status: self.furnishing_status,
            tenant_preferred: self.tenant_preferred,
            bathroom: self.bathroom,
        };
        (listing, rent)
    }
}

/// Этаж: строка из датасета или уже разобранные значения из формы
#[derive(Debug, Clone, PartialEq)]
pub enum Floor {
    Descriptor(String),
    Levels { floor_level: i32, total_floors: i32 },
}

/// Объявление без целевой переменной
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub posted_on: String,
    pub bhk: Option<f64>,
    pub size: Option<f64>,
    pub floor: Floor,
    pub area_type: Option<String>,
    pub city: Option<String>,
    pub furnishing_status: Option<String>,
    pub tenant_preferred: Option<String>,
    pub bathroom: Option<f64>,
}

/// Объявление после генерации признаков
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedListing {
    pub bhk: Option<f64>,
    pub size: Option<f64>,
    pub bathroom: Option<f64>,
    pub month: u32,
    pub day: u32,
    pub day_of_week: u32, // 0 = понедельник
    pub quarter: u32,
    pub total_floors: i32,
    pub floor_level: i32,
    pub area_type: Option<String>,
    pub city: Option<String>,
    pub furnishing_status: Option<String>,
    pub tenant_preferred: Option<String>,
}

impl DerivedListing {
    /// Значения в порядке [`NUMERIC_COLUMNS`]
    pub fn numeric_values(&self) -> Vec<Option<f64>> {
        vec![
            self.bhk,
            self.size,
            self.bathroom,
            Some(self.month as f64),
            Some(self.day as f64),
            Some(self.day_of_week as f64),
            Some(self.quarter as f64),
            Some(self.total_floors as f64),
            Some(self.floor_level as f64),
        ]
    }

    /// Значения в порядке [`CATEGORICAL_COLUMNS`]
    pub fn categorical_values(&self) -> Vec<Option<String>> {
        vec![
            self.area_type.clone(),
            self.city.clone(),
            self.furnishing_status.clone(),
            self.tenant_preferred.clone(),
        ]
    }
}

/// Запрос на предсказание (поля веб-формы)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RentQuery {
    pub city: String,
    pub furnishing_status: String,
    pub tenants_preferred: String,
    pub area_type: String,
    pub bhk: u32,
    pub size: u32,
    pub bathrooms: u32,
    pub floor_level: i32,
    pub total_floors: i32,
    pub date: String,
}

impl From<RentQuery> for Listing {
    fn from(query: RentQuery) -> Self {
        Listing {
            posted_on: query.date,
            bhk: Some(query.bhk as f64),
            size: Some(query.size as f64),
            floor: Floor::Levels {
                floor_level: query.floor_level,
                total_floors: query.total_floors,
            },
            area_type: Some(query.area_type),
            city: Some(query.city),
            furnishing_status: Some(query.furnishing_status),
            tenant_preferred: Some(query.tenants_preferred),
            bathroom: Some(query.bathrooms as f64),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionOutput {
    pub rent: f64,
    pub message: String,
}
