//! Feature engineering: этажи и календарные признаки

use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::Transform;
use crate::error::{ErrorKind, HousingError, Result, ResultExt};
use crate::types::{DerivedListing, Floor, Listing, CATEGORICAL_COLUMNS, NUMERIC_COLUMNS};

const FLOOR_SEPARATOR: &str = " out of ";
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y"];

/// Разбор строки этажа в (floor_level, total_floors).
///
/// "3 out of 5" -> (3, 5), "Ground out of 2" -> (0, 2), "Lower Basement out of 3" -> (-1, 3),
/// "4" -> (4, 4): без разделителя общее число этажей совпадает с этажом.
pub fn parse_floor(descriptor: &str) -> Result<(i32, i32)> {
    let mut parts = descriptor.trim().splitn(2, FLOOR_SEPARATOR);
    let level_part = parts.next().unwrap_or_default();
    let floor_level = parse_floor_level(level_part)?;

    let total_floors = match parts.next() {
        Some(total) => total.trim().parse::<i32>().wrap_err_with(ErrorKind::Transformation, || {
            format!("total floors in '{}' is not an integer", descriptor)
        })?,
        None => floor_level,
    };

    Ok((floor_level, total_floors))
}

fn parse_floor_level(level: &str) -> Result<i32> {
    match level.trim() {
        "Ground" => Ok(0),
        // Upper Basement встречается в реальном датасете, считаем его тем же подвалом
        "Lower Basement" | "Upper Basement" => Ok(-1),
        other => other
            .parse::<i32>()
            .wrap_err_with(ErrorKind::Transformation, || format!("unrecognised floor level '{}'", other)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFeatures {
    pub month: u32,
    pub day: u32,
    pub day_of_week: u32,
    pub quarter: u32,
}

/// Разложение даты публикации на месяц, день, день недели и квартал
#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarExpand;

impl CalendarExpand {
    fn parse_date(raw: &str) -> Result<NaiveDate> {
        let raw = raw.trim();
        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
                return Ok(date);
            }
        }
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.date_naive())
            .wrap_err_with(ErrorKind::Transformation, || format!("cannot parse posting date '{}'", raw))
    }
}

impl Transform for CalendarExpand {
    type Input = String;
    type Output = CalendarFeatures;
    type State = ();

    fn fit(&self, _batch: &[String]) -> Result<()> {
        Ok(())
    }

    fn apply(&self, _state: &(), record: &String) -> Result<CalendarFeatures> {
        let date = Self::parse_date(record)?;
        Ok(CalendarFeatures {
            month: date.month(),
            day: date.day(),
            day_of_week: date.weekday().num_days_from_monday(),
            quarter: (date.month() - 1) / 3 + 1,
        })
    }
}

/// Сохраняемое состояние генератора признаков: схема выходных колонок
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
}

impl FeatureSchema {
    pub fn current() -> Self {
        Self {
            numeric_columns: NUMERIC_COLUMNS.iter().map(|c| c.to_string()).collect(),
            categorical_columns: CATEGORICAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Генератор признаков: этажи в целые числа, дата в календарные признаки
#[derive(Debug, Clone, Copy, Default)]
pub struct FeaturesGenerator {
    calendar: CalendarExpand,
}

impl FeaturesGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transform for FeaturesGenerator {
    type Input = Listing;
    type Output = DerivedListing;
    type State = FeatureSchema;

    fn fit(&self, batch: &[Listing]) -> Result<FeatureSchema> {
        if batch.is_empty() {
            return Err(HousingError::new(
                ErrorKind::Transformation,
                "cannot fit features generator on an empty batch",
            ));
        }
        Ok(FeatureSchema::current())
    }

    fn apply(&self, state: &FeatureSchema, record: &Listing) -> Result<DerivedListing> {
        if *state != FeatureSchema::current() {
            return Err(HousingError::new(
                ErrorKind::Artifact,
                "features schema differs from the one this build produces",
            ));
        }

        let (floor_level, total_floors) = match &record.floor {
            Floor::Descriptor(descriptor) => parse_floor(descriptor)?,
            Floor::Levels { floor_level, total_floors } => (*floor_level, *total_floors),
        };
        let calendar = self.calendar.apply(&(), &record.posted_on)?;

        Ok(DerivedListing {
            bhk: record.bhk,
            size: record.size,
            bathroom: record.bathroom,
            month: calendar.month,
            day: calendar.day,
            day_of_week: calendar.day_of_week,
            quarter: calendar.quarter,
            total_floors,
            floor_level,
            area_type: record.area_type.clone(),
            city: record.city.clone(),
            furnishing_status: record.furnishing_status.clone(),
            tenant_preferred: record.tenant_preferred.clone(),
        })
    }
}
