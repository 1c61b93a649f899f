//! Единый тип ошибки пайплайна

use std::fmt;
use std::panic::Location;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, HousingError>;

/// Стадия пайплайна, на которой произошла ошибка
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Ingestion,
    Transformation,
    Training,
    Artifact,
    Inference,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Ingestion => "ingestion",
            ErrorKind::Transformation => "transformation",
            ErrorKind::Training => "training",
            ErrorKind::Artifact => "artifact",
            ErrorKind::Inference => "inference",
            ErrorKind::Config => "config",
        };
        f.write_str(name)
    }
}

/// Ошибка с исходной причиной и местом возникновения
#[derive(Debug, Error)]
#[error("{kind} error at [{location}]: {message}")]
pub struct HousingError {
    kind: ErrorKind,
    message: String,
    location: &'static Location<'static>,
    #[source]
    source: Option<BoxError>,
}

impl HousingError {
    #[track_caller]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: Location::caller(),
            source: None,
        }
    }

    #[track_caller]
    pub fn with_source(kind: ErrorKind, message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: Location::caller(),
            source: Some(source.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

/// Оборачивание произвольных ошибок в [`HousingError`]
pub trait ResultExt<T> {
    fn wrap_err(self, kind: ErrorKind, message: impl Into<String>) -> Result<T>;

    fn wrap_err_with<S, F>(self, kind: ErrorKind, message: F) -> Result<T>
    where
        S: Into<String>,
        F: FnOnce() -> S;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[track_caller]
    fn wrap_err(self, kind: ErrorKind, message: impl Into<String>) -> Result<T> {
        let location = Location::caller();
        self.map_err(|e| HousingError {
            kind,
            message: message.into(),
            location,
            source: Some(Box::new(e)),
        })
    }

    #[track_caller]
    fn wrap_err_with<S, F>(self, kind: ErrorKind, message: F) -> Result<T>
    where
        S: Into<String>,
        F: FnOnce() -> S,
    {
        let location = Location::caller();
        self.map_err(|e| HousingError {
            kind,
            message: message().into(),
            location,
            source: Some(Box::new(e)),
        })
    }
}
