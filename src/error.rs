use std::{fmt, io};

use http::status::StatusCode;
use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum AssetTreeError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("A push is already in progress for tree '{0}'")]
    ConcurrentPush(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("Remote API error: {0}")]
    Remote(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Invalid input: {0}")]
    Validation(String),
}

impl AssetTreeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AssetTreeError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AssetTreeError::ConcurrentPush(_) => StatusCode::CONFLICT,
            AssetTreeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AssetTreeError::NotFound(_) => StatusCode::NOT_FOUND,
            AssetTreeError::PermissionDenied => StatusCode::FORBIDDEN,
            AssetTreeError::Remote(_) => StatusCode::BAD_GATEWAY,
            AssetTreeError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AssetTreeError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<toml::de::Error> for AssetTreeError {
    fn from(src: toml::de::Error) -> AssetTreeError {
        AssetTreeError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for AssetTreeError {
    fn from(src: toml::ser::Error) -> AssetTreeError {
        AssetTreeError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for AssetTreeError {
    fn from(src: JsonError) -> AssetTreeError {
        AssetTreeError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<serde_yaml::Error> for AssetTreeError {
    fn from(src: serde_yaml::Error) -> AssetTreeError {
        AssetTreeError::Serialization(format!("YAML (de)serialization error: {src}"))
    }
}

impl From<csv::Error> for AssetTreeError {
    fn from(src: csv::Error) -> AssetTreeError {
        match src.kind() {
            csv::ErrorKind::Io(e) => AssetTreeError::Io(format!("CSV read failed: {}", e.kind())),
            _ => AssetTreeError::Validation(format!("Malformed CSV: {src}")),
        }
    }
}

impl From<uuid::Error> for AssetTreeError {
    fn from(src: uuid::Error) -> AssetTreeError {
        AssetTreeError::Serialization(format!("UUID conversion failed: {src}"))
    }
}

impl From<io::Error> for AssetTreeError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => AssetTreeError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => AssetTreeError::PermissionDenied,
            _ => AssetTreeError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<walkdir::Error> for AssetTreeError {
    fn from(x: walkdir::Error) -> Self {
        match x.into_io_error() {
            Some(io_error) => io_error.into(),
            None => AssetTreeError::Io("directory walk hit a filesystem loop".to_string()),
        }
    }
}

impl From<fmt::Error> for AssetTreeError {
    fn from(x: fmt::Error) -> Self {
        AssetTreeError::Serialization(format!("{x}"))
    }
}

impl From<RegexError> for AssetTreeError {
    fn from(x: RegexError) -> Self {
        AssetTreeError::Validation(format!("Regex parse failed: {x}"))
    }
}
