use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::error::SendError as TokioSendError;
use url::ParseError as UrlParseError;

use serde_json::Error as JsonError;

use crate::event::CacheEvent;

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum CacheError {
    #[error("No existing cached annotation found for '{0}'")]
    AnnotationNotFound(String),
    #[error("No existing cached list found for '{0}'")]
    ListNotFound(String),
    #[error("Not implemented: {0}")]
    Unsupported(String),
    #[error("Cannot reshape annotation '{0}' missing createdWhen timestamp")]
    MissingTimestamp(String),
    #[error("Cached annotation '{0}' has no local ID")]
    MissingLocalId(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Normalized state is inconsistent: {0}")]
    Inconsistent(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl CacheError {
    /// Programmer-error faults: the caller referenced something that does not exist in the
    /// cache, or asked for an operation the cache does not support.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            CacheError::AnnotationNotFound(_)
                | CacheError::ListNotFound(_)
                | CacheError::Unsupported(_)
        )
    }
}

impl From<toml::de::Error> for CacheError {
    fn from(src: toml::de::Error) -> CacheError {
        CacheError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for CacheError {
    fn from(src: toml::ser::Error) -> CacheError {
        CacheError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for CacheError {
    fn from(src: JsonError) -> CacheError {
        CacheError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<UrlParseError> for CacheError {
    fn from(src: UrlParseError) -> CacheError {
        CacheError::InvalidUrl(format!("{src}"))
    }
}

impl From<io::Error> for CacheError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => CacheError::NotFound(format!("{x}")),
            _ => CacheError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<TokioSendError<CacheEvent>> for CacheError {
    fn from(x: TokioSendError<CacheEvent>) -> Self {
        CacheError::Io(format!(
            "Channel update send Error, could not transmit cache event {}",
            x.0
        ))
    }
}
