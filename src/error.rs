use std::{fmt, io, path::StripPrefixError};

use http::status::StatusCode;
use notify::{Error as NotifyError, ErrorKind as NotifyErrorKind};
use regex::Error as RegexError;
use serde_json::Error as JsonError;
use thiserror::Error;
use url::ParseError as UrlParseError;

/// Crate-wide error type.
///
/// Variants are grouped by meaning rather than by source type: per-file
/// problems surface as [`StrataError::Content`] and are logged-and-skipped by
/// the owning loop, while infrastructure failures propagate with `?` and fail
/// the run. The [`StrataError::status_code`] mapping is used by the dev
/// server when a request cannot be satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrataError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Content processing error: {0}")]
    Content(String),
    #[error("File system error: {0}")]
    Io(String),
    #[error("Syntax highlighter error: {0}")]
    Highlight(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Operation cancelled")]
    OperationCancelled,
    #[error("Page not found")]
    PageNotFound,
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("(De)serialization error: {0}")]
    Serialization(String),
    #[error("Service error: {0}")]
    Service(String),
}

impl StrataError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            StrataError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            StrataError::Content(_) => StatusCode::INTERNAL_SERVER_ERROR,
            StrataError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            StrataError::Highlight(_) => StatusCode::INTERNAL_SERVER_ERROR,
            StrataError::NotFound(_) => StatusCode::NOT_FOUND,
            StrataError::OperationCancelled => StatusCode::NO_CONTENT,
            StrataError::PageNotFound => StatusCode::NOT_FOUND,
            StrataError::PermissionDenied => StatusCode::FORBIDDEN,
            StrataError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            StrataError::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<io::Error> for StrataError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => StrataError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => StrataError::PermissionDenied,
            _ => StrataError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<StripPrefixError> for StrataError {
    fn from(src: StripPrefixError) -> StrataError {
        StrataError::NotFound(format!("Strip prefix failed for path. Error: {src}"))
    }
}

impl From<serde_yaml::Error> for StrataError {
    fn from(src: serde_yaml::Error) -> StrataError {
        StrataError::Serialization(format!("YAML front matter error: {src}"))
    }
}

impl From<toml::de::Error> for StrataError {
    fn from(src: toml::de::Error) -> StrataError {
        StrataError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for StrataError {
    fn from(src: toml::ser::Error) -> StrataError {
        StrataError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for StrataError {
    fn from(src: JsonError) -> StrataError {
        StrataError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<UrlParseError> for StrataError {
    fn from(src: UrlParseError) -> StrataError {
        StrataError::Serialization(format!("Invalid URL: {src}"))
    }
}

impl From<fmt::Error> for StrataError {
    fn from(x: fmt::Error) -> Self {
        StrataError::Content(format!("{x}"))
    }
}

impl From<RegexError> for StrataError {
    fn from(x: RegexError) -> Self {
        StrataError::Serialization(format!("Regex parse failed: {x}"))
    }
}

impl From<reqwest::Error> for StrataError {
    fn from(x: reqwest::Error) -> Self {
        StrataError::Service(format!("HTTP fetch failed: {x}"))
    }
}

impl From<time::error::Format> for StrataError {
    fn from(x: time::error::Format) -> Self {
        StrataError::Serialization(format!("Date format failed: {x}"))
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for StrataError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        StrataError::Io("Channel send error, receiver dropped before event delivery".to_string())
    }
}

impl From<NotifyError> for StrataError {
    fn from(notify_error: NotifyError) -> Self {
        match notify_error.kind {
            NotifyErrorKind::Generic(msg) => StrataError::Service(format!(
                "notify-debouncer: {}, paths: {:?}",
                msg, notify_error.paths
            )),
            NotifyErrorKind::Io(io_error) => StrataError::Service(format!(
                "notify-debouncer: io error {}, paths: {:?}",
                io_error.kind(),
                notify_error.paths
            )),
            NotifyErrorKind::PathNotFound => StrataError::NotFound(format!(
                "notify-debouncer: path(s) not found: {:?}",
                notify_error.paths
            )),
            NotifyErrorKind::WatchNotFound => StrataError::NotFound(format!(
                "notify-debouncer: watch not found, paths: {:?}",
                notify_error.paths
            )),
            NotifyErrorKind::InvalidConfig(_) => {
                StrataError::Service("notify-debouncer invalid config".to_string())
            }
            NotifyErrorKind::MaxFilesWatch => {
                StrataError::Service("notify-debouncer max file watch limit reached".to_string())
            }
        }
    }
}
