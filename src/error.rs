//! Error types for the sharepoint_drive crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when interacting with a SharePoint document library.
#[derive(Error, Debug)]
pub enum SharePointError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Authentication failed ({status}): {body}")]
    Authentication { status: u16, body: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Local file not found: {}", .0.display())]
    LocalFileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to parse response JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl SharePointError {
    /// HTTP status behind an API-level error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            SharePointError::Authentication { status, .. } | SharePointError::Api { status, .. } => {
                Some(*status)
            }
            SharePointError::NotFound(_) => Some(404),
            SharePointError::PermissionDenied(_) => Some(403),
            SharePointError::Conflict(_) => Some(409),
            _ => None,
        }
    }
}

/// Result type alias for SharePointError.
pub type Result<T> = std::result::Result<T, SharePointError>;
