//! sharepoint_drive - A client for files in a SharePoint document library.
//!
//! This library talks to Microsoft Graph with app-only (client-credentials)
//! tokens and provides functionality to:
//! - List files in a folder
//! - Download and upload files by their path relative to the library root
//! - Move, rename and delete files
//! - Read the full metadata of a file
//!
//! `delete_file_by_relative_path` reports refused deletes (locked, forbidden,
//! missing) through an [`OperationResult`]; every other operation returns a
//! typed [`SharePointError`].
//!
//! # Example
//!
//! ```no_run
//! use sharepoint_drive::{ClientConfig, SharePointClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::from_env()?;
//!     let client = SharePointClient::new(config);
//!
//!     for file in client.list_files("Reports/2024").await? {
//!         println!("{}", file);
//!     }
//!
//!     let result = client.delete_file_by_relative_path("Reports/old.xlsx").await?;
//!     if result.is_locked() {
//!         let holder = result.file_metadata.as_ref().and_then(|m| m.last_modified_by_name());
//!         println!("locked by {:?}", holder);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod url_parser;

// Re-exports for convenience
pub use auth::Authenticator;
pub use client::{ConflictBehavior, SharePointClient};
pub use config::ClientConfig;
pub use error::{Result, SharePointError};
pub use models::{ErrorDetails, FailureKind, FileMetadata, OperationResult};
pub use url_parser::{parse_site_url, RemotePath};
