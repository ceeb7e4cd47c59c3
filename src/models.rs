//! Data models for Microsoft Graph drive responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata for a file or folder (a Graph `driveItem`).
///
/// Documented fields are typed; everything else the service returns is kept in
/// `extra` so the full upstream shape survives a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    /// Short-lived pre-authenticated URL; only present on files.
    #[serde(
        rename = "@microsoft.graph.downloadUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<IdentitySet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<IdentitySet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_reference: Option<ItemReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileFacet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<FolderFacet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared: Option<SharedFacet>,
    #[serde(rename = "eTag", default, skip_serializing_if = "Option::is_none")]
    pub e_tag: Option<String>,
    #[serde(rename = "cTag", default, skip_serializing_if = "Option::is_none")]
    pub c_tag: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FileMetadata {
    pub fn is_folder(&self) -> bool {
        self.folder.is_some()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.file.as_ref().and_then(|f| f.mime_type.as_deref())
    }

    /// Display name of whoever last modified (or locked) the item.
    pub fn last_modified_by_name(&self) -> Option<&str> {
        self.last_modified_by.as_ref().and_then(IdentitySet::display_name)
    }

    pub fn created_by_name(&self) -> Option<&str> {
        self.created_by.as_ref().and_then(IdentitySet::display_name)
    }
}

impl std::fmt::Display for FileMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size_str = if self.is_folder() {
            "<DIR>".to_string()
        } else {
            self.size
                .map(format_size)
                .unwrap_or_else(|| "-".to_string())
        };
        let modified = self.last_modified_date_time.as_deref().unwrap_or("-");
        write!(f, "{}\t{}\t{}\t{}", self.id, size_str, modified, self.name)
    }
}

/// Format bytes into human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentitySet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Identity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<Identity>,
}

impl IdentitySet {
    pub fn display_name(&self) -> Option<&str> {
        self.user
            .as_ref()
            .or(self.application.as_ref())
            .and_then(|identity| identity.display_name.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Reference to the containing folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFacet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashes: Option<Hashes>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hashes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quick_xor_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderFacet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedFacet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Response from a `children` listing.
#[derive(Debug, Deserialize)]
pub struct DriveItemCollection {
    #[serde(default)]
    pub value: Vec<FileMetadata>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

/// SharePoint site resource.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: String,
    #[serde(default)]
    pub web_url: Option<String>,
}

/// Document library (drive) resource.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drive {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub drive_type: Option<String>,
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub expires_in: u64,
}

/// Graph API error envelope.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

/// Classification of a failed delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    FileLocked,
    PermissionDenied,
    FileNotFound,
    Conflict,
    Unknown,
}

impl FailureKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            423 => FailureKind::FileLocked,
            403 => FailureKind::PermissionDenied,
            404 => FailureKind::FileNotFound,
            409 => FailureKind::Conflict,
            _ => FailureKind::Unknown,
        }
    }
}

/// Diagnostic context attached to a failed delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Raw error text from the service.
    pub error: String,
    pub error_type: FailureKind,
    pub status_code: u16,
    pub file_path: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_causes: Vec<String>,
    /// Why the follow-up metadata lookup failed, when it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_error: Option<String>,
}

impl ErrorDetails {
    pub fn for_delete(status: u16, file_path: &str, error: String) -> Self {
        let error_type = FailureKind::from_status(status);
        let (message, causes): (String, &[&str]) = match error_type {
            FailureKind::FileLocked => (
                "File is currently locked and cannot be deleted.".to_string(),
                &[
                    "File is being edited by another user",
                    "File is checked out",
                    "File has active sharing permissions",
                    "File is in a protected library or folder",
                ],
            ),
            FailureKind::PermissionDenied => (
                "You do not have permission to delete this file.".to_string(),
                &[
                    "Insufficient permissions on the file",
                    "File is in a protected folder",
                    "File has special permissions",
                    "Your account lacks delete permissions",
                ],
            ),
            FailureKind::FileNotFound => (
                "The specified file does not exist or cannot be found.".to_string(),
                &[],
            ),
            FailureKind::Conflict => (
                "There is a conflict preventing file deletion.".to_string(),
                &[
                    "File is being synchronized",
                    "File has pending changes",
                    "File is in a state that prevents deletion",
                ],
            ),
            FailureKind::Unknown => (
                format!("Unexpected error occurred (Status: {})", status),
                &[],
            ),
        };

        Self {
            error,
            error_type,
            status_code: status,
            file_path: file_path.to_string(),
            message,
            possible_causes: causes.iter().map(|c| c.to_string()).collect(),
            metadata_error: None,
        }
    }
}

/// Outcome of a delete, returned instead of an error for API-level failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    pub error_code: Option<u16>,
    pub error_details: Option<ErrorDetails>,
    pub file_metadata: Option<FileMetadata>,
}

impl OperationResult {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            error_code: None,
            error_details: None,
            file_metadata: None,
        }
    }

    pub fn failed(details: ErrorDetails, file_metadata: Option<FileMetadata>) -> Self {
        Self {
            success: false,
            error_code: Some(details.status_code),
            error_details: Some(details),
            file_metadata,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.error_code == Some(423)
    }
}
