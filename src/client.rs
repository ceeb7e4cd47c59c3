//! Microsoft Graph client for SharePoint document-library operations.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Request, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::auth::Authenticator;
use crate::config::ClientConfig;
use crate::error::{Result, SharePointError};
use crate::models::{
    ApiErrorResponse, Drive, DriveItemCollection, ErrorDetails, FileMetadata, OperationResult,
    Site,
};
use crate::url_parser::RemotePath;

/// Query parameter selecting the conflict behavior of a move.
const CONFLICT_BEHAVIOR_PARAM: &str = "@microsoft.graph.conflictBehavior";

/// What Graph should do when a move lands on an existing name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictBehavior {
    #[default]
    Fail,
    Replace,
    Rename,
}

impl ConflictBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictBehavior::Fail => "fail",
            ConflictBehavior::Replace => "replace",
            ConflictBehavior::Rename => "rename",
        }
    }
}

/// A non-success response, read once.
struct ApiFailure {
    status: u16,
    code: Option<String>,
    message: String,
}

impl ApiFailure {
    async fn read(response: Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(api_error) => Self {
                status,
                code: Some(api_error.error.code),
                message: api_error.error.message,
            },
            Err(_) => Self {
                status,
                code: None,
                message: body,
            },
        }
    }

    fn describe(&self) -> String {
        match &self.code {
            Some(code) => format!("{}: {}", code, self.message),
            None => self.message.clone(),
        }
    }

    /// Map the status onto the typed error kinds; `path` names the item involved.
    fn into_error(self, path: &str) -> SharePointError {
        match self.status {
            404 => SharePointError::NotFound(path.to_string()),
            403 => SharePointError::PermissionDenied(path.to_string()),
            409 => SharePointError::Conflict(path.to_string()),
            _ => SharePointError::Api {
                status: self.status,
                message: self.describe(),
            },
        }
    }
}

/// Read a success body and decode it as JSON.
///
/// A body that is not the expected JSON is a `Json` error, not a transport one.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Client for the default document library of one SharePoint site.
pub struct SharePointClient {
    config: Arc<ClientConfig>,
    auth: Authenticator,
    http: Client,
    drive_id: OnceCell<String>,
}

impl SharePointClient {
    /// Create a client from a validated configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_http_client(config, Client::new())
    }

    /// Create a client that sends every request through `http`.
    ///
    /// Use this to configure timeouts or proxies on the transport.
    pub fn with_http_client(config: ClientConfig, http: Client) -> Self {
        let config = Arc::new(config);
        Self {
            auth: Authenticator::new(Arc::clone(&config), http.clone()),
            config,
            http,
            drive_id: OnceCell::new(),
        }
    }

    /// Validate the four required parameters and create a client.
    ///
    /// # Arguments
    /// * `site_url` - e.g. `https://contoso.sharepoint.com/sites/Team`
    /// * `tenant_id` - Azure AD tenant ID
    /// * `client_id` - Application (client) ID
    /// * `client_secret` - Client secret
    pub fn from_credentials(
        site_url: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        let config = ClientConfig::new(site_url, tenant_id, client_id, client_secret)?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// ID of the site's default document library, resolved once per client.
    pub async fn drive_id(&self) -> Result<&str> {
        self.drive_id
            .get_or_try_init(|| self.resolve_drive_id())
            .await
            .map(String::as_str)
    }

    async fn resolve_drive_id(&self) -> Result<String> {
        let base = self.config.graph_base();
        let site_resource = self.config.site().graph_resource();

        let response = self
            .send_authorized(self.http.get(format!("{}/{}", base, site_resource)))
            .await?;
        if !response.status().is_success() {
            return Err(ApiFailure::read(response).await.into_error(self.config.site_url()));
        }
        let site: Site = read_json(response).await?;

        let response = self
            .send_authorized(self.http.get(format!("{}/sites/{}/drive", base, site.id)))
            .await?;
        if !response.status().is_success() {
            return Err(ApiFailure::read(response).await.into_error(self.config.site_url()));
        }
        let drive: Drive = read_json(response).await?;

        info!(site_id = %site.id, drive_id = %drive.id, "resolved document library");
        Ok(drive.id)
    }

    fn item_url(&self, drive_id: &str, path: &RemotePath) -> String {
        if path.is_root() {
            format!("{}/drives/{}/root", self.config.graph_base(), drive_id)
        } else {
            format!(
                "{}/drives/{}/root:/{}",
                self.config.graph_base(),
                drive_id,
                path.encoded()
            )
        }
    }

    fn children_url(&self, drive_id: &str, path: &RemotePath) -> String {
        if path.is_root() {
            format!("{}/children", self.item_url(drive_id, path))
        } else {
            format!("{}:/children", self.item_url(drive_id, path))
        }
    }

    fn content_url(&self, drive_id: &str, path: &RemotePath) -> String {
        format!("{}:/content", self.item_url(drive_id, path))
    }

    /// Attach a bearer token and send.
    async fn send_authorized(&self, request: RequestBuilder) -> Result<Response> {
        let token = self.auth.get_access_token().await?;
        let response = self.execute(request.bearer_auth(token).build()?).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.auth.invalidate().await;
        }
        Ok(response)
    }

    async fn execute(&self, request: Request) -> Result<Response> {
        debug!(method = %request.method(), url = %request.url(), "sending request");
        let response = self.http.execute(request).await?;
        debug!(status = response.status().as_u16(), "received response");
        Ok(response)
    }

    /// Fetch an item's metadata; `None` when it does not exist.
    async fn get_item(&self, path: &RemotePath) -> Result<Option<FileMetadata>> {
        let drive_id = self.drive_id().await?;
        let response = self
            .send_authorized(self.http.get(self.item_url(drive_id, path)))
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ApiFailure::read(response).await.into_error(&path.to_string()));
        }

        Ok(Some(read_json(response).await?))
    }

    /// List the items in a folder.
    ///
    /// An empty path (or `/`) lists the library root. Follows `@odata.nextLink`
    /// until every page has been read.
    ///
    /// # Arguments
    /// * `folder_path` - Folder path relative to the library root
    pub async fn list_files(&self, folder_path: &str) -> Result<Vec<FileMetadata>> {
        let path = RemotePath::parse(folder_path)?;
        let drive_id = self.drive_id().await?;

        let mut all_files = Vec::new();
        let mut next_url = Some(self.children_url(drive_id, &path));

        while let Some(url) = next_url {
            let response = self.send_authorized(self.http.get(url)).await?;
            if !response.status().is_success() {
                return Err(ApiFailure::read(response).await.into_error(&path.to_string()));
            }

            let page: DriveItemCollection = read_json(response).await?;
            all_files.extend(page.value);
            next_url = page.next_link;
        }

        info!(folder = %path, count = all_files.len(), "listed folder");
        Ok(all_files)
    }

    /// Download a file to a local path.
    ///
    /// An existing file at `local_path` is overwritten; if `local_path` is a
    /// directory the item's name is appended. Missing parent directories are
    /// created. Nothing is left behind at the destination when the transfer fails.
    ///
    /// # Arguments
    /// * `remote_path` - File path relative to the library root
    /// * `local_path` - Local destination
    pub async fn download_file_by_relative_path<P: AsRef<Path>>(
        &self,
        remote_path: &str,
        local_path: P,
    ) -> Result<FileMetadata> {
        let path = RemotePath::parse(remote_path)?;
        let metadata = self
            .get_item(&path)
            .await?
            .ok_or_else(|| SharePointError::NotFound(path.to_string()))?;

        if metadata.is_folder() {
            return Err(SharePointError::InvalidPath(format!("{} is a folder", path)));
        }

        let local_path = local_path.as_ref();
        let final_path = match fs::metadata(local_path).await {
            Ok(existing) if existing.is_dir() => local_path.join(&metadata.name),
            _ => local_path.to_path_buf(),
        };

        let response = match &metadata.download_url {
            Some(url) => self.execute(self.http.get(url).build()?).await?,
            None => {
                let drive_id = self.drive_id().await?;
                self.send_authorized(self.http.get(self.content_url(drive_id, &path)))
                    .await?
            }
        };

        if !response.status().is_success() {
            return Err(ApiFailure::read(response).await.into_error(&path.to_string()));
        }

        let bytes = write_to_file(response, &final_path).await?;

        info!(remote = %path, local = %final_path.display(), bytes, "downloaded file");
        Ok(metadata)
    }

    /// Upload a local file, overwriting any file of the same name.
    ///
    /// Intermediate folders are created by the service.
    ///
    /// # Arguments
    /// * `remote_path` - Destination path relative to the library root
    /// * `local_path` - Path to the local file
    pub async fn upload_file_by_relative_path<P: AsRef<Path>>(
        &self,
        remote_path: &str,
        local_path: P,
    ) -> Result<FileMetadata> {
        let local_path = local_path.as_ref();
        let path = RemotePath::parse(remote_path)?;
        if path.is_root() {
            return Err(SharePointError::InvalidPath(remote_path.to_string()));
        }

        let content = match fs::read(local_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SharePointError::LocalFileNotFound(local_path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };

        let mime_type = mime_guess::from_path(local_path)
            .first_or_octet_stream()
            .to_string();
        let size = content.len();

        let drive_id = self.drive_id().await?;
        let response = self
            .send_authorized(
                self.http
                    .put(self.content_url(drive_id, &path))
                    .header(CONTENT_TYPE, mime_type)
                    .body(content),
            )
            .await?;

        if !response.status().is_success() {
            return Err(ApiFailure::read(response).await.into_error(&path.to_string()));
        }

        let metadata: FileMetadata = read_json(response).await?;
        info!(remote = %path, local = %local_path.display(), bytes = size, "uploaded file");
        Ok(metadata)
    }

    /// Move or rename a file, failing if the destination already exists.
    ///
    /// # Arguments
    /// * `remote_src_path` - Current path relative to the library root
    /// * `remote_des_path` - New path; its last segment becomes the new name
    pub async fn move_file(
        &self,
        remote_src_path: &str,
        remote_des_path: &str,
    ) -> Result<FileMetadata> {
        self.move_file_with(remote_src_path, remote_des_path, ConflictBehavior::Fail)
            .await
    }

    /// Move or rename a file with an explicit conflict behavior.
    pub async fn move_file_with(
        &self,
        remote_src_path: &str,
        remote_des_path: &str,
        conflict_behavior: ConflictBehavior,
    ) -> Result<FileMetadata> {
        let source = RemotePath::parse(remote_src_path)?;
        let destination = RemotePath::parse(remote_des_path)?;
        let new_name = match (source.is_root(), destination.name()) {
            (false, Some(name)) => name.to_string(),
            _ => {
                return Err(SharePointError::InvalidPath(format!(
                    "{} -> {}",
                    remote_src_path, remote_des_path
                )))
            }
        };

        let drive_id = self.drive_id().await?;
        let parent = destination.parent();
        let parent_reference = if parent.is_root() {
            format!("/drives/{}/root:", drive_id)
        } else {
            format!("/drives/{}/root:/{}", drive_id, parent)
        };

        let payload = json!({
            "parentReference": { "path": parent_reference },
            "name": new_name,
        });

        let mut request = self.http.patch(self.item_url(drive_id, &source)).json(&payload);
        // Graph fails on an existing name unless told otherwise.
        if conflict_behavior != ConflictBehavior::Fail {
            request = request.query(&[(CONFLICT_BEHAVIOR_PARAM, conflict_behavior.as_str())]);
        }

        let response = self.send_authorized(request).await?;

        if !response.status().is_success() {
            let failure = ApiFailure::read(response).await;
            let involved = if failure.status == 409 {
                destination.to_string()
            } else {
                source.to_string()
            };
            return Err(failure.into_error(&involved));
        }

        let metadata: FileMetadata = read_json(response).await?;
        info!(from = %source, to = %destination, "moved file");
        Ok(metadata)
    }

    /// Delete a file, reporting API-level failures in the returned result.
    ///
    /// When the delete is refused, the item's metadata is fetched on a
    /// best-effort basis so callers can see e.g. who holds a lock. Only
    /// transport and authentication failures are returned as errors.
    ///
    /// # Arguments
    /// * `remote_path` - File path relative to the library root
    pub async fn delete_file_by_relative_path(&self, remote_path: &str) -> Result<OperationResult> {
        let path = RemotePath::parse(remote_path)?;
        if path.is_root() {
            return Err(SharePointError::InvalidPath(remote_path.to_string()));
        }

        let drive_id = match self.drive_id().await {
            Ok(drive_id) => drive_id,
            Err(e @ (SharePointError::Transport(_) | SharePointError::Authentication { .. })) => {
                return Err(e);
            }
            Err(e) => {
                let Some(status) = e.status() else {
                    return Err(e);
                };
                warn!(remote = %path, status, "document library lookup refused");
                let details = ErrorDetails::for_delete(status, &path.to_string(), e.to_string());
                return Ok(OperationResult::failed(details, None));
            }
        };

        let response = self
            .send_authorized(self.http.delete(self.item_url(drive_id, &path)))
            .await?;

        if response.status().is_success() {
            info!(remote = %path, "deleted file");
            return Ok(OperationResult::succeeded());
        }

        let failure = ApiFailure::read(response).await;
        let mut details = ErrorDetails::for_delete(failure.status, &path.to_string(), failure.describe());

        let file_metadata = match self.get_item(&path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                details.metadata_error = Some(e.to_string());
                None
            }
        };

        warn!(
            remote = %path,
            status = failure.status,
            locked_by = file_metadata.as_ref().and_then(FileMetadata::last_modified_by_name),
            "delete refused"
        );
        Ok(OperationResult::failed(details, file_metadata))
    }

    /// Get the full metadata of an item; `None` if it does not exist.
    ///
    /// # Arguments
    /// * `remote_path` - Path relative to the library root
    pub async fn get_file_metadata_by_relative_path(
        &self,
        remote_path: &str,
    ) -> Result<Option<FileMetadata>> {
        let path = RemotePath::parse(remote_path)?;
        self.get_item(&path).await
    }
}

/// Stream a response body into `destination` via a sibling `.part` file.
async fn write_to_file(response: Response, destination: &Path) -> Result<u64> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let partial = partial_path(destination)?;
    match stream_body(response, &partial).await {
        Ok(written) => {
            if let Err(e) = fs::rename(&partial, destination).await {
                let _ = fs::remove_file(&partial).await;
                return Err(e.into());
            }
            Ok(written)
        }
        Err(e) => {
            let _ = fs::remove_file(&partial).await;
            Err(e)
        }
    }
}

async fn stream_body(response: Response, target: &Path) -> Result<u64> {
    let mut file = File::create(target).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

fn partial_path(destination: &Path) -> Result<PathBuf> {
    let file_name = destination.file_name().ok_or_else(|| {
        SharePointError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} has no file name", destination.display()),
        ))
    })?;
    let mut partial_name = OsString::from(file_name);
    partial_name.push(".part");
    Ok(destination.with_file_name(partial_name))
}
