//! Client configuration.

use std::env;

use crate::error::{Result, SharePointError};
use crate::url_parser::{parse_site_url, SitePath};

/// Microsoft Graph v1.0 endpoint.
pub const DEFAULT_GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Microsoft identity platform authority host.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Environment variables read by [`ClientConfig::from_env`].
pub const ENV_SITE_URL: &str = "SHAREPOINT_SITE_URL";
pub const ENV_TENANT_ID: &str = "SHAREPOINT_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "SHAREPOINT_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "SHAREPOINT_CLIENT_SECRET";

/// Site, tenant and credentials for a single client instance.
#[derive(Clone)]
pub struct ClientConfig {
    site_url: String,
    site: SitePath,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    graph_base: String,
    authority_host: String,
}

impl ClientConfig {
    /// Create a validated configuration.
    ///
    /// # Arguments
    /// * `site_url` - SharePoint site URL, e.g. `https://contoso.sharepoint.com/sites/Team`
    /// * `tenant_id` - Azure AD tenant ID
    /// * `client_id` - Application (client) ID
    /// * `client_secret` - Client secret
    pub fn new(
        site_url: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        let site_url = required("site_url", site_url.into())?;
        let tenant_id = required("tenant_id", tenant_id.into())?;
        let client_id = required("client_id", client_id.into())?;
        let client_secret = required("client_secret", client_secret.into())?;
        let site = parse_site_url(&site_url)?;

        Ok(Self {
            site_url,
            site,
            tenant_id,
            client_id,
            client_secret,
            graph_base: DEFAULT_GRAPH_BASE.to_string(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
        })
    }

    /// Load configuration from the `SHAREPOINT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(
            env_var(ENV_SITE_URL)?,
            env_var(ENV_TENANT_ID)?,
            env_var(ENV_CLIENT_ID)?,
            env_var(ENV_CLIENT_SECRET)?,
        )
    }

    /// Point the client at a different Graph endpoint (national clouds, mock servers).
    pub fn with_graph_base(mut self, graph_base: impl Into<String>) -> Self {
        self.graph_base = graph_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Point token acquisition at a different authority host.
    pub fn with_authority_host(mut self, authority_host: impl Into<String>) -> Self {
        self.authority_host = authority_host.into().trim_end_matches('/').to_string();
        self
    }

    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    pub fn site(&self) -> &SitePath {
        &self.site
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub(crate) fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn graph_base(&self) -> &str {
        &self.graph_base
    }

    /// Tenant-scoped OAuth2 v2.0 token endpoint.
    pub fn token_endpoint(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority_host, self.tenant_id)
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("site_url", &self.site_url)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("graph_base", &self.graph_base)
            .field("authority_host", &self.authority_host)
            .finish()
    }
}

fn required(field: &str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SharePointError::Configuration(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

fn env_var(name: &str) -> Result<String> {
    env::var(name)
        .map_err(|_| SharePointError::Configuration(format!("missing environment variable {}", name)))
}
