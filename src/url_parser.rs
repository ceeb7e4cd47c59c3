//! Site URL parsing and document-library path handling.

use std::fmt;
use std::sync::LazyLock;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;

use crate::error::{Result, SharePointError};

/// `https://<host>[/<path>]`, query and fragment ignored.
static SITE_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://([A-Za-z0-9.-]+(?::\d+)?)(/[^?#]*)?(?:[?#].*)?$")
        .expect("Invalid site URL regex")
});

/// Managed paths that host site collections.
static MANAGED_PATH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i:sites|teams)$").expect("Invalid managed path regex"));

/// RFC 3986 unreserved characters stay as-is, everything else is escaped.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A SharePoint site expressed the way Graph addresses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitePath {
    pub hostname: String,
    /// Server-relative site path such as `sites/Team`; `None` for the root site.
    pub server_relative_path: Option<String>,
}

impl SitePath {
    /// Graph resource for the site, e.g. `sites/contoso.sharepoint.com:/sites/Team`.
    pub fn graph_resource(&self) -> String {
        match &self.server_relative_path {
            Some(path) => format!("sites/{}:/{}", self.hostname, path),
            None => format!("sites/{}", self.hostname),
        }
    }
}

/// Parse a SharePoint site URL.
///
/// Supports:
/// - `https://contoso.sharepoint.com` (root site)
/// - `https://contoso.sharepoint.com/sites/<name>`
/// - `https://contoso.sharepoint.com/teams/<name>`
///
/// Anything after the site name (library, folders, query string) is ignored.
///
/// # Examples
///
/// ```
/// use sharepoint_drive::url_parser::parse_site_url;
///
/// let site = parse_site_url("https://contoso.sharepoint.com/sites/Team").unwrap();
/// assert_eq!(site.graph_resource(), "sites/contoso.sharepoint.com:/sites/Team");
/// ```
pub fn parse_site_url(site_url: &str) -> Result<SitePath> {
    let trimmed = site_url.trim();
    let invalid = || SharePointError::Configuration(format!("invalid site URL: {}", site_url));

    let captures = SITE_URL_REGEX.captures(trimmed).ok_or_else(invalid)?;
    let hostname = captures[1].to_ascii_lowercase();

    let segments: Vec<&str> = captures
        .get(2)
        .map(|m| m.as_str().split('/').filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let server_relative_path = match segments.as_slice() {
        [] => None,
        [managed, name, ..] if MANAGED_PATH_REGEX.is_match(managed) => {
            Some(format!("{}/{}", managed, name))
        }
        _ => return Err(invalid()),
    };

    Ok(SitePath {
        hostname,
        server_relative_path,
    })
}

/// A path relative to the root of the site's default document library.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemotePath {
    segments: Vec<String>,
}

impl RemotePath {
    /// Normalize a caller-supplied relative path.
    ///
    /// Backslashes are treated as separators; empty and `.` segments are dropped.
    /// `..` is rejected so no path can climb out of the library root.
    pub fn parse(path: &str) -> Result<Self> {
        let mut segments = Vec::new();
        for segment in path.split(['/', '\\']) {
            match segment.trim() {
                "" | "." => continue,
                ".." => return Err(SharePointError::InvalidPath(path.to_string())),
                _ => segments.push(segment.to_string()),
            }
        }
        Ok(Self { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Final segment (the item name).
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Path of the containing folder; the root is its own parent.
    pub fn parent(&self) -> RemotePath {
        let mut segments = self.segments.clone();
        segments.pop();
        RemotePath { segments }
    }

    /// Percent-encoded form for use inside a Graph URL.
    pub fn encoded(&self) -> String {
        self.segments
            .iter()
            .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_site_url() {
        let site = parse_site_url("https://Contoso.sharepoint.com/sites/Team").unwrap();
        assert_eq!(site.hostname, "contoso.sharepoint.com");
        assert_eq!(site.server_relative_path.as_deref(), Some("sites/Team"));
    }

    #[test]
    fn test_parse_root_site() {
        let site = parse_site_url("https://contoso.sharepoint.com/").unwrap();
        assert_eq!(site.server_relative_path, None);
        assert_eq!(site.graph_resource(), "sites/contoso.sharepoint.com");
    }

    #[test]
    fn test_parse_site_url_with_trailing_parts() {
        let site =
            parse_site_url("https://contoso.sharepoint.com/teams/Ops/Shared%20Documents?web=1")
                .unwrap();
        assert_eq!(site.graph_resource(), "sites/contoso.sharepoint.com:/teams/Ops");
    }

    #[test]
    fn test_invalid_site_urls() {
        assert!(parse_site_url("http://contoso.sharepoint.com/sites/Team").is_err());
        assert!(parse_site_url("contoso.sharepoint.com/sites/Team").is_err());
        assert!(parse_site_url("https://contoso.sharepoint.com/sites").is_err());
        assert!(parse_site_url("https://contoso.sharepoint.com/Shared Documents").is_err());
    }

    #[test]
    fn test_remote_path_normalization() {
        let path = RemotePath::parse("/Reports//2024\\./q1.xlsx/").unwrap();
        assert_eq!(path.to_string(), "Reports/2024/q1.xlsx");
        assert_eq!(path.name(), Some("q1.xlsx"));
        assert_eq!(path.parent().to_string(), "Reports/2024");
    }

    #[test]
    fn test_remote_path_root() {
        assert!(RemotePath::parse("").unwrap().is_root());
        assert!(RemotePath::parse("/").unwrap().is_root());
        assert!(RemotePath::parse("a").unwrap().parent().is_root());
    }

    #[test]
    fn test_remote_path_rejects_parent_segments() {
        assert!(matches!(
            RemotePath::parse("Reports/../../secret.txt"),
            Err(SharePointError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_remote_path_encoding() {
        let path = RemotePath::parse("Q1 Reports/budget #2 (final)%.xlsx").unwrap();
        assert_eq!(path.encoded(), "Q1%20Reports/budget%20%232%20%28final%29%25.xlsx");
    }
}
