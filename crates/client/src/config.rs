//! Connection settings and copy endpoint construction.

use guestcp_protocol::constants::{CP_SEGMENT, INSTANCES_SEGMENT};
use url::Url;

use crate::error::CopyError;

/// Environment variable the CLI reads the API base URL from.
pub const ENV_BASE_URL: &str = "GUESTCP_BASE_URL";

/// Environment variable the CLI reads the bearer token from.
pub const ENV_API_KEY: &str = "GUESTCP_API_KEY";

/// Where the service lives and how to authenticate against it.
#[derive(Clone, PartialEq, Eq)]
pub struct CpConfig {
    pub base_url: String,
    pub api_key: String,
}

impl CpConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Headers sent with every connection upgrade.
    pub(crate) fn headers(&self) -> Vec<(String, String)> {
        vec![(
            "Authorization".to_string(),
            format!("Bearer {}", self.api_key),
        )]
    }
}

impl std::fmt::Debug for CpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Builds the copy endpoint for `instance_id`.
///
/// Any path prefix on `base_url` is kept; `http`/`https` become
/// `ws`/`wss`.
pub fn build_ws_url(base_url: &str, instance_id: &str) -> Result<String, CopyError> {
    if instance_id.is_empty() {
        return Err(CopyError::InvalidEndpoint(
            "instance ID cannot be empty".into(),
        ));
    }
    if instance_id.contains('/') || instance_id.contains('\\') || instance_id.contains("..") {
        return Err(CopyError::InvalidEndpoint(
            "invalid instance ID: contains path separator or traversal sequence".into(),
        ));
    }

    let mut url = Url::parse(base_url)
        .map_err(|e| CopyError::InvalidEndpoint(format!("invalid base URL: {e}")))?;

    if url.cannot_be_a_base() {
        return Err(CopyError::InvalidEndpoint(format!(
            "base URL cannot carry a path: {base_url}"
        )));
    }

    // `path()` is still percent-encoded; `set_path` keeps existing escapes.
    let prefix: Vec<&str> = url.path().split('/').filter(|s| !s.is_empty()).collect();
    let mut path = String::new();
    for segment in prefix.iter().chain(&[INSTANCES_SEGMENT, instance_id, CP_SEGMENT]) {
        path.push('/');
        path.push_str(segment);
    }
    url.set_path(&path);

    let scheme = match url.scheme() {
        "https" => Some("wss"),
        "http" => Some("ws"),
        _ => None,
    };
    if let Some(scheme) = scheme {
        url.set_scheme(scheme).map_err(|_| {
            CopyError::InvalidEndpoint(format!("cannot switch scheme of {base_url}"))
        })?;
    }

    Ok(url.into())
}
