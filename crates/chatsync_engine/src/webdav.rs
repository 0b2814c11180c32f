//! WebDAV adapter: one JSON file per identity.
//!
//! ```text
//! {endpoint}/
//! └─ {folder}/
//!    └─ {identity}.json
//! ```

use crate::config::{ProviderKind, WebDavConfig};
use crate::error::SyncResult;
use crate::http::{HttpAuth, HttpRequest, Method, RoutedClient};
use crate::transport::RemoteAdapter;
use tracing::debug;

/// Opaque-blob store over WebDAV.
pub struct WebDavAdapter {
    client: RoutedClient,
    base_url: String,
    folder: String,
    auth: HttpAuth,
}

impl WebDavAdapter {
    /// Creates an adapter for the given account.
    pub fn new(config: &WebDavConfig, client: RoutedClient) -> Self {
        Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            folder: config.folder.trim_matches('/').to_string(),
            auth: HttpAuth::Basic {
                username: config.username.clone(),
                password: config.password.clone(),
            },
        }
    }

    /// URL of the snapshot folder (with trailing slash).
    pub fn folder_url(&self) -> String {
        format!("{}/{}/", self.base_url, self.folder)
    }

    /// URL of the snapshot file for `identity`.
    pub fn file_url(&self, identity: &str) -> String {
        format!(
            "{}{}.json",
            self.folder_url(),
            urlencoding::encode(identity)
        )
    }

    fn request(&self, method: Method, url: String) -> HttpRequest {
        HttpRequest::new(method, url).auth(self.auth.clone())
    }

    fn ensure_folder(&self) -> SyncResult<()> {
        let response = self
            .client
            .send(self.request(Method::Mkcol, self.folder_url()))?;
        match response.status {
            // 405: the collection already exists.
            200 | 201 | 204 | 301 | 405 => Ok(()),
            _ => Err(response.into_error("webdav mkcol")),
        }
    }
}

impl RemoteAdapter for WebDavAdapter {
    fn fetch(&self, identity: &str) -> SyncResult<Option<String>> {
        let response = self
            .client
            .send(self.request(Method::Get, self.file_url(identity)))?;
        match response.status {
            404 => Ok(None),
            _ if response.is_success() => response.text().map(Some),
            _ => Err(response.into_error("webdav fetch")),
        }
    }

    fn store(&self, identity: &str, blob: &str) -> SyncResult<()> {
        self.ensure_folder()?;

        let request = self
            .request(Method::Put, self.file_url(identity))
            .header("Content-Type", "application/json")
            .body(blob.as_bytes().to_vec());
        let response = self.client.send(request)?;
        if response.is_success() {
            Ok(())
        } else {
            Err(response.into_error("webdav store"))
        }
    }

    fn probe(&self) -> bool {
        let request = self
            .request(Method::Propfind, self.folder_url())
            .header("Depth", "0");
        match self.client.send(request) {
            // 404: credentials accepted, folder not created yet.
            Ok(response) => matches!(response.status, 200 | 207 | 404),
            Err(e) => {
                debug!(error = %e, "webdav probe failed");
                false
            }
        }
    }

    fn kind(&self) -> Option<ProviderKind> {
        Some(ProviderKind::WebDav)
    }
}
