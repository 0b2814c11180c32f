//! HTTP transport seam.
//!
//! Remote adapters speak HTTP through the [`HttpClient`] trait, so the
//! concrete client library stays swappable: the `reqwest-client` feature
//! provides [`ReqwestClient`], tests plug in scripted clients.
//!
//! [`ProxyRoute`] rewrites request URLs to go through an intermediary. It only
//! touches the URL; method, headers, credentials and body pass through
//! untouched.

use crate::error::{SyncError, SyncResult};

/// HTTP methods used by the adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET.
    Get,
    /// PUT.
    Put,
    /// POST.
    Post,
    /// WebDAV PROPFIND.
    Propfind,
    /// WebDAV MKCOL.
    Mkcol,
}

impl Method {
    /// Returns the method token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Propfind => "PROPFIND",
            Method::Mkcol => "MKCOL",
        }
    }
}

/// Credentials attached to a request.
#[derive(Clone, PartialEq, Eq)]
pub enum HttpAuth {
    /// HTTP basic auth.
    Basic {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// Bearer token.
    Bearer(String),
}

impl std::fmt::Debug for HttpAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            HttpAuth::Bearer(_) => f.write_str("Bearer(..)"),
        }
    }
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// Credentials.
    pub auth: Option<HttpAuth>,
    /// Request body.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Creates a request with no headers, credentials or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            auth: None,
            body: None,
        }
    }

    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attaches credentials.
    pub fn auth(mut self, auth: HttpAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Sets the body.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns the body as UTF-8.
    pub fn text(&self) -> SyncResult<String> {
        String::from_utf8(self.body.clone())
            .map_err(|e| SyncError::Validation(format!("response body is not UTF-8: {e}")))
    }

    /// Maps an unexpected status to the matching error.
    ///
    /// 401/403 are credential failures; 408, 429 and 5xx are worth retrying.
    pub fn into_error(self, context: &str) -> SyncError {
        match self.status {
            401 | 403 => SyncError::Auth(format!("{context}: status {}", self.status)),
            408 | 429 | 500..=599 => {
                SyncError::network_retryable(format!("{context}: status {}", self.status))
            }
            status => SyncError::network_fatal(format!("{context}: status {status}")),
        }
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. A returned
/// `Err` means the request never produced a response (DNS, TLS, connection
/// reset, timeout); every status code, including errors, is an `Ok`.
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, String>;
}

impl<C: HttpClient + ?Sized> HttpClient for std::sync::Arc<C> {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        (**self).send(request)
    }
}

/// Where requests are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyRoute {
    /// Straight to the backend.
    Direct,
    /// Through an intermediary; the target URL is appended to the prefix.
    Via(String),
}

impl ProxyRoute {
    /// Routes through the given proxy prefix.
    pub fn via(prefix: impl Into<String>) -> Self {
        ProxyRoute::Via(prefix.into())
    }

    /// Rewrites a target URL according to this route.
    pub fn rewrite(&self, url: &str) -> String {
        match self {
            ProxyRoute::Direct => url.to_string(),
            ProxyRoute::Via(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), url),
        }
    }
}

/// Sends requests through a [`ProxyRoute`].
pub struct RoutedClient {
    client: Box<dyn HttpClient>,
    route: ProxyRoute,
}

impl RoutedClient {
    /// Wraps a client with a route.
    pub fn new(client: Box<dyn HttpClient>, route: ProxyRoute) -> Self {
        Self { client, route }
    }

    /// Sends a request, rewriting its URL first.
    ///
    /// Transport failures become retryable [`SyncError::Network`] errors.
    pub fn send(&self, mut request: HttpRequest) -> SyncResult<HttpResponse> {
        request.url = self.route.rewrite(&request.url);
        let method = request.method;
        self.client.send(request).map_err(|e| {
            tracing::debug!(method = method.as_str(), error = %e, "request failed");
            SyncError::network_retryable(e)
        })
    }
}

/// Blocking `reqwest` implementation of [`HttpClient`].
#[cfg(feature = "reqwest-client")]
pub struct ReqwestClient {
    inner: reqwest::blocking::Client,
}

#[cfg(feature = "reqwest-client")]
impl ReqwestClient {
    /// Creates a client with the given request timeout.
    pub fn new(timeout: std::time::Duration) -> SyncResult<Self> {
        let inner = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { inner })
    }
}

#[cfg(feature = "reqwest-client")]
impl HttpClient for ReqwestClient {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| e.to_string())?;
        let mut builder = self.inner.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.auth {
            Some(HttpAuth::Basic { username, password }) => {
                builder.basic_auth(username, Some(password))
            }
            Some(HttpAuth::Bearer(token)) => builder.bearer_auth(token),
            None => builder,
        };
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| e.to_string())?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}
