//! Upstash adapter: the blob is chunked across Redis keys.
//!
//! Redis REST values are size-limited, so a blob is split into chunks:
//!
//! ```text
//! {identity}-chunk-count  -> "N"
//! {identity}-chunk-0      -> first chunk
//! ...
//! {identity}-chunk-{N-1}  -> last chunk
//! ```
//!
//! The count is written after every chunk, so a reader never sees a count
//! pointing at chunks that were not stored yet. Writes are not atomic across
//! keys: when two devices push the same identity at once, a reader can pair
//! one writer's count with the other's chunks. Such a blob usually fails to
//! decode and the cycle ends with a validation error; the next cycle reads a
//! settled value.

use crate::config::{ProviderKind, UpstashConfig};
use crate::error::{SyncError, SyncResult};
use crate::http::{HttpAuth, HttpRequest, Method, RoutedClient};
use crate::transport::RemoteAdapter;
use serde::Deserialize;
use tracing::debug;

/// Default maximum chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Body of an Upstash REST reply.
#[derive(Debug, Deserialize)]
struct RedisReply {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Structured-document store over the Upstash Redis REST API.
pub struct UpstashAdapter {
    client: RoutedClient,
    base_url: String,
    token: String,
    chunk_size: usize,
}

impl UpstashAdapter {
    /// Creates an adapter for the given account.
    pub fn new(config: &UpstashConfig, client: RoutedClient) -> Self {
        Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            token: config.api_key.clone(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Sets the chunk size (minimum 4 bytes, so any UTF-8 char fits).
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(4);
        self
    }

    fn count_key(identity: &str) -> String {
        format!("{identity}-chunk-count")
    }

    fn chunk_key(identity: &str, index: usize) -> String {
        format!("{identity}-chunk-{index}")
    }

    fn command(&self, method: Method, command: &str, key: Option<&str>) -> HttpRequest {
        let url = match key {
            Some(key) => format!("{}/{}/{}", self.base_url, command, urlencoding::encode(key)),
            None => format!("{}/{}", self.base_url, command),
        };
        HttpRequest::new(method, url).auth(HttpAuth::Bearer(self.token.clone()))
    }

    fn call(&self, request: HttpRequest, context: &str) -> SyncResult<Option<serde_json::Value>> {
        let response = self.client.send(request)?;
        if !response.is_success() {
            return Err(response.into_error(context));
        }
        let reply: RedisReply = serde_json::from_slice(&response.body)
            .map_err(|e| SyncError::Validation(format!("{context}: malformed reply: {e}")))?;
        if let Some(error) = reply.error {
            return Err(SyncError::network_fatal(format!("{context}: {error}")));
        }
        Ok(reply.result.filter(|v| !v.is_null()))
    }

    fn get(&self, key: &str) -> SyncResult<Option<String>> {
        match self.call(self.command(Method::Get, "get", Some(key)), "upstash get")? {
            None => Ok(None),
            Some(serde_json::Value::String(s)) => Ok(Some(s)),
            Some(other) => Ok(Some(other.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        let request = self
            .command(Method::Post, "set", Some(key))
            .body(value.as_bytes().to_vec());
        self.call(request, "upstash set").map(|_| ())
    }
}

impl RemoteAdapter for UpstashAdapter {
    fn fetch(&self, identity: &str) -> SyncResult<Option<String>> {
        let Some(count) = self.get(&Self::count_key(identity))? else {
            return Ok(None);
        };
        let count: usize = count
            .trim()
            .parse()
            .map_err(|_| SyncError::Validation(format!("invalid chunk count: {count:?}")))?;

        let mut blob = String::new();
        for index in 0..count {
            let chunk = self
                .get(&Self::chunk_key(identity, index))?
                .ok_or_else(|| SyncError::Validation(format!("missing chunk {index} of {count}")))?;
            blob.push_str(&chunk);
        }
        debug!(chunks = count, bytes = blob.len(), "upstash fetch");
        Ok(Some(blob))
    }

    fn store(&self, identity: &str, blob: &str) -> SyncResult<()> {
        let chunks = split_chunks(blob, self.chunk_size);
        for (index, chunk) in chunks.iter().enumerate() {
            self.set(&Self::chunk_key(identity, index), chunk)?;
        }
        self.set(&Self::count_key(identity), &chunks.len().to_string())?;
        debug!(chunks = chunks.len(), bytes = blob.len(), "upstash store");
        Ok(())
    }

    fn probe(&self) -> bool {
        match self.call(self.command(Method::Get, "ping", None), "upstash ping") {
            Ok(reply) => reply.is_some(),
            Err(e) => {
                debug!(error = %e, "upstash probe failed");
                false
            }
        }
    }

    fn kind(&self) -> Option<ProviderKind> {
        Some(ProviderKind::Upstash)
    }
}

/// Splits `s` into pieces of at most `max` bytes on char boundaries.
fn split_chunks(s: &str, max: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = s;
    while !rest.is_empty() {
        let mut end = rest.len().min(max);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (head, tail) = rest.split_at(end);
        chunks.push(head);
        rest = tail;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpClient, HttpResponse, ProxyRoute};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Minimal Redis REST server.
    #[derive(Default)]
    struct FakeRedis {
        keys: Mutex<HashMap<String, String>>,
        writes: Mutex<Vec<String>>,
        token: String,
    }

    impl FakeRedis {
        fn with_token(token: &str) -> Self {
            Self {
                token: token.to_string(),
                ..Self::default()
            }
        }
    }

    impl HttpClient for FakeRedis {
        fn send(&self, request: HttpRequest) -> Result<HttpResponse, String> {
            if request.auth != Some(HttpAuth::Bearer(self.token.clone())) {
                return Ok(HttpResponse::new(401, r#"{"error":"Unauthorized"}"#));
            }
            let path = request
                .url
                .strip_prefix("https://kv.example.com/")
                .ok_or("unexpected host")?;
            let (command, key) = path.split_once('/').unwrap_or((path, ""));
            let key = urlencoding::decode(key).map_err(|e| e.to_string())?.into_owned();

            let body = match (request.method, command) {
                (Method::Get, "ping") => r#"{"result":"PONG"}"#.to_string(),
                (Method::Get, "get") => match self.keys.lock().get(&key) {
                    Some(v) => serde_json::json!({ "result": v }).to_string(),
                    None => r#"{"result":null}"#.to_string(),
                },
                (Method::Post, "set") => {
                    let value = String::from_utf8(request.body.unwrap_or_default())
                        .map_err(|e| e.to_string())?;
                    self.writes.lock().push(key.clone());
                    self.keys.lock().insert(key, value);
                    r#"{"result":"OK"}"#.to_string()
                }
                _ => return Ok(HttpResponse::new(400, r#"{"error":"bad command"}"#)),
            };
            Ok(HttpResponse::new(200, body))
        }
    }

    fn adapter(server: &Arc<FakeRedis>, token: &str) -> UpstashAdapter {
        let config = UpstashConfig {
            endpoint: "https://kv.example.com/".into(),
            username: "chatsync".into(),
            api_key: token.into(),
        };
        UpstashAdapter::new(
            &config,
            RoutedClient::new(Box::new(Arc::clone(server)), ProxyRoute::Direct),
        )
    }

    #[test]
    fn split_respects_char_boundaries() {
        assert!(split_chunks("", 4).is_empty());
        assert_eq!(split_chunks("abcdefg", 3), vec!["abc", "def", "g"]);
        // 'é' is two bytes; a 3-byte limit must not cut it.
        assert_eq!(split_chunks("aéé", 3), vec!["aé", "é"]);
    }

    #[test]
    fn fetch_never_written_is_absent() {
        let server = Arc::new(FakeRedis::with_token("tok"));
        assert_eq!(adapter(&server, "tok").fetch("chatsync").unwrap(), None);
    }

    #[test]
    fn store_and_fetch_chunked_blob() {
        let server = Arc::new(FakeRedis::with_token("tok"));
        let kv = adapter(&server, "tok").with_chunk_size(8);

        let blob = r#"{"sessions":[{"id":"ünïcode"}]}"#;
        kv.store("chatsync", blob).unwrap();
        assert_eq!(kv.fetch("chatsync").unwrap().as_deref(), Some(blob));

        let keys = server.keys.lock();
        let count: usize = keys["chatsync-chunk-count"].parse().unwrap();
        assert!(count > 1);
        assert!(keys.contains_key("chatsync-chunk-0"));
    }

    #[test]
    fn count_is_written_after_chunks() {
        let server = Arc::new(FakeRedis::with_token("tok"));
        let kv = adapter(&server, "tok").with_chunk_size(4);

        kv.store("chatsync", "0123456789").unwrap();
        let writes = server.writes.lock();
        assert_eq!(
            *writes,
            vec![
                "chatsync-chunk-0",
                "chatsync-chunk-1",
                "chatsync-chunk-2",
                "chatsync-chunk-count",
            ]
        );
        assert_eq!(server.keys.lock()["chatsync-chunk-count"], "3");
    }

    #[test]
    fn missing_chunk_is_validation_error() {
        let server = Arc::new(FakeRedis::with_token("tok"));
        server
            .keys
            .lock()
            .insert("chatsync-chunk-count".into(), "2".into());
        server
            .keys
            .lock()
            .insert("chatsync-chunk-0".into(), "{".into());

        assert!(matches!(
            adapter(&server, "tok").fetch("chatsync"),
            Err(SyncError::Validation(_))
        ));
    }

    #[test]
    fn wrong_token_is_auth_error() {
        let server = Arc::new(FakeRedis::with_token("tok"));
        let kv = adapter(&server, "nope");
        assert!(matches!(kv.fetch("chatsync"), Err(SyncError::Auth(_))));
        assert!(!kv.probe());
        assert!(adapter(&server, "tok").probe());
    }
}
