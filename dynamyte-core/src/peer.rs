use crate::{DynamyteError, Result, VersionContext, VersionedValue};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Why a single replica did not contribute to a quorum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaFailure {
    /// The replica could not be reached (connect error, timeout).
    Unavailable(String),
    /// The replica answered with an error status.
    Rejected { status_code: u16, reason: String },
}

pub type ReplicaResult<T> = std::result::Result<T, ReplicaFailure>;

impl ReplicaFailure {
    pub fn unavailable() -> Self {
        ReplicaFailure::Unavailable("unavailable".to_string())
    }

    pub fn rejected(status_code: u16, reason: impl Into<String>) -> Self {
        ReplicaFailure::Rejected {
            status_code,
            reason: reason.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ReplicaFailure::Unavailable(_) => 503,
            ReplicaFailure::Rejected { status_code, .. } => *status_code,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            ReplicaFailure::Unavailable(reason) => reason,
            ReplicaFailure::Rejected { reason, .. } => reason,
        }
    }
}

impl From<&DynamyteError> for ReplicaFailure {
    fn from(error: &DynamyteError) -> Self {
        let status_code = match error {
            DynamyteError::InvalidRequest(_) => 400,
            DynamyteError::NotFound(_) => 404,
            DynamyteError::AlreadyExists(_) => 409,
            DynamyteError::QuorumFailure { status_code, .. } => *status_code,
            _ => 500,
        };
        ReplicaFailure::rejected(status_code, error.to_string())
    }
}

/// Remote single-replica access to a peer node.
#[async_trait]
pub trait PeerChannel: Send + Sync {
    async fn get(&self, node: &str, key: &str) -> ReplicaResult<VersionedValue>;

    async fn put(
        &self,
        node: &str,
        key: &str,
        value: &serde_json::Value,
        context: &VersionContext,
    ) -> ReplicaResult<VersionContext>;
}

#[derive(Debug, Serialize)]
struct PeerPutRequest<'a> {
    value: &'a serde_json::Value,
    context: &'a VersionContext,
}

#[derive(Debug, Deserialize)]
struct PeerPutResponse {
    context: VersionContext,
}

#[derive(Debug, Deserialize)]
struct PeerErrorResponse {
    error: String,
}

/// PeerChannel over the peers' `/no-quorum/val/{key}` HTTP endpoints.
#[derive(Clone)]
pub struct HttpPeerChannel {
    client: Client,
}

impl HttpPeerChannel {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| DynamyteError::Http(error.to_string()))?;

        Ok(Self { client })
    }

    pub fn value_url(&self, node: &str, key: &str) -> Result<Url> {
        node_url(node, &["no-quorum", "val", key])
    }

    fn url_or_failure(&self, node: &str, key: &str) -> ReplicaResult<Url> {
        self.value_url(node, key)
            .map_err(|error| ReplicaFailure::rejected(400, error.to_string()))
    }
}

#[async_trait]
impl PeerChannel for HttpPeerChannel {
    async fn get(&self, node: &str, key: &str) -> ReplicaResult<VersionedValue> {
        let url = self.url_or_failure(node, key)?;

        let response = self.client.get(url).send().await.map_err(|error| {
            tracing::warn!("Peer get failed: node={} key={} error={}", node, key, error);
            ReplicaFailure::unavailable()
        })?;

        if !response.status().is_success() {
            return Err(failure_from_response(response).await);
        }

        response.json::<VersionedValue>().await.map_err(|error| {
            ReplicaFailure::rejected(502, format!("invalid peer response: {}", error))
        })
    }

    async fn put(
        &self,
        node: &str,
        key: &str,
        value: &serde_json::Value,
        context: &VersionContext,
    ) -> ReplicaResult<VersionContext> {
        let url = self.url_or_failure(node, key)?;

        let response = self
            .client
            .put(url)
            .json(&PeerPutRequest { value, context })
            .send()
            .await
            .map_err(|error| {
                tracing::warn!("Peer put failed: node={} key={} error={}", node, key, error);
                ReplicaFailure::unavailable()
            })?;

        if !response.status().is_success() {
            return Err(failure_from_response(response).await);
        }

        response
            .json::<PeerPutResponse>()
            .await
            .map(|body| body.context)
            .map_err(|error| {
                ReplicaFailure::rejected(502, format!("invalid peer response: {}", error))
            })
    }
}

/// `http://{node}/{segments...}` with every segment percent-encoded, so a
/// key containing `/` stays a single path segment.
pub fn node_url(node: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(&format!("http://{}/", node))
        .map_err(|error| DynamyteError::Http(error.to_string()))?;

    url.path_segments_mut()
        .map_err(|_| DynamyteError::Http(format!("node address cannot be a base: {}", node)))?
        .clear()
        .extend(segments);

    Ok(url)
}

async fn failure_from_response(response: reqwest::Response) -> ReplicaFailure {
    let status = response.status();
    let reason = match response.json::<PeerErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => default_reason(status),
    };

    ReplicaFailure::rejected(status.as_u16(), reason)
}

fn default_reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("unknown status")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn http_response(status_line: &str, content_type: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            content_type,
            body.len(),
            body
        )
    }

    /// Answers the first connection with `response` and returns the listener address.
    async fn serve_once(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        addr
    }

    /// Accepts one connection and never answers it.
    async fn serve_stalled() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        addr
    }

    async fn read_request(socket: &mut TcpStream) {
        let mut request = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let read = socket.read(&mut chunk).await.unwrap();
            if read == 0 {
                return;
            }
            request.extend_from_slice(&chunk[..read]);

            let Some(head_end) = request.windows(4).position(|window| window == b"\r\n\r\n")
            else {
                continue;
            };
            let head = String::from_utf8_lossy(&request[..head_end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if request.len() >= head_end + 4 + body_len {
                return;
            }
        }
    }

    #[tokio::test]
    async fn test_error_body_reason_is_forwarded() {
        let addr = serve_once(http_response(
            "404 Not Found",
            "application/json",
            r#"{"error":"Value for key not found"}"#,
        ))
        .await;
        let channel = HttpPeerChannel::new(Duration::from_secs(2)).unwrap();

        let failure = channel.get(&addr, "k").await.unwrap_err();
        assert_eq!(
            failure,
            ReplicaFailure::rejected(404, "Value for key not found")
        );
    }

    #[tokio::test]
    async fn test_non_json_error_body_uses_status_reason() {
        let addr = serve_once(http_response("409 Conflict", "text/plain", "stale!")).await;
        let channel = HttpPeerChannel::new(Duration::from_secs(2)).unwrap();

        let failure = channel
            .put(&addr, "k", &serde_json::json!(1), &VersionContext::new(0))
            .await
            .unwrap_err();
        assert_eq!(failure, ReplicaFailure::rejected(409, "Conflict"));
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_bad_gateway() {
        let addr = serve_once(http_response("200 OK", "application/json", "{not json")).await;
        let channel = HttpPeerChannel::new(Duration::from_secs(2)).unwrap();

        let failure = channel.get(&addr, "k").await.unwrap_err();
        assert_eq!(failure.status_code(), 502);
        assert!(failure.reason().starts_with("invalid peer response"));

        let addr = serve_once(http_response("200 OK", "application/json", r#"{"ok":true}"#)).await;
        let failure = channel
            .put(&addr, "k", &serde_json::json!(1), &VersionContext::new(0))
            .await
            .unwrap_err();
        assert_eq!(failure.status_code(), 502);
    }

    #[tokio::test]
    async fn test_put_returns_peer_context() {
        let addr = serve_once(http_response(
            "200 OK",
            "application/json",
            r#"{"context":{"version":3}}"#,
        ))
        .await;
        let channel = HttpPeerChannel::new(Duration::from_secs(2)).unwrap();

        let context = channel
            .put(&addr, "k", &serde_json::json!("v"), &VersionContext::new(2))
            .await
            .unwrap();
        assert_eq!(context, VersionContext::new(3));
    }

    #[tokio::test]
    async fn test_stalled_peer_times_out_as_unavailable() {
        let addr = serve_stalled().await;
        let channel = HttpPeerChannel::new(Duration::from_millis(200)).unwrap();

        let failure = channel.get(&addr, "k").await.unwrap_err();
        assert_eq!(failure, ReplicaFailure::unavailable());
    }

    #[test]
    fn test_value_url_escapes_key() {
        let channel = HttpPeerChannel::new(Duration::from_secs(1)).unwrap();
        let url = channel.value_url("127.0.0.1:7002", "user/42 x").unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:7002/no-quorum/val/user%2F42%20x"
        );
    }

    #[test]
    fn test_node_url_rejects_bad_address() {
        assert!(node_url("bad host:7001", &["val", "k"]).is_err());
        assert_eq!(
            node_url("10.0.0.1:7001", &["val", "k"]).unwrap().as_str(),
            "http://10.0.0.1:7001/val/k"
        );
    }

    #[test]
    fn test_failure_status_codes() {
        assert_eq!(ReplicaFailure::unavailable().status_code(), 503);
        assert_eq!(ReplicaFailure::unavailable().reason(), "unavailable");
        assert_eq!(ReplicaFailure::rejected(404, "missing").status_code(), 404);

        let failure = ReplicaFailure::from(&DynamyteError::NotFound("k".to_string()));
        assert_eq!(failure.status_code(), 404);
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_unavailable() {
        let channel = HttpPeerChannel::new(Duration::from_millis(200)).unwrap();
        // Port 9 (discard) is not expected to accept HTTP connections locally.
        let result = channel.get("127.0.0.1:9", "key").await;
        assert_eq!(result.unwrap_err().status_code(), 503);
    }
}
