//! HTTP delivery of bootstrap and frame payloads.
//!
//! The transport classifies outcomes and nothing else: no retries, no
//! buffering. Whoever calls it decides what a failure means.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, StreamError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Post,
    Put,
}

impl FromStr for HttpMethod {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            _ => Err(StreamError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Post => f.write_str("POST"),
            Self::Put => f.write_str("PUT"),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send `payload` as compact JSON. Ok only for a 2xx response.
    async fn send(
        &self,
        url: &str,
        payload: &Value,
        method: HttpMethod,
        headers: &HeaderMap,
        timeout: Duration,
    ) -> Result<()>;
}

/// Builds the header set every request carries: the identification header
/// plus `Content-Type: application/json`.
pub fn default_headers(name: &str, value: &str) -> Result<HeaderMap> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| StreamError::config(format!("bad header name {name:?}: {e}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| StreamError::config(format!("bad header value {value:?}: {e}")))?;

    let mut headers = HeaderMap::new();
    headers.insert(name, value);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

/// `reqwest`-backed transport. One client, so one connection pool, per run.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| StreamError::TransportFailure(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        url: &str,
        payload: &Value,
        method: HttpMethod,
        headers: &HeaderMap,
        timeout: Duration,
    ) -> Result<()> {
        let body = serde_json::to_vec(payload)?;
        let request = match method {
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Put => self.client.put(url),
        };

        let resp = request
            .headers(headers.clone())
            .timeout(timeout)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(StreamError::RejectedByServer(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn headers() -> HeaderMap {
        default_headers("IHate", "Zen").unwrap()
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("POST".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!("put".parse::<HttpMethod>().unwrap(), HttpMethod::Put);
        assert!(matches!(
            "GET".parse::<HttpMethod>(),
            Err(StreamError::UnsupportedMethod(m)) if m == "GET"
        ));
        assert!("DELETE".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_default_headers() {
        let h = headers();
        assert_eq!(h.get("IHate").unwrap(), "Zen");
        assert_eq!(h.get(CONTENT_TYPE).unwrap(), "application/json");
        assert!(default_headers("bad header", "x").is_err());
    }

    #[tokio::test]
    async fn test_post_sends_compact_json_with_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("IHate", "Zen"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"init":"{}","key":"abc123"}"#))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new().unwrap();
        let payload = json!({ "key": "abc123", "init": "{}" });
        transport
            .send(
                &server.uri(),
                &payload,
                HttpMethod::Post,
                &headers(),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_put_accepts_any_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/abc123"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let transport = HttpTransport::new().unwrap();
        let url = format!("{}/abc123", server.uri());
        let result = transport
            .send(
                &url,
                &json!({ "frame": "{}" }),
                HttpMethod::Put,
                &headers(),
                Duration::from_secs(5),
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_non_2xx_is_rejected_by_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let transport = HttpTransport::new().unwrap();
        let err = transport
            .send(
                &server.uri(),
                &json!({}),
                HttpMethod::Post,
                &headers(),
                Duration::from_secs(5),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::RejectedByServer(500)));
    }

    #[tokio::test]
    async fn test_timeout_is_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let transport = HttpTransport::new().unwrap();
        let err = transport
            .send(
                &server.uri(),
                &json!({}),
                HttpMethod::Put,
                &headers(),
                Duration::from_millis(100),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::TransportFailure(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_failure() {
        // bind then drop to get a port with nothing listening
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let transport = HttpTransport::new().unwrap();
        let err = transport
            .send(
                &format!("http://127.0.0.1:{port}/"),
                &json!({}),
                HttpMethod::Post,
                &headers(),
                Duration::from_secs(2),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::TransportFailure(_)));
    }
}
