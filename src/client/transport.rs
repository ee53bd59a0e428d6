//! Signed HTTP transport shared by every family client
//!
//! HTTP/1.1 over native-tls with pooled keep-alive connections. Requests are
//! re-signed on every attempt; 429/503 responses and connection errors are
//! retried with exponential backoff.

use crate::client::signer::SigV4Signer;
use crate::error::{ConfigError, RequestError, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::HeaderMap;
use hyper::{Method, Request, StatusCode};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use native_tls::TlsConnector;
use std::collections::BTreeMap;
use std::time::Duration;

/// How the request payload is represented in the signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSigning {
    /// Hash the body (required by query APIs, cheap for small XML bodies)
    Hashed,
    /// `UNSIGNED-PAYLOAD` (object uploads)
    Unsigned,
}

/// Transport tuning
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub timeout: Duration,
    pub max_retries: u32,
    pub insecure_tls: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            max_retries: 3,
            insecure_tls: false,
        }
    }
}

/// Raw response returned by the transport
#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Simple pseudo-random jitter (0.0 - 1.0) from the clock's nanoseconds
fn rand_jitter() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

fn backoff(attempt: u32, jitter: bool) -> Duration {
    let base_ms = 100u64 * (1 << attempt.min(10));
    let jitter_ms = if jitter {
        (base_ms as f64 * 0.2 * rand_jitter()) as u64
    } else {
        0
    };
    Duration::from_millis(base_ms + jitter_ms)
}

/// Pooled HTTP client plus a SigV4 signer for one service.
///
/// Clone is cheap - the underlying HTTP client uses Arc internally.
#[derive(Clone)]
pub struct HttpTransport {
    client: HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>,
    signer: SigV4Signer,
    options: TransportOptions,
}

impl HttpTransport {
    pub fn new(signer: SigV4Signer, options: TransportOptions) -> std::result::Result<Self, ConfigError> {
        let mut http = HttpConnector::new();
        http.set_nodelay(true);
        http.enforce_http(false);
        http.set_connect_timeout(Some(Duration::from_secs(10)));
        http.set_keepalive(Some(Duration::from_secs(90)));

        let tls = (if options.insecure_tls {
            tracing::warn!("INSECURE TLS MODE ENABLED: Certificate verification is disabled!");
            TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()
        } else {
            TlsConnector::new()
        })
        .map_err(|e| ConfigError::ClientConstruction(format!("TLS connector: {}", e)))?;

        let https = HttpsConnector::from((http, tls.into()));

        let client = HyperClient::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(64)
            .retry_canceled_requests(true)
            .set_host(true)
            .build(https);

        Ok(Self {
            client,
            signer,
            options,
        })
    }

    pub fn signer(&self) -> &SigV4Signer {
        &self.signer
    }

    /// Send a signed request, retrying 429/503 responses and connection errors.
    ///
    /// Non-success statuses are returned as a [`RawResponse`]; turning them
    /// into errors is the caller's job since only it knows the error shape.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        headers: BTreeMap<String, String>,
        body: Bytes,
        payload: PayloadSigning,
    ) -> Result<RawResponse> {
        let max_retries = self.options.max_retries;

        for attempt in 0..=max_retries {
            // Re-sign on each attempt (timestamp changes)
            let signed_headers = match payload {
                PayloadSigning::Unsigned if !body.is_empty() => {
                    self.signer
                        .sign_unsigned_payload(method.as_str(), url, headers.clone())
                }
                _ => self.signer.sign(method.as_str(), url, headers.clone(), &body),
            };

            let mut req = Request::builder().method(method.clone()).uri(url);
            for (key, value) in signed_headers.iter() {
                req = req.header(key, value);
            }
            let request = req.body(Full::new(body.clone()))?;

            let sent = tokio::time::timeout(self.options.timeout, self.client.request(request)).await;

            match sent {
                Ok(Ok(response)) => {
                    let status = response.status();
                    let is_retryable = status == StatusCode::TOO_MANY_REQUESTS
                        || status == StatusCode::SERVICE_UNAVAILABLE;

                    if is_retryable && attempt < max_retries {
                        // Drain body to return connection to pool, then retry
                        let _ = response.collect().await;
                        tracing::debug!(%url, %status, attempt, "retrying throttled request");
                        tokio::time::sleep(backoff(attempt, true)).await;
                        continue;
                    }

                    let headers = response.headers().clone();
                    let body = response
                        .collect()
                        .await
                        .map_err(|e| RequestError::Transport(format!("Body error: {}", e)))?
                        .to_bytes();
                    return Ok(RawResponse {
                        status,
                        headers,
                        body,
                    });
                }
                Ok(Err(e)) => {
                    if attempt < max_retries {
                        tracing::debug!(%url, error = %e, attempt, "retrying failed request");
                        tokio::time::sleep(backoff(attempt, false)).await;
                        continue;
                    }
                    return Err(RequestError::Transport(format!("Request failed: {}", e)));
                }
                Err(_) => {
                    return Err(RequestError::Transport(format!(
                        "Request timed out after {}s",
                        self.options.timeout.as_secs()
                    )));
                }
            }
        }

        Err(RequestError::Transport("Max retries exceeded".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows() {
        assert_eq!(backoff(0, false), Duration::from_millis(100));
        assert_eq!(backoff(2, false), Duration::from_millis(400));
        assert!(backoff(1, true) >= Duration::from_millis(200));
        assert!(backoff(1, true) <= Duration::from_millis(240));
    }

    #[tokio::test]
    async fn test_transport_is_clone() {
        let signer = SigV4Signer::new("access", "secret", None, "s3");
        let transport = HttpTransport::new(signer, TransportOptions::default()).unwrap();
        let copy = transport.clone();
        assert_eq!(copy.signer().service(), "s3");
    }
}
