//! Query-protocol client shared by the compute and warehouse families
//!
//! Every call is a form-encoded POST of `Action`, `Version` and flattened
//! parameters (`InstanceId.1=...`) to the service root, answered with XML.

use crate::client::transport::{HttpTransport, PayloadSigning};
use crate::client::xml;
use crate::error::{RequestError, Result};
use bytes::Bytes;
use hyper::Method;
use std::collections::BTreeMap;

/// Ordered request parameters, excluding `Action` and `Version`
#[derive(Debug, Clone, Default)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.push((name.into(), value.into()));
        self
    }

    /// `{prefix}.1`, `{prefix}.2`, ... one per value
    pub fn push_list(&mut self, prefix: &str, values: &[String]) -> &mut Self {
        for (i, value) in values.iter().enumerate() {
            self.0.push((format!("{}.{}", prefix, i + 1), value.clone()));
        }
        self
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Form body for `action` at API `version`
    pub fn encode(&self, action: &str, version: &str) -> String {
        let mut body = String::with_capacity(64 + self.0.len() * 32);
        body.push_str("Action=");
        body.push_str(&urlencoding::encode(action));
        body.push_str("&Version=");
        body.push_str(&urlencoding::encode(version));
        for (name, value) in &self.0 {
            body.push('&');
            body.push_str(&urlencoding::encode(name));
            body.push('=');
            body.push_str(&urlencoding::encode(value));
        }
        body
    }
}

/// Signed query-protocol client for one service endpoint
pub struct QueryClient {
    endpoint: String,
    version: &'static str,
    transport: HttpTransport,
}

impl QueryClient {
    pub fn new(endpoint: String, version: &'static str, transport: HttpTransport) -> Self {
        Self {
            endpoint,
            version,
            transport,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Invoke `action` and return the raw XML response body
    pub async fn call(&self, action: &str, params: &QueryParams) -> Result<Bytes> {
        let url = format!("{}/", self.endpoint);
        let body = params.encode(action, self.version);

        let mut headers = BTreeMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/x-www-form-urlencoded; charset=utf-8".to_string(),
        );
        headers.insert("content-length".to_string(), body.len().to_string());

        tracing::debug!(%action, endpoint = %self.endpoint, "query call");

        let response = self
            .transport
            .send(
                Method::POST,
                &url,
                headers,
                Bytes::from(body),
                PayloadSigning::Hashed,
            )
            .await?;

        if response.status.is_success() {
            return Ok(response.body);
        }

        Err(match xml::parse_error(&response.body) {
            Some((code, message)) => RequestError::service(response.status, code, message),
            None => RequestError::service(
                response.status,
                response.status.as_u16().to_string(),
                String::from_utf8_lossy(&response.body).into_owned(),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_flattens_and_escapes() {
        let mut params = QueryParams::new();
        params
            .push_list("InstanceId", &["i-1".to_string(), "i-2".to_string()])
            .push("Description", "nightly image");

        assert_eq!(
            params.encode("StopInstances", "2016-11-15"),
            "Action=StopInstances&Version=2016-11-15&InstanceId.1=i-1&InstanceId.2=i-2&Description=nightly%20image"
        );
    }

    #[test]
    fn test_get_and_len() {
        let params = QueryParams::new()
            .with("ClusterIdentifier", "analytics")
            .with("SkipFinalClusterSnapshot", "true");

        assert_eq!(params.len(), 2);
        assert_eq!(params.get("SkipFinalClusterSnapshot"), Some("true"));
        assert_eq!(params.get("NodeType"), None);
    }
}
