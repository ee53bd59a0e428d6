//! Object-storage client over the signed HTTP transport
//!
//! Path-style S3 REST requests (`{endpoint}/{bucket}/{key}`):
//! - Paginated ListObjectsV2 with byte-slice XML tag matching
//! - Server-side copy via `x-amz-copy-source`
//! - Bucket sub-resources (`?versioning`, `?cors`, `?encryption`, `?acl`, `?restore`)
//! - Query-string presigned GET URLs

use crate::client::signer::uri_encode;
use crate::client::transport::{HttpTransport, PayloadSigning, RawResponse};
use crate::client::{xml, ClientBinding, LocationConstraint, ResourceFamily};
use crate::error::{ConfigError, RequestError, Result};
use crate::storage::api::StorageApi;
use crate::storage::types::{
    CannedAcl, CorsRule, EncryptionConfig, EncryptionRule, ObjectMetadata, VersioningStatus,
};
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use hyper::{Method, StatusCode};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;

const S3_XMLNS: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// One page of a ListObjectsV2 response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsPage {
    pub keys: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// S3 REST client bound to one endpoint and credential set
///
/// Built only by consuming a [`ClientBinding`], so one binding backs exactly
/// one handler.
///
/// ```compile_fail
/// fn shared<T: Clone>() {}
/// shared::<cloudrm::storage::S3Client>();
/// ```
pub struct S3Client {
    endpoint: String,
    transport: HttpTransport,
}

impl S3Client {
    /// Consume a storage binding
    pub fn from_binding(binding: ClientBinding) -> std::result::Result<Self, ConfigError> {
        let (endpoint, transport) = binding.into_transport(ResourceFamily::Storage)?;
        Ok(Self {
            endpoint,
            transport,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build full object URL
    fn build_url(&self, bucket: &str, key: &str) -> String {
        let encoded_key = uri_encode(key, false);
        let mut url =
            String::with_capacity(self.endpoint.len() + 2 + bucket.len() + encoded_key.len());
        url.push_str(&self.endpoint);
        url.push('/');
        url.push_str(bucket);
        url.push('/');
        url.push_str(&encoded_key);
        url
    }

    /// Build bucket URL (no key)
    fn build_bucket_url(&self, bucket: &str) -> String {
        let mut url = String::with_capacity(self.endpoint.len() + 1 + bucket.len());
        url.push_str(&self.endpoint);
        url.push('/');
        url.push_str(bucket);
        url
    }

    /// Build the URL for a ListObjectsV2 request.
    ///
    /// Parameters are ordered alphabetically so the signer's canonical query
    /// fast path can skip re-sorting.
    pub fn build_list_url(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
    ) -> String {
        let base_url = self.build_bucket_url(bucket);

        let mut url = String::with_capacity(base_url.len() + 256);
        url.push_str(&base_url);
        url.push_str("/?");

        if let Some(token) = continuation_token {
            url.push_str("continuation-token=");
            url.push_str(&uri_encode(token, true));
            url.push('&');
        }
        url.push_str("list-type=2&max-keys=1000");
        if let Some(p) = prefix.filter(|p| !p.is_empty()) {
            url.push_str("&prefix=");
            url.push_str(&uri_encode(p, true));
        }

        url
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        headers: BTreeMap<String, String>,
        body: Bytes,
        payload: PayloadSigning,
    ) -> Result<RawResponse> {
        let response = self.transport.send(method, url, headers, body, payload).await?;
        Self::check(response)
    }

    async fn send_empty(&self, method: Method, url: &str) -> Result<RawResponse> {
        self.send(method, url, BTreeMap::new(), Bytes::new(), PayloadSigning::Hashed)
            .await
    }

    /// Send a small XML document with the integrity headers bucket configuration calls require
    async fn send_xml(&self, method: Method, url: &str, document: String) -> Result<RawResponse> {
        let body = document.into_bytes();
        let md5_hash = md5::compute(&body);
        let md5_base64 = base64::engine::general_purpose::STANDARD.encode(&md5_hash[..]);

        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/xml".to_string());
        headers.insert("content-length".to_string(), body.len().to_string());
        headers.insert("content-md5".to_string(), md5_base64);

        self.send(method, url, headers, Bytes::from(body), PayloadSigning::Hashed)
            .await
    }

    /// Turn a non-success response into a service error
    fn check(response: RawResponse) -> Result<RawResponse> {
        if response.status.is_success() {
            return Ok(response);
        }
        Err(Self::service_error(response.status, &response.body))
    }

    fn service_error(status: StatusCode, body: &[u8]) -> RequestError {
        match xml::parse_error(body) {
            Some((code, message)) => RequestError::service(status, code, message),
            // HEAD responses carry no body; the status is all there is
            None => RequestError::service(
                status,
                status.as_u16().to_string(),
                status.canonical_reason().unwrap_or("Unknown"),
            ),
        }
    }

    /// Parse one ListObjectsV2 page, matching tags as byte slices
    fn parse_list_response(xml_data: &[u8]) -> Result<ListObjectsPage> {
        let mut reader = Reader::from_reader(xml_data);
        reader.config_mut().trim_text_start = true;
        reader.config_mut().trim_text_end = true;

        let mut page = ListObjectsPage::default();
        let mut in_contents = false;
        let mut current_text = String::with_capacity(256);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    if e.local_name().as_ref() == b"Contents" {
                        in_contents = true;
                    }
                    current_text.clear();
                }
                Ok(Event::Text(e)) => {
                    current_text.clear();
                    current_text.push_str(&e.unescape()?);
                }
                Ok(Event::End(e)) => {
                    match e.local_name().as_ref() {
                        b"Key" if in_contents => {
                            page.keys.push(std::mem::take(&mut current_text));
                        }
                        b"Contents" => in_contents = false,
                        b"IsTruncated" => page.is_truncated = current_text == "true",
                        b"NextContinuationToken" => {
                            page.next_continuation_token = Some(std::mem::take(&mut current_text));
                        }
                        _ => {}
                    }
                    current_text.clear();
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(RequestError::XmlParse(e.to_string())),
                _ => {}
            }
        }

        Ok(page)
    }

    fn parse_cors_response(xml_data: &[u8]) -> Result<Vec<CorsRule>> {
        let mut reader = Reader::from_reader(xml_data);
        reader.config_mut().trim_text_start = true;
        reader.config_mut().trim_text_end = true;

        let mut rules = Vec::new();
        let mut current: Option<CorsRule> = None;
        let mut current_text = String::with_capacity(64);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    if e.local_name().as_ref() == b"CORSRule" {
                        current = Some(CorsRule::default());
                    }
                    current_text.clear();
                }
                Ok(Event::Text(e)) => {
                    current_text.clear();
                    current_text.push_str(&e.unescape()?);
                }
                Ok(Event::End(e)) => {
                    let name = e.local_name();
                    if name.as_ref() == b"CORSRule" {
                        if let Some(rule) = current.take() {
                            rules.push(rule);
                        }
                    } else if let Some(rule) = current.as_mut() {
                        let value = std::mem::take(&mut current_text);
                        match name.as_ref() {
                            b"AllowedOrigin" => rule.allowed_origins.push(value),
                            b"AllowedMethod" => rule.allowed_methods.push(value),
                            b"AllowedHeader" => rule.allowed_headers.push(value),
                            b"ExposeHeader" => rule.expose_headers.push(value),
                            b"MaxAgeSeconds" => rule.max_age_seconds = value.parse().ok(),
                            _ => {}
                        }
                    }
                    current_text.clear();
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(RequestError::XmlParse(e.to_string())),
                _ => {}
            }
        }

        Ok(rules)
    }

    fn parse_encryption_response(xml_data: &[u8]) -> Result<EncryptionConfig> {
        let mut reader = Reader::from_reader(xml_data);
        reader.config_mut().trim_text_start = true;
        reader.config_mut().trim_text_end = true;

        let mut config = EncryptionConfig::default();
        let mut current: Option<EncryptionRule> = None;
        let mut current_text = String::with_capacity(64);

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    if e.local_name().as_ref() == b"Rule" {
                        current = Some(EncryptionRule {
                            sse_algorithm: String::new(),
                            kms_master_key_id: None,
                            bucket_key_enabled: None,
                        });
                    }
                    current_text.clear();
                }
                Ok(Event::Text(e)) => {
                    current_text.clear();
                    current_text.push_str(&e.unescape()?);
                }
                Ok(Event::End(e)) => {
                    let name = e.local_name();
                    if name.as_ref() == b"Rule" {
                        if let Some(rule) = current.take() {
                            config.rules.push(rule);
                        }
                    } else if let Some(rule) = current.as_mut() {
                        match name.as_ref() {
                            b"SSEAlgorithm" => {
                                rule.sse_algorithm = std::mem::take(&mut current_text);
                            }
                            b"KMSMasterKeyID" => {
                                rule.kms_master_key_id = Some(std::mem::take(&mut current_text));
                            }
                            b"BucketKeyEnabled" => {
                                rule.bucket_key_enabled = Some(current_text == "true");
                            }
                            _ => {}
                        }
                    }
                    current_text.clear();
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(RequestError::XmlParse(e.to_string())),
                _ => {}
            }
        }

        Ok(config)
    }

    fn metadata_from_headers(response: &RawResponse) -> ObjectMetadata {
        let owned = |name: &str| response.header(name).map(str::to_string);

        let metadata = response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                let user_key = name.as_str().strip_prefix("x-amz-meta-")?;
                Some((user_key.to_string(), value.to_str().ok()?.to_string()))
            })
            .collect();

        ObjectMetadata {
            content_length: response
                .header("content-length")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            content_type: owned("content-type"),
            etag: owned("etag"),
            last_modified: owned("last-modified"),
            storage_class: owned("x-amz-storage-class"),
            version_id: owned("x-amz-version-id"),
            restore: owned("x-amz-restore"),
            metadata,
        }
    }

    fn create_bucket_document(location: &LocationConstraint) -> String {
        let mut doc = String::with_capacity(160);
        doc.push_str("<CreateBucketConfiguration xmlns=\"");
        doc.push_str(S3_XMLNS);
        doc.push_str("\">");
        xml::push_element(&mut doc, "LocationConstraint", location.region());
        doc.push_str("</CreateBucketConfiguration>");
        doc
    }

    fn versioning_document(status: VersioningStatus) -> String {
        let mut doc = String::with_capacity(128);
        doc.push_str("<VersioningConfiguration xmlns=\"");
        doc.push_str(S3_XMLNS);
        doc.push_str("\">");
        xml::push_element(&mut doc, "Status", status.as_str());
        doc.push_str("</VersioningConfiguration>");
        doc
    }

    fn cors_document(rules: &[CorsRule]) -> String {
        let mut doc = String::with_capacity(rules.len() * 200 + 64);
        doc.push_str("<CORSConfiguration xmlns=\"");
        doc.push_str(S3_XMLNS);
        doc.push_str("\">");
        for rule in rules {
            doc.push_str("<CORSRule>");
            for header in &rule.allowed_headers {
                xml::push_element(&mut doc, "AllowedHeader", header);
            }
            for method in &rule.allowed_methods {
                xml::push_element(&mut doc, "AllowedMethod", method);
            }
            for origin in &rule.allowed_origins {
                xml::push_element(&mut doc, "AllowedOrigin", origin);
            }
            for header in &rule.expose_headers {
                xml::push_element(&mut doc, "ExposeHeader", header);
            }
            if let Some(max_age) = rule.max_age_seconds {
                xml::push_element(&mut doc, "MaxAgeSeconds", &max_age.to_string());
            }
            doc.push_str("</CORSRule>");
        }
        doc.push_str("</CORSConfiguration>");
        doc
    }

    fn restore_document(days: u32) -> String {
        let mut doc = String::with_capacity(160);
        doc.push_str("<RestoreRequest xmlns=\"");
        doc.push_str(S3_XMLNS);
        doc.push_str("\">");
        xml::push_element(&mut doc, "Days", &days.to_string());
        doc.push_str("<GlacierJobParameters>");
        xml::push_element(&mut doc, "Tier", "Standard");
        doc.push_str("</GlacierJobParameters></RestoreRequest>");
        doc
    }
}

#[async_trait]
impl StorageApi for S3Client {
    async fn list_buckets(&self) -> Result<Vec<String>> {
        let url = format!("{}/", self.endpoint);
        let response = self.send_empty(Method::GET, &url).await?;
        xml::texts_at(&response.body, &["Bucket", "Name"])
    }

    async fn create_bucket(&self, bucket: &str, location: &LocationConstraint) -> Result<()> {
        let url = self.build_bucket_url(bucket);
        if location.requires_body() {
            self.send_xml(Method::PUT, &url, Self::create_bucket_document(location))
                .await?;
        } else {
            self.send_empty(Method::PUT, &url).await?;
        }
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let url = self.build_bucket_url(bucket);
        self.send_empty(Method::DELETE, &url).await?;
        Ok(())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMetadata> {
        let url = self.build_url(bucket, key);
        let response = self.send_empty(Method::HEAD, &url).await?;
        Ok(Self::metadata_from_headers(&response))
    }

    async fn list_objects(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let url = self.build_list_url(bucket, prefix, token.as_deref());
            let response = self.send_empty(Method::GET, &url).await?;
            let page = Self::parse_list_response(&response.body)?;
            keys.extend(page.keys);

            match page.next_continuation_token {
                Some(next) if page.is_truncated => token = Some(next),
                _ => break,
            }
        }

        Ok(keys)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let url = self.build_url(bucket, key);
        let response = self.send_empty(Method::GET, &url).await?;
        Ok(response.body)
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<()> {
        let url = self.build_url(bucket, key);

        let mut headers = BTreeMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/octet-stream".to_string(),
        );
        headers.insert("content-length".to_string(), data.len().to_string());

        self.send(Method::PUT, &url, headers, data, PayloadSigning::Unsigned)
            .await?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let url = self.build_url(bucket, key);
        self.send_empty(Method::DELETE, &url).await?;
        Ok(())
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()> {
        let url = self.build_url(dst_bucket, dst_key);

        let mut headers = BTreeMap::new();
        headers.insert(
            "x-amz-copy-source".to_string(),
            format!("/{}/{}", src_bucket, uri_encode(src_key, false)),
        );

        let response = self
            .send(Method::PUT, &url, headers, Bytes::new(), PayloadSigning::Hashed)
            .await?;

        // A copy can fail after the 200 status line was sent; the error is then in the body
        if let Some((code, message)) = xml::parse_error(&response.body) {
            return Err(RequestError::service(response.status, code, message));
        }
        Ok(())
    }

    async fn restore_object(&self, bucket: &str, key: &str, days: u32) -> Result<()> {
        let url = format!("{}?restore=", self.build_url(bucket, key));
        self.send_xml(Method::POST, &url, Self::restore_document(days))
            .await?;
        Ok(())
    }

    async fn put_object_acl(&self, bucket: &str, key: &str, acl: CannedAcl) -> Result<()> {
        let url = format!("{}?acl=", self.build_url(bucket, key));

        let mut headers = BTreeMap::new();
        headers.insert("x-amz-acl".to_string(), acl.as_str().to_string());

        self.send(Method::PUT, &url, headers, Bytes::new(), PayloadSigning::Hashed)
            .await?;
        Ok(())
    }

    async fn get_bucket_versioning(&self, bucket: &str) -> Result<VersioningStatus> {
        let url = format!("{}?versioning=", self.build_bucket_url(bucket));
        let response = self.send_empty(Method::GET, &url).await?;

        let status = xml::first_text_at(&response.body, &["VersioningConfiguration", "Status"])?;
        Ok(match status.as_deref() {
            Some("Enabled") => VersioningStatus::Enabled,
            Some("Suspended") => VersioningStatus::Suspended,
            _ => VersioningStatus::Unset,
        })
    }

    async fn put_bucket_versioning(&self, bucket: &str, status: VersioningStatus) -> Result<()> {
        if status == VersioningStatus::Unset {
            return Err(RequestError::InvalidInput(
                "versioning cannot be returned to the unset state".to_string(),
            ));
        }
        let url = format!("{}?versioning=", self.build_bucket_url(bucket));
        self.send_xml(Method::PUT, &url, Self::versioning_document(status))
            .await?;
        Ok(())
    }

    async fn get_bucket_cors(&self, bucket: &str) -> Result<Vec<CorsRule>> {
        let url = format!("{}?cors=", self.build_bucket_url(bucket));
        let response = self.send_empty(Method::GET, &url).await?;
        Self::parse_cors_response(&response.body)
    }

    async fn put_bucket_cors(&self, bucket: &str, rules: &[CorsRule]) -> Result<()> {
        let url = format!("{}?cors=", self.build_bucket_url(bucket));
        if rules.is_empty() {
            // An empty CORSConfiguration is rejected; removing the policy is a DELETE
            self.send_empty(Method::DELETE, &url).await?;
        } else {
            self.send_xml(Method::PUT, &url, Self::cors_document(rules))
                .await?;
        }
        Ok(())
    }

    async fn get_bucket_encryption(&self, bucket: &str) -> Result<EncryptionConfig> {
        let url = format!("{}?encryption=", self.build_bucket_url(bucket));
        let response = self.send_empty(Method::GET, &url).await?;
        Self::parse_encryption_response(&response.body)
    }

    async fn presign_get(&self, bucket: &str, key: &str, expires_secs: u64) -> Result<String> {
        let url = self.build_url(bucket, key);
        Ok(self.transport.signer().presign("GET", &url, expires_secs))
    }
}
