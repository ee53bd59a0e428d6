//! Resource client factory
//!
//! Turns a [`CredentialBundle`] into a [`ClientBinding`]: a signed HTTP
//! transport scoped to exactly one [`ResourceFamily`] and, when the bundle
//! carries a region, to that region plus the [`LocationConstraint`] used when
//! creating storage containers.

pub mod query;
pub mod signer;
pub mod transport;
pub mod xml;

pub use query::{QueryClient, QueryParams};
pub use signer::SigV4Signer;
pub use transport::{HttpTransport, PayloadSigning, RawResponse, TransportOptions};

use crate::config::{Config, CredentialBundle};
use crate::error::ConfigError;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Category of cloud-managed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceFamily {
    /// Object storage (buckets and objects)
    Storage,
    /// Compute instances
    Compute,
    /// Data-warehouse clusters
    Warehouse,
}

impl ResourceFamily {
    /// Service name used in request signatures
    pub fn service_name(&self) -> &'static str {
        match self {
            ResourceFamily::Storage => "s3",
            ResourceFamily::Compute => "ec2",
            ResourceFamily::Warehouse => "redshift",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResourceFamily::Storage => "storage",
            ResourceFamily::Compute => "compute",
            ResourceFamily::Warehouse => "warehouse",
        }
    }

    /// Public endpoint for this family in `region`
    fn default_endpoint(&self, region: Option<&str>) -> String {
        match (self, region) {
            (ResourceFamily::Storage, None) => "https://s3.amazonaws.com".to_string(),
            (family, region) => format!(
                "https://{}.{}.amazonaws.com",
                family.service_name(),
                region.unwrap_or(signer::DEFAULT_SIGNING_REGION)
            ),
        }
    }
}

impl fmt::Display for ResourceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Region hint sent only when creating a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationConstraint(String);

impl LocationConstraint {
    pub fn new(region: impl Into<String>) -> Self {
        Self(region.into())
    }

    pub fn region(&self) -> &str {
        &self.0
    }

    /// The provider rejects an explicit constraint for its default region,
    /// so container creation there sends no configuration body.
    pub fn requires_body(&self) -> bool {
        self.0 != signer::DEFAULT_SIGNING_REGION
    }
}

impl fmt::Display for LocationConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Builds family-scoped client bindings
#[derive(Debug, Clone, Default)]
pub struct ClientFactory {
    endpoints: HashMap<ResourceFamily, String>,
    options: TransportOptions,
}

impl ClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory using endpoint overrides and transport settings from `config`
    pub fn from_config(config: &Config) -> Self {
        let mut factory = Self::new().with_options(TransportOptions {
            timeout: Duration::from_secs(config.transport.request_timeout),
            max_retries: config.transport.max_retries,
            insecure_tls: config.transport.insecure_tls,
        });

        let overrides = [
            (ResourceFamily::Storage, &config.endpoints.storage),
            (ResourceFamily::Compute, &config.endpoints.compute),
            (ResourceFamily::Warehouse, &config.endpoints.warehouse),
        ];
        for (family, endpoint) in overrides {
            if let Some(url) = endpoint {
                factory = factory.with_endpoint(family, url.clone());
            }
        }

        factory
    }

    /// Send requests for `family` to `url` instead of the public endpoint
    pub fn with_endpoint(mut self, family: ResourceFamily, url: impl Into<String>) -> Self {
        self.endpoints.insert(family, url.into());
        self
    }

    pub fn with_options(mut self, options: TransportOptions) -> Self {
        self.options = options;
        self
    }

    /// Construct a client bound to `family`.
    ///
    /// Fails with [`ConfigError::ClientConstruction`] when the identity,
    /// region or endpoint is malformed or the TLS stack cannot be initialized.
    pub fn build(
        &self,
        bundle: &CredentialBundle,
        family: ResourceFamily,
    ) -> Result<ClientBinding, ConfigError> {
        validate_identity("access identifier", bundle.identifier())?;
        validate_identity("access secret", bundle.secret())?;
        if let Some(region) = bundle.region() {
            validate_region(region)?;
        }

        let endpoint = match self.endpoints.get(&family) {
            Some(url) => {
                validate_endpoint(url)?;
                url.trim_end_matches('/').to_string()
            }
            None => family.default_endpoint(bundle.region()),
        };

        let signer = SigV4Signer::new(
            bundle.identifier(),
            bundle.secret(),
            bundle.region(),
            family.service_name(),
        );
        let transport = HttpTransport::new(signer, self.options.clone())?;

        tracing::debug!(%family, %endpoint, region = ?bundle.region(), "built client binding");

        Ok(ClientBinding {
            family,
            region: bundle.region().map(str::to_string),
            location_constraint: bundle.region().map(LocationConstraint::new),
            endpoint,
            transport,
        })
    }
}

fn validate_identity(what: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::ClientConstruction(format!("{} is empty", what)));
    }
    if !value.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(ConfigError::ClientConstruction(format!(
            "{} contains whitespace or non-ASCII characters",
            what
        )));
    }
    Ok(())
}

fn validate_region(region: &str) -> Result<(), ConfigError> {
    let valid = region
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if !valid || region.starts_with('-') || region.ends_with('-') {
        return Err(ConfigError::ClientConstruction(format!(
            "malformed region '{}'",
            region
        )));
    }
    Ok(())
}

fn validate_endpoint(url: &str) -> Result<(), ConfigError> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            ConfigError::ClientConstruction(format!("endpoint '{}' is not an http(s) URL", url))
        })?;
    if rest.is_empty() || rest.starts_with('/') || rest.contains(char::is_whitespace) {
        return Err(ConfigError::ClientConstruction(format!(
            "endpoint '{}' has no host",
            url
        )));
    }
    Ok(())
}

/// Network client scoped to one resource family.
///
/// Owned by exactly one handler; not `Clone`. Family clients consume it.
pub struct ClientBinding {
    family: ResourceFamily,
    region: Option<String>,
    location_constraint: Option<LocationConstraint>,
    endpoint: String,
    transport: HttpTransport,
}

impl ClientBinding {
    pub fn family(&self) -> ResourceFamily {
        self.family
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Defined only when the binding was built with an explicit region
    pub fn location_constraint(&self) -> Option<&LocationConstraint> {
        self.location_constraint.as_ref()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Take the endpoint and transport, checking the family first
    pub(crate) fn into_transport(
        self,
        expected: ResourceFamily,
    ) -> Result<(String, HttpTransport), ConfigError> {
        if self.family != expected {
            return Err(ConfigError::FamilyMismatch {
                expected: expected.name(),
                actual: self.family.name(),
            });
        }
        Ok((self.endpoint, self.transport))
    }
}

impl fmt::Debug for ClientBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBinding")
            .field("family", &self.family)
            .field("region", &self.region)
            .field("location_constraint", &self.location_constraint)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
