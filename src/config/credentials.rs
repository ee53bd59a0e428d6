//! Credential resolution
//!
//! Reads the access identifier, secret and region from the process
//! environment. When any of the three is missing, a local secrets file
//! (`.env` by default) is consulted for the missing names. Environment values
//! always take precedence over the file.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Environment name of the access identifier
pub const ACCESS_KEY_VAR: &str = "AWS_ACCESS_KEY_ID";
/// Environment name of the access secret
pub const SECRET_KEY_VAR: &str = "AWS_SECRET_ACCESS_KEY";
/// Environment name of the optional region
pub const REGION_VAR: &str = "REGION";

/// Immutable access identity used to build resource clients
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    identifier: String,
    secret: String,
    region: Option<String>,
}

impl CredentialBundle {
    /// Build a bundle, rejecting an empty identifier or secret.
    /// An empty region is treated as absent.
    pub fn new(
        identifier: impl Into<String>,
        secret: impl Into<String>,
        region: Option<String>,
    ) -> Result<Self, ConfigError> {
        let identifier = identifier.into();
        let secret = secret.into();

        let mut missing = Vec::new();
        if identifier.is_empty() {
            missing.push(ACCESS_KEY_VAR);
        }
        if secret.is_empty() {
            missing.push(SECRET_KEY_VAR);
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingCredentials {
                missing: missing.join(", "),
            });
        }

        Ok(Self {
            identifier,
            secret,
            region: region.filter(|r| !r.is_empty()),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Region, or `None` to use the provider default
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Where the fallback secrets file comes from
#[derive(Debug, Clone)]
enum SecretsFile {
    /// `.env` in the current directory or one of its ancestors
    Discover,
    Path(PathBuf),
    Disabled,
}

/// Resolves a [`CredentialBundle`] from the environment with a secrets file fallback
pub struct CredentialResolver {
    env: EnvLookup,
    secrets: SecretsFile,
}

impl Default for CredentialResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialResolver {
    /// Resolver over the process environment and a discovered `.env` file
    pub fn new() -> Self {
        Self {
            env: Box::new(|name| std::env::var(name).ok()),
            secrets: SecretsFile::Discover,
        }
    }

    /// Use an explicit secrets file instead of searching for `.env`
    pub fn with_secrets_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.secrets = SecretsFile::Path(path.into());
        self
    }

    /// Never consult a secrets file
    pub fn without_secrets_file(mut self) -> Self {
        self.secrets = SecretsFile::Disabled;
        self
    }

    /// Replace the environment lookup (tests, embedding)
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(lookup);
        self
    }

    /// Resolve the credential bundle.
    ///
    /// Fails with [`ConfigError::MissingCredentials`] when the identifier or
    /// the secret is absent from both the environment and the secrets file.
    /// A missing region is not an error.
    pub fn resolve(&self) -> Result<CredentialBundle, ConfigError> {
        let mut identifier = self.read(ACCESS_KEY_VAR);
        let mut secret = self.read(SECRET_KEY_VAR);
        let mut region = self.read(REGION_VAR);

        if identifier.is_none() || secret.is_none() || region.is_none() {
            let file = self.load_secrets_file();
            let from_file = |name: &str| file.get(name).filter(|v| !v.is_empty()).cloned();
            identifier = identifier.or_else(|| from_file(ACCESS_KEY_VAR));
            secret = secret.or_else(|| from_file(SECRET_KEY_VAR));
            region = region.or_else(|| from_file(REGION_VAR));
        }

        let mut missing = Vec::new();
        if identifier.is_none() {
            missing.push(ACCESS_KEY_VAR);
        }
        if secret.is_none() {
            missing.push(SECRET_KEY_VAR);
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingCredentials {
                missing: missing.join(", "),
            });
        }

        CredentialBundle::new(
            identifier.unwrap_or_default(),
            secret.unwrap_or_default(),
            region,
        )
    }

    fn read(&self, name: &str) -> Option<String> {
        (self.env)(name).filter(|v| !v.is_empty())
    }

    /// Parse the secrets file without touching the process environment.
    /// A missing or malformed file yields no values.
    fn load_secrets_file(&self) -> HashMap<String, String> {
        let iter = match &self.secrets {
            SecretsFile::Disabled => return HashMap::new(),
            SecretsFile::Discover => dotenvy::dotenv_iter(),
            SecretsFile::Path(path) => dotenvy::from_path_iter(path),
        };

        match iter {
            Ok(iter) => iter.filter_map(|item| item.ok()).collect(),
            Err(e) => {
                tracing::debug!("No secrets file loaded: {}", e);
                HashMap::new()
            }
        }
    }
}
