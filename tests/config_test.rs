use cloudrm::client::{ClientFactory, ResourceFamily};
use cloudrm::config::{self, ACCESS_KEY_VAR, REGION_VAR, SECRET_KEY_VAR};
use cloudrm::ConfigError;
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &TempDir, yaml: &str) -> String {
    let path = dir.path().join("config.yaml");
    fs::write(&path, yaml).unwrap();
    path.to_string_lossy().into_owned()
}

/// Test loading configuration from YAML file
#[test]
fn test_load_yaml_config() {
    let yaml = r#"
profiles:
  test:
    access_key: AKIATEST
    secret_key: secrettest
    region: us-west-2
  other:
    access_key: AKIAOTHER
    secret_key: othersecret

default_profile: test

endpoints:
  storage: http://127.0.0.1:9000
  warehouse: https://redshift.example.internal

transport:
  request_timeout: 120
  max_retries: 5
  insecure_tls: true
"#;

    let temp_dir = TempDir::new().unwrap();
    let path = write_config(&temp_dir, yaml);

    let config = config::load_from_yaml(&path).unwrap();

    assert_eq!(config.profiles.len(), 2);
    let profile = config.get_profile(None).unwrap();
    assert_eq!(profile.access_key, "AKIATEST");
    assert_eq!(profile.region.as_deref(), Some("us-west-2"));

    assert_eq!(config.endpoints.storage.as_deref(), Some("http://127.0.0.1:9000"));
    assert_eq!(config.endpoints.compute, None);
    assert_eq!(config.transport.request_timeout, 120);
    assert_eq!(config.transport.max_retries, 5);
    assert!(config.transport.insecure_tls);
}

/// Test profile selection through load_config
#[test]
fn test_load_config_selects_profile() {
    let yaml = r#"
profiles:
  test:
    access_key: AKIATEST
    secret_key: secrettest
    region: us-west-2
  other:
    access_key: AKIAOTHER
    secret_key: othersecret

default_profile: test
"#;

    let temp_dir = TempDir::new().unwrap();
    let path = write_config(&temp_dir, yaml);

    let loaded = config::load_config(Some(&path), None).unwrap();
    assert_eq!(loaded.credentials.identifier(), "AKIATEST");
    assert_eq!(loaded.credentials.region(), Some("us-west-2"));

    let loaded = config::load_config(Some(&path), Some("other")).unwrap();
    assert_eq!(loaded.credentials.identifier(), "AKIAOTHER");
    assert_eq!(loaded.credentials.region(), None);

    let err = config::load_config(Some(&path), Some("missing")).unwrap_err();
    assert!(err.to_string().contains("missing"));
}

/// Without a default, two profiles are ambiguous
#[test]
fn test_load_config_ambiguous_profile() {
    let yaml = r#"
profiles:
  a:
    access_key: a
    secret_key: a
  b:
    access_key: b
    secret_key: b
"#;

    let temp_dir = TempDir::new().unwrap();
    let path = write_config(&temp_dir, yaml);

    let err = config::load_config(Some(&path), None).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::Profile(_))
    ));
}

#[test]
fn test_unreadable_config_file() {
    let err = config::load_config(Some("/nonexistent/cloudrm.yaml"), None).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

/// Test loading transport settings from the environment
#[test]
fn test_load_env_config() {
    temp_env::with_vars(
        [
            ("CLOUDRM_STORAGE_ENDPOINT", Some("http://localhost:9000")),
            ("CLOUDRM_COMPUTE_ENDPOINT", Some("")),
            ("CLOUDRM_REQUEST_TIMEOUT", Some("45")),
            ("CLOUDRM_MAX_RETRIES", Some("not-a-number")),
            ("CLOUDRM_INSECURE_TLS", Some("1")),
        ],
        || {
            let config = config::load_from_env();

            assert_eq!(config.endpoints.storage.as_deref(), Some("http://localhost:9000"));
            // Empty means unset
            assert_eq!(config.endpoints.compute, None);
            assert_eq!(config.transport.request_timeout, 45);
            assert_eq!(config.transport.max_retries, 3);
            assert!(config.transport.insecure_tls);
            assert!(config.profiles.is_empty());
        },
    );
}

/// Without a config file, credentials come from the environment
#[test]
fn test_load_config_from_env_credentials() {
    temp_env::with_vars(
        [
            (ACCESS_KEY_VAR, Some("env_key")),
            (SECRET_KEY_VAR, Some("env_secret")),
            (REGION_VAR, Some("ap-southeast-2")),
        ],
        || {
            let loaded = config::load_config(None, None).unwrap();
            assert_eq!(loaded.credentials.identifier(), "env_key");
            assert_eq!(loaded.credentials.secret(), "env_secret");
            assert_eq!(loaded.credentials.region(), Some("ap-southeast-2"));
        },
    );
}

/// Profiles only exist in a config file
#[test]
fn test_profile_without_config_file() {
    temp_env::with_vars(
        [
            (ACCESS_KEY_VAR, Some("env_key")),
            (SECRET_KEY_VAR, Some("env_secret")),
        ],
        || {
            let err = config::load_config(None, Some("prod")).unwrap_err();
            assert!(err.to_string().contains("'prod'"));
            assert!(err.to_string().contains("--config"));
        },
    );
}

/// Endpoint overrides from config reach the built binding
#[tokio::test]
async fn test_factory_from_config_uses_overrides() {
    let yaml = r#"
profiles:
  local:
    access_key: minioadmin
    secret_key: minioadmin
    region: us-east-1
endpoints:
  storage: http://127.0.0.1:9000/
"#;

    let temp_dir = TempDir::new().unwrap();
    let path = write_config(&temp_dir, yaml);
    let loaded = config::load_config(Some(&path), None).unwrap();

    let factory = ClientFactory::from_config(&loaded.config);
    let storage = factory
        .build(&loaded.credentials, ResourceFamily::Storage)
        .unwrap();
    assert_eq!(storage.endpoint(), "http://127.0.0.1:9000");

    let compute = factory
        .build(&loaded.credentials, ResourceFamily::Compute)
        .unwrap();
    assert!(compute.endpoint().starts_with("https://"));
    assert!(compute.endpoint().contains("us-east-1"));
}

/// A malformed override is a construction error, not a request error
#[tokio::test]
async fn test_bad_endpoint_override() {
    let yaml = r#"
profiles:
  local:
    access_key: key
    secret_key: secret
endpoints:
  compute: ftp://example.com
"#;

    let temp_dir = TempDir::new().unwrap();
    let path = write_config(&temp_dir, yaml);
    let loaded = config::load_config(Some(&path), None).unwrap();

    let err = ClientFactory::from_config(&loaded.config)
        .build(&loaded.credentials, ResourceFamily::Compute)
        .unwrap_err();
    assert!(matches!(err, ConfigError::ClientConstruction(_)));
}

/// A binding only fits the family it was built for
#[tokio::test]
async fn test_binding_family_mismatch() {
    let bundle = cloudrm::CredentialBundle::new("key", "secret", Some("eu-west-1".into())).unwrap();
    let binding = ClientFactory::new()
        .build(&bundle, ResourceFamily::Storage)
        .unwrap();

    let err = cloudrm::ComputeHandler::from_binding(binding).err().unwrap();
    assert!(matches!(
        err,
        ConfigError::FamilyMismatch {
            expected: "compute",
            actual: "storage"
        }
    ));
}
