//! Error types shared by every resource family
//!
//! Two layers of failure exist:
//! - [`ConfigError`] is fatal. It is returned from credential resolution and
//!   client construction and is never swallowed.
//! - [`RequestError`] describes a single failed request. Handlers classify it
//!   with [`RequestError::class`], log it and convert it into a "no result"
//!   value instead of returning it.

use hyper::StatusCode;
use thiserror::Error;

/// Fatal configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing credentials: {missing} not found in environment or secrets file")]
    MissingCredentials { missing: String },

    #[error("Client construction failed: {0}")]
    ClientConstruction(String),

    #[error("Client binding is for {actual}, expected {expected}")]
    FamilyMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Profile error: {0}")]
    Profile(String),
}

/// Errors produced by a single request against a resource family
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Service error: {status} {code} - {message}")]
    Service {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::http::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl From<quick_xml::Error> for RequestError {
    fn from(err: quick_xml::Error) -> Self {
        RequestError::XmlParse(err.to_string())
    }
}

impl From<hyper_util::client::legacy::Error> for RequestError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        RequestError::Transport(err.to_string())
    }
}

/// How a handler treats a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The provider reported that the target does not exist
    NotFound,
    /// The provider rejected or could not complete the request
    Request,
    /// Anything that did not come from the provider (local I/O, bad input, broken response)
    Unexpected,
}

/// Provider error codes that mean "the thing you asked about is absent"
const NOT_FOUND_CODES: &[&str] = &["404", "NoSuchKey", "NoSuchBucket", "NotFound"];

impl RequestError {
    /// Build a service error from its parts
    pub fn service(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        RequestError::Service {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Provider error code, if this is a service error
    pub fn code(&self) -> Option<&str> {
        match self {
            RequestError::Service { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Classify this error for logging and result conversion
    pub fn class(&self) -> FailureClass {
        match self {
            RequestError::Service { status, code, .. } => {
                if *status == StatusCode::NOT_FOUND
                    || NOT_FOUND_CODES.contains(&code.as_str())
                    // Query APIs: InvalidInstanceID.NotFound, ClusterNotFound, ...
                    || code.ends_with("NotFound")
                {
                    FailureClass::NotFound
                } else {
                    FailureClass::Request
                }
            }
            // Transport failures are the provider client failing to complete the request
            RequestError::Transport(_) | RequestError::Http(_) => FailureClass::Request,
            RequestError::XmlParse(_)
            | RequestError::InvalidResponse(_)
            | RequestError::InvalidInput(_)
            | RequestError::Io(_)
            | RequestError::Utf8(_) => FailureClass::Unexpected,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.class() == FailureClass::NotFound
    }
}

pub type Result<T> = std::result::Result<T, RequestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_by_status() {
        let err = RequestError::service(StatusCode::NOT_FOUND, "404", "Not Found");
        assert_eq!(err.class(), FailureClass::NotFound);
    }

    #[test]
    fn test_not_found_by_code() {
        // Some providers answer a missing bucket on a list call with 400/403 bodies
        let err = RequestError::service(StatusCode::BAD_REQUEST, "NoSuchBucket", "gone");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_query_api_not_found_codes() {
        let err = RequestError::service(StatusCode::BAD_REQUEST, "InvalidInstanceID.NotFound", "x");
        assert!(err.is_not_found());
        let err = RequestError::service(StatusCode::BAD_REQUEST, "ClusterNotFound", "x");
        assert!(err.is_not_found());
        let err = RequestError::service(StatusCode::BAD_REQUEST, "InvalidParameterValue", "x");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_server_error_is_request_failure() {
        let err = RequestError::service(StatusCode::INTERNAL_SERVER_ERROR, "InternalError", "boom");
        assert_eq!(err.class(), FailureClass::Request);
        assert_eq!(err.code(), Some("InternalError"));
    }

    #[test]
    fn test_local_faults_are_unexpected() {
        let err = RequestError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert_eq!(err.class(), FailureClass::Unexpected);
        assert_eq!(err.code(), None);

        let err = RequestError::InvalidInput("empty".into());
        assert_eq!(err.class(), FailureClass::Unexpected);
    }

    #[test]
    fn test_missing_credentials_message() {
        let err = ConfigError::MissingCredentials {
            missing: "AWS_SECRET_ACCESS_KEY".into(),
        };
        assert!(err.to_string().contains("AWS_SECRET_ACCESS_KEY"));
    }
}
