//! Typed API errors
//!
//! Every remote call fails with an [`ApiError`] naming the operation and the
//! resource it targeted. [`ApiError::kind`] buckets the provider error code
//! into the classes the evaluation driver cares about.

use std::fmt;

/// Remote operation that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListClusters,
    ListAddons,
    DescribeAddon,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::ListClusters => "ListClusters",
            Operation::ListAddons => "ListAddons",
            Operation::DescribeAddon => "DescribeAddon",
        };
        f.write_str(name)
    }
}

/// Error class, derived from the provider error code and HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The resource does not exist
    NotFound,
    /// The identifier was rejected, usually because it went stale
    InvalidIdentifier,
    Throttling,
    /// Server-side failures, timeouts and connection errors
    Transient,
    /// Credentials or permissions problem
    Authorization,
    Other,
}

const NOT_FOUND_CODES: &[&str] = &["ResourceNotFoundException", "NotFoundException"];

const INVALID_IDENTIFIER_CODES: &[&str] = &[
    "InvalidParameterException",
    "InvalidParameter",
    "ValidationException",
];

const THROTTLING_CODES: &[&str] = &[
    "ThrottlingException",
    "Throttling",
    "TooManyRequestsException",
    "RequestLimitExceeded",
];

const AUTHORIZATION_CODES: &[&str] = &[
    "AccessDeniedException",
    "UnauthorizedException",
    "UnrecognizedClientException",
    "InvalidSignatureException",
    "ExpiredTokenException",
    "MissingAuthenticationTokenException",
];

const TRANSIENT_CODES: &[&str] = &[
    "ServerException",
    "ServiceUnavailableException",
    "InternalFailure",
    NETWORK_ERROR_CODE,
    TIMEOUT_ERROR_CODE,
];

/// Code used for failures that never produced an HTTP response
pub const NETWORK_ERROR_CODE: &str = "NetworkError";

/// Code used when the call policy gave up waiting for a response
pub const TIMEOUT_ERROR_CODE: &str = "RequestTimeout";

/// Error returned by a remote EKS call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} {target} failed: {code}{}: {message}", status_suffix(.status))]
pub struct ApiError {
    pub operation: Operation,
    /// Region and resource path the call addressed, e.g. `us-east-1 clusters/prod/addons`
    pub target: String,
    pub status: Option<u16>,
    pub code: String,
    pub message: String,
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(status) => format!(" (HTTP {})", status),
        None => String::new(),
    }
}

impl ApiError {
    pub fn new(
        operation: Operation,
        target: impl Into<String>,
        status: Option<u16>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            target: target.into(),
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Failure below HTTP (DNS, TLS, connection reset, body decoding)
    pub fn network(operation: Operation, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(operation, target, None, NETWORK_ERROR_CODE, message)
    }

    /// The call did not complete within the policy timeout
    pub fn timeout(operation: Operation, target: impl Into<String>, secs: u64) -> Self {
        Self::new(
            operation,
            target,
            None,
            TIMEOUT_ERROR_CODE,
            format!("no response after {}s", secs),
        )
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        let code = self.code.as_str();
        if NOT_FOUND_CODES.contains(&code) {
            return ErrorKind::NotFound;
        }
        if INVALID_IDENTIFIER_CODES.contains(&code) {
            return ErrorKind::InvalidIdentifier;
        }
        if THROTTLING_CODES.contains(&code) {
            return ErrorKind::Throttling;
        }
        if AUTHORIZATION_CODES.contains(&code) {
            return ErrorKind::Authorization;
        }
        if TRANSIENT_CODES.contains(&code) {
            return ErrorKind::Transient;
        }

        // Unknown code, fall back on the status line
        match self.status {
            Some(404) => ErrorKind::NotFound,
            Some(429) => ErrorKind::Throttling,
            Some(401) | Some(403) => ErrorKind::Authorization,
            Some(s) if s >= 500 => ErrorKind::Transient,
            _ => ErrorKind::Other,
        }
    }

    /// Whether a retry could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Throttling | ErrorKind::Transient)
    }

    /// Whether this error must stop the whole evaluation
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Authorization
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(code: &str, status: Option<u16>) -> ApiError {
        ApiError::new(Operation::DescribeAddon, "us-east-1 clusters/c1/addons/a1", status, code, "boom")
    }

    #[test]
    fn test_known_codes_classify() {
        assert_eq!(err("ResourceNotFoundException", Some(404)).kind(), ErrorKind::NotFound);
        assert_eq!(err("InvalidParameterException", Some(400)).kind(), ErrorKind::InvalidIdentifier);
        assert_eq!(err("ThrottlingException", Some(400)).kind(), ErrorKind::Throttling);
        assert_eq!(err("AccessDeniedException", Some(403)).kind(), ErrorKind::Authorization);
        assert_eq!(err("ServerException", Some(500)).kind(), ErrorKind::Transient);
        assert_eq!(err("ClientException", Some(400)).kind(), ErrorKind::Other);
    }

    #[test]
    fn test_unknown_code_falls_back_to_status() {
        assert_eq!(err("Weird", Some(404)).kind(), ErrorKind::NotFound);
        assert_eq!(err("Weird", Some(429)).kind(), ErrorKind::Throttling);
        assert_eq!(err("Weird", Some(503)).kind(), ErrorKind::Transient);
        assert_eq!(err("Weird", None).kind(), ErrorKind::Other);
    }

    #[test]
    fn test_network_and_timeout_are_retryable() {
        assert!(ApiError::network(Operation::ListAddons, "x", "reset").is_retryable());
        assert!(ApiError::timeout(Operation::ListAddons, "x", 30).is_retryable());
        assert!(!err("AccessDeniedException", Some(403)).is_retryable());
        assert!(err("AccessDeniedException", Some(403)).is_fatal());
    }

    #[test]
    fn test_display_names_the_call() {
        let message = err("ThrottlingException", Some(400)).to_string();
        assert_eq!(
            message,
            "DescribeAddon us-east-1 clusters/c1/addons/a1 failed: ThrottlingException (HTTP 400): boom"
        );
    }
}
