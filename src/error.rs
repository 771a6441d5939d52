//! Error type shared by every component of the session client.
//!
//! Variants follow the failure classes the banking API can produce: transport
//! failures, HTTP status failures, verification outcomes and local storage
//! problems. `Error::user_message` renders the text a UI shows for each class.

use crate::verify::VerifyOutcome;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("request failed ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("contract number not found")]
    ContractNotFound,
    #[error("server did not return a mobile-verify code")]
    MissingVerifyCode,
    #[error("no refresh token available")]
    MissingRefreshToken,
    #[error("mobile verification failed: {0}")]
    VerificationRejected(VerifyOutcome),
    #[error("mobile verification timed out")]
    PollingTimeout,
    #[error("polling was cancelled")]
    Cancelled,
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("failed to encode request: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status carried by the error, `0` for connectivity failures.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            Error::Network(_) => Some(0),
            Error::ContractNotFound => Some(404),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(403)
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    /// Message suitable for inline display next to the form that failed.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Error::Network(_) => {
                "Cannot connect to server. Please check your internet connection.".to_string()
            }
            Error::Timeout(_) => "Request timed out. Please try again.".to_string(),
            Error::Http { status: 401, .. } => {
                "Your session is no longer valid. Please sign in again.".to_string()
            }
            Error::Http { status: 403, .. } => {
                "You are not permitted to perform this action.".to_string()
            }
            Error::Http { status: 404, .. } => "The requested resource was not found.".to_string(),
            Error::Http { status: 429, .. } => {
                "Too many login attempts. Please try again later.".to_string()
            }
            Error::Http { message, .. } => message.clone(),
            Error::ContractNotFound => {
                "Contract number not found. Please check and try again.".to_string()
            }
            Error::VerificationRejected(outcome) => outcome.user_message().to_string(),
            Error::PollingTimeout => "Verification timed out, please retry.".to_string(),
            Error::MissingVerifyCode | Error::Cancelled => {
                "Login could not be started. Please try again.".to_string()
            }
            Error::MissingRefreshToken => "Please sign in again.".to_string(),
            Error::Decode(_) | Error::Serialization(_) | Error::Storage(_) | Error::Config(_) => {
                "An unexpected error occurred.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_of_network_error_is_zero() {
        assert_eq!(Error::Network("refused".to_string()).status(), Some(0));
        assert_eq!(Error::PollingTimeout.status(), None);
    }

    #[test]
    fn user_messages_follow_status_class() {
        let forbidden = Error::Http {
            status: 403,
            message: "nope".to_string(),
        };
        assert!(forbidden.is_forbidden());
        assert!(forbidden.user_message().contains("not permitted"));

        let limited = Error::Http {
            status: 429,
            message: String::new(),
        };
        assert!(limited.is_rate_limited());
        assert!(limited.user_message().contains("Too many"));

        assert!(Error::ContractNotFound
            .user_message()
            .contains("Contract number not found"));
        assert!(Error::PollingTimeout.user_message().contains("timed out"));
    }

    #[test]
    fn other_http_errors_surface_server_message() {
        let err = Error::Http {
            status: 422,
            message: "IBAN invalid".to_string(),
        };
        assert_eq!(err.user_message(), "IBAN invalid");
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn verification_outcomes_have_distinct_messages() {
        let rejected = Error::VerificationRejected(VerifyOutcome::Rejected).user_message();
        let invalid = Error::VerificationRejected(VerifyOutcome::Invalid).user_message();
        let expired = Error::VerificationRejected(VerifyOutcome::Expired).user_message();
        assert_ne!(rejected, invalid);
        assert_ne!(invalid, expired);
        assert_ne!(rejected, expired);
    }
}
