//! Request and response bodies of the auth endpoints.
//!
//! The backend has shipped the pending-verification code under several field
//! names over time. `extract_verify_code` is the only place that knows about
//! them; everything past this boundary sees one canonical code.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Accepted field names for a pending mobile-verify code, in lookup order.
pub const VERIFY_CODE_FIELDS: [&str; 4] = ["mobileVerifyCode", "mobileVerify", "mobile_verify", "code"];

/// Returns the first non-empty verification code found in `body`.
#[must_use]
pub fn extract_verify_code(body: &Value) -> Option<String> {
    let object = body.as_object()?;
    VERIFY_CODE_FIELDS.iter().find_map(|field| {
        object
            .get(*field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string)
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLoginRequest<'a> {
    pub contract_number: &'a str,
    pub device_id: &'a str,
}

/// Body shared by the status, cancel and one-shot token endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileVerifyRequest<'a> {
    pub mobile_verify: &'a str,
    pub device_id: &'a str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthStatus {
    Pending,
    Approved,
    Rejected,
    Invalid,
    Expired,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct AuthStatusResponse {
    pub status: AuthStatus,
}

#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"***")
            .field("refresh_token", &"***")
            .finish()
    }
}

pub struct PasswordLoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a SecretString,
}

impl Serialize for PasswordLoginRequest<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("PasswordLoginRequest", 2)?;
        state.serialize_field("email", self.email)?;
        state.serialize_field("password", self.password.expose_secret())?;
        state.end()
    }
}

pub struct ChangePasswordRequest {
    pub current_password: SecretString,
    pub new_password: SecretString,
    pub confirmation_password: SecretString,
}

impl Serialize for ChangePasswordRequest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ChangePasswordRequest", 3)?;
        state.serialize_field("currentPassword", self.current_password.expose_secret())?;
        state.serialize_field("newPassword", self.new_password.expose_secret())?;
        state.serialize_field(
            "confirmationPassword",
            self.confirmation_password.expose_secret(),
        )?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_verify_code_accepts_every_alias() {
        for field in VERIFY_CODE_FIELDS {
            let body = json!({ field: "ABC" });
            assert_eq!(extract_verify_code(&body).as_deref(), Some("ABC"), "{field}");
        }
    }

    #[test]
    fn extract_verify_code_prefers_canonical_name() {
        let body = json!({ "code": "LATE", "mobileVerifyCode": "FIRST" });
        assert_eq!(extract_verify_code(&body).as_deref(), Some("FIRST"));
    }

    #[test]
    fn extract_verify_code_ignores_empty_and_non_strings() {
        assert_eq!(extract_verify_code(&json!({ "mobileVerify": "" })), None);
        assert_eq!(extract_verify_code(&json!({ "code": 42 })), None);
        assert_eq!(extract_verify_code(&json!(["mobileVerify"])), None);
        assert_eq!(extract_verify_code(&Value::Null), None);
    }

    #[test]
    fn auth_status_parses_known_and_unknown_values() {
        let parse = |raw: &str| {
            serde_json::from_value::<AuthStatusResponse>(json!({ "status": raw }))
                .map(|response| response.status)
                .ok()
        };
        assert_eq!(parse("APPROVED"), Some(AuthStatus::Approved));
        assert_eq!(parse("PENDING"), Some(AuthStatus::Pending));
        assert_eq!(parse("EXPIRED"), Some(AuthStatus::Expired));
        assert_eq!(parse("SOMETHING_NEW"), Some(AuthStatus::Unknown));
    }

    #[test]
    fn password_request_serializes_wire_names() -> serde_json::Result<()> {
        let password = SecretString::from("hunter2");
        let body = serde_json::to_value(PasswordLoginRequest {
            email: "ops@purbank.test",
            password: &password,
        })?;
        assert_eq!(body, json!({ "email": "ops@purbank.test", "password": "hunter2" }));

        let body = serde_json::to_value(ChangePasswordRequest {
            current_password: SecretString::from("old"),
            new_password: SecretString::from("new"),
            confirmation_password: SecretString::from("new"),
        })?;
        assert_eq!(
            body,
            json!({ "currentPassword": "old", "newPassword": "new", "confirmationPassword": "new" })
        );
        Ok(())
    }

    #[test]
    fn token_response_debug_is_redacted() -> serde_json::Result<()> {
        let response: TokenResponse =
            serde_json::from_value(json!({ "access_token": "a", "refresh_token": "r" }))?;
        assert_eq!(response.access_token.expose_secret(), "a");
        assert!(!format!("{response:?}").contains("\"a\""));
        Ok(())
    }
}
