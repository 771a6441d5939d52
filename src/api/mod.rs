//! Authorizing client for every non-auth banking endpoint.
//!
//! Each request gets the bearer token of the matching identity and the device
//! id. A 401 triggers one shared token refresh followed by a single retry, and
//! a mutating request whose response asks for mobile approval only succeeds
//! once the verification gate approves it.

pub mod transport;

use crate::{
    auth::{types::extract_verify_code, AdminAuth, UserAuth},
    device::DeviceIdentity,
    error::{Error, Result},
    token::AuthContext,
    verify::VerifyGate,
};
use reqwest::Method;
use secrecy::SecretString;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub use transport::{ApiRequest, ApiResponse, Transport};

/// Endpoints that carry their own credentials and must never be retried or gated.
const AUTH_ENDPOINTS: [&str; 6] = [
    "/auth/login",
    "/auth/refresh-token",
    "/auth/refreshtoken",
    "/auth/register",
    "/auth/status",
    "/auth/cancel",
];

const DEVICE_ID_FIELD: &str = "deviceId";

pub struct ApiClient {
    transport: Arc<Transport>,
    user: Arc<UserAuth>,
    admin: Arc<AdminAuth>,
    device: Arc<DeviceIdentity>,
    gate: Arc<VerifyGate>,
    refresh_lock: Mutex<()>,
    // bumped after every successful refresh
    refresh_generation: AtomicU64,
}

impl ApiClient {
    #[must_use]
    pub fn new(
        transport: Arc<Transport>,
        user: Arc<UserAuth>,
        admin: Arc<AdminAuth>,
        device: Arc<DeviceIdentity>,
        gate: Arc<VerifyGate>,
    ) -> Self {
        Self {
            transport,
            user,
            admin,
            device,
            gate,
            refresh_lock: Mutex::new(()),
            refresh_generation: AtomicU64::new(0),
        }
    }

    /// Sends a request through the full authorization pipeline.
    ///
    /// # Errors
    /// Transport and HTTP errors pass through unchanged, except a 401 that a
    /// refresh could recover. A refresh failure ends that session and is
    /// returned. A rejected verification yields `Error::VerificationRejected`.
    pub async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<ApiResponse> {
        if is_auth_endpoint(path) {
            let request = ApiRequest::new(method, path).with_body(body);
            return self.transport.execute(request).await;
        }

        let mutating = !matches!(method, Method::GET | Method::HEAD | Method::OPTIONS);
        let body = if mutating {
            body.map(|body| self.inject_device_id(body))
        } else {
            body
        };
        let request = ApiRequest::new(method, path).with_body(body);

        let generation = self.refresh_generation.load(Ordering::SeqCst);
        let first = self
            .transport
            .execute(request.clone().with_bearer(self.select_token(path)))
            .await;

        let response = match first {
            Ok(response) => response,
            Err(err) if err.is_unauthorized() => {
                if !self.refresh_after_unauthorized(generation).await? {
                    return Err(err);
                }
                debug!("retrying {} {path} with refreshed token", request.method);
                self.transport
                    .execute(request.with_bearer(self.select_token(path)))
                    .await?
            }
            Err(err) => return Err(err),
        };

        if mutating {
            self.verify_response(response).await
        } else {
            Ok(response)
        }
    }

    /// # Errors
    /// See [`ApiClient::send`]; returns `Error::Decode` on a body mismatch.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::GET, path, None).await?.json()
    }

    /// # Errors
    /// See [`ApiClient::send`]; returns `Error::Decode` on a body mismatch.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.send(Method::POST, path, Some(body)).await?.json()
    }

    /// # Errors
    /// See [`ApiClient::send`]; returns `Error::Decode` on a body mismatch.
    pub async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.send(Method::PUT, path, Some(body)).await?.json()
    }

    /// # Errors
    /// See [`ApiClient::send`]; returns `Error::Decode` on a body mismatch.
    pub async fn patch_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.send(Method::PATCH, path, Some(body)).await?.json()
    }

    /// # Errors
    /// See [`ApiClient::send`].
    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.send(Method::DELETE, path, None).await
    }

    /// Operator paths prefer the admin token, everything else the user token.
    /// With both present the precedence is the only disambiguation.
    fn select_token(&self, path: &str) -> Option<SecretString> {
        let user = self.user.access_token();
        let admin = self.admin.access_token();

        if is_admin_path(path) {
            admin.or(user)
        } else {
            user.or(admin)
        }
    }

    fn inject_device_id(&self, body: Value) -> Value {
        match body {
            Value::Object(mut map) => {
                if !map.contains_key(DEVICE_ID_FIELD) {
                    map.insert(
                        DEVICE_ID_FIELD.to_string(),
                        Value::String(self.device.get_or_create_device_id()),
                    );
                }
                Value::Object(map)
            }
            other => other,
        }
    }

    /// Runs at most one refresh per rotation. Returns whether a retry can succeed.
    ///
    /// Callers that saw the same generation queue on the lock; the first one
    /// refreshes, the rest find the generation moved and retry directly.
    async fn refresh_after_unauthorized(&self, seen_generation: u64) -> Result<bool> {
        let _guard = self.refresh_lock.lock().await;

        if self.refresh_generation.load(Ordering::SeqCst) != seen_generation {
            debug!("token already refreshed by a concurrent request");
            return Ok(true);
        }

        let Some(context) = self.refresh_context() else {
            debug!("no refresh token available, passing 401 through");
            return Ok(false);
        };

        info!("Access token rejected, refreshing {context} session");
        match context {
            AuthContext::Admin => self.admin.refresh_token().await,
            AuthContext::User => self.user.refresh_access_token().await,
        }?;

        self.refresh_generation.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    fn refresh_context(&self) -> Option<AuthContext> {
        let admin_refresh = self.admin.tokens().has_refresh_token();

        if self.admin.is_admin() && admin_refresh {
            Some(AuthContext::Admin)
        } else if self.user.tokens().has_refresh_token() {
            Some(AuthContext::User)
        } else if admin_refresh {
            Some(AuthContext::Admin)
        } else {
            None
        }
    }

    async fn verify_response(&self, response: ApiResponse) -> Result<ApiResponse> {
        let Some(code) = extract_verify_code(&response.body) else {
            return Ok(response);
        };

        let outcome = self.gate.request_outcome(&code).await;
        if outcome.is_approved() {
            Ok(response)
        } else {
            warn!("Gated request not completed: verification {outcome}");
            Err(Error::VerificationRejected(outcome))
        }
    }
}

fn is_auth_endpoint(path: &str) -> bool {
    AUTH_ENDPOINTS.iter().any(|endpoint| path.contains(endpoint))
}

fn is_admin_path(path: &str) -> bool {
    path.split(['?', '#'])
        .next()
        .unwrap_or_default()
        .split('/')
        .find(|segment| !segment.is_empty())
        == Some("admin")
}
