//! Back-office operator sign-in with email and password.

use crate::{
    api::transport::{ApiRequest, Transport},
    auth::types::{ChangePasswordRequest, PasswordLoginRequest, TokenResponse},
    error::{Error, Result},
    navigation::{Navigator, Route},
    storage::{KeyValueStore, ADMIN_FLAG_KEY, CONTRACT_NUMBER_KEY},
    token::{AuthContext, TokenClaims, TokenStore},
};
use parking_lot::RwLock;
use reqwest::Method;
use secrecy::SecretString;
use serde_json::json;
use std::{sync::Arc, time::SystemTime};
use tracing::{debug, info, instrument, warn};

const ADMIN_ROLE: &str = "ADMIN";

pub struct AdminAuth {
    transport: Arc<Transport>,
    tokens: TokenStore,
    user_tokens: TokenStore,
    store: Arc<dyn KeyValueStore>,
    navigator: Navigator,
    current_user: RwLock<Option<TokenClaims>>,
}

impl AdminAuth {
    #[must_use]
    pub fn new(transport: Arc<Transport>, store: Arc<dyn KeyValueStore>, navigator: Navigator) -> Self {
        let auth = Self {
            transport,
            tokens: TokenStore::new(Arc::clone(&store), AuthContext::Admin),
            user_tokens: TokenStore::new(Arc::clone(&store), AuthContext::User),
            store,
            navigator,
            current_user: RwLock::new(None),
        };
        auth.load_current_user();
        auth
    }

    /// # Errors
    /// Returns the transport error; `Error::Network` when the server is unreachable.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<()> {
        let response: TokenResponse = self
            .transport
            .post_json(
                "/auth/login/password",
                &PasswordLoginRequest { email, password },
                None,
            )
            .await?;

        // operator and customer sessions never coexist
        self.user_tokens.clear()?;
        self.store.remove(CONTRACT_NUMBER_KEY)?;

        self.tokens
            .set_tokens(&response.access_token, &response.refresh_token)?;
        // only operator accounts have passwords, so this endpoint implies the role
        self.store.set(ADMIN_FLAG_KEY, "true")?;
        self.load_current_user();
        info!("Admin signed in: {email}");

        Ok(())
    }

    /// Marker set by a password login, or an admin role in the token.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        if self.has_admin_marker() {
            return true;
        }
        self.tokens
            .claims()
            .is_some_and(|claims| claims.has_role(ADMIN_ROLE))
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_authenticated()
    }

    /// Decoded admin token; carries the `ADMIN` authority whenever the marker is set.
    #[must_use]
    pub fn current_user(&self) -> Option<TokenClaims> {
        let mut claims = self.tokens.claims()?;
        if self.has_admin_marker() && !claims.has_role(ADMIN_ROLE) {
            claims
                .authorities
                .get_or_insert_with(Vec::new)
                .push(ADMIN_ROLE.to_string());
        }
        Some(claims)
    }

    /// Last user loaded after login, refresh or construction.
    #[must_use]
    pub fn cached_user(&self) -> Option<TokenClaims> {
        self.current_user.read().clone()
    }

    #[must_use]
    pub fn user_email(&self) -> Option<String> {
        self.current_user()
            .map(|claims| claims.sub)
            .filter(|sub| !sub.is_empty())
    }

    #[must_use]
    pub fn token_expiration(&self) -> Option<SystemTime> {
        self.tokens.claims().map(|claims| claims.expires_at())
    }

    #[must_use]
    pub fn access_token(&self) -> Option<SecretString> {
        self.tokens.access_token()
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Rotates the admin token pair; any failure ends the admin session.
    ///
    /// # Errors
    /// `Error::MissingRefreshToken` when nothing is stored, otherwise the refresh error.
    #[instrument(skip(self))]
    pub async fn refresh_token(&self) -> Result<()> {
        let refresh_token = self.tokens.refresh_token().ok_or(Error::MissingRefreshToken)?;

        let result: Result<TokenResponse> = self
            .transport
            .post_json("/auth/refresh-token", &json!({}), Some(refresh_token))
            .await;

        let stored = result.and_then(|response| {
            self.tokens
                .set_tokens(&response.access_token, &response.refresh_token)
        });

        match stored {
            Ok(()) => {
                self.load_current_user();
                debug!("admin tokens refreshed");
                Ok(())
            }
            Err(err) => {
                warn!("Admin token refresh failed: {err}");
                self.logout();
                Err(err)
            }
        }
    }

    /// Changes the operator password with a single request.
    ///
    /// A 401 means the current password was wrong, so it is never answered
    /// with a token refresh.
    ///
    /// # Errors
    /// Returns the transport error unchanged.
    pub async fn change_password(
        &self,
        current_password: SecretString,
        new_password: SecretString,
        confirmation_password: SecretString,
    ) -> Result<()> {
        let body = serde_json::to_value(ChangePasswordRequest {
            current_password,
            new_password,
            confirmation_password,
        })?;
        let request = ApiRequest::new(Method::PATCH, "/auth/change-password")
            .with_body(Some(body))
            .with_bearer(self.tokens.access_token());

        self.transport.execute(request).await?;
        info!("Admin password changed");
        Ok(())
    }

    pub fn logout(&self) {
        if let Err(err) = self.tokens.clear() {
            warn!("Failed to clear admin tokens: {err}");
        }
        if let Err(err) = self.store.remove(ADMIN_FLAG_KEY) {
            warn!("Failed to clear admin marker: {err}");
        }
        *self.current_user.write() = None;
        self.navigator.navigate(Route::Login);
        info!("Admin signed out");
    }

    fn has_admin_marker(&self) -> bool {
        self.store.get(ADMIN_FLAG_KEY).as_deref() == Some("true")
    }

    fn load_current_user(&self) {
        *self.current_user.write() = self.current_user();
    }
}
