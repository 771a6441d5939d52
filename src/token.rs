//! Access and refresh token persistence per auth context, plus the client-side
//! JWT payload decoding used for expiry checks and role display.
//!
//! Decoding never verifies a signature. The result only drives local guards
//! and UI decisions; the backend remains the authority on every token.

use crate::{
    error::Result,
    storage::{
        KeyValueStore, ADMIN_ACCESS_TOKEN_KEY, ADMIN_REFRESH_TOKEN_KEY, USER_ACCESS_TOKEN_KEY,
        USER_REFRESH_TOKEN_KEY,
    },
};
use base64ct::{Base64UrlUnpadded, Encoding};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Identity a token pair belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthContext {
    /// Customer signed in with contract number and mobile approval.
    User,
    /// Back-office operator signed in with email and password.
    Admin,
}

impl AuthContext {
    const fn keys(self) -> (&'static str, &'static str) {
        match self {
            AuthContext::User => (USER_ACCESS_TOKEN_KEY, USER_REFRESH_TOKEN_KEY),
            AuthContext::Admin => (ADMIN_ACCESS_TOKEN_KEY, ADMIN_REFRESH_TOKEN_KEY),
        }
    }
}

impl fmt::Display for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthContext::User => f.write_str("user"),
            AuthContext::Admin => f.write_str("admin"),
        }
    }
}

/// Registered timestamps are JSON numbers and may carry a fraction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: String,
    pub exp: f64,
    #[serde(default)]
    pub iat: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_number: Option<String>,
}

impl TokenClaims {
    /// True if `authorities` or `roles` grants `role`, with or without the `ROLE_` prefix.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        let prefixed = format!("ROLE_{role}");
        [&self.authorities, &self.roles]
            .into_iter()
            .flatten()
            .flatten()
            .any(|granted| granted == role || *granted == prefixed)
    }

    #[must_use]
    pub fn expires_at(&self) -> SystemTime {
        UNIX_EPOCH + Duration::try_from_secs_f64(self.exp).unwrap_or_default()
    }
}

/// Decodes the payload segment of a JWT without verifying it.
#[must_use]
pub fn decode_token(token: &str) -> Option<TokenClaims> {
    let payload = token.split('.').nth(1)?;
    let bytes = Base64UrlUnpadded::decode_vec(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// A token that cannot be decoded counts as expired.
#[must_use]
pub fn is_token_expired(token: &str) -> bool {
    let Some(claims) = decode_token(token) else {
        return true;
    };

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |elapsed| elapsed.as_secs_f64());

    claims.exp < now
}

#[must_use]
pub fn token_expiration(token: &str) -> Option<SystemTime> {
    decode_token(token).map(|claims| claims.expires_at())
}

/// Token pair persistence for one auth context.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
    context: AuthContext,
}

impl TokenStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, context: AuthContext) -> Self {
        Self { store, context }
    }

    #[must_use]
    pub fn context(&self) -> AuthContext {
        self.context
    }

    /// Persists both tokens, replacing any previous pair of this context.
    ///
    /// # Errors
    /// Returns `Error::Storage` if the pair cannot be written.
    pub fn set_tokens(&self, access: &SecretString, refresh: &SecretString) -> Result<()> {
        let (access_key, refresh_key) = self.context.keys();
        self.store.set(access_key, access.expose_secret())?;
        self.store.set(refresh_key, refresh.expose_secret())
    }

    #[must_use]
    pub fn access_token(&self) -> Option<SecretString> {
        self.store
            .get(self.context.keys().0)
            .map(SecretString::from)
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<SecretString> {
        self.store
            .get(self.context.keys().1)
            .map(SecretString::from)
    }

    #[must_use]
    pub fn has_refresh_token(&self) -> bool {
        self.store.get(self.context.keys().1).is_some()
    }

    #[must_use]
    pub fn claims(&self) -> Option<TokenClaims> {
        self.access_token()
            .and_then(|token| decode_token(token.expose_secret()))
    }

    /// An access token exists and has not expired.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token()
            .is_some_and(|token| !is_token_expired(token.expose_secret()))
    }

    /// # Errors
    /// Returns `Error::Storage` if the pair cannot be removed.
    pub fn clear(&self) -> Result<()> {
        let (access_key, refresh_key) = self.context.keys();
        self.store.remove(access_key)?;
        self.store.remove(refresh_key)
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore")
            .field("context", &self.context)
            .field("access_token", &self.access_token().map(|_| "***"))
            .field("refresh_token", &self.refresh_token().map(|_| "***"))
            .finish()
    }
}
