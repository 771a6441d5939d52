//! Customer sign-in: contract number, out-of-band approval in the mobile app,
//! then a token exchange bound to the device.

use crate::{
    api::transport::{ApiRequest, Transport},
    auth::types::{
        extract_verify_code, AuthStatus, AuthStatusResponse, MobileVerifyRequest, TokenResponse,
        UserLoginRequest,
    },
    config::ClientConfig,
    device::DeviceIdentity,
    error::{Error, Result},
    navigation::{Navigator, Route},
    storage::{KeyValueStore, ADMIN_FLAG_KEY, CONTRACT_NUMBER_KEY},
    token::{AuthContext, TokenClaims, TokenStore},
    verify::VerifyOutcome,
};
use parking_lot::{Mutex, RwLock};
use reqwest::Method;
use secrecy::SecretString;
use serde_json::json;
use std::{fmt, sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    task::{AbortHandle, JoinHandle},
    time::{interval, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, instrument, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoginState {
    #[default]
    Idle,
    AwaitingMobileVerification,
    Approved,
    Rejected,
    Invalid,
    Error,
    Timeout,
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LoginState::Idle => "idle",
            LoginState::AwaitingMobileVerification => "awaiting_mobile_verification",
            LoginState::Approved => "approved",
            LoginState::Rejected => "rejected",
            LoginState::Invalid => "invalid",
            LoginState::Error => "error",
            LoginState::Timeout => "timeout",
        };
        f.write_str(label)
    }
}

/// How a polling sequence ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Approved,
    Rejected,
    Invalid,
    TimedOut,
    Cancelled,
}

impl PollOutcome {
    /// # Errors
    /// Every outcome except `Approved` maps to its error.
    pub fn into_result(self) -> Result<()> {
        match self {
            PollOutcome::Approved => Ok(()),
            PollOutcome::Rejected => Err(Error::VerificationRejected(VerifyOutcome::Rejected)),
            PollOutcome::Invalid => Err(Error::VerificationRejected(VerifyOutcome::Invalid)),
            PollOutcome::TimedOut => Err(Error::PollingTimeout),
            PollOutcome::Cancelled => Err(Error::Cancelled),
        }
    }
}

/// Handle to a running polling sequence.
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<PollOutcome>,
}

impl PollHandle {
    /// Waits for the sequence to finish; a stopped sequence yields `Cancelled`.
    pub async fn wait(self) -> PollOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(err) => {
                if !err.is_cancelled() {
                    error!("Polling task failed: {err}");
                }
                PollOutcome::Cancelled
            }
        }
    }

    pub fn cancel(&self) {
        self.task.abort();
    }
}

pub struct UserAuth {
    transport: Arc<Transport>,
    tokens: TokenStore,
    admin_tokens: TokenStore,
    store: Arc<dyn KeyValueStore>,
    device: Arc<DeviceIdentity>,
    navigator: Navigator,
    state: watch::Sender<LoginState>,
    verify_code: RwLock<Option<String>>,
    current_user: RwLock<Option<TokenClaims>>,
    poll_task: Mutex<Option<AbortHandle>>,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl UserAuth {
    #[must_use]
    pub fn new(
        config: &ClientConfig,
        transport: Arc<Transport>,
        store: Arc<dyn KeyValueStore>,
        device: Arc<DeviceIdentity>,
        navigator: Navigator,
    ) -> Self {
        let tokens = TokenStore::new(Arc::clone(&store), AuthContext::User);
        let current_user = RwLock::new(tokens.claims());
        let (state, _) = watch::channel(LoginState::Idle);

        Self {
            transport,
            admin_tokens: TokenStore::new(Arc::clone(&store), AuthContext::Admin),
            tokens,
            store,
            device,
            navigator,
            state,
            verify_code: RwLock::new(None),
            current_user,
            poll_task: Mutex::new(None),
            poll_interval: config.poll_interval,
            poll_timeout: config.poll_timeout,
        }
    }

    /// Starts a login for `contract_number` and returns the code to approve.
    ///
    /// # Errors
    /// `Error::ContractNotFound` for an unknown contract, `Error::MissingVerifyCode`
    /// when the response carries no code, otherwise the transport error.
    #[instrument(skip(self))]
    pub async fn initiate_login(&self, contract_number: &str) -> Result<String> {
        // a poll left over from an earlier attempt must not resolve the new one
        self.stop_polling();
        let device_id = self.device.get_or_create_device_id();
        let request = ApiRequest::new(Method::POST, "/auth/login").with_body(Some(
            serde_json::to_value(UserLoginRequest {
                contract_number,
                device_id: &device_id,
            })?,
        ));

        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                self.set_state(LoginState::Error);
                return Err(match err {
                    Error::Http { status: 404, .. } => Error::ContractNotFound,
                    other => other,
                });
            }
        };

        // a customer login must never run with leftover operator credentials
        if let Err(err) = self
            .admin_tokens
            .clear()
            .and_then(|()| self.store.remove(ADMIN_FLAG_KEY))
        {
            warn!("Failed to clear admin credentials: {err}");
        }

        let Some(code) = extract_verify_code(&response.body) else {
            self.set_state(LoginState::Error);
            return Err(Error::MissingVerifyCode);
        };

        self.store.set(CONTRACT_NUMBER_KEY, contract_number)?;
        *self.verify_code.write() = Some(code.clone());
        self.set_state(LoginState::AwaitingMobileVerification);
        info!("Login initiated, awaiting mobile verification");

        Ok(code)
    }

    /// Single status check for the current code.
    ///
    /// # Errors
    /// `Error::MissingVerifyCode` without an active login, otherwise the transport error.
    pub async fn poll_auth_status(&self) -> Result<AuthStatus> {
        let code = self.require_code()?;
        let device_id = self.device.get_or_create_device_id();
        self.request_status(&code, &device_id).await
    }

    /// Polls the current code until it reaches a terminal state.
    ///
    /// # Errors
    /// `Error::MissingVerifyCode` without an active login.
    pub fn start_polling(self: &Arc<Self>) -> Result<PollHandle> {
        let code = self.require_code()?;
        Ok(self.start_polling_for_code(code))
    }

    /// Replaces any running poll with one for `code`.
    pub fn start_polling_for_code(self: &Arc<Self>, code: impl Into<String>) -> PollHandle {
        let code = code.into();
        let mut slot = self.poll_task.lock();
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        let auth = Arc::clone(self);
        let task = tokio::spawn(async move { auth.run_poll(code).await });
        *slot = Some(task.abort_handle());

        PollHandle { task }
    }

    pub fn stop_polling(&self) {
        if let Some(task) = self.poll_task.lock().take() {
            debug!("stopping login status polling");
            task.abort();
        }
    }

    async fn run_poll(&self, code: String) -> PollOutcome {
        let device_id = self.device.get_or_create_device_id();
        let started = Instant::now();
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if started.elapsed() > self.poll_timeout {
                warn!("Mobile verification timed out");
                self.set_state(LoginState::Timeout);
                return PollOutcome::TimedOut;
            }

            match self.request_status(&code, &device_id).await {
                Ok(AuthStatus::Approved) => {
                    info!("Mobile verification approved");
                    self.set_state(LoginState::Approved);
                    return PollOutcome::Approved;
                }
                Ok(AuthStatus::Rejected) => {
                    self.set_state(LoginState::Rejected);
                    return PollOutcome::Rejected;
                }
                Ok(AuthStatus::Invalid) => {
                    self.set_state(LoginState::Invalid);
                    return PollOutcome::Invalid;
                }
                Ok(AuthStatus::Expired) => {
                    self.set_state(LoginState::Timeout);
                    return PollOutcome::TimedOut;
                }
                Ok(AuthStatus::Pending | AuthStatus::Unknown) => {}
                Err(err) => warn!("Polling error: {err}"),
            }
        }
    }

    async fn request_status(&self, code: &str, device_id: &str) -> Result<AuthStatus> {
        let body = MobileVerifyRequest {
            mobile_verify: code,
            device_id,
        };
        let response: AuthStatusResponse =
            self.transport.post_json("/auth/status", &body, None).await?;
        Ok(response.status)
    }

    /// Trades the approved code for the user token pair.
    ///
    /// # Errors
    /// `Error::MissingVerifyCode` without an active login, otherwise the
    /// transport error; the login state is left untouched on failure.
    #[instrument(skip(self))]
    pub async fn exchange_tokens(&self) -> Result<()> {
        let code = self.require_code()?;
        let device_id = self.device.get_or_create_device_id();
        let body = MobileVerifyRequest {
            mobile_verify: &code,
            device_id: &device_id,
        };

        let response: TokenResponse = self
            .transport
            .post_json("/auth/refreshtoken", &body, None)
            .await?;

        self.tokens
            .set_tokens(&response.access_token, &response.refresh_token)?;
        self.load_current_user();
        self.reset_login_state();
        info!("User signed in");

        Ok(())
    }

    /// Rotates the user token pair; any failure ends the user session.
    ///
    /// # Errors
    /// `Error::MissingRefreshToken` when nothing is stored, otherwise the refresh error.
    #[instrument(skip(self))]
    pub async fn refresh_access_token(&self) -> Result<()> {
        let refresh_token = self.tokens.refresh_token().ok_or(Error::MissingRefreshToken)?;

        match self.request_refresh(refresh_token).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!("User token refresh failed: {err}");
                self.logout();
                Err(err)
            }
        }
    }

    async fn request_refresh(&self, refresh_token: SecretString) -> Result<()> {
        let response: TokenResponse = self
            .transport
            .post_json("/auth/refresh-token", &json!({}), Some(refresh_token))
            .await?;
        self.tokens
            .set_tokens(&response.access_token, &response.refresh_token)?;
        self.load_current_user();
        debug!("user tokens refreshed");
        Ok(())
    }

    /// Aborts the pending approval; local state is reset even if the call fails.
    ///
    /// # Errors
    /// `Error::MissingVerifyCode` without an active login, otherwise the transport error.
    pub async fn cancel_login(&self) -> Result<()> {
        let code = self.require_code()?;
        let device_id = self.device.get_or_create_device_id();
        let request = ApiRequest::new(Method::POST, "/auth/cancel").with_body(Some(
            serde_json::to_value(MobileVerifyRequest {
                mobile_verify: &code,
                device_id: &device_id,
            })?,
        ));

        let result = self.transport.execute(request).await.map(|_| ());
        self.reset_login_state();
        result
    }

    pub fn reset_login_state(&self) {
        self.stop_polling();
        *self.verify_code.write() = None;
        self.set_state(LoginState::Idle);
    }

    pub fn logout(&self) {
        if let Err(err) = self.tokens.clear() {
            warn!("Failed to clear user tokens: {err}");
        }
        if let Err(err) = self.store.remove(CONTRACT_NUMBER_KEY) {
            warn!("Failed to clear contract number: {err}");
        }
        *self.current_user.write() = None;
        self.reset_login_state();
        self.navigator.navigate(Route::Login);
        info!("User signed out");
    }

    #[must_use]
    pub fn login_state(&self) -> LoginState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn subscribe_login_state(&self) -> watch::Receiver<LoginState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn mobile_verify_code(&self) -> Option<String> {
        self.verify_code.read().clone()
    }

    #[must_use]
    pub fn contract_number(&self) -> Option<String> {
        self.store.get(CONTRACT_NUMBER_KEY)
    }

    #[must_use]
    pub fn current_user(&self) -> Option<TokenClaims> {
        self.current_user.read().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_authenticated()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<SecretString> {
        self.tokens.access_token()
    }

    #[must_use]
    pub fn stored_refresh_token(&self) -> Option<SecretString> {
        self.tokens.refresh_token()
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    fn require_code(&self) -> Result<String> {
        self.verify_code.read().clone().ok_or(Error::MissingVerifyCode)
    }

    fn load_current_user(&self) {
        *self.current_user.write() = self.tokens.claims();
    }

    fn set_state(&self, state: LoginState) {
        debug!("login state -> {state}");
        self.state.send_replace(state);
    }
}
