//! Inactivity warning and session-age enforcement.
//!
//! One tick per second while any identity is signed in. Inactivity counts
//! seconds since the last completed navigation; session age counts seconds
//! since the last login or refresh. An old session of an active user is
//! refreshed silently, an old session of an inactive user is ended.

use crate::{
    auth::{AdminAuth, UserAuth},
    config::ClientConfig,
    navigation::{Navigator, Route},
};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

const TICK: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nobody is signed in; counters were reset.
    Idle,
    Tracking,
    Refreshed,
    LoggedOut,
}

pub struct SessionTimer {
    user: Arc<UserAuth>,
    admin: Arc<AdminAuth>,
    navigator: Navigator,
    inactivity: AtomicU64,
    session: AtomicU64,
    warning: watch::Sender<bool>,
    inactivity_limit: u64,
    session_limit: u64,
}

impl SessionTimer {
    #[must_use]
    pub fn new(
        config: &ClientConfig,
        user: Arc<UserAuth>,
        admin: Arc<AdminAuth>,
        navigator: Navigator,
    ) -> Self {
        let (warning, _) = watch::channel(false);
        Self {
            user,
            admin,
            navigator,
            inactivity: AtomicU64::new(0),
            session: AtomicU64::new(0),
            warning,
            inactivity_limit: config.inactivity_limit_seconds,
            session_limit: config.session_limit_seconds,
        }
    }

    /// Runs `tick` every second until the returned task is aborted.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        self.spawn_every(TICK)
    }

    fn spawn_every(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let timer = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                timer.tick().await;
            }
        })
    }

    /// Advances the counters by one second and applies the limits.
    pub async fn tick(&self) -> TickOutcome {
        if !self.admin.is_authenticated() && !self.user.is_authenticated() {
            self.reset_all();
            return TickOutcome::Idle;
        }

        let inactivity = self.inactivity.fetch_add(1, Ordering::SeqCst) + 1;
        let session = self.session.fetch_add(1, Ordering::SeqCst) + 1;

        if inactivity >= self.inactivity_limit {
            self.warning.send_if_modified(|visible| {
                if *visible {
                    false
                } else {
                    info!("Session about to expire due to inactivity");
                    *visible = true;
                    true
                }
            });
        }

        if session < self.session_limit {
            return TickOutcome::Tracking;
        }

        if inactivity < self.inactivity_limit {
            self.refresh_tokens().await
        } else {
            info!("Session expired after inactivity");
            self.force_logout();
            TickOutcome::LoggedOut
        }
    }

    async fn refresh_tokens(&self) -> TickOutcome {
        debug!("session limit reached while active, refreshing tokens");
        let refreshed = if self.admin.is_authenticated() {
            self.admin.refresh_token().await
        } else {
            self.user.refresh_access_token().await
        };

        match refreshed {
            Ok(()) => {
                self.session.store(0, Ordering::SeqCst);
                TickOutcome::Refreshed
            }
            Err(err) => {
                warn!("Session refresh failed: {err}");
                self.force_logout();
                TickOutcome::LoggedOut
            }
        }
    }

    fn force_logout(&self) {
        self.warning.send_replace(false);
        self.admin.logout();
        self.user.logout();
        self.reset_all();
        self.navigator.navigate(Route::SessionTimeout);
    }

    /// Called by the UI after every completed navigation.
    pub fn navigation_completed(&self) {
        self.inactivity.store(0, Ordering::SeqCst);
        self.warning.send_replace(false);
    }

    pub fn stay_logged_in(&self) {
        self.navigation_completed();
    }

    pub fn logout_now(&self) {
        self.force_logout();
    }

    #[must_use]
    pub fn subscribe_warning(&self) -> watch::Receiver<bool> {
        self.warning.subscribe()
    }

    #[must_use]
    pub fn is_warning_visible(&self) -> bool {
        *self.warning.borrow()
    }

    #[must_use]
    pub fn inactivity_seconds(&self) -> u64 {
        self.inactivity.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn session_seconds(&self) -> u64 {
        self.session.load(Ordering::SeqCst)
    }

    /// Seconds until the session limit is reached.
    #[must_use]
    pub fn total_time_remaining(&self) -> u64 {
        self.session_limit.saturating_sub(self.session_seconds())
    }

    /// Seconds until the inactivity warning appears.
    #[must_use]
    pub fn inactivity_time_remaining(&self) -> u64 {
        self.inactivity_limit.saturating_sub(self.inactivity_seconds())
    }

    fn reset_all(&self) {
        self.inactivity.store(0, Ordering::SeqCst);
        self.session.store(0, Ordering::SeqCst);
        self.warning.send_if_modified(|visible| std::mem::replace(visible, false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::transport::Transport,
        device::DeviceIdentity,
        storage::{KeyValueStore, MemoryStore},
        token::test_tokens::valid,
    };
    use secrecy::SecretString;
    use serde_json::json;
    use std::net::TcpListener;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    struct Fixture {
        timer: SessionTimer,
        user: Arc<UserAuth>,
        navigator: Navigator,
    }

    fn fixture(base: &str) -> crate::Result<Fixture> {
        let config = ClientConfig::default().with_api_base_url(base);
        let transport = Arc::new(Transport::new(&config)?);
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let navigator = Navigator::new();
        let user = Arc::new(UserAuth::new(
            &config,
            Arc::clone(&transport),
            Arc::clone(&store),
            Arc::new(DeviceIdentity::new(Arc::clone(&store))),
            navigator.clone(),
        ));
        let admin = Arc::new(AdminAuth::new(transport, store, navigator.clone()));
        Ok(Fixture {
            timer: SessionTimer::new(&config, Arc::clone(&user), admin, navigator.clone()),
            user,
            navigator,
        })
    }

    fn sign_in(user: &UserAuth, refresh: &str) -> crate::Result<()> {
        user.tokens().set_tokens(
            &SecretString::from(valid("customer")),
            &SecretString::from(refresh.to_string()),
        )
    }

    #[tokio::test]
    async fn idle_without_session() -> crate::Result<()> {
        let fx = fixture("http://localhost:8080/api/v1")?;
        assert_eq!(fx.timer.tick().await, TickOutcome::Idle);
        assert_eq!(fx.timer.session_seconds(), 0);
        assert_eq!(fx.timer.total_time_remaining(), 600);
        Ok(())
    }

    #[tokio::test]
    async fn spawned_timer_keeps_ticking_until_aborted() -> crate::Result<()> {
        let fx = fixture("http://localhost:8080/api/v1")?;
        sign_in(&fx.user, "r")?;
        let timer = Arc::new(fx.timer);

        let task = timer.spawn_every(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(200)).await;
        task.abort();
        let _ = task.await;

        let ticked = timer.session_seconds();
        assert!(ticked >= 3, "only {ticked} ticks");
        assert_eq!(timer.inactivity_seconds(), ticked);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(timer.session_seconds(), ticked);
        Ok(())
    }

    #[tokio::test]
    async fn warning_after_inactivity_and_cleared_by_navigation() -> crate::Result<()> {
        let fx = fixture("http://localhost:8080/api/v1")?;
        sign_in(&fx.user, "r")?;
        let mut warnings = fx.timer.subscribe_warning();

        for _ in 0..479 {
            fx.timer.tick().await;
        }
        assert!(!fx.timer.is_warning_visible());
        assert_eq!(fx.timer.inactivity_time_remaining(), 1);

        assert_eq!(fx.timer.tick().await, TickOutcome::Tracking);
        assert!(fx.timer.is_warning_visible());
        assert!(warnings.has_changed().unwrap_or(false));
        warnings.borrow_and_update();

        // idempotent once visible
        fx.timer.tick().await;
        assert!(!warnings.has_changed().unwrap_or(true));

        fx.timer.navigation_completed();
        assert_eq!(fx.timer.inactivity_seconds(), 0);
        assert!(!fx.timer.is_warning_visible());
        assert_eq!(fx.timer.session_seconds(), 481);
        Ok(())
    }

    #[tokio::test]
    async fn active_user_is_refreshed_at_session_limit() -> crate::Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh-token"))
            .and(header("Authorization", "Bearer refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": valid("customer"),
                "refresh_token": "refresh-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let fx = fixture(&server.uri())?;
        sign_in(&fx.user, "refresh-1")?;

        for second in 1..600 {
            if second % 300 == 0 {
                fx.timer.stay_logged_in();
            }
            assert_eq!(fx.timer.tick().await, TickOutcome::Tracking);
        }
        assert_eq!(fx.timer.tick().await, TickOutcome::Refreshed);
        assert_eq!(fx.timer.session_seconds(), 0);
        assert!(fx.user.is_authenticated());
        Ok(())
    }

    #[tokio::test]
    async fn inactive_user_is_logged_out_at_session_limit() -> crate::Result<()> {
        let fx = fixture("http://localhost:8080/api/v1")?;
        sign_in(&fx.user, "r")?;

        for _ in 1..600 {
            fx.timer.tick().await;
        }
        assert_eq!(fx.timer.tick().await, TickOutcome::LoggedOut);
        assert!(!fx.user.is_authenticated());
        assert!(!fx.timer.is_warning_visible());
        assert_eq!(fx.navigator.current_route(), Some(Route::SessionTimeout));
        assert_eq!(fx.timer.tick().await, TickOutcome::Idle);
        Ok(())
    }

    #[tokio::test]
    async fn failed_refresh_forces_logout() -> crate::Result<()> {
        let Ok(listener) = TcpListener::bind("127.0.0.1:0") else {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        };
        let port = listener.local_addr().map_or(9, |addr| addr.port());
        drop(listener);

        let fx = fixture(&format!("http://127.0.0.1:{port}"))?;
        sign_in(&fx.user, "r")?;

        for _ in 1..600 {
            fx.timer.navigation_completed();
            fx.timer.tick().await;
        }
        assert_eq!(fx.timer.tick().await, TickOutcome::LoggedOut);
        assert_eq!(fx.navigator.current_route(), Some(Route::SessionTimeout));
        Ok(())
    }
}
