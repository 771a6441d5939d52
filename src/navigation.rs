//! Screen navigation requests emitted by the session core.
//!
//! The core never renders anything. It asks the embedding UI to show a
//! screen (the login form after logout, the expiry notice after a forced
//! logout) and the UI reports completed navigations back to the session
//! timer.

use parking_lot::RwLock;
use std::{fmt, sync::Arc};
use tokio::sync::broadcast;
use tracing::debug;

const ROUTE_CHANNEL_CAPACITY: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Login,
    SessionTimeout,
    Dashboard,
    Management,
}

impl Route {
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::SessionTimeout => "/session-timeout",
            Route::Dashboard => "/dashboard",
            Route::Management => "/management",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Clone)]
pub struct Navigator {
    tx: broadcast::Sender<Route>,
    current: Arc<RwLock<Option<Route>>>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(ROUTE_CHANNEL_CAPACITY);
        Self {
            tx,
            current: Arc::new(RwLock::new(None)),
        }
    }

    pub fn navigate(&self, route: Route) {
        debug!("navigate to {route}");
        *self.current.write() = Some(route);
        // no subscriber is fine, the current route is still recorded
        let _ = self.tx.send(route);
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Route> {
        self.tx.subscribe()
    }

    /// Last route requested by the core, if any.
    #[must_use]
    pub fn current_route(&self) -> Option<Route> {
        *self.current.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn navigate_records_and_broadcasts() {
        let navigator = Navigator::new();
        let mut rx = navigator.subscribe();

        navigator.navigate(Route::SessionTimeout);

        assert_eq!(navigator.current_route(), Some(Route::SessionTimeout));
        assert_eq!(rx.recv().await.ok(), Some(Route::SessionTimeout));
    }

    #[test]
    fn navigate_without_subscribers_still_records() {
        let navigator = Navigator::new();
        navigator.navigate(Route::Login);
        assert_eq!(navigator.current_route(), Some(Route::Login));
        assert_eq!(Route::Login.to_string(), "/login");
    }
}
