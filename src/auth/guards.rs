//! Access checks run before a protected screen is shown.

use crate::{
    auth::{admin::AdminAuth, user::UserAuth},
    navigation::{Navigator, Route},
};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect {
        route: Route,
        /// Screen to come back to after signing in.
        return_url: Option<String>,
    },
}

impl GuardDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }
}

pub struct Guards {
    user: Arc<UserAuth>,
    admin: Arc<AdminAuth>,
    navigator: Navigator,
}

impl Guards {
    #[must_use]
    pub fn new(user: Arc<UserAuth>, admin: Arc<AdminAuth>, navigator: Navigator) -> Self {
        Self {
            user,
            admin,
            navigator,
        }
    }

    /// Operator screens need an authenticated admin session with the admin role.
    pub fn admin_guard(&self, target: &str) -> GuardDecision {
        if self.admin.is_authenticated() && self.admin.is_admin() {
            return GuardDecision::Allow;
        }
        self.redirect(Route::Login, Some(target))
    }

    /// Customer screens accept a user session, or an admin-context session
    /// without the admin role. Operators are sent to their own area.
    pub fn auth_guard(&self, target: &str) -> GuardDecision {
        if self.user.is_authenticated() {
            return GuardDecision::Allow;
        }

        if self.admin.is_authenticated() {
            if self.admin.is_admin() {
                return self.redirect(Route::Management, None);
            }
            return GuardDecision::Allow;
        }

        self.redirect(Route::Login, Some(target))
    }

    fn redirect(&self, route: Route, return_url: Option<&str>) -> GuardDecision {
        debug!("guard redirect to {route}");
        self.navigator.navigate(route);
        GuardDecision::Redirect {
            route,
            return_url: return_url.map(str::to_string),
        }
    }
}
