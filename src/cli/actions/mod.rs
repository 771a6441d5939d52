pub mod admin;
pub mod language;
pub mod login;
pub mod request;
pub mod session;

// Internal "interpreter" for `Action`.
// We keep the match in a separate module so `mod.rs` stays small as more actions are added.
mod run;

use crate::cli::globals::GlobalArgs;

#[derive(Debug)]
pub enum Action {
    Login(login::Args),
    AdminLogin(admin::LoginArgs),
    ChangePassword(admin::ChangePasswordArgs),
    Status(GlobalArgs),
    Request(request::Args),
    Logout(GlobalArgs),
    Language(language::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}

/// Keeps the session error as the source and shows the user-facing text on top.
pub(crate) fn user_error(err: crate::Error) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}
