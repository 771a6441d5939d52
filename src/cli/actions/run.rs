use crate::cli::actions::{admin, language, login, request, session, Action};
use anyhow::Result;

/// Execute the provided action.
// This is the single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Login(args) => login::execute(args).await,
        Action::AdminLogin(args) => admin::login(args).await,
        Action::ChangePassword(args) => admin::change_password(args).await,
        Action::Status(globals) => session::status(&globals),
        Action::Request(args) => request::execute(args).await,
        Action::Logout(globals) => session::logout(&globals),
        Action::Language(args) => language::execute(&args),
    }
}
