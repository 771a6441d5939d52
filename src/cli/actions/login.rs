use crate::cli::{actions::user_error, globals::GlobalArgs};
use anyhow::{bail, Result};
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub contract_number: String,
}

/// Customer login: start, wait for the mobile approval, exchange tokens.
/// Ctrl-C while waiting cancels the pending approval on the server.
/// # Errors
/// Returns an error if any step of the login fails or is cancelled.
pub async fn execute(args: Args) -> Result<()> {
    let session = args.globals.session()?;
    let user = session.user();

    let code = user
        .initiate_login(&args.contract_number)
        .await
        .map_err(user_error)?;

    println!("Approve the login in the PurBank app.");
    println!("Verification code: {code}");

    let polling = user.start_polling().map_err(user_error)?;

    tokio::select! {
        outcome = polling.wait() => {
            debug!("polling finished: {outcome:?}");
            outcome.into_result().map_err(user_error)?;
        }
        _ = tokio::signal::ctrl_c() => {
            if let Err(err) = user.cancel_login().await {
                warn!("Failed to cancel login on the server: {err}");
            }
            bail!("Login cancelled");
        }
    }

    user.exchange_tokens().await.map_err(user_error)?;

    let subject = user
        .current_user()
        .map(|claims| claims.sub)
        .unwrap_or_else(|| args.contract_number.clone());
    println!("Signed in as {subject}");

    Ok(())
}
