use crate::cli::{actions::user_error, globals::GlobalArgs};
use anyhow::{bail, Result};
use secrecy::{ExposeSecret, SecretString};

#[derive(Debug)]
pub struct LoginArgs {
    pub globals: GlobalArgs,
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug)]
pub struct ChangePasswordArgs {
    pub globals: GlobalArgs,
    pub current: SecretString,
    pub new: SecretString,
    pub confirm: SecretString,
}

/// # Errors
/// Returns an error if the credentials are rejected or the server is unreachable.
pub async fn login(args: LoginArgs) -> Result<()> {
    let session = args.globals.session()?;
    let admin = session.admin();

    admin
        .login(&args.email, &args.password)
        .await
        .map_err(user_error)?;

    if admin.is_admin() {
        println!("Signed in to the back office as {}", args.email);
    } else {
        println!("Signed in as {} (no operator role)", args.email);
    }

    Ok(())
}

/// # Errors
/// Returns an error if the passwords do not match, the current password is
/// wrong, or the request fails.
pub async fn change_password(args: ChangePasswordArgs) -> Result<()> {
    if args.new.expose_secret() != args.confirm.expose_secret() {
        bail!("New password and confirmation do not match");
    }

    let session = args.globals.session()?;
    let admin = session.admin();
    if admin.access_token().is_none() {
        bail!("Not signed in to the back office, run `purbank admin-login` first");
    }

    match admin
        .change_password(args.current, args.new, args.confirm)
        .await
    {
        Ok(()) => {
            println!("Password changed");
            Ok(())
        }
        Err(err) if err.is_unauthorized() => bail!("Current password is incorrect"),
        Err(err) => Err(user_error(err)),
    }
}
