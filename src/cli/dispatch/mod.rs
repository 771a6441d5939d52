use crate::{
    cli::{
        actions::{admin, language, login, request, Action},
        globals::GlobalArgs,
    },
    language::Language,
};
use anyhow::{anyhow, Context, Result};
use reqwest::Method;
use secrecy::SecretString;

fn required(matches: &clap::ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .ok_or_else(|| anyhow!("missing required argument: {name}"))
}

fn required_secret(matches: &clap::ArgMatches, name: &str) -> Result<SecretString> {
    required(matches, name).map(SecretString::from)
}

/// Turns parsed arguments into an [`Action`].
///
/// Global arguments are read from the subcommand matches, clap propagates
/// them there regardless of where they appeared on the command line.
///
/// # Errors
/// Returns an error if a required argument is missing or malformed.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let (name, sub_m) = matches.subcommand().context("missing subcommand")?;
    let globals = GlobalArgs::from_matches(sub_m);

    match name {
        "login" => Ok(Action::Login(login::Args {
            globals,
            contract_number: required(sub_m, "contract-number")?.trim().to_string(),
        })),
        "admin-login" => Ok(Action::AdminLogin(admin::LoginArgs {
            globals,
            email: required(sub_m, "email")?.trim().to_string(),
            password: required_secret(sub_m, "password")?,
        })),
        "change-password" => Ok(Action::ChangePassword(admin::ChangePasswordArgs {
            globals,
            current: required_secret(sub_m, "current")?,
            new: required_secret(sub_m, "new")?,
            confirm: required_secret(sub_m, "confirm")?,
        })),
        "status" => Ok(Action::Status(globals)),
        "request" => {
            let method = required(sub_m, "method")?.to_ascii_uppercase();
            let method = Method::from_bytes(method.as_bytes())
                .with_context(|| format!("invalid HTTP method: {method}"))?;
            let body =
                request::parse_body(sub_m.get_one::<String>("data").map(String::as_str))?;

            Ok(Action::Request(request::Args {
                globals,
                method,
                path: required(sub_m, "path")?,
                body,
            }))
        }
        "logout" => Ok(Action::Logout(globals)),
        "language" => {
            let language = sub_m
                .get_one::<String>("language")
                .map(|code| code.parse::<Language>())
                .transpose()?;

            Ok(Action::Language(language::Args { globals, language }))
        }
        other => Err(anyhow!("unknown subcommand: {other}")),
    }
}
