use crate::cli::{actions::user_error, globals::GlobalArgs};
use anyhow::{Context, Result};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// Parses a `--data` argument into a JSON body.
///
/// # Errors
/// Returns an error if `data` is not valid JSON.
pub fn parse_body(data: Option<&str>) -> Result<Option<Value>> {
    data.map(|raw| serde_json::from_str(raw).context("--data must be valid JSON"))
        .transpose()
}

/// Sends the request through the authorizing client. Verification challenges
/// are resolved by polling their status until approved in the mobile app.
/// # Errors
/// Returns an error if the request fails or its verification is not approved.
pub async fn execute(args: Args) -> Result<()> {
    let session = args.globals.session()?;
    let watcher = Arc::clone(session.watcher()).spawn_auto_watch();

    let result = session.api().send(args.method, &args.path, args.body).await;
    watcher.abort();

    let response = result.map_err(user_error)?;
    match response.body {
        Value::Null => println!("{}", response.status),
        body => println!("{}", serde_json::to_string_pretty(&body)?),
    }

    Ok(())
}
