//! # PurBank session client
//!
//! `purbank_session` is the session and authentication core of the PurBank
//! retail banking client. It holds two independent identities against the
//! banking API:
//!
//! - **Customers** sign in with a contract number and approve the login in the
//!   PurBank mobile app. The client polls the approval status and then
//!   exchanges the approved code for a device-bound token pair.
//! - **Operators** sign in with email and password and manage the bank from the
//!   back office.
//!
//! ## Request pipeline
//!
//! Every non-auth request goes through [`api::ApiClient`], which attaches the
//! bearer token of the matching identity and the persistent device id. A 401 is
//! answered with one shared refresh followed by a retry of every affected
//! request. Mutating requests whose response carries a pending verification
//! code complete only after the [`verify::VerifyGate`] reports an approval.
//!
//! ## Session lifetime
//!
//! [`timer::SessionTimer`] shows an expiry warning after eight minutes without
//! navigation and refreshes or ends the session after ten minutes, depending on
//! whether the user was still active.
//!
//! State lives in a [`storage::KeyValueStore`]; the `purbank` binary keeps it
//! in a JSON file next to the working directory.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod language;
pub mod navigation;
pub mod session;
pub mod storage;
pub mod timer;
pub mod token;
pub mod verify;

pub use error::{Error, Result};
pub use session::Session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_names_the_crate() {
        assert!(APP_USER_AGENT.starts_with("purbank-session/"));
        assert!(APP_USER_AGENT.ends_with(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn commit_hash_is_never_empty() {
        assert!(!GIT_COMMIT_HASH.is_empty());
    }
}
