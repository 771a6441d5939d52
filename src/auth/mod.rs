//! Sign-in flows for both identities a session can hold.
//!
//! Customers use `UserAuth` (contract number plus mobile approval), operators
//! use `AdminAuth` (email and password). The two never share tokens; starting
//! one flow clears the credentials of the other.

pub mod admin;
pub mod guards;
pub mod types;
pub mod user;

pub use admin::AdminAuth;
pub use guards::{GuardDecision, Guards};
pub use types::{extract_verify_code, AuthStatus};
pub use user::{LoginState, PollHandle, PollOutcome, UserAuth};
