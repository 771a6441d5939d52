use crate::{cli::globals::GlobalArgs, token::TokenClaims};
use anyhow::Result;
use std::time::SystemTime;

fn describe_expiry(claims: &TokenClaims) -> String {
    match claims.expires_at().duration_since(SystemTime::now()) {
        Ok(remaining) => format!("expires in {}s", remaining.as_secs()),
        Err(_) => "expired".to_string(),
    }
}

fn describe(label: &str, authenticated: bool, claims: Option<&TokenClaims>) -> String {
    match (authenticated, claims) {
        (true, Some(claims)) => format!("{label}: {} ({})", claims.sub, describe_expiry(claims)),
        (false, Some(claims)) => format!("{label}: {} (expired)", claims.sub),
        _ => format!("{label}: signed out"),
    }
}

/// # Errors
/// Returns an error if the session cannot be opened.
pub fn status(globals: &GlobalArgs) -> Result<()> {
    let session = globals.session()?;
    let user = session.user();
    let admin = session.admin();

    println!("API:        {}", session.config().api_base_url);
    println!("Device id:  {}", session.device().get_or_create_device_id());
    println!("Language:   {}", session.language().current());
    println!(
        "{}",
        describe("Customer", user.is_authenticated(), user.current_user().as_ref())
    );
    if let Some(contract) = user.contract_number() {
        println!("Contract:   {contract}");
    }
    println!(
        "{}",
        describe("Operator", admin.is_authenticated(), admin.current_user().as_ref())
    );
    if admin.is_authenticated() {
        println!("Admin role: {}", admin.is_admin());
    }

    Ok(())
}

/// # Errors
/// Returns an error if the session cannot be opened.
pub fn logout(globals: &GlobalArgs) -> Result<()> {
    let session = globals.session()?;
    session.logout_all();
    println!("Signed out");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_signed_out_and_expired() {
        assert_eq!(describe("Customer", false, None), "Customer: signed out");

        let claims = TokenClaims {
            sub: "123456".to_string(),
            exp: 1.0,
            ..TokenClaims::default()
        };
        assert_eq!(
            describe("Customer", false, Some(&claims)),
            "Customer: 123456 (expired)"
        );
        assert_eq!(describe_expiry(&claims), "expired");
    }
}
