pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_API_URL: &str = "api-url";
pub const ARG_STATE_FILE: &str = "state-file";
pub const ARG_CONFIG: &str = "config";

pub const DEFAULT_STATE_FILE: &str = "purbank-state.json";

const HTTP_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("purbank")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new(ARG_API_URL)
                .long(ARG_API_URL)
                .help("Banking API base URL, example: https://bank.tld/api/v1")
                .env("PURBANK_API_URL")
                .global(true),
        )
        .arg(
            Arg::new(ARG_STATE_FILE)
                .long(ARG_STATE_FILE)
                .help("File holding tokens, device id and preferences")
                .env("PURBANK_STATE_FILE")
                .default_value(DEFAULT_STATE_FILE)
                .global(true),
        )
        .arg(
            Arg::new(ARG_CONFIG)
                .short('c')
                .long(ARG_CONFIG)
                .help("Runtime config document, example: {\"apiUrl\": \"https://bank.tld/api/v1\"}")
                .env("PURBANK_CONFIG")
                .global(true),
        )
        .subcommand(
            Command::new("login")
                .about("Sign in with a contract number and approve in the mobile app")
                .arg(
                    Arg::new("contract-number")
                        .help("Contract number printed on the welcome letter")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("admin-login")
                .about("Sign in to the back office with email and password")
                .arg(
                    Arg::new("email")
                        .short('e')
                        .long("email")
                        .help("Operator email")
                        .env("PURBANK_ADMIN_EMAIL")
                        .required(true),
                )
                .arg(
                    Arg::new("password")
                        .short('p')
                        .long("password")
                        .help("Operator password")
                        .env("PURBANK_ADMIN_PASSWORD")
                        .hide_env_values(true)
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("change-password")
                .about("Change the operator password")
                .arg(
                    Arg::new("current")
                        .long("current")
                        .help("Current password")
                        .required(true),
                )
                .arg(
                    Arg::new("new")
                        .long("new")
                        .help("New password")
                        .required(true),
                )
                .arg(
                    Arg::new("confirm")
                        .long("confirm")
                        .help("New password, repeated")
                        .required(true),
                ),
        )
        .subcommand(Command::new("status").about("Show signed-in identities and the device id"))
        .subcommand(
            Command::new("request")
                .about("Send an authorized request, approving verifications in the mobile app")
                .arg(
                    Arg::new("method")
                        .help("HTTP method")
                        .required(true)
                        .ignore_case(true)
                        .value_parser(HTTP_METHODS),
                )
                .arg(
                    Arg::new("path")
                        .help("Path below the API base URL, example: /konten")
                        .required(true),
                )
                .arg(
                    Arg::new("data")
                        .short('d')
                        .long("data")
                        .help("JSON request body"),
                ),
        )
        .subcommand(Command::new("logout").about("Sign out customer and operator"))
        .subcommand(
            Command::new("language")
                .about("Show or set the preferred language")
                .arg(
                    Arg::new("language")
                        .help("Language code")
                        .ignore_case(true)
                        .value_parser(["de", "en"]),
                ),
        );

    logging::with_args(command)
}
