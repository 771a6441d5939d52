use crate::{cli::globals::GlobalArgs, language::Language};
use anyhow::Result;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub language: Option<Language>,
}

/// Prints the stored language, or stores a new one.
/// # Errors
/// Returns an error if the state file cannot be read or written.
pub fn execute(args: &Args) -> Result<()> {
    let session = args.globals.session()?;
    let preference = session.language();

    if let Some(language) = args.language {
        preference.set(language)?;
    }
    println!("{}", preference.current());

    Ok(())
}
