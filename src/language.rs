use crate::{
    error::{Error, Result},
    storage::{KeyValueStore, LANGUAGE_KEY},
};
use std::{fmt, str::FromStr, sync::Arc};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Language {
    #[default]
    De,
    En,
}

impl Language {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Language::De => "de",
            Language::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "de" => Ok(Language::De),
            "en" => Ok(Language::En),
            other => Err(Error::Config(format!("unsupported language: {other}"))),
        }
    }
}

/// UI language persisted next to the session state.
pub struct LanguagePreference {
    store: Arc<dyn KeyValueStore>,
}

impl LanguagePreference {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored language; unknown or missing values fall back to German.
    #[must_use]
    pub fn current(&self) -> Language {
        self.store
            .get(LANGUAGE_KEY)
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    /// # Errors
    /// Returns `Error::Storage` if the choice cannot be persisted.
    pub fn set(&self, language: Language) -> Result<()> {
        self.store.set(LANGUAGE_KEY, language.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn defaults_to_german_and_persists_choice() -> Result<()> {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let preference = LanguagePreference::new(Arc::clone(&store));
        assert_eq!(preference.current(), Language::De);

        preference.set(Language::En)?;
        assert_eq!(preference.current(), Language::En);
        assert_eq!(store.get(LANGUAGE_KEY).as_deref(), Some("en"));

        store.set(LANGUAGE_KEY, "fr")?;
        assert_eq!(preference.current(), Language::De);
        Ok(())
    }

    #[test]
    fn parses_codes_case_insensitively() {
        assert_eq!("EN".parse::<Language>().ok(), Some(Language::En));
        assert!("klingon".parse::<Language>().is_err());
    }
}
