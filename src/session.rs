//! Wiring of every session component over one store and one HTTP transport.

use crate::{
    api::{transport::Transport, ApiClient},
    auth::{AdminAuth, Guards, UserAuth},
    config::ClientConfig,
    device::DeviceIdentity,
    error::Result,
    language::LanguagePreference,
    navigation::Navigator,
    storage::KeyValueStore,
    timer::SessionTimer,
    verify::{VerifyGate, VerifyWatcher},
};
use std::sync::Arc;
use tracing::info;

pub struct Session {
    config: ClientConfig,
    store: Arc<dyn KeyValueStore>,
    navigator: Navigator,
    device: Arc<DeviceIdentity>,
    user: Arc<UserAuth>,
    admin: Arc<AdminAuth>,
    gate: Arc<VerifyGate>,
    watcher: Arc<VerifyWatcher>,
    api: Arc<ApiClient>,
    timer: Arc<SessionTimer>,
    guards: Guards,
    language: LanguagePreference,
}

impl Session {
    /// # Errors
    /// Returns `Error::Config` if the configuration is invalid.
    pub fn new(config: ClientConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let transport = Arc::new(Transport::new(&config)?);
        let navigator = Navigator::new();
        let device = Arc::new(DeviceIdentity::new(Arc::clone(&store)));

        let user = Arc::new(UserAuth::new(
            &config,
            Arc::clone(&transport),
            Arc::clone(&store),
            Arc::clone(&device),
            navigator.clone(),
        ));
        let admin = Arc::new(AdminAuth::new(
            Arc::clone(&transport),
            Arc::clone(&store),
            navigator.clone(),
        ));

        let gate = Arc::new(VerifyGate::new());
        let watcher = Arc::new(VerifyWatcher::new(
            Arc::clone(&transport),
            Arc::clone(&device),
            Arc::clone(&gate),
            config.poll_interval,
            config.poll_timeout,
        ));
        let api = Arc::new(ApiClient::new(
            transport,
            Arc::clone(&user),
            Arc::clone(&admin),
            Arc::clone(&device),
            Arc::clone(&gate),
        ));
        let timer = Arc::new(SessionTimer::new(
            &config,
            Arc::clone(&user),
            Arc::clone(&admin),
            navigator.clone(),
        ));
        let guards = Guards::new(Arc::clone(&user), Arc::clone(&admin), navigator.clone());
        let language = LanguagePreference::new(Arc::clone(&store));

        Ok(Self {
            config,
            store,
            navigator,
            device,
            user,
            admin,
            gate,
            watcher,
            api,
            timer,
            guards,
            language,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    #[must_use]
    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    #[must_use]
    pub fn device(&self) -> &Arc<DeviceIdentity> {
        &self.device
    }

    #[must_use]
    pub fn user(&self) -> &Arc<UserAuth> {
        &self.user
    }

    #[must_use]
    pub fn admin(&self) -> &Arc<AdminAuth> {
        &self.admin
    }

    #[must_use]
    pub fn gate(&self) -> &Arc<VerifyGate> {
        &self.gate
    }

    #[must_use]
    pub fn watcher(&self) -> &Arc<VerifyWatcher> {
        &self.watcher
    }

    #[must_use]
    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    #[must_use]
    pub fn timer(&self) -> &Arc<SessionTimer> {
        &self.timer
    }

    #[must_use]
    pub fn guards(&self) -> &Guards {
        &self.guards
    }

    #[must_use]
    pub fn language(&self) -> &LanguagePreference {
        &self.language
    }

    /// Signs out both identities.
    pub fn logout_all(&self) {
        self.admin.logout();
        self.user.logout();
        info!("All sessions signed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        navigation::Route,
        storage::{MemoryStore, ADMIN_FLAG_KEY},
        token::test_tokens::valid,
    };
    use secrecy::SecretString;

    #[test]
    fn logout_all_clears_both_contexts() -> Result<()> {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let session = Session::new(ClientConfig::default(), Arc::clone(&store))?;

        session.user().tokens().set_tokens(
            &SecretString::from(valid("customer")),
            &SecretString::from("u"),
        )?;
        session.admin().tokens().set_tokens(
            &SecretString::from(valid("ops")),
            &SecretString::from("a"),
        )?;
        store.set(ADMIN_FLAG_KEY, "true")?;

        session.logout_all();

        assert!(!session.user().is_authenticated());
        assert!(!session.admin().is_authenticated());
        assert_eq!(store.get(ADMIN_FLAG_KEY), None);
        assert_eq!(session.navigator().current_route(), Some(Route::Login));
        Ok(())
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let config = ClientConfig::default().with_api_base_url("ftp://bank");
        assert!(Session::new(config, store).is_err());
    }
}
