//! Stable per-installation device identifier sent with device-bound requests.

use crate::storage::{KeyValueStore, DEVICE_ID_KEY};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct DeviceIdentity {
    store: Arc<dyn KeyValueStore>,
    // serializes first-time creation so two callers cannot mint different ids
    create_lock: Mutex<()>,
}

impl DeviceIdentity {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            create_lock: Mutex::new(()),
        }
    }

    /// Returns the persisted device id, creating a UUID v4 on first use.
    ///
    /// Once created the id is never regenerated. If persisting a fresh id
    /// fails the id is still returned for this call and the failure is logged.
    pub fn get_or_create_device_id(&self) -> String {
        if let Some(id) = self.store.get(DEVICE_ID_KEY) {
            return id;
        }

        let _guard = self.create_lock.lock();
        if let Some(id) = self.store.get(DEVICE_ID_KEY) {
            return id;
        }

        let id = Uuid::new_v4().to_string();
        if let Err(err) = self.store.set(DEVICE_ID_KEY, &id) {
            warn!("Failed to persist device id: {err}");
        }
        debug!("created device id {id}");

        id
    }
}
