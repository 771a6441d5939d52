//! Second-factor gate for mutating requests.
//!
//! A gated request registers a challenge keyed by its verification code and
//! waits for exactly that code to be completed. Listeners (a UI prompt, or the
//! `VerifyWatcher` polling the status endpoint) receive every challenge on a
//! broadcast channel and report the terminal outcome back through `complete`.

use crate::{
    api::transport::Transport,
    auth::types::{AuthStatus, AuthStatusResponse, MobileVerifyRequest},
    device::DeviceIdentity,
};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::{broadcast, oneshot},
    task::JoinHandle,
    time::{interval, Instant, MissedTickBehavior},
};
use tracing::{debug, info, instrument, warn};

const CHALLENGE_CHANNEL_CAPACITY: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    Approved,
    Rejected,
    Invalid,
    Expired,
    ConnectionError,
}

impl VerifyOutcome {
    #[must_use]
    pub fn is_approved(self) -> bool {
        self == VerifyOutcome::Approved
    }

    #[must_use]
    pub fn user_message(self) -> &'static str {
        match self {
            VerifyOutcome::Approved => "Verification approved.",
            VerifyOutcome::Rejected => "Verification was rejected in the mobile app.",
            VerifyOutcome::Invalid => "The verification code is invalid.",
            VerifyOutcome::Expired => "The verification code has expired. Please try again.",
            VerifyOutcome::ConnectionError => {
                "Connection error while checking the verification status."
            }
        }
    }
}

impl fmt::Display for VerifyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VerifyOutcome::Approved => "approved",
            VerifyOutcome::Rejected => "rejected",
            VerifyOutcome::Invalid => "invalid",
            VerifyOutcome::Expired => "expired",
            VerifyOutcome::ConnectionError => "connection error",
        };
        f.write_str(label)
    }
}

/// A pending approval published to listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyChallenge {
    pub code: String,
}

pub struct VerifyGate {
    pending: Mutex<HashMap<String, Vec<oneshot::Sender<VerifyOutcome>>>>,
    challenges: broadcast::Sender<VerifyChallenge>,
}

impl Default for VerifyGate {
    fn default() -> Self {
        Self::new()
    }
}

impl VerifyGate {
    #[must_use]
    pub fn new() -> Self {
        let (challenges, _) = broadcast::channel(CHALLENGE_CHANNEL_CAPACITY);
        Self {
            pending: Mutex::new(HashMap::new()),
            challenges,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<VerifyChallenge> {
        self.challenges.subscribe()
    }

    /// Publishes a challenge for `code` and waits for its outcome.
    ///
    /// With no subscribed listener nobody could ever answer, so the challenge
    /// is rejected immediately. A challenge whose sender is dropped without an
    /// answer resolves to `Rejected`. Dropping the returned future removes
    /// its waiter from the pending set.
    pub async fn request_outcome(&self, code: &str) -> VerifyOutcome {
        if self.challenges.receiver_count() == 0 {
            warn!("No verification listener for code {code}, rejecting");
            return VerifyOutcome::Rejected;
        }

        // declared before the receiver so it drops after it and sees the sender closed
        let _cleanup = PendingCleanup { gate: self, code };
        let (tx, mut rx) = oneshot::channel();
        self.pending
            .lock()
            .entry(code.to_string())
            .or_default()
            .push(tx);

        info!("Mobile verification required (code {code})");
        if self
            .challenges
            .send(VerifyChallenge {
                code: code.to_string(),
            })
            .is_err()
        {
            warn!("Verification listeners went away for code {code}, rejecting");
            return VerifyOutcome::Rejected;
        }

        (&mut rx).await.unwrap_or(VerifyOutcome::Rejected)
    }

    /// Resolves to `true` only when the challenge was approved.
    pub async fn request(&self, code: &str) -> bool {
        self.request_outcome(code).await.is_approved()
    }

    /// Resolves every waiter registered for `code`; returns whether any matched.
    pub fn complete(&self, code: &str, outcome: VerifyOutcome) -> bool {
        let Some(waiters) = self.pending.lock().remove(code) else {
            debug!("no pending verification for code {code}");
            return false;
        };

        debug!("verification {code} completed: {outcome}");
        for waiter in waiters {
            // the waiting request may have been dropped in the meantime
            let _ = waiter.send(outcome);
        }
        true
    }

    #[must_use]
    pub fn is_pending(&self, code: &str) -> bool {
        self.pending.lock().contains_key(code)
    }

    #[must_use]
    pub fn pending_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.pending.lock().keys().cloned().collect();
        codes.sort();
        codes
    }
}

/// Drops the senders of waiters that went away before their code completed.
struct PendingCleanup<'a> {
    gate: &'a VerifyGate,
    code: &'a str,
}

impl Drop for PendingCleanup<'_> {
    fn drop(&mut self) {
        let mut pending = self.gate.pending.lock();
        if let Some(waiters) = pending.get_mut(self.code) {
            waiters.retain(|waiter| !waiter.is_closed());
            if waiters.is_empty() {
                pending.remove(self.code);
                debug!("abandoned verification {} removed", self.code);
            }
        }
    }
}

/// Resolves challenges by polling the auth status endpoint with their code.
pub struct VerifyWatcher {
    transport: Arc<Transport>,
    device: Arc<DeviceIdentity>,
    gate: Arc<VerifyGate>,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl VerifyWatcher {
    #[must_use]
    pub fn new(
        transport: Arc<Transport>,
        device: Arc<DeviceIdentity>,
        gate: Arc<VerifyGate>,
        poll_interval: Duration,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            device,
            gate,
            poll_interval,
            poll_timeout,
        }
    }

    /// Polls until `code` reaches a terminal state, then completes it on the gate.
    #[instrument(skip(self))]
    pub async fn watch(&self, code: &str) -> VerifyOutcome {
        let outcome = self.poll_until_terminal(code).await;
        self.gate.complete(code, outcome);
        outcome
    }

    async fn poll_until_terminal(&self, code: &str) -> VerifyOutcome {
        let device_id = self.device.get_or_create_device_id();
        let started = Instant::now();
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if started.elapsed() > self.poll_timeout {
                warn!("Verification {code} timed out");
                return VerifyOutcome::Expired;
            }

            let body = MobileVerifyRequest {
                mobile_verify: code,
                device_id: &device_id,
            };
            let response = self
                .transport
                .post_json::<_, AuthStatusResponse>("/auth/status", &body, None)
                .await;

            match response.map(|response| response.status) {
                Ok(AuthStatus::Approved) => return VerifyOutcome::Approved,
                Ok(AuthStatus::Rejected) => return VerifyOutcome::Rejected,
                Ok(AuthStatus::Invalid) => return VerifyOutcome::Invalid,
                Ok(AuthStatus::Expired) => return VerifyOutcome::Expired,
                Ok(AuthStatus::Pending | AuthStatus::Unknown) => {}
                Err(err) => {
                    warn!("Verification status check failed: {err}");
                    return VerifyOutcome::ConnectionError;
                }
            }
        }
    }

    /// Watches every challenge the gate publishes until the task is aborted.
    pub fn spawn_auto_watch(self: Arc<Self>) -> JoinHandle<()> {
        // subscribe before spawning so no challenge published after this call is missed
        let challenges = self.gate.subscribe();
        self.watch_challenges(challenges)
    }

    fn watch_challenges(
        self: Arc<Self>,
        mut challenges: broadcast::Receiver<VerifyChallenge>,
    ) -> JoinHandle<()> {
        let watched: Arc<Mutex<HashSet<String>>> = Arc::default();

        tokio::spawn(async move {
            loop {
                match challenges.recv().await {
                    Ok(challenge) => {
                        if self.gate.is_pending(&challenge.code) {
                            self.start_watch(challenge.code, &watched);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Verification watcher skipped {skipped} challenges, resyncing");
                        for code in self.gate.pending_codes() {
                            self.start_watch(code, &watched);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Spawns one watch per code; a code already being watched is skipped.
    fn start_watch(self: &Arc<Self>, code: String, watched: &Arc<Mutex<HashSet<String>>>) {
        if !watched.lock().insert(code.clone()) {
            return;
        }

        let watcher = Arc::clone(self);
        let watched = Arc::clone(watched);
        tokio::spawn(async move {
            watcher.watch(&code).await;
            watched.lock().remove(&code);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ClientConfig,
        storage::{KeyValueStore, MemoryStore},
    };
    use serde_json::json;
    use std::net::TcpListener;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn watcher(base: &str, gate: Arc<VerifyGate>) -> crate::Result<VerifyWatcher> {
        let transport = Transport::new(&ClientConfig::default().with_api_base_url(base))?;
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        Ok(VerifyWatcher::new(
            Arc::new(transport),
            Arc::new(DeviceIdentity::new(store)),
            gate,
            Duration::from_millis(20),
            Duration::from_secs(5),
        ))
    }

    #[tokio::test]
    async fn request_without_listener_fails_closed() {
        let gate = VerifyGate::new();
        assert!(!gate.request("X1").await);
        assert!(gate.pending_codes().is_empty());
    }

    #[tokio::test]
    async fn concurrent_challenges_resolve_by_code() {
        let gate = Arc::new(VerifyGate::new());
        let mut listener = gate.subscribe();

        let first = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move { gate.request_outcome("A").await }
        });
        let second = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move { gate.request_outcome("B").await }
        });

        let mut seen = Vec::new();
        for _ in 0..2 {
            if let Ok(challenge) = listener.recv().await {
                seen.push(challenge.code);
            }
        }
        seen.sort();
        assert_eq!(seen, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(gate.pending_codes(), vec!["A".to_string(), "B".to_string()]);

        // answer in reverse order
        assert!(gate.complete("B", VerifyOutcome::Rejected));
        assert!(gate.complete("A", VerifyOutcome::Approved));
        assert!(!gate.complete("A", VerifyOutcome::Approved));

        assert_eq!(first.await.ok(), Some(VerifyOutcome::Approved));
        assert_eq!(second.await.ok(), Some(VerifyOutcome::Rejected));
    }

    #[tokio::test]
    async fn dropped_request_leaves_no_pending_waiter() {
        let gate = Arc::new(VerifyGate::new());
        let mut listener = gate.subscribe();

        let request = tokio::spawn({
            let gate = Arc::clone(&gate);
            async move { gate.request_outcome("GONE").await }
        });
        assert_eq!(listener.recv().await.ok().map(|c| c.code).as_deref(), Some("GONE"));
        assert!(gate.is_pending("GONE"));

        request.abort();
        assert!(request.await.is_err());

        assert!(gate.pending_codes().is_empty());
        assert!(!gate.complete("GONE", VerifyOutcome::Approved));
    }

    #[tokio::test]
    async fn lagging_watcher_resyncs_from_pending_codes() -> crate::Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "APPROVED" })))
            .mount(&server)
            .await;

        let gate = Arc::new(VerifyGate::new());
        let watcher = Arc::new(watcher(&server.uri(), Arc::clone(&gate))?);
        // subscribed but not yet read, so the challenges below overflow it
        let challenges = gate.subscribe();

        let total = CHALLENGE_CHANNEL_CAPACITY + 4;
        let requests: Vec<_> = (0..total)
            .map(|i| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { gate.request_outcome(&format!("C{i}")).await })
            })
            .collect();
        while gate.pending_codes().len() < total {
            tokio::task::yield_now().await;
        }

        let auto = Arc::clone(&watcher).watch_challenges(challenges);
        let mut approved = 0;
        for request in requests {
            let outcome = tokio::time::timeout(Duration::from_secs(5), request).await;
            if matches!(outcome, Ok(Ok(VerifyOutcome::Approved))) {
                approved += 1;
            }
        }
        auto.abort();

        assert_eq!(approved, total);
        assert!(gate.pending_codes().is_empty());
        Ok(())
    }

    #[test]
    fn outcomes_have_distinct_messages() {
        let messages = [
            VerifyOutcome::Rejected.user_message(),
            VerifyOutcome::Invalid.user_message(),
            VerifyOutcome::Expired.user_message(),
            VerifyOutcome::ConnectionError.user_message(),
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[tokio::test]
    async fn watcher_polls_until_approved() -> crate::Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/status"))
            .and(body_partial_json(json!({ "mobileVerify": "PAY-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "PENDING" })))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "APPROVED" })))
            .mount(&server)
            .await;

        let gate = Arc::new(VerifyGate::new());
        let watcher = Arc::new(watcher(&server.uri(), Arc::clone(&gate))?);
        let auto = Arc::clone(&watcher).spawn_auto_watch();

        assert!(gate.request("PAY-1").await);
        auto.abort();
        Ok(())
    }

    #[tokio::test]
    async fn watcher_reports_rejection_and_connection_errors() -> crate::Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/status"))
            .and(body_partial_json(json!({ "mobileVerify": "NO" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "REJECTED" })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/status"))
            .and(body_partial_json(json!({ "mobileVerify": "BROKEN" })))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let gate = Arc::new(VerifyGate::new());
        let watcher = watcher(&server.uri(), gate)?;

        assert_eq!(watcher.watch("NO").await, VerifyOutcome::Rejected);
        assert_eq!(watcher.watch("BROKEN").await, VerifyOutcome::ConnectionError);
        Ok(())
    }
}
