use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error};

use proctor_core::model::ParticipantId;

use crate::collaborators::Presence;

/// Which kind of session a pending timer guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Trial,
    Test,
}

/// Fire-once forgiveness timers, one per (participant, session kind).
///
/// Scheduling replaces any pending timer for the same key. At fire time the
/// timer re-checks live presence and skips its action if the participant
/// came back; the caller's action re-verifies session identity on top of
/// that, so an unaborted stale timer is always a silent no-op. `cancel` and
/// `shutdown` abort eagerly as cleanup, nothing more.
pub struct AbandonmentScheduler {
    forgiveness: Duration,
    presence: Arc<dyn Presence>,
    pending: Mutex<HashMap<(ParticipantId, SessionKind), JoinHandle<()>>>,
}

impl AbandonmentScheduler {
    #[must_use]
    pub fn new(forgiveness: Duration, presence: Arc<dyn Presence>) -> Self {
        Self {
            forgiveness,
            presence,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Arm (or re-arm) the timer for a participant's session.
    ///
    /// `on_expired` runs only if the participant is still offline when the
    /// forgiveness window elapses.
    pub fn schedule<F>(&self, participant: ParticipantId, kind: SessionKind, on_expired: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let presence = Arc::clone(&self.presence);
        let forgiveness = self.forgiveness;
        let handle = tokio::spawn(async move {
            sleep(forgiveness).await;
            if presence.is_online(participant) {
                debug!(%participant, ?kind, "participant returned before the deadline");
                return;
            }
            on_expired.await;
        });

        match self.pending.lock() {
            Ok(mut pending) => {
                if let Some(previous) = pending.insert((participant, kind), handle) {
                    previous.abort();
                }
            }
            Err(poisoned) => {
                error!(%participant, ?kind, "abandonment timer map poisoned");
                drop(poisoned);
                handle.abort();
            }
        }
    }

    /// Discard a pending timer, if one exists.
    pub fn cancel(&self, participant: ParticipantId, kind: SessionKind) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(handle) = pending.remove(&(participant, kind)) {
                handle.abort();
            }
        }
    }

    /// True while a timer for the key has been scheduled and not cancelled.
    #[must_use]
    pub fn is_pending(&self, participant: ParticipantId, kind: SessionKind) -> bool {
        self.pending
            .lock()
            .map(|pending| pending.contains_key(&(participant, kind)))
            .unwrap_or(false)
    }

    /// Abort every pending timer.
    pub fn shutdown(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            for (_, handle) in pending.drain() {
                handle.abort();
            }
        }
    }
}

impl Drop for AbandonmentScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
