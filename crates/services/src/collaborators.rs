//! Capability contracts the lifecycle controller consumes.
//!
//! The host environment implements these; the controller never parses
//! commands, renders text, or talks to a permission backend itself.

use async_trait::async_trait;

use proctor_core::model::ParticipantId;
use storage::repository::{TestRecord, TrialRecord};

/// Live presence, queried at transition time and re-queried when an
/// abandonment timer fires.
pub trait Presence: Send + Sync {
    fn is_online(&self, participant: ParticipantId) -> bool;
}

/// Permission-group assignment. Best-effort: implementations log their own
/// failures, the controller never awaits confirmation beyond the call.
#[async_trait]
pub trait GroupAssigner: Send + Sync {
    /// Current primary group of a participant, if known.
    async fn primary_group(&self, participant: ParticipantId) -> Option<String>;

    /// Replace the participant's primary group.
    async fn set_group(&self, participant: ParticipantId, group: &str);
}

/// Typed participant-facing events. Rendering them is the host's job.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Notice {
    /// A quiz question was posed. `number` is 1-based.
    Question { number: usize, prompt: String },
    AnswerCorrect,
    AnswerIncorrect { expected: String },
    TestPassed { wrong: u32 },
    TestFailed { wrong: u32 },
    /// The other party of a trial disconnected; the window is how long they
    /// have to return.
    PeerDisconnected { forgiveness_secs: u64 },
    /// A trial was force-failed because the other party never returned.
    TrialAbandoned,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, participant: ParticipantId, notice: Notice);
}

/// Outbound report delivery. Called at most once per eligible closed
/// session; delivery failures are the sink's responsibility.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn trial_report(&self, record: &TrialRecord, attempt: u32);
    async fn test_report(&self, record: &TestRecord, attempt: u32);
}
