use thiserror::Error;

use crate::model::{ParticipantId, TrialId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TrialSessionError {
    #[error("a participant cannot trial themselves")]
    SelfTrial,
}

/// One in-progress evaluation: a trialer observing a testificate.
///
/// The registry slot is reserved before the persistence call that assigns
/// the record id, so `trial_id` stays `None` until the controller binds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialSession {
    trialer: ParticipantId,
    testificate: ParticipantId,
    trial_id: Option<TrialId>,
}

impl TrialSession {
    /// Creates a reserved (not yet persisted) trial slot.
    ///
    /// # Errors
    ///
    /// Returns `TrialSessionError::SelfTrial` if both parties are the same
    /// participant.
    pub fn reserve(
        trialer: ParticipantId,
        testificate: ParticipantId,
    ) -> Result<Self, TrialSessionError> {
        if trialer == testificate {
            return Err(TrialSessionError::SelfTrial);
        }
        Ok(Self {
            trialer,
            testificate,
            trial_id: None,
        })
    }

    #[must_use]
    pub fn trialer(&self) -> ParticipantId {
        self.trialer
    }

    #[must_use]
    pub fn testificate(&self) -> ParticipantId {
        self.testificate
    }

    /// The persisted record id, once bound.
    #[must_use]
    pub fn trial_id(&self) -> Option<TrialId> {
        self.trial_id
    }

    /// Attach the id assigned by the persistence layer.
    pub fn bind_trial_id(&mut self, id: TrialId) {
        self.trial_id = Some(id);
    }

    /// True if the given participant is either party of this trial.
    #[must_use]
    pub fn involves(&self, participant: ParticipantId) -> bool {
        self.trialer == participant || self.testificate == participant
    }
}
