use std::collections::HashMap;

use proctor_core::model::{ParticipantId, TestId, TrialId, TrialSession};

use crate::error::LifecycleError;
use crate::sessions::session::TestSession;

/// Canonical maps of active sessions.
///
/// Trials are keyed by the trialer; a secondary party index maps BOTH
/// parties of every trial back to its key, keeping the either-role conflict
/// checks O(1). Tests are keyed by the testificate. The controller is the
/// only writer; lookups hand out clones.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    trials: HashMap<ParticipantId, TrialSession>,
    trial_parties: HashMap<ParticipantId, ParticipantId>,
    tests: HashMap<ParticipantId, TestSession>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a trial slot for the pair, before any external call is made.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Conflict` if either party is already in a
    /// trial (in either role) or the pair is one participant; the registry
    /// is left untouched in every conflict case.
    pub fn acquire_trial(
        &mut self,
        trialer: ParticipantId,
        testificate: ParticipantId,
    ) -> Result<(), LifecycleError> {
        if self.trial_parties.contains_key(&trialer) {
            return Err(LifecycleError::conflict(
                "You are already in the act of trialing",
            ));
        }
        if self.trial_parties.contains_key(&testificate) {
            return Err(LifecycleError::conflict("That individual is already trialing"));
        }
        let session = TrialSession::reserve(trialer, testificate)
            .map_err(|_| LifecycleError::conflict("You cannot trial yourself"))?;
        self.trials.insert(trialer, session);
        self.trial_parties.insert(trialer, trialer);
        self.trial_parties.insert(testificate, trialer);
        Ok(())
    }

    /// Attach the persisted record id to a reserved trial.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Invariant` if the slot vanished between
    /// reservation and binding.
    pub fn bind_trial_id(
        &mut self,
        trialer: ParticipantId,
        id: TrialId,
    ) -> Result<(), LifecycleError> {
        let session = self.trials.get_mut(&trialer).ok_or_else(|| {
            LifecycleError::Invariant(format!("no reserved trial for trialer {trialer}"))
        })?;
        session.bind_trial_id(id);
        Ok(())
    }

    /// Remove and return the trial owned by this trialer.
    pub fn release_trial(&mut self, trialer: ParticipantId) -> Option<TrialSession> {
        let session = self.trials.remove(&trialer)?;
        self.trial_parties.remove(&session.trialer());
        self.trial_parties.remove(&session.testificate());
        Some(session)
    }

    /// The trial owned by this trialer, if any.
    #[must_use]
    pub fn lookup_trial(&self, trialer: ParticipantId) -> Option<TrialSession> {
        self.trials.get(&trialer).cloned()
    }

    /// The trial this participant takes part in, in either role.
    #[must_use]
    pub fn trial_involving(&self, participant: ParticipantId) -> Option<TrialSession> {
        let trialer = self.trial_parties.get(&participant)?;
        self.trials.get(trialer).cloned()
    }

    /// Reserve the test slot for a testificate.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Conflict` if they are already testing; the
    /// registry is left untouched.
    pub fn acquire_test(&mut self, session: TestSession) -> Result<(), LifecycleError> {
        let testificate = session.testificate();
        if self.tests.contains_key(&testificate) {
            return Err(LifecycleError::conflict("You are already testing"));
        }
        self.tests.insert(testificate, session);
        Ok(())
    }

    /// Attach the persisted record id to a reserved test.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Invariant` if the slot vanished between
    /// reservation and binding.
    pub fn bind_test_id(
        &mut self,
        testificate: ParticipantId,
        id: TestId,
    ) -> Result<(), LifecycleError> {
        let session = self.tests.get_mut(&testificate).ok_or_else(|| {
            LifecycleError::Invariant(format!("no reserved test for testificate {testificate}"))
        })?;
        session.bind_test_id(id);
        Ok(())
    }

    /// Remove and return the test owned by this testificate.
    pub fn release_test(&mut self, testificate: ParticipantId) -> Option<TestSession> {
        self.tests.remove(&testificate)
    }

    #[must_use]
    pub fn lookup_test(&self, testificate: ParticipantId) -> Option<TestSession> {
        self.tests.get(&testificate).cloned()
    }

    /// Mutable access for the controller's in-lock transitions.
    pub(crate) fn test_mut(&mut self, testificate: ParticipantId) -> Option<&mut TestSession> {
        self.tests.get_mut(&testificate)
    }

    /// Trialer keys of every active trial.
    #[must_use]
    pub fn active_trialers(&self) -> Vec<ParticipantId> {
        self.trials.keys().copied().collect()
    }

    /// Testificate keys of every active test.
    #[must_use]
    pub fn active_testificates(&self) -> Vec<ParticipantId> {
        self.tests.keys().copied().collect()
    }
}
