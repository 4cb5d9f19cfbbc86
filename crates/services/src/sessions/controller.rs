use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use chrono::Duration;
use tracing::{debug, error, info, warn};

use proctor_core::model::{
    ParticipantId, ProctorConfig, TestId, TrialId, TrialSession, is_valid_app_reference,
};
use proctor_core::{Clock, answers_match};
use storage::repository::Storage;

use crate::collaborators::{GroupAssigner, Notice, Notifier, Presence, ReportSink};
use crate::error::LifecycleError;
use crate::quiz::QuizPlan;
use crate::sessions::abandonment::{AbandonmentScheduler, SessionKind};
use crate::sessions::registry::SessionRegistry;
use crate::sessions::session::TestSession;

/// Note persisted when a trial dies because a party never came back.
const ABANDONED_NOTE: &str =
    "The trial was automatically ended due to the trialer or testificate leaving";

/// Note persisted when the host shuts down with trials still open.
const SHUTDOWN_NOTE: &str = "This trial was automatically ended as the server went offline";

/// Wrong-answer count recorded for a force-stopped or abandoned test.
const FORCED_WRONG: u32 = 25;

/// Orchestrates every trial and test transition.
///
/// All registry access happens inside one mutex with short, await-free
/// critical sections, so events (commands, presence changes, timer firings)
/// are effectively serialized; collaborator calls happen between sections.
#[derive(Clone)]
pub struct LifecycleController {
    inner: Arc<Inner>,
}

struct Inner {
    config: ProctorConfig,
    clock: Clock,
    storage: Storage,
    groups: Arc<dyn GroupAssigner>,
    reports: Arc<dyn ReportSink>,
    presence: Arc<dyn Presence>,
    notifier: Arc<dyn Notifier>,
    scheduler: AbandonmentScheduler,
    state: Mutex<SessionRegistry>,
}

impl LifecycleController {
    #[must_use]
    pub fn new(
        config: ProctorConfig,
        clock: Clock,
        storage: Storage,
        groups: Arc<dyn GroupAssigner>,
        reports: Arc<dyn ReportSink>,
        presence: Arc<dyn Presence>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let scheduler = AbandonmentScheduler::new(
            StdDuration::from_secs(config.abandon_forgiveness_secs),
            Arc::clone(&presence),
        );
        Self {
            inner: Arc::new(Inner {
                config,
                clock,
                storage,
                groups,
                reports,
                presence,
                notifier,
                scheduler,
                state: Mutex::new(SessionRegistry::new()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionRegistry> {
        // A poisoned mutex means another transition panicked; the registry
        // itself is still structurally sound, so keep serving events.
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn invariant(&self, description: impl Into<String>) -> LifecycleError {
        let description = description.into();
        error!(%description, "internal invariant violated");
        LifecycleError::Invariant(description)
    }

    // ─── Trials ────────────────────────────────────────────────────────────────

    /// Start a trial of `testificate` run by `trialer`.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Conflict` for self-trials, an offline or
    /// already-trialing party, a malformed application reference, or an
    /// ineligible rank; `LifecycleError::Storage` if the record cannot be
    /// created (the reservation is rolled back).
    pub async fn start_trial(
        &self,
        trialer: ParticipantId,
        testificate: ParticipantId,
        app: &str,
    ) -> Result<TrialId, LifecycleError> {
        if trialer == testificate {
            return Err(LifecycleError::conflict("You cannot trial yourself"));
        }
        if !self.inner.presence.is_online(testificate) {
            return Err(LifecycleError::conflict(
                "That individual is not online and cannot be trialed",
            ));
        }
        if !is_valid_app_reference(app) {
            return Err(LifecycleError::conflict(format!("Invalid app: {app}")));
        }
        let group = self.inner.groups.primary_group(testificate).await;
        if group.as_deref() != Some(self.inner.config.student_group.as_str()) {
            return Err(LifecycleError::conflict(
                "That individual is ineligible for trial due to rank",
            ));
        }

        self.state().acquire_trial(trialer, testificate)?;

        let created = self
            .inner
            .storage
            .trials
            .create_trial(trialer, testificate, app, self.inner.clock.now())
            .await;
        let trial_id = match created {
            Ok(id) => id,
            Err(e) => {
                self.state().release_trial(trialer);
                return Err(e.into());
            }
        };
        self.state().bind_trial_id(trialer, trial_id)?;

        self.inner
            .groups
            .set_group(testificate, &self.inner.config.testificate_group)
            .await;
        info!(%trialer, %testificate, %trial_id, "trial started");
        Ok(trial_id)
    }

    /// Append a note to the caller's active trial.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Conflict` if the caller is not trialing.
    pub async fn add_trial_note(
        &self,
        trialer: ParticipantId,
        note: &str,
    ) -> Result<(), LifecycleError> {
        let session = self
            .state()
            .lookup_trial(trialer)
            .ok_or_else(|| LifecycleError::conflict("You are not trialing anyone"))?;
        let trial_id = session
            .trial_id()
            .ok_or_else(|| self.invariant(format!("trial for {trialer} has no bound id")))?;
        self.inner
            .storage
            .trials
            .add_note(trial_id, note.trim())
            .await?;
        Ok(())
    }

    /// Close the caller's active trial with a verdict.
    ///
    /// A final note, when given, is persisted before the close. The
    /// testificate moves to the builder group on a pass and back to the
    /// student group on a fail, and a report is emitted either way.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Conflict` if the caller is not trialing,
    /// `LifecycleError::Invariant` if the registry entry disappears
    /// mid-transition.
    pub async fn end_trial(
        &self,
        trialer: ParticipantId,
        passed: bool,
        final_note: Option<&str>,
    ) -> Result<(), LifecycleError> {
        let session = self
            .state()
            .lookup_trial(trialer)
            .ok_or_else(|| LifecycleError::conflict("You are not trialing anyone"))?;
        let trial_id = session
            .trial_id()
            .ok_or_else(|| self.invariant(format!("trial for {trialer} has no bound id")))?;

        if let Some(note) = final_note {
            self.inner.storage.trials.add_note(trial_id, note).await?;
        }
        self.inner
            .storage
            .trials
            .close_trial(trial_id, passed, self.inner.clock.now())
            .await?;

        let removed = self
            .state()
            .release_trial(trialer)
            .ok_or_else(|| self.invariant(format!("trial for {trialer} vanished before release")))?;
        let testificate = removed.testificate();
        self.inner.scheduler.cancel(trialer, SessionKind::Trial);
        self.inner.scheduler.cancel(testificate, SessionKind::Trial);

        let group = if passed {
            &self.inner.config.builder_group
        } else {
            &self.inner.config.student_group
        };
        self.inner.groups.set_group(testificate, group).await;

        let record = self.inner.storage.trials.get_trial(trial_id).await?;
        let attempt = self.inner.storage.trials.count_trials(testificate).await?;
        self.inner.reports.trial_report(&record, attempt).await;

        info!(%trialer, %testificate, %trial_id, passed, "trial ended");
        Ok(())
    }

    // ─── Tests ─────────────────────────────────────────────────────────────────

    /// Start a quiz for a testificate and pose its first question.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Conflict` if they are already testing, have
    /// already passed, or burned their last three attempts within 24 hours;
    /// `LifecycleError::Storage` if the record cannot be created (the
    /// reservation is rolled back).
    pub async fn start_test(&self, testificate: ParticipantId) -> Result<TestId, LifecycleError> {
        if self.state().lookup_test(testificate).is_some() {
            return Err(LifecycleError::conflict("You are already testing"));
        }
        self.check_test_gating(testificate).await?;

        let plan = QuizPlan::shuffled(&mut rand::rng());
        self.state()
            .acquire_test(TestSession::reserve(testificate, plan))?;

        let created = self
            .inner
            .storage
            .tests
            .create_test(testificate, self.inner.clock.now())
            .await;
        let test_id = match created {
            Ok(id) => id,
            Err(e) => {
                self.state().release_test(testificate);
                return Err(e.into());
            }
        };
        self.state().bind_test_id(testificate, test_id)?;

        info!(%testificate, %test_id, "test started");
        self.advance(testificate).await?;
        Ok(test_id)
    }

    /// A testificate with a passed test never retakes it, and three fresh
    /// failures in a day force a cooldown before the next attempt.
    async fn check_test_gating(&self, testificate: ParticipantId) -> Result<(), LifecycleError> {
        let prior = self.inner.storage.tests.list_tests(testificate).await?;
        for id in &prior {
            let record = self.inner.storage.tests.get_test(*id).await?;
            if record.passed == Some(true) {
                return Err(LifecycleError::conflict("You already passed the test"));
            }
        }

        if prior.len() >= 3 {
            let now = self.inner.clock.now();
            let mut all_recent = true;
            for id in &prior[prior.len() - 3..] {
                let record = self.inner.storage.tests.get_test(*id).await?;
                if now - record.started_at > Duration::hours(24) {
                    all_recent = false;
                    break;
                }
            }
            if all_recent {
                return Err(LifecycleError::conflict(
                    "Your last 3 tests were all taken within the last 24 hours",
                ));
            }
        }
        Ok(())
    }

    /// Grade an answer to the current question, then move on.
    ///
    /// The cursor advances whether or not the answer was right; a miss also
    /// bumps the persisted wrong count.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Conflict` if the caller is not testing,
    /// `LifecycleError::Invariant` if no question is posed.
    pub async fn submit_answer(
        &self,
        testificate: ParticipantId,
        provided: &str,
    ) -> Result<(), LifecycleError> {
        let (correct, expected, test_id, wrong) = {
            let mut state = self.state();
            let session = state
                .test_mut(testificate)
                .ok_or_else(|| LifecycleError::conflict("You are not taking a test"))?;
            let expected = session
                .current_answer()
                .ok_or_else(|| {
                    LifecycleError::Invariant(format!("no question posed for {testificate}"))
                })?
                .to_owned();
            let test_id = session.test_id().ok_or_else(|| {
                LifecycleError::Invariant(format!("test for {testificate} has no bound id"))
            })?;
            let correct = answers_match(&expected, provided);
            session.record_answer(correct);
            (correct, expected, test_id, session.wrong())
        };

        if correct {
            self.inner
                .notifier
                .notify(testificate, Notice::AnswerCorrect)
                .await;
        } else {
            self.inner
                .notifier
                .notify(testificate, Notice::AnswerIncorrect { expected })
                .await;
            self.inner
                .storage
                .tests
                .set_wrong_count(test_id, wrong)
                .await?;
        }

        self.advance(testificate).await
    }

    /// Pose the next question, or close the quiz once all 25 are answered.
    async fn advance(&self, testificate: ParticipantId) -> Result<(), LifecycleError> {
        enum Step {
            Question { number: usize, prompt: String },
            Completed { test_id: TestId, passed: bool, wrong: u32 },
        }

        let step = {
            let mut state = self.state();
            let session = state.test_mut(testificate).ok_or_else(|| {
                LifecycleError::Invariant(format!("no test session for {testificate} to advance"))
            })?;
            if session.is_complete() {
                let test_id = session.test_id().ok_or_else(|| {
                    LifecycleError::Invariant(format!("test for {testificate} has no bound id"))
                })?;
                let (passed, wrong) = (session.passed(), session.wrong());
                state.release_test(testificate);
                Step::Completed {
                    test_id,
                    passed,
                    wrong,
                }
            } else {
                let number = session.index() + 1;
                let question = session.pose_next(&mut rand::rng()).ok_or_else(|| {
                    LifecycleError::Invariant(format!("plan exhausted early for {testificate}"))
                })?;
                Step::Question {
                    number,
                    prompt: question.prompt().to_owned(),
                }
            }
        };

        match step {
            Step::Question { number, prompt } => {
                self.inner
                    .notifier
                    .notify(testificate, Notice::Question { number, prompt })
                    .await;
                Ok(())
            }
            Step::Completed {
                test_id,
                passed,
                wrong,
            } => {
                self.inner
                    .storage
                    .tests
                    .close_test(test_id, passed, wrong, self.inner.clock.now())
                    .await?;
                self.inner.scheduler.cancel(testificate, SessionKind::Test);

                let notice = if passed {
                    Notice::TestPassed { wrong }
                } else {
                    Notice::TestFailed { wrong }
                };
                self.inner.notifier.notify(testificate, notice).await;

                if passed {
                    let record = self.inner.storage.tests.get_test(test_id).await?;
                    let attempt = self.inner.storage.tests.count_tests(testificate).await?;
                    self.inner.reports.test_report(&record, attempt).await;
                }
                info!(%testificate, %test_id, passed, wrong, "test completed");
                Ok(())
            }
        }
    }

    /// Abort the caller's quiz. Recorded as a failure with all 25 wrong; no
    /// report is sent.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Conflict` if the caller is not testing.
    pub async fn force_stop_test(&self, testificate: ParticipantId) -> Result<(), LifecycleError> {
        let session = self
            .state()
            .release_test(testificate)
            .ok_or_else(|| LifecycleError::conflict("You are not taking a test"))?;
        let test_id = session
            .test_id()
            .ok_or_else(|| self.invariant(format!("test for {testificate} has no bound id")))?;

        self.inner
            .storage
            .tests
            .close_test(test_id, false, FORCED_WRONG, self.inner.clock.now())
            .await?;
        self.inner.scheduler.cancel(testificate, SessionKind::Test);
        info!(%testificate, %test_id, "test force-stopped");
        Ok(())
    }

    // ─── Presence hooks ────────────────────────────────────────────────────────

    /// A participant connected: refresh the username cache, drop any pending
    /// abandonment timers, and restore the under-evaluation group if they
    /// rejoined their own trial.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::Storage` if the username cache update fails.
    pub async fn on_connect(
        &self,
        participant: ParticipantId,
        username: &str,
    ) -> Result<(), LifecycleError> {
        self.inner
            .storage
            .usernames
            .cache_username(participant, username)
            .await?;
        self.inner.scheduler.cancel(participant, SessionKind::Trial);
        self.inner.scheduler.cancel(participant, SessionKind::Test);

        let trial = self.state().trial_involving(participant);
        if let Some(trial) = trial {
            if trial.testificate() == participant {
                self.inner
                    .groups
                    .set_group(participant, &self.inner.config.testificate_group)
                    .await;
            }
            debug!(%participant, "party rejoined an active trial");
        }
        Ok(())
    }

    /// A participant disconnected: warn the other trial party, demote a
    /// departing testificate, and arm forgiveness timers for every session
    /// they own.
    pub async fn on_disconnect(&self, participant: ParticipantId) {
        let trial = self.state().trial_involving(participant);
        if let Some(trial) = trial {
            self.handle_trial_disconnect(participant, &trial).await;
        }

        let test = self.state().lookup_test(participant);
        if let Some(test) = test {
            let expected_id = test.test_id();
            let controller = self.clone();
            self.inner
                .scheduler
                .schedule(participant, SessionKind::Test, async move {
                    controller.expire_test(participant, expected_id).await;
                });
        }
    }

    async fn handle_trial_disconnect(&self, participant: ParticipantId, trial: &TrialSession) {
        let other = if trial.trialer() == participant {
            trial.testificate()
        } else {
            trial.trialer()
        };
        self.inner
            .notifier
            .notify(
                other,
                Notice::PeerDisconnected {
                    forgiveness_secs: self.inner.config.abandon_forgiveness_secs,
                },
            )
            .await;

        if trial.testificate() == participant {
            self.inner
                .groups
                .set_group(participant, &self.inner.config.student_group)
                .await;
        }

        let expected_id = trial.trial_id();
        let controller = self.clone();
        self.inner
            .scheduler
            .schedule(participant, SessionKind::Trial, async move {
                controller.expire_trial(participant, expected_id).await;
            });
    }

    /// Forgiveness deadline for a trial party. The scheduler already
    /// re-checked presence; re-verify the session identity so a timer from a
    /// finished trial cannot kill its successor.
    async fn expire_trial(&self, participant: ParticipantId, expected_id: Option<TrialId>) {
        let current = self.state().trial_involving(participant);
        let Some(trial) = current else {
            debug!(%participant, "stale trial timer: no active session");
            return;
        };
        if trial.trial_id() != expected_id {
            debug!(%participant, "stale trial timer: session replaced");
            return;
        }

        let trialer = trial.trialer();
        let other = if trialer == participant {
            trial.testificate()
        } else {
            trialer
        };
        if let Err(e) = self.end_trial(trialer, false, Some(ABANDONED_NOTE)).await {
            warn!(%trialer, error = %e, "failed to close abandoned trial");
            return;
        }
        self.inner.notifier.notify(other, Notice::TrialAbandoned).await;
    }

    /// Forgiveness deadline for a quiz taker.
    async fn expire_test(&self, participant: ParticipantId, expected_id: Option<TestId>) {
        let matches = self
            .state()
            .lookup_test(participant)
            .map(|session| session.test_id() == expected_id)
            .unwrap_or(false);
        if !matches {
            debug!(%participant, "stale test timer");
            return;
        }
        if let Err(e) = self.force_stop_test(participant).await {
            warn!(%participant, error = %e, "failed to close abandoned test");
        }
    }

    /// Host is going down: fail every open session so nothing dangles.
    pub async fn shutdown(&self) {
        self.inner.scheduler.shutdown();

        let trialers = self.state().active_trialers();
        for trialer in trialers {
            if let Err(e) = self.end_trial(trialer, false, Some(SHUTDOWN_NOTE)).await {
                warn!(%trialer, error = %e, "failed to close trial during shutdown");
            }
        }

        let testificates = self.state().active_testificates();
        for testificate in testificates {
            if let Err(e) = self.force_stop_test(testificate).await {
                warn!(%testificate, error = %e, "failed to close test during shutdown");
            }
        }
    }

    /// Read-only view of a participant's active trial, in either role.
    #[must_use]
    pub fn active_trial(&self, participant: ParticipantId) -> Option<TrialSession> {
        self.state().trial_involving(participant)
    }

    /// Read-only view of a testificate's active quiz.
    #[must_use]
    pub fn active_test(&self, testificate: ParticipantId) -> Option<TestSession> {
        self.state().lookup_test(testificate)
    }
}
