use async_trait::async_trait;
use chrono::{DateTime, Utc};
use proctor_core::model::{ParticipantId, TestId, TrialId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape of one trial, including its accumulated notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialRecord {
    pub id: TrialId,
    pub trialer: ParticipantId,
    pub testificate: ParticipantId,
    pub app: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub passed: Option<bool>,
    pub notes: Vec<String>,
}

/// Persisted shape of one test attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRecord {
    pub id: TestId,
    pub testificate: ParticipantId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub passed: Option<bool>,
    pub wrong: Option<u32>,
}

/// Repository contract for trials and their notes.
///
/// All mutations are durable on return; callers do not retry.
#[async_trait]
pub trait TrialRepository: Send + Sync {
    /// Insert a new open trial and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn create_trial(
        &self,
        trialer: ParticipantId,
        testificate: ParticipantId,
        app: &str,
        started_at: DateTime<Utc>,
    ) -> Result<TrialId, StorageError>;

    /// Close a trial with its outcome.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the trial does not exist.
    async fn close_trial(
        &self,
        id: TrialId,
        passed: bool,
        ended_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Append a note to an open or closed trial.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the trial does not exist.
    async fn add_note(&self, id: TrialId, note: &str) -> Result<(), StorageError>;

    /// Fetch a trial with its notes.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_trial(&self, id: TrialId) -> Result<TrialRecord, StorageError>;

    /// Ids of all trials a testificate has been evaluated in, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn list_trials(&self, testificate: ParticipantId) -> Result<Vec<TrialId>, StorageError>;

    /// Number of trials a testificate has been evaluated in.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn count_trials(&self, testificate: ParticipantId) -> Result<u32, StorageError>;
}

/// Repository contract for test attempts.
#[async_trait]
pub trait TestRepository: Send + Sync {
    /// Insert a new open test attempt and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn create_test(
        &self,
        testificate: ParticipantId,
        started_at: DateTime<Utc>,
    ) -> Result<TestId, StorageError>;

    /// Close a test with its outcome and final wrong-answer count.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the test does not exist.
    async fn close_test(
        &self,
        id: TestId,
        passed: bool,
        wrong: u32,
        ended_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Update the running wrong-answer count of an open test.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the test does not exist.
    async fn set_wrong_count(&self, id: TestId, wrong: u32) -> Result<(), StorageError>;

    /// Fetch a test record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_test(&self, id: TestId) -> Result<TestRecord, StorageError>;

    /// Ids of all tests a testificate has attempted, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn list_tests(&self, testificate: ParticipantId) -> Result<Vec<TestId>, StorageError>;

    /// Number of tests a testificate has attempted.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn count_tests(&self, testificate: ParticipantId) -> Result<u32, StorageError>;
}

/// Username cache, fed by connection events and read by report assembly.
#[async_trait]
pub trait UsernameRepository: Send + Sync {
    /// Record or refresh the username observed for a participant.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cache cannot be updated.
    async fn cache_username(
        &self,
        participant: ParticipantId,
        username: &str,
    ) -> Result<(), StorageError>;

    /// Resolve a username to a participant, if cached.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn participant_for(&self, username: &str)
    -> Result<Option<ParticipantId>, StorageError>;

    /// Resolve a participant to their last seen username, if cached.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn username_for(
        &self,
        participant: ParticipantId,
    ) -> Result<Option<String>, StorageError>;
}

// ─── In-memory implementation ──────────────────────────────────────────────────

#[derive(Default)]
struct InMemoryState {
    next_trial_id: i64,
    next_test_id: i64,
    trials: HashMap<TrialId, TrialRecord>,
    tests: HashMap<TestId, TestRecord>,
    usernames: HashMap<ParticipantId, String>,
}

/// Simple in-memory storage implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn locked<T>(
        &self,
        f: impl FnOnce(&mut InMemoryState) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        f(&mut guard)
    }
}

#[async_trait]
impl TrialRepository for InMemoryStorage {
    async fn create_trial(
        &self,
        trialer: ParticipantId,
        testificate: ParticipantId,
        app: &str,
        started_at: DateTime<Utc>,
    ) -> Result<TrialId, StorageError> {
        self.locked(|state| {
            state.next_trial_id += 1;
            let id = TrialId::new(state.next_trial_id);
            state.trials.insert(
                id,
                TrialRecord {
                    id,
                    trialer,
                    testificate,
                    app: app.to_owned(),
                    started_at,
                    ended_at: None,
                    passed: None,
                    notes: Vec::new(),
                },
            );
            Ok(id)
        })
    }

    async fn close_trial(
        &self,
        id: TrialId,
        passed: bool,
        ended_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.locked(|state| {
            let record = state.trials.get_mut(&id).ok_or(StorageError::NotFound)?;
            record.ended_at = Some(ended_at);
            record.passed = Some(passed);
            Ok(())
        })
    }

    async fn add_note(&self, id: TrialId, note: &str) -> Result<(), StorageError> {
        self.locked(|state| {
            let record = state.trials.get_mut(&id).ok_or(StorageError::NotFound)?;
            record.notes.push(note.to_owned());
            Ok(())
        })
    }

    async fn get_trial(&self, id: TrialId) -> Result<TrialRecord, StorageError> {
        self.locked(|state| state.trials.get(&id).cloned().ok_or(StorageError::NotFound))
    }

    async fn list_trials(&self, testificate: ParticipantId) -> Result<Vec<TrialId>, StorageError> {
        self.locked(|state| {
            let mut ids: Vec<TrialId> = state
                .trials
                .values()
                .filter(|t| t.testificate == testificate)
                .map(|t| t.id)
                .collect();
            ids.sort();
            Ok(ids)
        })
    }

    async fn count_trials(&self, testificate: ParticipantId) -> Result<u32, StorageError> {
        let ids = self.list_trials(testificate).await?;
        u32::try_from(ids.len()).map_err(|_| StorageError::Serialization("count overflow".into()))
    }
}

#[async_trait]
impl TestRepository for InMemoryStorage {
    async fn create_test(
        &self,
        testificate: ParticipantId,
        started_at: DateTime<Utc>,
    ) -> Result<TestId, StorageError> {
        self.locked(|state| {
            state.next_test_id += 1;
            let id = TestId::new(state.next_test_id);
            state.tests.insert(
                id,
                TestRecord {
                    id,
                    testificate,
                    started_at,
                    ended_at: None,
                    passed: None,
                    wrong: None,
                },
            );
            Ok(id)
        })
    }

    async fn close_test(
        &self,
        id: TestId,
        passed: bool,
        wrong: u32,
        ended_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.locked(|state| {
            let record = state.tests.get_mut(&id).ok_or(StorageError::NotFound)?;
            record.ended_at = Some(ended_at);
            record.passed = Some(passed);
            record.wrong = Some(wrong);
            Ok(())
        })
    }

    async fn set_wrong_count(&self, id: TestId, wrong: u32) -> Result<(), StorageError> {
        self.locked(|state| {
            let record = state.tests.get_mut(&id).ok_or(StorageError::NotFound)?;
            record.wrong = Some(wrong);
            Ok(())
        })
    }

    async fn get_test(&self, id: TestId) -> Result<TestRecord, StorageError> {
        self.locked(|state| state.tests.get(&id).cloned().ok_or(StorageError::NotFound))
    }

    async fn list_tests(&self, testificate: ParticipantId) -> Result<Vec<TestId>, StorageError> {
        self.locked(|state| {
            let mut ids: Vec<TestId> = state
                .tests
                .values()
                .filter(|t| t.testificate == testificate)
                .map(|t| t.id)
                .collect();
            ids.sort();
            Ok(ids)
        })
    }

    async fn count_tests(&self, testificate: ParticipantId) -> Result<u32, StorageError> {
        let ids = self.list_tests(testificate).await?;
        u32::try_from(ids.len()).map_err(|_| StorageError::Serialization("count overflow".into()))
    }
}

#[async_trait]
impl UsernameRepository for InMemoryStorage {
    async fn cache_username(
        &self,
        participant: ParticipantId,
        username: &str,
    ) -> Result<(), StorageError> {
        self.locked(|state| {
            state.usernames.insert(participant, username.to_owned());
            Ok(())
        })
    }

    async fn participant_for(
        &self,
        username: &str,
    ) -> Result<Option<ParticipantId>, StorageError> {
        self.locked(|state| {
            Ok(state
                .usernames
                .iter()
                .find(|(_, name)| name.as_str() == username)
                .map(|(participant, _)| *participant))
        })
    }

    async fn username_for(
        &self,
        participant: ParticipantId,
    ) -> Result<Option<String>, StorageError> {
        self.locked(|state| Ok(state.usernames.get(&participant).cloned()))
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub trials: Arc<dyn TrialRepository>,
    pub tests: Arc<dyn TestRepository>,
    pub usernames: Arc<dyn UsernameRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryStorage::new();
        let trials: Arc<dyn TrialRepository> = Arc::new(repo.clone());
        let tests: Arc<dyn TestRepository> = Arc::new(repo.clone());
        let usernames: Arc<dyn UsernameRepository> = Arc::new(repo);
        Self {
            trials,
            tests,
            usernames,
        }
    }
}
