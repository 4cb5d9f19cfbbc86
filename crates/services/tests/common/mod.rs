//! Shared fixtures: recording collaborators and a wired controller.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use proctor_core::model::{ParticipantId, ProctorConfig};
use proctor_core::time::fixed_clock;
use services::collaborators::{GroupAssigner, Notice, Notifier, Presence, ReportSink};
use services::sessions::LifecycleController;
use storage::repository::{InMemoryStorage, Storage, TestRecord, TrialRecord};

#[derive(Default)]
pub struct FakePresence {
    online: Mutex<HashSet<ParticipantId>>,
}

impl FakePresence {
    pub fn set_online(&self, participant: ParticipantId, online: bool) {
        let mut set = self.online.lock().unwrap();
        if online {
            set.insert(participant);
        } else {
            set.remove(&participant);
        }
    }
}

impl Presence for FakePresence {
    fn is_online(&self, participant: ParticipantId) -> bool {
        self.online.lock().unwrap().contains(&participant)
    }
}

#[derive(Default)]
pub struct RecordingGroups {
    current: Mutex<HashMap<ParticipantId, String>>,
    pub history: Mutex<Vec<(ParticipantId, String)>>,
}

impl RecordingGroups {
    pub fn seed(&self, participant: ParticipantId, group: &str) {
        self.current
            .lock()
            .unwrap()
            .insert(participant, group.to_string());
    }

    pub fn current_group(&self, participant: ParticipantId) -> Option<String> {
        self.current.lock().unwrap().get(&participant).cloned()
    }
}

#[async_trait]
impl GroupAssigner for RecordingGroups {
    async fn primary_group(&self, participant: ParticipantId) -> Option<String> {
        self.current_group(participant)
    }

    async fn set_group(&self, participant: ParticipantId, group: &str) {
        self.current
            .lock()
            .unwrap()
            .insert(participant, group.to_string());
        self.history
            .lock()
            .unwrap()
            .push((participant, group.to_string()));
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<(ParticipantId, Notice)>>,
}

impl RecordingNotifier {
    pub fn notices_for(&self, participant: ParticipantId) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| *p == participant)
            .map(|(_, n)| n.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, participant: ParticipantId, notice: Notice) {
        self.notices.lock().unwrap().push((participant, notice));
    }
}

#[derive(Default)]
pub struct RecordingReports {
    pub trials: Mutex<Vec<(TrialRecord, u32)>>,
    pub tests: Mutex<Vec<(TestRecord, u32)>>,
}

impl RecordingReports {
    pub fn trial_count(&self) -> usize {
        self.trials.lock().unwrap().len()
    }

    pub fn test_count(&self) -> usize {
        self.tests.lock().unwrap().len()
    }
}

#[async_trait]
impl ReportSink for RecordingReports {
    async fn trial_report(&self, record: &TrialRecord, attempt: u32) {
        self.trials.lock().unwrap().push((record.clone(), attempt));
    }

    async fn test_report(&self, record: &TestRecord, attempt: u32) {
        self.tests.lock().unwrap().push((record.clone(), attempt));
    }
}

pub struct Harness {
    pub controller: LifecycleController,
    pub repo: InMemoryStorage,
    pub presence: Arc<FakePresence>,
    pub groups: Arc<RecordingGroups>,
    pub notifier: Arc<RecordingNotifier>,
    pub reports: Arc<RecordingReports>,
    pub config: ProctorConfig,
}

impl Harness {
    pub async fn stored_trial(&self, id: proctor_core::model::TrialId) -> TrialRecord {
        use storage::repository::TrialRepository;
        self.repo.get_trial(id).await.unwrap()
    }

    pub async fn stored_test(&self, id: proctor_core::model::TestId) -> TestRecord {
        use storage::repository::TestRepository;
        self.repo.get_test(id).await.unwrap()
    }
}

pub fn harness() -> Harness {
    let config = ProctorConfig::default();
    let repo = InMemoryStorage::new();
    let storage = Storage {
        trials: Arc::new(repo.clone()),
        tests: Arc::new(repo.clone()),
        usernames: Arc::new(repo.clone()),
    };
    let presence = Arc::new(FakePresence::default());
    let groups = Arc::new(RecordingGroups::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let reports = Arc::new(RecordingReports::default());

    let controller = LifecycleController::new(
        config.clone(),
        fixed_clock(),
        storage,
        Arc::clone(&groups) as _,
        Arc::clone(&reports) as _,
        Arc::clone(&presence) as _,
        Arc::clone(&notifier) as _,
    );

    Harness {
        controller,
        repo,
        presence,
        groups,
        notifier,
        reports,
        config,
    }
}

/// A student testificate who is online and ready to be trialed or tested.
pub fn online_student(harness: &Harness) -> ParticipantId {
    let participant = ParticipantId::random();
    harness.presence.set_online(participant, true);
    harness.groups.seed(participant, &harness.config.student_group);
    participant
}

/// Submit the numeric-equivalent form of the currently expected answer:
/// binary patterns are converted to their decimal reading, exercising the
/// cross-base grading path end to end.
pub async fn submit_equivalent_answer(harness: &Harness, testificate: ParticipantId) {
    let expected = harness
        .controller
        .active_test(testificate)
        .expect("active session")
        .current_answer()
        .expect("posed question")
        .to_string();
    let provided = if expected.bytes().all(|b| b == b'0' || b == b'1') {
        let decimal = i64::from_str_radix(&expected, 2).unwrap().to_string();
        // A decimal reading of "10"/"11" would itself re-parse as binary and
        // grade wrong; keep the original pattern for those.
        if decimal.bytes().all(|b| b == b'0' || b == b'1') {
            expected.clone()
        } else {
            decimal
        }
    } else {
        expected.clone()
    };
    harness
        .controller
        .submit_answer(testificate, &provided)
        .await
        .unwrap();
}

/// Submit something that can never grade correct.
pub async fn submit_wrong_answer(harness: &Harness, testificate: ParticipantId) {
    harness
        .controller
        .submit_answer(testificate, "definitely not it")
        .await
        .unwrap();
}
