use rand::Rng;
use std::fmt;

use proctor_core::model::{Category, ParticipantId, TestId};

use crate::quiz::{Question, QuizPlan, UsedKeys, next_question};

/// In-memory state of one quiz attempt.
///
/// `index` is the cursor into the plan and only ever moves forward;
/// `wrong` only ever grows. Both are owned exclusively by the registry and
/// mutated through the controller, so plain fields suffice.
#[derive(Clone)]
pub struct TestSession {
    testificate: ParticipantId,
    test_id: Option<TestId>,
    plan: QuizPlan,
    index: usize,
    wrong: u32,
    current_answer: Option<String>,
    used_keys: UsedKeys,
}

impl TestSession {
    /// Creates a reserved (not yet persisted) session at question 0.
    #[must_use]
    pub fn reserve(testificate: ParticipantId, plan: QuizPlan) -> Self {
        Self {
            testificate,
            test_id: None,
            plan,
            index: 0,
            wrong: 0,
            current_answer: None,
            used_keys: UsedKeys::new(),
        }
    }

    #[must_use]
    pub fn testificate(&self) -> ParticipantId {
        self.testificate
    }

    /// The persisted record id, once bound.
    #[must_use]
    pub fn test_id(&self) -> Option<TestId> {
        self.test_id
    }

    /// Attach the id assigned by the persistence layer.
    pub fn bind_test_id(&mut self, id: TestId) {
        self.test_id = Some(id);
    }

    /// 0-based cursor into the plan; 25 means the quiz is over.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn wrong(&self) -> u32 {
        self.wrong
    }

    /// Canonical answer of the currently posed question.
    #[must_use]
    pub fn current_answer(&self) -> Option<&str> {
        self.current_answer.as_deref()
    }

    /// Category of the question about to be posed.
    #[must_use]
    pub fn current_category(&self) -> Option<Category> {
        self.plan.category_at(self.index)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.index >= self.plan.len()
    }

    /// Final verdict: at most two wrong answers pass.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.wrong <= 2
    }

    /// Generate and store the next question, or `None` once the plan is
    /// exhausted. The question's canonical answer becomes the grading target
    /// for the next `record_answer`.
    pub fn pose_next(&mut self, rng: &mut impl Rng) -> Option<Question> {
        let category = self.current_category()?;
        let question = next_question(category, &mut self.used_keys, rng);
        self.current_answer = Some(question.answer().to_owned());
        Some(question)
    }

    /// Record a graded answer: the cursor always advances, the wrong count
    /// only on a miss.
    pub fn record_answer(&mut self, correct: bool) {
        if !correct {
            self.wrong += 1;
        }
        self.index += 1;
        self.current_answer = None;
    }

    #[cfg(test)]
    pub(crate) fn used_keys(&self) -> &UsedKeys {
        &self.used_keys
    }
}

impl fmt::Debug for TestSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSession")
            .field("testificate", &self.testificate)
            .field("test_id", &self.test_id)
            .field("index", &self.index)
            .field("wrong", &self.wrong)
            .field("has_current_answer", &self.current_answer.is_some())
            .finish_non_exhaustive()
    }
}
