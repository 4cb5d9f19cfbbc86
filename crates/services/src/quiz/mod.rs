mod generator;
mod plan;

// Public API of the quiz subsystem.
pub use generator::{MAX_DRAW_ATTEMPTS, Question, UsedKeys, next_question};
pub use plan::{PLAN_LEN, QuizPlan};
