#![forbid(unsafe_code)]

pub mod collaborators;
pub mod error;
pub mod quiz;
pub mod report;
pub mod sessions;

pub use proctor_core::Clock;
pub use sessions as session;

pub use collaborators::{GroupAssigner, Notice, Notifier, Presence, ReportSink};
pub use error::LifecycleError;
pub use report::WebhookReporter;

pub use quiz::{PLAN_LEN, Question, QuizPlan, UsedKeys, next_question};
pub use sessions::{
    AbandonmentScheduler, LifecycleController, SessionKind, SessionRegistry, TestSession,
};
