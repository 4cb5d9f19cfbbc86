#![forbid(unsafe_code)]

pub mod answer;
pub mod error;
pub mod model;
pub mod nibble;
pub mod time;

pub use answer::answers_match;
pub use error::Error;
pub use time::Clock;

pub use model::{
    Category, ParticipantId, ProctorConfig, ProctorConfigError, TestId, TrialId, TrialSession,
    TrialSessionError,
};
