mod category;
mod config;
mod ids;
mod trial;

pub use category::Category;
pub use config::{ProctorConfig, ProctorConfigError, is_valid_app_reference};
pub use ids::{ParseIdError, ParticipantId, TestId, TrialId};
pub use trial::{TrialSession, TrialSessionError};
