use thiserror::Error;

use crate::model::{ProctorConfigError, TrialSessionError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ProctorConfigError),
    #[error(transparent)]
    TrialSession(#[from] TrialSessionError),
}
