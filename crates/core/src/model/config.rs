use chrono::Duration;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProctorConfigError {
    #[error("webhook is not a valid URL")]
    InvalidWebhook,
    #[error("abandon forgiveness must be positive")]
    InvalidForgiveness,
}

/// Runtime configuration: permission-group names, the report webhook, and
/// the forgiveness window granted after a disconnect.
///
/// The host decides where this comes from (file, env); the struct only
/// defines the shape and defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProctorConfig {
    /// Group a testificate is reverted to on failure or departure.
    pub student_group: String,
    /// Group applied while a participant is under evaluation.
    pub testificate_group: String,
    /// Group granted when a trial is passed.
    pub builder_group: String,
    /// Report delivery endpoint.
    pub webhook: String,
    /// Seconds a disconnected participant has to return before their
    /// session is force-terminated.
    pub abandon_forgiveness_secs: u64,
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            student_group: "student".to_string(),
            testificate_group: "testificate".to_string(),
            builder_group: "builder".to_string(),
            webhook: "webhook".to_string(),
            abandon_forgiveness_secs: 300,
        }
    }
}

impl ProctorConfig {
    /// The forgiveness window as a duration.
    #[must_use]
    pub fn abandon_forgiveness(&self) -> Duration {
        Duration::seconds(i64::try_from(self.abandon_forgiveness_secs).unwrap_or(i64::MAX))
    }

    /// Validate fields that have structural requirements.
    ///
    /// The default `webhook` placeholder is accepted so a freshly generated
    /// config loads before an operator fills it in.
    ///
    /// # Errors
    ///
    /// Returns `ProctorConfigError` for a malformed webhook URL or a zero
    /// forgiveness window.
    pub fn validate(&self) -> Result<(), ProctorConfigError> {
        if self.abandon_forgiveness_secs == 0 {
            return Err(ProctorConfigError::InvalidForgiveness);
        }
        if self.webhook != ProctorConfig::default().webhook && Url::parse(&self.webhook).is_err() {
            return Err(ProctorConfigError::InvalidWebhook);
        }
        Ok(())
    }
}

/// Validates an application reference supplied when starting a trial.
#[must_use]
pub fn is_valid_app_reference(app: &str) -> bool {
    Url::parse(app)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}
