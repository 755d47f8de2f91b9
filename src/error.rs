use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenefitError {
    #[error("Validation error: {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Unknown procedure code: {0}")]
    UnknownProcedureCode(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Session expired for {0}")]
    SessionExpired(String),

    #[error("Verification failed: {0}")]
    Verification(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Fee schedule error: {0}")]
    FeeSchedule(#[from] toml::de::Error),
}

impl BenefitError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BenefitError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BenefitError>;
