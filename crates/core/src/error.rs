use thiserror::Error;
use uuid::Uuid;

pub type ClinicResult<T> = Result<T, ClinicError>;

/// Infrastructure-level faults. Expected business outcomes (inactive code,
/// already-attributed patient, ...) are NOT errors — they travel as result
/// values in `clinic-intake`.
#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Patient {0} not found")]
    PatientNotFound(Uuid),

    #[error("Affiliate {0} not found")]
    AffiliateNotFound(Uuid),

    #[error("Touch {0} not found")]
    TouchNotFound(Uuid),

    #[error("Timed out after {timeout_secs}s waiting for the row lock on patient {patient_id}")]
    LockTimeout { patient_id: Uuid, timeout_secs: u64 },

    #[error("Touch {0} is already converted")]
    AlreadyConverted(Uuid),

    #[error("Invalid commission transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
