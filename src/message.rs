use tokio::sync::mpsc::Sender;

use crate::benefits::BenefitSnapshot;
use crate::schema::{PatientInfo, VerificationResult};

/// Wraps a patient request with a response channel for the verification result
///
/// Used by intake to match a verification response to the request it answers
#[derive(Debug)]
pub struct VerificationEnvelope {
    pub request_id: String,
    pub patient: PatientInfo,
    pub response_tx: Sender<VerificationOutcome>,
}

/// Message sent from Intake to the Verifier
#[derive(Debug)]
pub enum VerificationMessage {
    Verify(VerificationEnvelope),
}

/// Message sent from the Verifier back to whoever submitted the request
#[derive(Debug, Clone)]
pub enum VerificationOutcome {
    Verified {
        request_id: String,
        result: Box<VerificationResult>,
    },
    Failed {
        request_id: String,
        reason: String,
    },
}

impl VerificationOutcome {
    pub fn request_id(&self) -> &str {
        match self {
            VerificationOutcome::Verified { request_id, .. } => request_id,
            VerificationOutcome::Failed { request_id, .. } => request_id,
        }
    }
}

/// Changes the calculator reacts to
#[derive(Debug, Clone)]
pub enum CalculatorEvent {
    Toggle(String),
    ReplaceSnapshot(BenefitSnapshot),
    Clear,
}
