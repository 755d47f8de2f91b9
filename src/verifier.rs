use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::mpsc::Receiver;
use tokio::time::sleep;

use crate::logging::log_patient_event;
use crate::message::{VerificationEnvelope, VerificationMessage, VerificationOutcome};
use crate::schema::{PatientInfo, VerificationResult, sample_verification};

/// Simulated eligibility service standing in for a payer's verification API.
///
/// Every valid request gets the same canned benefits response after a random
/// delay; invalid requests are answered with `Failed`.
pub struct Verifier {
    min_delay_ms: u64,
    max_delay_ms: u64,
    rx: Receiver<VerificationMessage>,
    verbose: bool,
}

impl Verifier {
    pub fn new(min_delay_ms: u64, max_delay_ms: u64, rx: Receiver<VerificationMessage>, verbose: bool) -> Self {
        Self {
            min_delay_ms,
            max_delay_ms,
            rx,
            verbose,
        }
    }

    pub async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            let VerificationMessage::Verify(envelope) = msg;
            let delay = self.random_delay();
            let verbose = self.verbose;
            tokio::spawn(async move {
                sleep(delay).await;
                respond(envelope, verbose).await;
            });
        }
    }

    fn random_delay(&self) -> Duration {
        let mut rng = rand::rng();
        let ms = rng.random_range(self.min_delay_ms..=self.max_delay_ms.max(self.min_delay_ms));
        Duration::from_millis(ms)
    }
}

async fn respond(envelope: VerificationEnvelope, verbose: bool) {
    let VerificationEnvelope {
        request_id,
        patient,
        response_tx,
    } = envelope;

    let outcome = match verify(&patient) {
        Ok(result) => {
            if verbose {
                log_patient_event("verifier", &request_id, "verified", &format!("Plan {} is {}", result.plan_details.plan_name, result.status));
            }
            VerificationOutcome::Verified {
                request_id,
                result: Box::new(result),
            }
        }
        Err(reason) => {
            tracing::warn!(request_id = %request_id, "Verification rejected: {}", reason);
            VerificationOutcome::Failed { request_id, reason }
        }
    };

    if response_tx.send(outcome).await.is_err() {
        tracing::warn!("Verification requester dropped before the response arrived");
    }
}

/// Verify a single patient without going through the channel plumbing.
pub fn verify(patient: &PatientInfo) -> Result<VerificationResult, String> {
    patient.validate().map_err(|e| e.to_string())?;
    let mut result = sample_verification();
    if let Some(group) = patient.group_number.as_deref().filter(|g| !g.trim().is_empty()) {
        result.plan_details.group = group.to_string();
    }
    if let Some(history) = result.history.as_mut() {
        history.last_verification = Utc::now();
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::sample_patient;
    use tokio::time::timeout;

    fn envelope(request_id: &str, patient: PatientInfo) -> (VerificationEnvelope, Receiver<VerificationOutcome>) {
        let (response_tx, response_rx) = tokio::sync::mpsc::channel(1);
        let envelope = VerificationEnvelope {
            request_id: request_id.to_string(),
            patient,
            response_tx,
        };
        (envelope, response_rx)
    }

    #[tokio::test]
    async fn test_run_verifier() {
        let (verify_tx, verify_rx) = tokio::sync::mpsc::channel(1);
        let verifier = Verifier::new(10, 50, verify_rx, true);
        tokio::spawn(async move {
            verifier.run().await;
        });

        let (envelope, mut response_rx) = envelope("req-1", sample_patient());
        verify_tx.send(VerificationMessage::Verify(envelope)).await.unwrap();

        match timeout(Duration::from_secs(5), response_rx.recv()).await {
            Ok(Some(VerificationOutcome::Verified { request_id, result })) => {
                assert_eq!(request_id, "req-1");
                assert_eq!(result.status, "ACTIVE");
                assert_eq!(result.benefits.deductible.remaining, rust_decimal::Decimal::from(50));
            }
            Ok(other) => panic!("Expected verified outcome, got {:?}", other),
            Err(_) => panic!("Timeout waiting for verification response"),
        }
    }

    #[tokio::test]
    async fn test_verifier_rejects_incomplete_patient() {
        let (verify_tx, verify_rx) = tokio::sync::mpsc::channel(1);
        let verifier = Verifier::new(0, 0, verify_rx, false);
        tokio::spawn(async move {
            verifier.run().await;
        });

        let mut patient = sample_patient();
        patient.last_name = String::new();
        let (envelope, mut response_rx) = envelope("req-2", patient);
        verify_tx.send(VerificationMessage::Verify(envelope)).await.unwrap();

        match timeout(Duration::from_secs(5), response_rx.recv()).await {
            Ok(Some(VerificationOutcome::Failed { request_id, reason })) => {
                assert_eq!(request_id, "req-2");
                assert!(reason.contains("lastName"));
            }
            _ => panic!("Expected failed outcome"),
        }
    }

    #[tokio::test]
    async fn test_verifier_multiple_requests() {
        let (verify_tx, verify_rx) = tokio::sync::mpsc::channel(10);
        let verifier = Verifier::new(5, 5, verify_rx, false);
        tokio::spawn(async move {
            verifier.run().await;
        });

        let (first, mut first_rx) = envelope("a", sample_patient());
        let (second, mut second_rx) = envelope("b", sample_patient());
        verify_tx.send(VerificationMessage::Verify(first)).await.unwrap();
        verify_tx.send(VerificationMessage::Verify(second)).await.unwrap();

        let a = timeout(Duration::from_secs(5), first_rx.recv()).await.unwrap().unwrap();
        let b = timeout(Duration::from_secs(5), second_rx.recv()).await.unwrap().unwrap();
        assert_eq!(a.request_id(), "a");
        assert_eq!(b.request_id(), "b");
    }

    #[test]
    fn test_verify_uses_patient_group_number() {
        let mut patient = sample_patient();
        patient.group_number = Some("777-002".to_string());
        let result = verify(&patient).unwrap();
        assert_eq!(result.plan_details.group, "777-002");
    }
}
