use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::allocation::{AllocationEngine, AllocationResult};
use crate::benefits::{BenefitSnapshot, CoverageRate};
use crate::config::Config;
use crate::error::{BenefitError, Result};
use crate::fee_schedule::FeeSchedule;
use crate::logging::log_patient_event;
use crate::message::{VerificationEnvelope, VerificationMessage, VerificationOutcome};
use crate::schema::{PatientInfo, VerificationResult};
use crate::selection::SelectionSet;

/// What happened to one patient request
#[derive(Debug, Clone)]
pub struct IntakeOutcome {
    pub request_id: String,
    pub patient: PatientInfo,
    pub status: IntakeStatus,
}

#[derive(Debug, Clone)]
pub enum IntakeStatus {
    Costed {
        verification: Box<VerificationResult>,
        allocation: AllocationResult,
    },
    Rejected(String),
}

/// Intake task that submits patient requests for verification and costs the
/// treatment plan against each verified benefit snapshot.
///
/// For each incoming patient:
/// - Creates a one-shot channel for the verification response.
/// - Sends the request to the verifier wrapped in a `VerificationEnvelope`.
/// - Spawns a listener that turns the response into an `IntakeOutcome`.
///
/// Returns once the patient channel closes and every listener has finished,
/// with outcomes in submission order.
pub async fn run_intake(
    config: Config,
    mut rx: Receiver<PatientInfo>,
    tx: Sender<VerificationMessage>,
    schedule: Arc<FeeSchedule>,
    plan: SelectionSet,
    notify: Option<Sender<String>>, //optional notification per finished request
) -> Result<Vec<IntakeOutcome>> {
    config.validate()?;
    let fallback = config.fallback()?;
    if config.strict_codes {
        if let Some(code) = schedule.first_unknown(&plan) {
            return Err(BenefitError::UnknownProcedureCode(code.to_string()));
        }
    }
    let verbose = config.verbose;
    if verbose {
        log_patient_event("intake", "-", "start", "Starting intake task");
    }

    let plan = Arc::new(plan);
    let mut listeners = Vec::new();
    let mut submitted = 0usize;

    while let Some(patient) = rx.recv().await {
        submitted += 1;
        let request_id = format!("{}-{}", patient.member_id, submitted);
        let (outcome_tx, outcome_rx) = tokio::sync::mpsc::channel(1);

        listeners.push(tokio::spawn(listen_for_outcome(
            outcome_rx,
            request_id.clone(),
            patient.clone(),
            schedule.clone(),
            plan.clone(),
            fallback,
            notify.clone(),
            verbose,
        )));

        if verbose {
            log_patient_event(
                "intake",
                &request_id,
                "submitting",
                &format!("Submitting verification for {}", patient.display_name()),
            );
        }
        let envelope = VerificationEnvelope {
            request_id,
            patient,
            response_tx: outcome_tx,
        };
        if tx.send(VerificationMessage::Verify(envelope)).await.is_err() {
            return Err(BenefitError::Verification("Verifier channel dropped".to_string()));
        }
    }

    let mut outcomes = Vec::with_capacity(listeners.len());
    for joined in join_all(listeners).await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => return Err(BenefitError::Verification(format!("Listener task failed: {}", e))),
        }
    }
    Ok(outcomes)
}

#[allow(clippy::too_many_arguments)]
async fn listen_for_outcome(
    mut outcome_rx: Receiver<VerificationOutcome>,
    request_id: String,
    patient: PatientInfo,
    schedule: Arc<FeeSchedule>,
    plan: Arc<SelectionSet>,
    fallback: CoverageRate,
    notify: Option<Sender<String>>,
    verbose: bool,
) -> IntakeOutcome {
    let status = match outcome_rx.recv().await {
        Some(VerificationOutcome::Verified { result, .. }) => match BenefitSnapshot::from_verification(&result) {
            Ok(snapshot) => {
                let engine = AllocationEngine::new(&schedule, fallback);
                let allocation = engine.allocate(&plan, &snapshot);
                if verbose {
                    log_patient_event(
                        "intake",
                        &request_id,
                        "costed",
                        &format!(
                            "Insurance {} / patient {}",
                            allocation.insurance_portion.round_dp(2),
                            allocation.patient_portion.round_dp(2)
                        ),
                    );
                }
                IntakeStatus::Costed {
                    verification: result,
                    allocation,
                }
            }
            Err(e) => IntakeStatus::Rejected(e.to_string()),
        },
        Some(VerificationOutcome::Failed { reason, .. }) => IntakeStatus::Rejected(reason),
        None => IntakeStatus::Rejected("Verifier closed without responding".to_string()),
    };

    if let Some(tx) = notify {
        let _ = tx.send(request_id.clone()).await;
    }

    IntakeOutcome {
        request_id,
        patient,
        status,
    }
}
