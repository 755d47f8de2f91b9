use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};

use benefitsim::allocation::AllocationEngine;
use benefitsim::benefits::BenefitSnapshot;
use benefitsim::calculator::{CalculatorState, replay};
use benefitsim::config::Config;
use benefitsim::error::BenefitError;
use benefitsim::intake::run_intake;
use benefitsim::json_faker::write_fake_patients_jsonl;
use benefitsim::logging::init_logger;
use benefitsim::message::{CalculatorEvent, VerificationEnvelope, VerificationMessage, VerificationOutcome};
use benefitsim::reader::stream_patients;
use benefitsim::reporter;
use benefitsim::schema::PatientInfo;
use benefitsim::selection::SelectionSet;
use benefitsim::session::{SessionSlot, UserDirectory, run_session_watchdog};
use benefitsim::verifier::Verifier;

#[derive(Parser)]
#[command(name = "benefitsim")]
#[command(about = "Dental insurance verification and treatment cost simulator")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone)]
struct Credentials {
    #[arg(long)]
    email: String,

    #[arg(long)]
    password: String,
}

#[derive(Subcommand)]
enum Command {
    /// Show the fee schedule
    Fees {
        #[arg(long = "procedure")]
        procedures: Vec<String>,
    },
    /// Write fake patient requests as JSONL
    Generate {
        #[arg(long, default_value = "fake_patients.jsonl")]
        out: String,

        #[arg(long, default_value_t = 10)]
        count: usize,
    },
    /// Verify one patient and cost the selected procedures
    Verify {
        #[command(flatten)]
        credentials: Credentials,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        /// YYYY-MM-DD
        #[arg(long)]
        date_of_birth: String,

        #[arg(long)]
        insurance_provider: String,

        #[arg(long)]
        member_id: String,

        #[arg(long)]
        group_number: Option<String>,

        /// Procedure code to cost; repeat in the order selected
        #[arg(long = "procedure")]
        procedures: Vec<String>,
    },
    /// Verify every patient in a JSONL file and cost one treatment plan for each
    Batch {
        #[command(flatten)]
        credentials: Credentials,

        #[arg(long, default_value = "fake_patients.jsonl")]
        file: String,

        #[arg(long = "procedure")]
        procedures: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.config;
    init_logger(config.verbose);
    config.validate()?;

    match cli.command {
        Command::Fees { procedures } => {
            let schedule = config.load_fee_schedule()?;
            let selection = SelectionSet::from_codes(procedures)?;
            reporter::fee_schedule_table(&schedule, &selection).printstd();
        }
        Command::Generate { out, count } => {
            write_fake_patients_jsonl(&out, count).with_context(|| format!("writing {}", out))?;
            tracing::info!("Wrote {} fake patients to {}", count, out);
        }
        Command::Verify {
            credentials,
            first_name,
            last_name,
            date_of_birth,
            insurance_provider,
            member_id,
            group_number,
            procedures,
        } => {
            let patient = PatientInfo {
                first_name,
                last_name,
                date_of_birth,
                insurance_provider,
                member_id,
                group_number,
            };
            verify_one(&config, &credentials, patient, procedures).await?;
        }
        Command::Batch {
            credentials,
            file,
            procedures,
        } => {
            run_batch(&config, &credentials, file, procedures).await?;
        }
    }
    Ok(())
}

async fn sign_in(config: &Config, credentials: &Credentials) -> anyhow::Result<SessionSlot> {
    let session = UserDirectory::demo().authenticate(
        &credentials.email,
        &credentials.password,
        Utc::now(),
        config.session_timeout()?,
    )?;
    session.authorize(Utc::now(), config.required_roles())?;
    let slot = SessionSlot::new();
    slot.sign_in(session).await;
    Ok(slot)
}

async fn verify_one(
    config: &Config,
    credentials: &Credentials,
    patient: PatientInfo,
    procedures: Vec<String>,
) -> anyhow::Result<()> {
    let slot = sign_in(config, credentials).await?;
    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel(1);
    let watchdog = tokio::spawn(run_session_watchdog(slot.clone(), Duration::from_secs(1), shutdown_rx));

    patient.validate()?;
    let schedule = config.load_fee_schedule()?;
    let engine = AllocationEngine::new(&schedule, config.fallback()?);

    let (verify_tx, verify_rx) = tokio::sync::mpsc::channel(1);
    let verifier = Verifier::new(config.min_delay_ms, config.max_delay_ms, verify_rx, config.verbose);
    tokio::spawn(async move {
        verifier.run().await;
    });

    let (response_tx, mut response_rx) = tokio::sync::mpsc::channel(1);
    let request_id = format!("{}-1", patient.member_id);
    println!("Verifying {}...", patient.display_name());
    verify_tx
        .send(VerificationMessage::Verify(VerificationEnvelope {
            request_id,
            patient,
            response_tx,
        }))
        .await
        .map_err(|_| anyhow!("Verifier stopped before accepting the request"))?;

    let result = match response_rx.recv().await {
        Some(VerificationOutcome::Verified { result, .. }) => result,
        Some(VerificationOutcome::Failed { reason, .. }) => return Err(anyhow!("Verification failed: {}", reason)),
        None => return Err(anyhow!("Verifier closed without responding")),
    };

    let session = slot
        .current(Utc::now())
        .await
        .ok_or_else(|| anyhow!("Session expired, sign in again"))?;
    tracing::debug!(email = %session.identity.email, "Session still active");

    reporter::print_verification(&result);

    let snapshot = BenefitSnapshot::from_verification(&result)?;
    let selection = SelectionSet::from_codes(procedures)?;
    if config.strict_codes {
        if let Some(code) = schedule.first_unknown(&selection) {
            return Err(BenefitError::UnknownProcedureCode(code.to_string()).into());
        }
    }
    let state = replay(
        &engine,
        CalculatorState::new(&engine, snapshot),
        selection.iter().map(|code| CalculatorEvent::Toggle(code.to_string())),
    );

    reporter::fee_schedule_table(&schedule, &state.selection).printstd();
    reporter::print_cost_summary(&schedule, &state.result);

    let _ = shutdown_tx.send(()).await;
    let _ = watchdog.await;
    Ok(())
}

async fn run_batch(
    config: &Config,
    credentials: &Credentials,
    file: String,
    procedures: Vec<String>,
) -> anyhow::Result<()> {
    let slot = sign_in(config, credentials).await?;
    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel(1);
    let watchdog = tokio::spawn(run_session_watchdog(slot.clone(), Duration::from_secs(1), shutdown_rx));

    let schedule = Arc::new(config.load_fee_schedule()?);
    let plan = SelectionSet::from_codes(procedures)?;

    let (patient_tx, patient_rx) = tokio::sync::mpsc::channel::<PatientInfo>(16);
    let (verify_tx, verify_rx) = tokio::sync::mpsc::channel(16);

    let verifier = Verifier::new(config.min_delay_ms, config.max_delay_ms, verify_rx, config.verbose);
    tokio::spawn(async move {
        verifier.run().await;
    });

    let reader = tokio::spawn(async move { stream_patients(&file, patient_tx).await });
    let outcomes = run_intake(config.clone(), patient_rx, verify_tx, schedule.clone(), plan, None).await?;
    let read = reader.await??;
    tracing::info!("Processed {} of {} patient requests", outcomes.len(), read);

    if slot.current(Utc::now()).await.is_none() {
        return Err(anyhow!("Session expired during the batch, results discarded"));
    }
    reporter::intake_table(&outcomes).printstd();

    let _ = shutdown_tx.send(()).await;
    let _ = watchdog.await;
    Ok(())
}
