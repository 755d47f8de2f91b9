use colored::Colorize;
use prettytable::{Table, row};
use rust_decimal::Decimal;

use crate::allocation::AllocationResult;
use crate::fee_schedule::{FeeSchedule, ProcedureCategory};
use crate::intake::{IntakeOutcome, IntakeStatus};
use crate::schema::VerificationResult;
use crate::selection::SelectionSet;

fn money(amount: Decimal) -> String {
    format!("${:.2}", amount)
}

pub fn plan_table(result: &VerificationResult) -> Table {
    let mut table = Table::new();
    table.add_row(row!["Status", result.status]);
    table.add_row(row!["Network Status", result.network.status]);
    table.add_row(row!["Network", result.network.network_name]);
    table.add_row(row!["Plan Type", result.network.plan_type]);
    table.add_row(row!["Plan", result.plan_details.plan_name]);
    table.add_row(row!["Group", result.plan_details.group]);
    table.add_row(row!["Plan Year", result.plan_details.plan_year]);
    table.add_row(row!["Effective", format!("{} to {}", result.effective_date, result.termination_date)]);
    table.add_row(row!["Claims To", result.plan_details.claim_address]);
    table
}

pub fn benefits_table(result: &VerificationResult) -> Table {
    let deductible = &result.benefits.deductible;
    let maximums = &result.benefits.maximums;
    let mut table = Table::new();
    table.add_row(row!["", "Amount", "Remaining"]);
    table.add_row(row!["Individual Deductible", money(deductible.individual), money(deductible.remaining)]);
    table.add_row(row!["Family Deductible", money(deductible.family), ""]);
    table.add_row(row!["Annual Maximum", money(maximums.annual), money(maximums.remaining)]);
    if let Some(ortho) = maximums.orthodontic_lifetime {
        table.add_row(row!["Orthodontic Lifetime", money(ortho), ""]);
    }
    if let Some(preventive) = &result.benefits.preventive {
        table.add_row(row!["Preventive", preventive.coverage, ""]);
    }
    table
}

/// One row per covered endodontic procedure, with restrictions when present
pub fn procedure_coverage_table(result: &VerificationResult) -> Option<Table> {
    let endo = result.endodontic_coverage.as_ref()?;
    let mut table = Table::new();
    table.add_row(row!["Code", "Procedure", "Coverage", "Patient Portion", "Note"]);
    for (code, procedure) in &endo.procedures {
        table.add_row(row![
            code,
            procedure.name,
            procedure.coverage,
            procedure.patient_portion,
            procedure.notable_restriction().unwrap_or("")
        ]);
    }
    Some(table)
}

pub fn history_table(result: &VerificationResult) -> Option<Table> {
    let history = result.history.as_ref()?;
    let mut table = Table::new();
    table.add_row(row!["Tooth", "Date", "Procedure", "Provider"]);
    for (tooth, record) in &history.tooth_history {
        table.add_row(row![tooth, record.date, record.procedure, record.provider]);
    }
    Some(table)
}

/// Fee schedule grouped by category, marking selected codes
pub fn fee_schedule_table(schedule: &FeeSchedule, selection: &SelectionSet) -> Table {
    let mut table = Table::new();
    table.add_row(row!["", "Code", "Description", "Fee"]);
    for category in ProcedureCategory::ALL {
        let mut entries = schedule.in_category(category).peekable();
        if entries.peek().is_none() {
            continue;
        }
        table.add_row(row![category.to_string(), "", "", ""]);
        for entry in entries {
            let mark = if selection.contains(&entry.code) { "[x]" } else { "[ ]" };
            table.add_row(row![mark, entry.code, entry.description, money(entry.fee)]);
        }
    }
    table
}

/// Per-procedure split plus totals, rounded to cents for display
pub fn cost_summary_table(schedule: &FeeSchedule, result: &AllocationResult) -> Table {
    let shown = result.rounded(2);
    let mut table = Table::new();
    table.add_row(row!["Code", "Description", "Fee", "Coverage", "Deductible", "Insurance", "Patient"]);
    for line in &shown.lines {
        let description = schedule
            .lookup(&line.code)
            .map(|entry| entry.description.as_str())
            .unwrap_or("(not on fee schedule)");
        table.add_row(row![
            line.code,
            description,
            money(line.fee),
            line.coverage_rate,
            money(line.deductible),
            money(line.insurance),
            money(line.patient)
        ]);
    }
    table.add_row(row![
        "Total",
        "",
        money(shown.total_fees),
        "",
        money(shown.deductible_applied),
        money(shown.insurance_portion),
        money(shown.patient_portion)
    ]);
    table
}

pub fn print_verification(result: &VerificationResult) {
    println!("\n--- Plan Information ---");
    plan_table(result).printstd();

    for warning in &result.warnings {
        println!("{} {}", "Important:".red().bold(), warning.red());
    }

    println!("\n--- Benefits & Maximums ---");
    benefits_table(result).printstd();

    if let Some(endo) = &result.endodontic_coverage {
        println!("\n--- Endodontic Coverage ---");
        println!(
            "Basic: {} (deductible applies: {}), waiting period: {}, frequency: {}",
            endo.basic.coverage,
            if endo.basic.deductible_applies { "Yes" } else { "No" },
            endo.basic.waiting_period,
            endo.basic.frequency.as_deref().unwrap_or("N/A")
        );
    }
    if let Some(table) = procedure_coverage_table(result) {
        table.printstd();
    }

    if let Some(table) = history_table(result) {
        println!("\n--- Treatment History ---");
        table.printstd();
    }
}

pub fn print_cost_summary(schedule: &FeeSchedule, result: &AllocationResult) {
    println!("\n--- Treatment Cost Calculator ---");
    cost_summary_table(schedule, result).printstd();
    for code in &result.unknown_codes {
        println!("{} {} is not on the fee schedule and was costed at $0", "Warning:".yellow().bold(), code);
    }
    let shown = result.rounded(2);
    println!(
        "{} {}   {} {}",
        "Insurance Pays:".blue(),
        money(shown.insurance_portion).blue().bold(),
        "Patient Responsibility:".green(),
        money(shown.patient_portion).green().bold()
    );
    println!(
        "Remaining after treatment: deductible {}, annual maximum {}",
        money(shown.deductible_remaining_after),
        money(shown.maximum_remaining_after)
    );
}

pub fn intake_table(outcomes: &[IntakeOutcome]) -> Table {
    let mut table = Table::new();
    table.add_row(row!["Request", "Patient", "Provider", "Result", "Insurance", "Patient Pays"]);
    for outcome in outcomes {
        match &outcome.status {
            IntakeStatus::Costed { verification, allocation } => {
                let shown = allocation.rounded(2);
                table.add_row(row![
                    outcome.request_id,
                    outcome.patient.display_name(),
                    outcome.patient.insurance_provider,
                    verification.status,
                    money(shown.insurance_portion),
                    money(shown.patient_portion)
                ]);
            }
            IntakeStatus::Rejected(reason) => {
                table.add_row(row![
                    outcome.request_id,
                    outcome.patient.display_name(),
                    outcome.patient.insurance_provider,
                    format!("REJECTED: {}", reason),
                    "",
                    ""
                ]);
            }
        }
    }
    table
}
