use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{BenefitError, Result};
use crate::selection::SelectionSet;

/// Largest fee or benefit balance accepted, in dollars. Sums of capped amounts
/// stay far inside `Decimal`'s range.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Display grouping for a procedure; has no effect on cost allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureCategory {
    InitialVisit,
    Treatment,
    Retreatment,
    Additional,
}

impl ProcedureCategory {
    pub const ALL: [ProcedureCategory; 4] = [
        ProcedureCategory::InitialVisit,
        ProcedureCategory::Treatment,
        ProcedureCategory::Retreatment,
        ProcedureCategory::Additional,
    ];
}

impl fmt::Display for ProcedureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProcedureCategory::InitialVisit => "Initial Visit",
            ProcedureCategory::Treatment => "Treatment",
            ProcedureCategory::Retreatment => "Retreatment",
            ProcedureCategory::Additional => "Additional Procedures",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeScheduleEntry {
    pub code: String,
    pub description: String,
    pub category: ProcedureCategory,
    pub fee: Decimal,
}

/// Immutable procedure code -> fee mapping.
///
/// Entries keep the order they were declared in so listings group the same
/// way every time.
#[derive(Debug, Clone)]
pub struct FeeSchedule {
    entries: Vec<FeeScheduleEntry>,
    index: HashMap<String, usize>,
}

#[derive(Deserialize)]
struct FeeScheduleFile {
    #[serde(rename = "procedure", default)]
    procedures: Vec<FeeScheduleEntry>,
}

impl FeeSchedule {
    /// Build a schedule, rejecting blank codes, duplicate codes and fees
    /// outside `0..=MAX_AMOUNT`.
    pub fn new(entries: Vec<FeeScheduleEntry>) -> Result<Self> {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if entry.code.trim().is_empty() {
                return Err(BenefitError::validation("fee_schedule.code", "Code cannot be empty"));
            }
            if entry.fee < Decimal::ZERO {
                return Err(BenefitError::validation(
                    format!("fee_schedule.{}.fee", entry.code),
                    format!("Fee must be non-negative, got {}", entry.fee),
                ));
            }
            if entry.fee > MAX_AMOUNT {
                return Err(BenefitError::validation(
                    format!("fee_schedule.{}.fee", entry.code),
                    format!("Fee {} exceeds the {} ceiling", entry.fee, MAX_AMOUNT),
                ));
            }
            if index.insert(entry.code.clone(), i).is_some() {
                return Err(BenefitError::validation(
                    "fee_schedule.code",
                    format!("Duplicate procedure code {}", entry.code),
                ));
            }
        }
        Ok(Self { entries, index })
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        let file: FeeScheduleFile = toml::from_str(input)?;
        Self::new(file.procedures)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn lookup(&self, code: &str) -> Option<&FeeScheduleEntry> {
        self.index.get(code).and_then(|&i| self.entries.get(i))
    }

    /// Fee for a code, zero when the code is not on the schedule.
    pub fn fee_or_zero(&self, code: &str) -> Decimal {
        self.lookup(code).map(|entry| entry.fee).unwrap_or(Decimal::ZERO)
    }

    /// First selected code that is not on the schedule.
    pub fn first_unknown<'s>(&self, selection: &'s SelectionSet) -> Option<&'s str> {
        selection.iter().find(|code| self.lookup(code).is_none())
    }

    pub fn entries(&self) -> &[FeeScheduleEntry] {
        &self.entries
    }

    pub fn in_category(&self, category: ProcedureCategory) -> impl Iterator<Item = &FeeScheduleEntry> {
        self.entries.iter().filter(move |entry| entry.category == category)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn entry(code: &str, description: &str, category: ProcedureCategory, fee: i64) -> FeeScheduleEntry {
    FeeScheduleEntry {
        code: code.to_string(),
        description: description.to_string(),
        category,
        fee: Decimal::from(fee),
    }
}

impl Default for FeeSchedule {
    /// The practice's standard endodontic fee schedule.
    fn default() -> Self {
        use ProcedureCategory::*;
        let entries = vec![
            entry("D0160", "Consultation", InitialVisit, 160),
            entry("D0460", "Pulp Vitality Testing", InitialVisit, 50),
            entry("D0367", "CBCT", InitialVisit, 200),
            entry("D3310", "Anterior Root Canal", Treatment, 1000),
            entry("D3320", "Premolar Root Canal", Treatment, 1150),
            entry("D3330", "Molar Root Canal", Treatment, 1300),
            entry("D3346", "Retreatment - Anterior", Retreatment, 1200),
            entry("D3347", "Retreatment - Premolar", Retreatment, 1350),
            entry("D3348", "Retreatment - Molar", Retreatment, 1500),
            entry("D2950", "Core Build-up", Additional, 250),
        ];
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.code.clone(), i))
            .collect();
        Self { entries, index }
    }
}
