use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{BenefitError, Result};

/// Patient and insurance identifiers captured at the front desk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInfo {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub insurance_provider: String,
    pub member_id: String,
    #[serde(default)]
    pub group_number: Option<String>,
}

impl PatientInfo {
    /// Every field except the group number is required; the date of birth
    /// must be a `YYYY-MM-DD` date.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("dateOfBirth", &self.date_of_birth),
            ("insuranceProvider", &self.insurance_provider),
            ("memberId", &self.member_id),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(BenefitError::validation(field, "Value cannot be empty"));
            }
        }
        NaiveDate::parse_from_str(&self.date_of_birth, "%Y-%m-%d").map_err(|e| {
            BenefitError::validation("dateOfBirth", format!("Invalid date {:?}: {}", self.date_of_birth, e))
        })?;
        Ok(())
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// The root struct for a verification response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub status: String,
    pub effective_date: String,
    pub termination_date: String,
    pub network: Network,
    pub plan_details: PlanDetails,
    pub benefits: Benefits,
    #[serde(default)]
    pub endodontic_coverage: Option<EndodonticCoverage>,
    #[serde(default)]
    pub history: Option<History>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub status: String,
    #[serde(rename = "type")]
    pub plan_type: String,
    pub network_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDetails {
    pub plan_name: String,
    pub group: String,
    pub plan_year: String,
    pub claim_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benefits {
    pub deductible: Deductible,
    pub maximums: Maximums,
    #[serde(default)]
    pub preventive: Option<CoverageTerms>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deductible {
    pub individual: Decimal,
    pub family: Decimal,
    pub remaining: Decimal,
    #[serde(default)]
    pub applies_to_treatment: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maximums {
    pub annual: Decimal,
    pub remaining: Decimal,
    #[serde(default)]
    pub orthodontic_lifetime: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageTerms {
    pub coverage: String,
    pub deductible_applies: bool,
    pub waiting_period: String,
    #[serde(default)]
    pub frequency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndodonticCoverage {
    pub basic: CoverageTerms,
    #[serde(default)]
    pub procedures: BTreeMap<String, ProcedureCoverage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureCoverage {
    pub name: String,
    pub coverage: String,
    pub patient_portion: String,
    #[serde(default)]
    pub restrictions: Option<String>,
}

impl ProcedureCoverage {
    /// Restrictions worth showing; payers send `"None"` for unrestricted codes.
    pub fn notable_restriction(&self) -> Option<&str> {
        self.restrictions
            .as_deref()
            .filter(|r| !r.trim().is_empty() && *r != "None")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    #[serde(rename = "lastVerification")]
    pub last_verification: DateTime<Utc>,
    #[serde(default)]
    pub tooth_history: BTreeMap<String, ToothRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToothRecord {
    pub date: String,
    pub procedure: String,
    pub provider: String,
}

fn procedure(name: &str, restrictions: &str) -> ProcedureCoverage {
    ProcedureCoverage {
        name: name.to_string(),
        coverage: "80%".to_string(),
        patient_portion: "20%".to_string(),
        restrictions: Some(restrictions.to_string()),
    }
}

/// Canned response returned by the simulated verification service
pub fn sample_verification() -> VerificationResult {
    let retreatment_wait = "2 years after initial treatment";
    let procedures = [
        ("D3310", procedure("Anterior Root Canal", "None")),
        ("D3320", procedure("Premolar Root Canal", "None")),
        ("D3330", procedure("Molar Root Canal", "None")),
        ("D3346", procedure("Retreatment - Anterior", retreatment_wait)),
        ("D3347", procedure("Retreatment - Premolar", retreatment_wait)),
        ("D3348", procedure("Retreatment - Molar", retreatment_wait)),
    ]
    .into_iter()
    .map(|(code, p)| (code.to_string(), p))
    .collect();

    let mut tooth_history = BTreeMap::new();
    tooth_history.insert(
        "18".to_string(),
        ToothRecord {
            date: "2023-06-15".to_string(),
            procedure: "D3330".to_string(),
            provider: "Dr. Smith".to_string(),
        },
    );

    VerificationResult {
        status: "ACTIVE".to_string(),
        effective_date: "2024-01-01".to_string(),
        termination_date: "2024-12-31".to_string(),
        network: Network {
            status: "IN-NETWORK".to_string(),
            plan_type: "PPO".to_string(),
            network_name: "Premium Dental Network".to_string(),
        },
        plan_details: PlanDetails {
            plan_name: "Premium Dental PPO".to_string(),
            group: "12345-001".to_string(),
            plan_year: "Calendar Year".to_string(),
            claim_address: "PO Box 12345, Some City, ST 12345".to_string(),
        },
        benefits: Benefits {
            deductible: Deductible {
                individual: Decimal::from(50),
                family: Decimal::from(150),
                remaining: Decimal::from(50),
                applies_to_treatment: true,
            },
            maximums: Maximums {
                annual: Decimal::from(1500),
                remaining: Decimal::from(1500),
                orthodontic_lifetime: Some(Decimal::from(1000)),
            },
            preventive: Some(CoverageTerms {
                coverage: "100%".to_string(),
                deductible_applies: false,
                waiting_period: "None".to_string(),
                frequency: None,
            }),
        },
        endodontic_coverage: Some(EndodonticCoverage {
            basic: CoverageTerms {
                coverage: "80%".to_string(),
                deductible_applies: true,
                waiting_period: "None".to_string(),
                frequency: Some("Once per tooth per lifetime".to_string()),
            },
            procedures,
        }),
        history: Some(History {
            last_verification: Utc::now(),
            tooth_history,
        }),
        warnings: vec![
            "Tooth 18 had previous root canal treatment in 2023".to_string(),
            "Retreatment waiting period applies".to_string(),
        ],
    }
}

/// Mock patient for testing
pub fn sample_patient() -> PatientInfo {
    PatientInfo {
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
        date_of_birth: "1990-01-01".to_string(),
        insurance_provider: "Delta Dental".to_string(),
        member_id: "pmid456".to_string(),
        group_number: Some("12345-001".to_string()),
    }
}
