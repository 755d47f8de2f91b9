use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{BenefitError, Result};
use crate::fee_schedule::MAX_AMOUNT;
use crate::schema::VerificationResult;

/// Fraction of the post-deductible fee the plan pays, always within [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct CoverageRate(Decimal);

impl CoverageRate {
    /// Rate applied when a plan reports nothing for a procedure.
    pub const DEFAULT_FALLBACK: CoverageRate = CoverageRate(Decimal::from_parts(80, 0, 0, false, 2));

    pub fn new(fraction: Decimal) -> Result<Self> {
        if fraction < Decimal::ZERO || fraction > Decimal::ONE {
            return Err(BenefitError::validation(
                "coverage_rate",
                format!("Coverage must be between 0 and 1, got {}", fraction),
            ));
        }
        Ok(Self(fraction))
    }

    /// Parse a payer-style percentage such as `"80%"` or `"100 %"`.
    pub fn from_percent_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
        let percent = Decimal::from_str(number).map_err(|e| {
            BenefitError::validation("coverage_rate", format!("Invalid percentage {:?}: {}", value, e))
        })?;
        Self::new(percent / Decimal::ONE_HUNDRED)
    }

    pub fn fraction(self) -> Decimal {
        self.0
    }
}

impl Default for CoverageRate {
    fn default() -> Self {
        Self::DEFAULT_FALLBACK
    }
}

impl TryFrom<Decimal> for CoverageRate {
    type Error = BenefitError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CoverageRate> for Decimal {
    fn from(rate: CoverageRate) -> Self {
        rate.0
    }
}

impl FromStr for CoverageRate {
    type Err = BenefitError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim_end().ends_with('%') {
            return Self::from_percent_str(s);
        }
        let fraction = Decimal::from_str(s.trim())
            .map_err(|e| BenefitError::validation("coverage_rate", format!("Invalid rate {:?}: {}", s, e)))?;
        Self::new(fraction)
    }
}

impl fmt::Display for CoverageRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", (self.0 * Decimal::ONE_HUNDRED).normalize())
    }
}

/// Point-in-time remaining deductible and annual maximum for one patient.
///
/// Read-only input to an allocation run. Balances are validated on
/// construction and never go negative.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BenefitSnapshot {
    deductible_remaining: Decimal,
    maximum_remaining: Decimal,
    procedure_coverage: HashMap<String, CoverageRate>,
}

impl BenefitSnapshot {
    pub fn new(deductible_remaining: Decimal, maximum_remaining: Decimal) -> Result<Self> {
        balance_in_range("deductible.remaining", deductible_remaining)?;
        balance_in_range("maximums.remaining", maximum_remaining)?;
        Ok(Self {
            deductible_remaining,
            maximum_remaining,
            procedure_coverage: HashMap::new(),
        })
    }

    pub fn with_coverage(mut self, code: impl Into<String>, rate: CoverageRate) -> Self {
        self.procedure_coverage.insert(code.into(), rate);
        self
    }

    /// Build a snapshot from a verification record.
    ///
    /// Procedure coverage strings like `"80%"` are parsed here so a malformed
    /// payer response fails before any allocation runs.
    pub fn from_verification(result: &VerificationResult) -> Result<Self> {
        let benefits = &result.benefits;
        let mut snapshot = Self::new(benefits.deductible.remaining, benefits.maximums.remaining)?;
        if let Some(endo) = &result.endodontic_coverage {
            for (code, procedure) in &endo.procedures {
                let rate = CoverageRate::from_percent_str(&procedure.coverage).map_err(|_| {
                    BenefitError::validation(
                        format!("procedures.{}.coverage", code),
                        format!("Unparseable coverage {:?}", procedure.coverage),
                    )
                })?;
                snapshot.procedure_coverage.insert(code.clone(), rate);
            }
        }
        Ok(snapshot)
    }

    pub fn deductible_remaining(&self) -> Decimal {
        self.deductible_remaining
    }

    pub fn maximum_remaining(&self) -> Decimal {
        self.maximum_remaining
    }

    pub fn coverage_for(&self, code: &str) -> Option<CoverageRate> {
        self.procedure_coverage.get(code).copied()
    }

    /// Coverage for a code, falling back to `fallback` when the plan is silent.
    pub fn coverage_or(&self, code: &str, fallback: CoverageRate) -> CoverageRate {
        self.coverage_for(code).unwrap_or(fallback)
    }

    /// A copy of this snapshot with balances replaced, e.g. to commit the
    /// "after" balances of an allocation run.
    pub fn with_balances(&self, deductible_remaining: Decimal, maximum_remaining: Decimal) -> Result<Self> {
        let mut next = Self::new(deductible_remaining, maximum_remaining)?;
        next.procedure_coverage = self.procedure_coverage.clone();
        Ok(next)
    }
}

fn balance_in_range(field: &str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO {
        return Err(BenefitError::validation(
            field,
            format!("Balance must be non-negative, got {}", value),
        ));
    }
    if value > MAX_AMOUNT {
        return Err(BenefitError::validation(
            field,
            format!("Balance {} exceeds the {} ceiling", value, MAX_AMOUNT),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::sample_verification;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_fallback_is_eighty_percent() {
        assert_eq!(CoverageRate::DEFAULT_FALLBACK.fraction(), dec!(0.80));
        assert_eq!(CoverageRate::default().to_string(), "80%");
    }

    #[test]
    fn test_coverage_rate_range() {
        assert!(CoverageRate::new(dec!(0)).is_ok());
        assert!(CoverageRate::new(dec!(1)).is_ok());
        assert!(CoverageRate::new(dec!(1.01)).is_err());
        assert!(CoverageRate::new(dec!(-0.1)).is_err());
    }

    #[test]
    fn test_coverage_rate_parsing() {
        assert_eq!(CoverageRate::from_percent_str("80%").unwrap().fraction(), dec!(0.8));
        assert_eq!(CoverageRate::from_percent_str(" 100 % ").unwrap().fraction(), dec!(1));
        assert_eq!("0.5".parse::<CoverageRate>().unwrap().fraction(), dec!(0.5));
        assert_eq!("50%".parse::<CoverageRate>().unwrap().fraction(), dec!(0.5));
        assert!(CoverageRate::from_percent_str("150%").is_err());
        assert!(CoverageRate::from_percent_str("most").is_err());
    }

    #[test]
    fn test_snapshot_rejects_negative_balances() {
        assert!(BenefitSnapshot::new(dec!(-1), dec!(100)).is_err());
        let err = BenefitSnapshot::new(dec!(0), dec!(-0.01)).unwrap_err();
        assert!(err.to_string().contains("maximums.remaining"));
    }

    #[test]
    fn test_snapshot_rejects_balances_above_ceiling() {
        let err = BenefitSnapshot::new(MAX_AMOUNT + dec!(0.01), dec!(100)).unwrap_err();
        assert!(err.to_string().contains("deductible.remaining"));
        assert!(BenefitSnapshot::new(dec!(0), MAX_AMOUNT * dec!(10)).is_err());
        assert!(BenefitSnapshot::new(MAX_AMOUNT, MAX_AMOUNT).is_ok());
    }

    #[test]
    fn test_snapshot_from_verification() {
        let verification = sample_verification();
        let snapshot = BenefitSnapshot::from_verification(&verification).unwrap();
        assert_eq!(snapshot.deductible_remaining(), dec!(50));
        assert_eq!(snapshot.maximum_remaining(), dec!(1500));
        assert_eq!(snapshot.coverage_for("D3330").map(CoverageRate::fraction), Some(dec!(0.8)));
        assert_eq!(snapshot.coverage_for("D0160"), None);
        let half = CoverageRate::new(dec!(0.5)).unwrap();
        assert_eq!(snapshot.coverage_or("D0160", half), half);
    }

    #[test]
    fn test_snapshot_from_verification_rejects_bad_coverage() {
        let mut verification = sample_verification();
        if let Some(endo) = verification.endodontic_coverage.as_mut() {
            if let Some(procedure) = endo.procedures.get_mut("D3310") {
                procedure.coverage = "lots".to_string();
            }
        }
        let err = BenefitSnapshot::from_verification(&verification).unwrap_err();
        assert!(err.to_string().contains("procedures.D3310.coverage"));
    }

    #[test]
    fn test_with_balances_keeps_coverage() {
        let snapshot = BenefitSnapshot::new(dec!(50), dec!(1500))
            .unwrap()
            .with_coverage("D3310", CoverageRate::new(dec!(0.5)).unwrap());
        let next = snapshot.with_balances(dec!(0), dec!(1000)).unwrap();
        assert_eq!(next.deductible_remaining(), dec!(0));
        assert_eq!(next.coverage_for("D3310"), snapshot.coverage_for("D3310"));
        assert!(snapshot.with_balances(dec!(0), dec!(-5)).is_err());
    }
}
