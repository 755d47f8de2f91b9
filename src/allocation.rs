use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::benefits::{BenefitSnapshot, CoverageRate};
use crate::error::{BenefitError, Result};
use crate::fee_schedule::FeeSchedule;
use crate::selection::SelectionSet;

/// How one selected procedure's fee was split
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineAllocation {
    pub code: String,
    pub fee: Decimal,
    pub coverage_rate: CoverageRate,
    pub deductible: Decimal,
    pub insurance: Decimal,
    pub patient: Decimal,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AllocationResult {
    pub total_fees: Decimal,
    pub deductible_applied: Decimal,
    pub insurance_portion: Decimal,
    /// Deductible dollars plus coinsurance plus anything above the annual maximum.
    pub patient_portion: Decimal,
    pub deductible_remaining_after: Decimal,
    pub maximum_remaining_after: Decimal,
    pub lines: Vec<LineAllocation>,
    /// Selected codes missing from the fee schedule; each was costed at zero.
    pub unknown_codes: Vec<String>,
}

impl AllocationResult {
    /// Copy with every amount rounded to `dp` places, half away from zero.
    /// Only for display; allocation itself never rounds.
    pub fn rounded(&self, dp: u32) -> AllocationResult {
        let r = |v: Decimal| v.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
        AllocationResult {
            total_fees: r(self.total_fees),
            deductible_applied: r(self.deductible_applied),
            insurance_portion: r(self.insurance_portion),
            patient_portion: r(self.patient_portion),
            deductible_remaining_after: r(self.deductible_remaining_after),
            maximum_remaining_after: r(self.maximum_remaining_after),
            lines: self
                .lines
                .iter()
                .map(|line| LineAllocation {
                    code: line.code.clone(),
                    fee: r(line.fee),
                    coverage_rate: line.coverage_rate,
                    deductible: r(line.deductible),
                    insurance: r(line.insurance),
                    patient: r(line.patient),
                })
                .collect(),
            unknown_codes: self.unknown_codes.clone(),
        }
    }

    /// Checks that every fee dollar landed in exactly one of the insurance or
    /// patient buckets, per line and in total.
    pub fn validate_conservation(&self) -> std::result::Result<(), String> {
        for line in &self.lines {
            let sum = line.insurance + line.patient;
            if sum != line.fee {
                return Err(format!(
                    "Procedure {}: insurance {} + patient {} does not match fee {}",
                    line.code, line.insurance, line.patient, line.fee
                ));
            }
        }
        let sum = self.insurance_portion + self.patient_portion;
        if sum != self.total_fees {
            return Err(format!(
                "Totals: insurance {} + patient {} does not match total fees {}",
                self.insurance_portion, self.patient_portion, self.total_fees
            ));
        }
        Ok(())
    }
}

/// Splits selected procedure fees between the plan and the patient.
///
/// Both pools (remaining deductible, remaining annual maximum) are drawn down
/// greedily in selection order, so the per-procedure split depends on the
/// order codes were picked. The engine holds no state between runs.
#[derive(Debug, Clone, Copy)]
pub struct AllocationEngine<'a> {
    schedule: &'a FeeSchedule,
    fallback_rate: CoverageRate,
}

impl<'a> AllocationEngine<'a> {
    pub fn new(schedule: &'a FeeSchedule, fallback_rate: CoverageRate) -> Self {
        Self {
            schedule,
            fallback_rate,
        }
    }

    pub fn schedule(&self) -> &'a FeeSchedule {
        self.schedule
    }

    pub fn fallback_rate(&self) -> CoverageRate {
        self.fallback_rate
    }

    /// Unknown codes are costed at zero and reported in `unknown_codes`.
    pub fn allocate(&self, selection: &SelectionSet, snapshot: &BenefitSnapshot) -> AllocationResult {
        let mut deductible_remaining = snapshot.deductible_remaining();
        let mut maximum_remaining = snapshot.maximum_remaining();
        let mut result = AllocationResult::default();

        for code in selection.iter() {
            let fee = match self.schedule.lookup(code) {
                Some(entry) => entry.fee,
                None => {
                    result.unknown_codes.push(code.to_string());
                    Decimal::ZERO
                }
            };

            let deductible = deductible_remaining.min(fee);
            deductible_remaining -= deductible;
            let working_fee = fee - deductible;

            let coverage_rate = snapshot.coverage_or(code, self.fallback_rate);
            let raw_share = working_fee * coverage_rate.fraction();
            let insurance = raw_share.min(maximum_remaining);
            maximum_remaining -= insurance;

            let patient = deductible + (working_fee - insurance);

            result.total_fees += fee;
            result.deductible_applied += deductible;
            result.insurance_portion += insurance;
            result.patient_portion += patient;
            result.lines.push(LineAllocation {
                code: code.to_string(),
                fee,
                coverage_rate,
                deductible,
                insurance,
                patient,
            });
        }

        result.deductible_remaining_after = deductible_remaining;
        result.maximum_remaining_after = maximum_remaining;
        result
    }

    /// Like [`allocate`](Self::allocate) but refuses selections containing
    /// codes that are not on the fee schedule. Nothing is computed when a code
    /// is rejected.
    pub fn allocate_strict(&self, selection: &SelectionSet, snapshot: &BenefitSnapshot) -> Result<AllocationResult> {
        if let Some(code) = self.schedule.first_unknown(selection) {
            return Err(BenefitError::UnknownProcedureCode(code.to_string()));
        }
        Ok(self.allocate(selection, snapshot))
    }
}
