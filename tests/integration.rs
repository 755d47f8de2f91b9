use benefitsim::calculator::{CalculatorState, reduce, replay};
use benefitsim::message::CalculatorEvent;
use benefitsim::schema::sample_verification;
use benefitsim::{AllocationEngine, BenefitError, BenefitSnapshot, CoverageRate, FeeSchedule, SelectionSet};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn snapshots() -> Vec<BenefitSnapshot> {
    vec![
        BenefitSnapshot::new(dec!(0), dec!(0)).unwrap(),
        BenefitSnapshot::new(dec!(50), dec!(1500)).unwrap(),
        BenefitSnapshot::new(dec!(0), dec!(40)).unwrap(),
        BenefitSnapshot::new(dec!(2000), dec!(100)).unwrap(),
        BenefitSnapshot::new(dec!(75.25), dec!(333.33))
            .unwrap()
            .with_coverage("D3348", CoverageRate::new(dec!(0.5)).unwrap())
            .with_coverage("D0367", CoverageRate::new(dec!(1)).unwrap()),
    ]
}

fn selections() -> Vec<SelectionSet> {
    let codes: [&[&str]; 5] = [
        &[],
        &["D0160"],
        &["D3310", "D0160", "D2950"],
        &["D0367", "D3348", "D9999", "D0460"],
        &["D3330", "D3320", "D3310", "D3346", "D3347", "D3348"],
    ];
    codes
        .iter()
        .map(|c| SelectionSet::from_codes(c.iter().copied()).unwrap())
        .collect()
}

/// Every fee dollar is paid by exactly one party, and pools only shrink
#[test]
fn test_conservation_and_monotonic_balances() {
    let schedule = FeeSchedule::default();
    let engine = AllocationEngine::new(&schedule, CoverageRate::DEFAULT_FALLBACK);

    for snapshot in snapshots() {
        for selection in selections() {
            let result = engine.allocate(&selection, &snapshot);
            assert_eq!(
                result.total_fees,
                result.insurance_portion + result.patient_portion,
                "conservation failed for {:?} / {:?}",
                selection,
                snapshot
            );
            assert!(result.validate_conservation().is_ok());
            assert!(result.deductible_remaining_after <= snapshot.deductible_remaining());
            assert!(result.maximum_remaining_after <= snapshot.maximum_remaining());
            assert!(result.deductible_remaining_after >= Decimal::ZERO);
            assert!(result.maximum_remaining_after >= Decimal::ZERO);
            assert_eq!(
                snapshot.deductible_remaining() - result.deductible_remaining_after,
                result.deductible_applied
            );
            assert_eq!(
                snapshot.maximum_remaining() - result.maximum_remaining_after,
                result.insurance_portion
            );
        }
    }
}

/// Rounding happens once, on the finished totals
#[test]
fn test_rounded_totals_stay_within_a_cent() {
    let schedule = FeeSchedule::default();
    let engine = AllocationEngine::new(&schedule, CoverageRate::new(dec!(0.7)).unwrap());
    for snapshot in snapshots() {
        for selection in selections() {
            let shown = engine.allocate(&selection, &snapshot).rounded(2);
            let drift = (shown.total_fees - shown.insurance_portion - shown.patient_portion).abs();
            assert!(drift <= dec!(0.01), "rounding drift {} too large", drift);
        }
    }
}

#[test]
fn test_allocation_leaves_snapshot_untouched() {
    let schedule = FeeSchedule::default();
    let engine = AllocationEngine::new(&schedule, CoverageRate::DEFAULT_FALLBACK);
    let snapshot = BenefitSnapshot::new(dec!(50), dec!(1500)).unwrap();
    let before = snapshot.clone();
    let selection = SelectionSet::from_codes(["D3330", "D2950"]).unwrap();

    let first = engine.allocate(&selection, &snapshot);
    let second = engine.allocate(&selection, &snapshot);
    assert_eq!(snapshot, before);
    assert_eq!(first, second);
}

/// Committing the after-balances carries the shrinking pools into the next visit
#[test]
fn test_committing_balances_between_visits() {
    let schedule = FeeSchedule::default();
    let engine = AllocationEngine::new(&schedule, CoverageRate::DEFAULT_FALLBACK);
    let snapshot = BenefitSnapshot::from_verification(&sample_verification()).unwrap();

    let first_visit = engine.allocate(&SelectionSet::from_codes(["D0160", "D0367"]).unwrap(), &snapshot);
    let committed = snapshot
        .with_balances(first_visit.deductible_remaining_after, first_visit.maximum_remaining_after)
        .unwrap();
    let second_visit = engine.allocate(&SelectionSet::from_codes(["D3330"]).unwrap(), &committed);

    assert_eq!(first_visit.deductible_applied, dec!(50));
    assert_eq!(second_visit.deductible_applied, dec!(0));
    // 1500 - 88 - 160 = 1252 left, molar wants 1040
    assert_eq!(second_visit.insurance_portion, dec!(1040));
    assert_eq!(second_visit.maximum_remaining_after, dec!(212));
}

#[test]
fn test_toggle_twice_reproduces_result_through_reducer() {
    let schedule = FeeSchedule::default();
    let engine = AllocationEngine::new(&schedule, CoverageRate::DEFAULT_FALLBACK);
    let snapshot = BenefitSnapshot::from_verification(&sample_verification()).unwrap();
    let start = replay(
        &engine,
        CalculatorState::new(&engine, snapshot),
        ["D0160", "D0460", "D3330"].map(|c| CalculatorEvent::Toggle(c.to_string())),
    );

    for code in ["D0160", "D2950", "D9999"] {
        let once = reduce(&engine, &start, CalculatorEvent::Toggle(code.to_string()));
        let twice = reduce(&engine, &once, CalculatorEvent::Toggle(code.to_string()));
        assert_eq!(twice.result.insurance_portion, start.result.insurance_portion);
        assert_eq!(twice.result.patient_portion, start.result.patient_portion);
        assert_eq!(twice.result.total_fees, start.result.total_fees);
        assert_eq!(twice.selection.len(), start.selection.len());
    }
}

#[test]
fn test_strict_mode_matches_lenient_mode_for_known_codes() {
    let schedule = FeeSchedule::default();
    let engine = AllocationEngine::new(&schedule, CoverageRate::DEFAULT_FALLBACK);
    let snapshot = BenefitSnapshot::new(dec!(50), dec!(1500)).unwrap();

    let known = SelectionSet::from_codes(["D3310", "D2950"]).unwrap();
    assert_eq!(engine.allocate_strict(&known, &snapshot).unwrap(), engine.allocate(&known, &snapshot));

    let unknown = SelectionSet::from_codes(["D3310", "X0000"]).unwrap();
    assert!(matches!(
        engine.allocate_strict(&unknown, &snapshot),
        Err(BenefitError::UnknownProcedureCode(_))
    ));
}

#[test]
fn test_validation_errors_at_construction() {
    assert!(matches!(
        BenefitSnapshot::new(dec!(-5), dec!(100)),
        Err(BenefitError::Validation { .. })
    ));
    assert!(CoverageRate::new(dec!(1.2)).is_err());
    assert!(SelectionSet::from_codes(["D0160", "D0160"]).is_err());
}
