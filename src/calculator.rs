use crate::allocation::{AllocationEngine, AllocationResult};
use crate::benefits::BenefitSnapshot;
use crate::message::CalculatorEvent;
use crate::selection::SelectionSet;

/// Everything the treatment-cost view shows, recomputed after every event.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculatorState {
    pub selection: SelectionSet,
    pub snapshot: BenefitSnapshot,
    pub result: AllocationResult,
}

impl CalculatorState {
    pub fn new(engine: &AllocationEngine<'_>, snapshot: BenefitSnapshot) -> Self {
        let selection = SelectionSet::new();
        let result = engine.allocate(&selection, &snapshot);
        Self {
            selection,
            snapshot,
            result,
        }
    }
}

/// Apply one event and return the next state; the previous state is untouched.
pub fn reduce(engine: &AllocationEngine<'_>, state: &CalculatorState, event: CalculatorEvent) -> CalculatorState {
    let mut selection = state.selection.clone();
    let mut snapshot = state.snapshot.clone();
    match event {
        CalculatorEvent::Toggle(code) => {
            selection.toggle(&code);
        }
        CalculatorEvent::ReplaceSnapshot(next) => snapshot = next,
        CalculatorEvent::Clear => selection.clear(),
    }
    let result = engine.allocate(&selection, &snapshot);
    CalculatorState {
        selection,
        snapshot,
        result,
    }
}

/// Fold a sequence of events over `state`.
pub fn replay<I>(engine: &AllocationEngine<'_>, state: CalculatorState, events: I) -> CalculatorState
where
    I: IntoIterator<Item = CalculatorEvent>,
{
    events
        .into_iter()
        .fold(state, |acc, event| reduce(engine, &acc, event))
}
