pub mod allocation;
pub mod benefits;
pub mod calculator;
pub mod config;
pub mod error;
pub mod fee_schedule;
pub mod intake;
pub mod json_faker;
pub mod logging;
pub mod message;
pub mod reader;
pub mod reporter;
pub mod schema;
pub mod selection;
pub mod session;
pub mod verifier;

pub use allocation::{AllocationEngine, AllocationResult, LineAllocation};
pub use benefits::{BenefitSnapshot, CoverageRate};
pub use error::{BenefitError, Result};
pub use fee_schedule::{FeeSchedule, FeeScheduleEntry};
pub use selection::SelectionSet;
