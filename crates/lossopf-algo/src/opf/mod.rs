//! Loss-iterated DC optimal power flow
//!
//! - [`DispatchModel`]: linear dispatch LP with a swappable balance group
//! - [`estimate_losses`]: quadratic DC loss estimate from bus angles
//! - [`LossOpf`]: fixed-point loop over the two
//! - [`extract_report`]: primal and dual values in physical units
//! - [`solve_transmission`] and [`solve_multiperiod`]: studies built on the loop

mod builder;
mod export;
mod iterative;
mod losses;
mod multiperiod;
mod results;
mod transmission;
mod types;

pub use builder::{DispatchModel, VarMap};
pub use iterative::{run_fixed_point, FixedPoint, LossCoupledModel, LossOpf, LossOpfOutcome};
pub use losses::{estimate_losses, FlowSign, LossState};
pub use multiperiod::{
    solve_multiperiod, solve_multiperiod_with, MultiPeriodOutcome, MultiPeriodStudy, PeriodResult,
};
pub use results::{
    extract_report, BalanceCheck, BatteryDispatch, BoundPrices, CurtailmentSummary, DispatchReport,
    DualResults, LoadShedding, LossSummary, PrimalResults, SheddingSummary,
    CURTAILMENT_THRESHOLD_MW, LOSS_REPORT_THRESHOLD_MW,
};
pub use transmission::{solve_transmission, solve_transmission_with, TransmissionOutcome};
pub use types::{IterationRecord, LossOpfConfig, OpfObjective};
