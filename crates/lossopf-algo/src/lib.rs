//! # lossopf-algo: loss-iterated DC optimal power flow
//!
//! The DC dispatch LP ignores resistive losses. This crate recovers them by
//! successive linear approximation: the LP is solved with losses held as
//! constant bus demands, losses are re-estimated from the solved angles, and
//! the balance rows are rebuilt until the total loss settles.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`lp`] | solver-independent LP model and the [`lp::LpSolver`] oracles |
//! | [`opf`] | dispatch model, loss estimate, fixed-point loop, reports |
//! | [`scenarios`] | wind/load/N-1 scenario generation and application |
//! | [`sweep`] | parallel scenario sweeps with per-scenario outcomes |
//!
//! ## Example
//!
//! ```rust,no_run
//! use lossopf_algo::opf::{LossOpf, LossOpfConfig};
//! use lossopf_core::cases;
//!
//! let network = cases::three_bus();
//! let outcome = LossOpf::new(LossOpfConfig::default())?.solve_loss(&network)?;
//! if let Some(report) = outcome.report(&network) {
//!     println!("cost {:.2} $/h, losses {:.4} MW", report.total_cost, report.losses.total_mw);
//! }
//! # Ok::<(), lossopf_algo::OpfError>(())
//! ```
//!
//! ## Errors
//!
//! [`OpfError::Optimization`] (an LP solve was not optimal) and
//! [`OpfError::Convergence`] (the loss iteration ran out of iterations) are
//! kept apart so that callers can skip non-converging scenarios while still
//! treating solver failures as hard errors.

pub mod error;
pub mod lp;
pub mod opf;
pub mod scenarios;
pub mod sweep;

pub use error::OpfError;
pub use opf::{
    extract_report, solve_multiperiod, solve_transmission, DispatchModel, DispatchReport,
    LossOpf, LossOpfConfig, LossOpfOutcome, LossState, OpfObjective,
};
pub use scenarios::{apply_scenario, Scenario};
pub use sweep::{run_sweep, ScenarioStatus, SweepConfig, SweepSummary};
