use crate::lp::{LpError, LpStatus};
use lossopf_core::{CoreError, LineId};
use thiserror::Error;

/// Loss-OPF errors
#[derive(Debug, Error)]
pub enum OpfError {
    /// The LP oracle returned a non-optimal status inside the loop
    #[error("LP solve failed at iteration {iteration} with status {status}")]
    Optimization { iteration: usize, status: LpStatus },

    /// Every solve succeeded but the loss estimate never settled
    #[error("Loss iteration did not converge after {iterations} iterations (last diff: {last_diff:.3e})")]
    Convergence { iterations: usize, last_diff: f64 },

    #[error("{line} has zero reactance")]
    ZeroReactance { line: LineId },

    #[error("{line} has a negative or non-finite impedance (r = {resistance}, x = {reactance})")]
    InvalidImpedance {
        line: LineId,
        resistance: f64,
        reactance: f64,
    },

    /// Angle comparison was not decidable (NaN in the solution)
    #[error("Cannot determine flow direction on {line}: non-finite angle")]
    IndeterminateFlowSign { line: LineId },

    #[error("Data validation: {0}")]
    DataValidation(String),

    #[error("{entity} references unknown bus {bus}")]
    UnknownBus { entity: String, bus: usize },

    #[error(transparent)]
    Lp(#[from] LpError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl OpfError {
    pub fn is_convergence(&self) -> bool {
        matches!(self, OpfError::Convergence { .. })
    }

    pub fn is_optimization(&self) -> bool {
        matches!(self, OpfError::Optimization { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_distinct() {
        let conv = OpfError::Convergence {
            iterations: 2,
            last_diff: 5e-3,
        };
        let opt = OpfError::Optimization {
            iteration: 1,
            status: LpStatus::Infeasible,
        };
        assert!(conv.is_convergence() && !conv.is_optimization());
        assert!(opt.is_optimization() && !opt.is_convergence());
        assert_eq!(
            opt.to_string(),
            "LP solve failed at iteration 1 with status Infeasible"
        );
        assert!(conv.to_string().contains("after 2 iterations"));
    }

    #[test]
    fn test_zero_reactance_names_line() {
        let err = OpfError::ZeroReactance {
            line: LineId::new(4),
        };
        assert_eq!(err.to_string(), "Line 4 has zero reactance");
    }
}
