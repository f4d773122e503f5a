//! Quadratic DC loss estimate.
//!
//! With voltage magnitudes held at 1.0 pu, the active loss on a line is
//! approximated by `g·(θf − θt)²` where `g = r / (r² + x²)`. Each line loss
//! is split in half between its endpoint buses.

use crate::OpfError;
use lossopf_core::{BusId, LineId, Network};
use serde::Serialize;
use std::collections::BTreeMap;

/// Direction of a line flow implied by its endpoint angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FlowSign {
    /// θ_from > θ_to
    Forward,
    Reverse,
    #[default]
    Zero,
}

impl FlowSign {
    pub fn from_angles(line: LineId, theta_from: f64, theta_to: f64) -> Result<Self, OpfError> {
        if theta_from > theta_to {
            Ok(FlowSign::Forward)
        } else if theta_from < theta_to {
            Ok(FlowSign::Reverse)
        } else if theta_from == theta_to {
            Ok(FlowSign::Zero)
        } else {
            Err(OpfError::IndeterminateFlowSign { line })
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            FlowSign::Forward => 1.0,
            FlowSign::Reverse => -1.0,
            FlowSign::Zero => 0.0,
        }
    }
}

/// Loss memory carried between loop iterations (per-unit).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LossState {
    pub bus_loss: BTreeMap<BusId, f64>,
    pub line_loss: BTreeMap<LineId, f64>,
    pub flow_sign: BTreeMap<LineId, FlowSign>,
}

impl LossState {
    /// Zero loss on every bus and in-service line.
    pub fn zero(network: &Network) -> Self {
        let mut state = LossState::default();
        for bus in network.buses() {
            state.bus_loss.insert(bus.id, 0.0);
        }
        for line in network.in_service_lines() {
            state.line_loss.insert(line.id, 0.0);
            state.flow_sign.insert(line.id, FlowSign::Zero);
        }
        state
    }

    /// Total system loss, summed over lines.
    pub fn total(&self) -> f64 {
        self.line_loss.values().sum()
    }

    /// Total of the bus allocations; equals [`LossState::total`] up to rounding.
    pub fn bus_total(&self) -> f64 {
        self.bus_loss.values().sum()
    }

    pub fn bus(&self, id: BusId) -> f64 {
        self.bus_loss.get(&id).copied().unwrap_or(0.0)
    }

    pub fn line(&self, id: LineId) -> f64 {
        self.line_loss.get(&id).copied().unwrap_or(0.0)
    }

    pub fn sign(&self, id: LineId) -> FlowSign {
        self.flow_sign.get(&id).copied().unwrap_or_default()
    }

    /// Losses are non-negative and the bus allocation matches the line total.
    pub fn is_consistent(&self, tol: f64) -> bool {
        self.line_loss.values().all(|l| *l >= 0.0)
            && self.bus_loss.values().all(|l| *l >= 0.0)
            && (self.total() - self.bus_total()).abs() <= tol
    }
}

/// Estimate losses from a bus-angle assignment in radians.
pub fn estimate_losses<F>(network: &Network, theta: F) -> Result<LossState, OpfError>
where
    F: Fn(BusId) -> f64,
{
    let mut state = LossState::default();
    for bus in network.buses() {
        state.bus_loss.insert(bus.id, 0.0);
    }

    for line in network.in_service_lines() {
        let theta_from = theta(line.from_bus);
        let theta_to = theta(line.to_bus);
        let sign = FlowSign::from_angles(line.id, theta_from, theta_to)?;

        let loss = line.series_conductance() * (theta_from - theta_to).powi(2);
        let half = loss / 2.0;
        *state.bus_loss.entry(line.from_bus).or_insert(0.0) += half;
        *state.bus_loss.entry(line.to_bus).or_insert(0.0) += half;
        state.line_loss.insert(line.id, loss);
        state.flow_sign.insert(line.id, sign);
    }

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lossopf_core::cases;
    use std::collections::HashMap;

    #[test]
    fn test_flow_sign_totality() {
        let id = LineId::new(1);
        assert_eq!(FlowSign::from_angles(id, 0.1, 0.0).unwrap(), FlowSign::Forward);
        assert_eq!(FlowSign::from_angles(id, -0.1, 0.0).unwrap(), FlowSign::Reverse);
        assert_eq!(FlowSign::from_angles(id, 0.0, 0.0).unwrap(), FlowSign::Zero);
        assert!(matches!(
            FlowSign::from_angles(id, f64::NAN, 0.0),
            Err(OpfError::IndeterminateFlowSign { line }) if line == id
        ));
    }

    #[test]
    fn test_three_bus_losses_split_in_half() {
        let net = cases::three_bus();
        let angles: HashMap<BusId, f64> = [(1, 0.0), (2, -0.02), (3, -0.05)]
            .into_iter()
            .map(|(b, t)| (BusId::new(b), t))
            .collect();
        let state = estimate_losses(&net, |b| angles[&b]).unwrap();

        // line 1-2: g = 0.1 / 1.01
        let expected = 0.1 / 1.01 * 0.02f64.powi(2);
        assert!((state.line(LineId::new(1)) - expected).abs() < 1e-15);
        assert_eq!(state.sign(LineId::new(1)), FlowSign::Forward);
        assert_eq!(state.sign(LineId::new(3)), FlowSign::Forward);
        assert!(state.is_consistent(1e-15));

        let line_total = state.total();
        let at_bus_1 = (state.line(LineId::new(1)) + state.line(LineId::new(2))) / 2.0;
        assert!((state.bus(BusId::new(1)) - at_bus_1).abs() < 1e-15);
        assert!(line_total > 0.0);
    }

    #[test]
    fn test_zero_state_covers_network() {
        let net = cases::six_bus();
        let state = LossState::zero(&net);
        assert_eq!(state.bus_loss.len(), 6);
        assert_eq!(state.line_loss.len(), 8);
        assert_eq!(state.total(), 0.0);
        assert!(state.is_consistent(0.0));
    }

    #[test]
    fn test_out_of_service_line_carries_no_loss() {
        let mut net = cases::three_bus();
        net.line_mut(LineId::new(3)).unwrap().in_service = false;
        let state = estimate_losses(&net, |b| -0.01 * b.value() as f64).unwrap();
        assert!(!state.line_loss.contains_key(&LineId::new(3)));
        assert_eq!(state.line(LineId::new(3)), 0.0);
    }
}
