//! Nodal admittance (Y-bus) matrix.
//!
//! Each in-service line contributes its 2×2 element matrix
//! ```text
//! no tap:    [ y + jb    -y     ]      tap a:  [ y/|a|² + jb   -y/conj(a) ]
//!            [  -y     y + jb   ]              [   -y/a         y + jb    ]
//! ```
//! with `y = 1 / (r + jx)` and `jb` the line charging term. Contributions are
//! accumulated in triplet form and compressed to CSR.

use crate::{BusId, CoreError, CoreResult, Network};
use num_complex::Complex64;
use sprs::{CsMat, TriMat};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct AdmittanceMatrix {
    matrix: CsMat<Complex64>,
    bus_index: HashMap<BusId, usize>,
    buses: Vec<BusId>,
}

impl AdmittanceMatrix {
    pub fn from_network(network: &Network) -> CoreResult<Self> {
        let buses: Vec<BusId> = network.buses().iter().map(|b| b.id).collect();
        if buses.is_empty() {
            return Err(CoreError::Network("network has no buses".to_string()));
        }
        let bus_index: HashMap<BusId, usize> =
            buses.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let n = buses.len();
        let mut triplets = TriMat::new((n, n));

        for line in network.in_service_lines() {
            let lookup = |bus: BusId| {
                bus_index.get(&bus).copied().ok_or_else(|| CoreError::UnknownBus {
                    entity: line.name.clone(),
                    bus: bus.value(),
                })
            };
            let f = lookup(line.from_bus)?;
            let t = lookup(line.to_bus)?;

            let z = Complex64::new(line.resistance, line.reactance);
            if z.norm() < 1e-12 {
                return Err(CoreError::ZeroImpedance(line.name.clone()));
            }
            let y = z.inv();
            let jb = Complex64::new(0.0, line.charging_b.value());

            let (y_ff, y_ft, y_tf) = match line.tap_ratio {
                Some(ratio) => {
                    let a = Complex64::new(ratio, 0.0);
                    (y / a.norm_sqr() + jb, -y / a.conj(), -y / a)
                }
                None => (y + jb, -y, -y),
            };
            let y_tt = y + jb;

            triplets.add_triplet(f, f, y_ff);
            triplets.add_triplet(f, t, y_ft);
            triplets.add_triplet(t, f, y_tf);
            triplets.add_triplet(t, t, y_tt);
        }

        Ok(Self {
            matrix: triplets.to_csr(),
            bus_index,
            buses,
        })
    }

    pub fn n_bus(&self) -> usize {
        self.buses.len()
    }

    pub fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    /// Entry for a pair of buses; zero when either is unknown or unconnected.
    pub fn get(&self, row: BusId, col: BusId) -> Complex64 {
        match (self.bus_index.get(&row), self.bus_index.get(&col)) {
            (Some(&i), Some(&j)) => self.matrix.get(i, j).copied().unwrap_or_default(),
            _ => Complex64::default(),
        }
    }

    pub fn bus_ids(&self) -> &[BusId] {
        &self.buses
    }

    pub fn matrix(&self) -> &CsMat<Complex64> {
        &self.matrix
    }
}

impl Network {
    /// Aggregate nodal admittance matrix of the in-service topology.
    pub fn admittance_matrix(&self) -> CoreResult<AdmittanceMatrix> {
        AdmittanceMatrix::from_network(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bus, Line, LineId};

    fn pair(line: Line) -> Network {
        let mut net = Network::new();
        net.add_bus(Bus::slack(BusId::new(1), "1")).unwrap();
        net.add_bus(Bus::new(BusId::new(2), "2")).unwrap();
        net.add_line(line).unwrap();
        net
    }

    fn close(a: Complex64, b: Complex64) -> bool {
        (a - b).norm() < 1e-12
    }

    #[test]
    fn test_plain_line_entries() {
        let net = pair(
            Line::new(LineId::new(1), "L", BusId::new(1), BusId::new(2), 0.0, 0.5).with_charging(0.1),
        );
        let y = net.admittance_matrix().unwrap();
        let (b1, b2) = (BusId::new(1), BusId::new(2));

        // y = 1/(j0.5) = -j2
        assert!(close(y.get(b1, b2), Complex64::new(0.0, 2.0)));
        assert!(close(y.get(b2, b1), Complex64::new(0.0, 2.0)));
        assert!(close(y.get(b1, b1), Complex64::new(0.0, -1.9)));
        assert!(close(y.get(b2, b2), Complex64::new(0.0, -1.9)));
        assert_eq!(y.nnz(), 4);
    }

    #[test]
    fn test_tap_scales_from_side() {
        let net = pair(
            Line::new(LineId::new(1), "T", BusId::new(1), BusId::new(2), 0.0, 0.5).with_tap(2.0),
        );
        let y = net.admittance_matrix().unwrap();
        let (b1, b2) = (BusId::new(1), BusId::new(2));

        assert!(close(y.get(b1, b1), Complex64::new(0.0, -0.5)));
        assert!(close(y.get(b1, b2), Complex64::new(0.0, 1.0)));
        assert!(close(y.get(b2, b1), Complex64::new(0.0, 1.0)));
        assert!(close(y.get(b2, b2), Complex64::new(0.0, -2.0)));
    }

    #[test]
    fn test_parallel_lines_accumulate() {
        let mut net = pair(Line::new(LineId::new(1), "A", BusId::new(1), BusId::new(2), 0.0, 1.0));
        net.add_line(Line::new(LineId::new(2), "B", BusId::new(1), BusId::new(2), 0.0, 1.0))
            .unwrap();
        let y = net.admittance_matrix().unwrap();
        assert!(close(y.get(BusId::new(1), BusId::new(1)), Complex64::new(0.0, -2.0)));
    }

    #[test]
    fn test_zero_impedance_is_an_error() {
        let net = pair(Line::new(LineId::new(1), "Z", BusId::new(1), BusId::new(2), 0.0, 0.0));
        assert!(matches!(
            net.admittance_matrix(),
            Err(CoreError::ZeroImpedance(name)) if name == "Z"
        ));
    }
}
