//! Loss iteration tests on the benchmark systems

use lossopf_algo::lp::{ClarabelLp, LpStatus};
use lossopf_algo::opf::{LossOpf, LossOpfConfig, LossOpfOutcome, LossState};
use lossopf_algo::OpfError;
use lossopf_core::{cases, Bus, BusId, Gen, GenId, Line, LineId, Load, LoadId, Megawatts, Network};
use std::sync::Arc;

fn driver(config: LossOpfConfig) -> LossOpf {
    LossOpf::with_solver(config, Arc::new(ClarabelLp))
}

/// Two buses joined by a lossy line (r = 1.0, x = 0.5) carrying 50 MW.
/// First-pass loss is 0.05 pu and the estimate moves by ~5e-3 pu on the
/// second pass.
fn lossy_two_bus() -> Network {
    let mut net = Network::new();
    net.add_bus(Bus::slack(BusId::new(1), "Bus 1")).unwrap();
    net.add_bus(Bus::new(BusId::new(2), "Bus 2")).unwrap();
    net.add_line(Line::new(LineId::new(1), "L1-2", BusId::new(1), BusId::new(2), 1.0, 0.5))
        .unwrap();
    net.add_gen(Gen::thermal(GenId::new(1), "G1", BusId::new(1), 10.0).with_p_limits(0.0, 500.0))
        .unwrap();
    net.add_load(
        Load::new(LoadId::new(1), "D2", BusId::new(2), Megawatts(50.0)).with_shed_cost(5000.0),
    )
    .unwrap();
    net
}

/// Per-bus residual of `gen + shed − demand − loss + flow_in − flow_out` in pu.
fn max_bus_residual(net: &Network, outcome: &LossOpfOutcome) -> f64 {
    let base = net.base_mva;
    let vars = &outcome.model.vars;
    let value = |v| outcome.solution.value(v);
    net.buses()
        .iter()
        .map(|bus| {
            let mut r = -outcome.applied_losses.bus(bus.id);
            for g in net.generators_at_bus(bus.id) {
                r += vars.gen.get(&g.id).map(|v| value(*v)).unwrap_or(0.0);
                r += vars.discharge.get(&g.id).map(|v| value(*v)).unwrap_or(0.0);
                r -= vars.charge.get(&g.id).map(|v| value(*v)).unwrap_or(0.0);
            }
            for l in net.loads_at_bus(bus.id) {
                r += value(vars.shed[&l.id]) - l.demand.to_per_unit(base).value();
            }
            for line in net.in_service_lines() {
                let f = value(vars.flow[&line.id]);
                if line.to_bus == bus.id {
                    r += f;
                }
                if line.from_bus == bus.id {
                    r -= f;
                }
            }
            r.abs()
        })
        .fold(0.0, f64::max)
}

#[test]
fn three_bus_converges_with_exact_slack_angle() {
    let net = cases::three_bus();
    let outcome = driver(LossOpfConfig::default())
        .solve_loss(&net)
        .expect("three-bus loss OPF should converge");

    assert!(outcome.iterations <= 100);
    let slack = outcome.model.vars.theta[&BusId::new(1)];
    assert_eq!(outcome.solution.value(slack), 0.0);

    let report = outcome.report(&net).expect("optimal solution has a report");
    let served = report.served_load_mw();
    assert!(
        (served - (10.0 - report.shedding.total_mw)).abs() < 1e-9,
        "served load {} should be 10 MW minus shed",
        served
    );
    assert!(report.shedding.total_mw < 1e-6, "no shedding expected");
}

#[test]
fn three_bus_first_pass_matches_lossless_dispatch() {
    let net = cases::three_bus();
    let outcome = driver(LossOpfConfig::default()).solve_loss(&net).unwrap();

    // Lossless pass: line 1-2 binds at 0.02 pu, G1 ≈ 6.67 MW, G2 ≈ 3.33 MW
    let first = outcome.history[0];
    assert!((first.objective - 133.333).abs() < 0.1, "got {}", first.objective);

    let g1 = outcome.solution.value(outcome.model.vars.gen[&GenId::new(1)]) * 100.0;
    let f12 = outcome.solution.value(outcome.model.vars.flow[&LineId::new(1)]);
    assert!(g1 > 6.6 && g1 < 6.8, "G1 output {} MW", g1);
    assert!((f12 - 0.02).abs() < 1e-6, "line 1-2 should sit at its limit");
}

#[test]
fn loss_differences_shrink_each_iteration() {
    for net in [cases::three_bus(), cases::six_bus()] {
        let outcome = driver(LossOpfConfig::default()).solve_loss(&net).unwrap();
        assert!(outcome.history.len() >= 2);
        for pair in outcome.history.windows(2) {
            assert!(
                pair[1].loss_diff < pair[0].loss_diff,
                "diff went from {} to {}",
                pair[0].loss_diff,
                pair[1].loss_diff
            );
        }
    }
}

#[test]
fn power_is_conserved_at_every_bus() {
    for net in [cases::three_bus(), cases::six_bus(), cases::six_bus_wind_battery()] {
        let outcome = driver(LossOpfConfig::default()).solve_loss(&net).unwrap();
        let residual = max_bus_residual(&net, &outcome);
        assert!(residual < 1e-6, "bus residual {}", residual);
    }
}

#[test]
fn losses_are_non_negative_and_split_exactly() {
    let net = cases::six_bus();
    let outcome = driver(LossOpfConfig::default()).solve_loss(&net).unwrap();
    assert!(outcome.history.iter().all(|r| r.total_loss >= 0.0));
    for state in [&outcome.losses, &outcome.applied_losses] {
        assert!(state.line_loss.values().all(|l| *l >= 0.0));
        assert!((state.total() - state.bus_total()).abs() < 1e-12);
    }
}

#[test]
fn warm_start_from_converged_losses_takes_one_iteration() {
    let net = cases::three_bus();
    let opf = driver(LossOpfConfig::default());
    let first = opf.solve_loss(&net).unwrap();
    let again = opf.solve_loss_from(&net, first.losses.clone()).unwrap();

    assert_eq!(again.iterations, 1);
    assert!(again.history[0].loss_diff < 1e-6);
    assert!((again.objective() - first.objective()).abs() < 1e-4);
}

#[test]
fn repeated_runs_are_reproducible() {
    let net = cases::three_bus();
    let opf = driver(LossOpfConfig::default());
    let a = opf.solve_loss(&net).unwrap();
    let b = opf.solve_loss(&net).unwrap();
    assert_eq!(a.iterations, b.iterations);
    assert_eq!(a.objective().to_bits(), b.objective().to_bits());
}

#[test]
fn zero_reactance_fails_before_solving() {
    let mut net = cases::three_bus();
    net.line_mut(LineId::new(2)).unwrap().reactance = 0.0;
    let err = driver(LossOpfConfig::default()).solve_loss(&net).unwrap_err();
    assert!(matches!(err, OpfError::ZeroReactance { line } if line == LineId::new(2)));
}

#[test]
fn negative_resistance_fails_before_solving() {
    let mut net = cases::three_bus();
    net.line_mut(LineId::new(2)).unwrap().resistance = -0.15;
    assert!(net.validate().is_err());
    let err = driver(LossOpfConfig::default()).solve_loss(&net).unwrap_err();
    assert!(matches!(
        err,
        OpfError::InvalidImpedance { line, resistance, .. }
            if line == LineId::new(2) && resistance == -0.15
    ));

    net.line_mut(LineId::new(2)).unwrap().resistance = f64::INFINITY;
    let err = driver(LossOpfConfig::default()).solve_loss(&net).unwrap_err();
    assert!(matches!(err, OpfError::InvalidImpedance { .. }));
}

/// 150 MW over a line with r = x = 1.0 pu. The flow needed to cover the
/// load plus half the loss, `P = 1.5 + P²/4`, has no real root, so each
/// pass grows the loss estimate instead of settling it.
fn runaway_loss_two_bus() -> Network {
    let mut net = Network::new();
    net.add_bus(Bus::slack(BusId::new(1), "Bus 1")).unwrap();
    net.add_bus(Bus::new(BusId::new(2), "Bus 2")).unwrap();
    net.add_line(Line::new(LineId::new(1), "L1-2", BusId::new(1), BusId::new(2), 1.0, 1.0))
        .unwrap();
    net.add_gen(Gen::thermal(GenId::new(1), "G1", BusId::new(1), 10.0).with_p_limits(0.0, 2000.0))
        .unwrap();
    net.add_load(
        Load::new(LoadId::new(1), "D2", BusId::new(2), Megawatts(150.0)).with_shed_cost(5000.0),
    )
    .unwrap();
    net
}

#[test]
fn runaway_losses_surface_as_catchable_convergence_error() {
    let net = runaway_loss_two_bus();
    let err = driver(LossOpfConfig::default().with_max_iterations(2))
        .solve_loss(&net)
        .unwrap_err();
    assert!(err.is_convergence(), "got {err}");
    if let OpfError::Convergence { last_diff, .. } = err {
        // 1.125 pu on the first pass, about 2.13 pu on the second
        assert!(last_diff > 0.5, "last diff {}", last_diff);
    }
}

#[test]
fn iteration_cap_raises_convergence_error() {
    let net = lossy_two_bus();
    let err = driver(LossOpfConfig::default().with_max_iterations(2))
        .solve_loss(&net)
        .unwrap_err();
    match err {
        OpfError::Convergence { iterations, last_diff } => {
            assert_eq!(iterations, 2);
            assert!(last_diff > 1e-3, "last diff {}", last_diff);
        }
        other => panic!("expected a convergence error, got {other}"),
    }

    let outcome = driver(LossOpfConfig::default()).solve_loss(&net).unwrap();
    assert!(outcome.iterations > 2);
    assert!(outcome.losses.total() > 0.05);
}

#[test]
fn infeasible_dispatch_raises_optimization_error() {
    let mut net = cases::three_bus();
    for gen in net.generators_mut() {
        gen.pmin = Megawatts(50.0);
    }
    let err = driver(LossOpfConfig::default()).solve_loss(&net).unwrap_err();
    assert!(matches!(
        err,
        OpfError::Optimization {
            iteration: 1,
            status: LpStatus::Infeasible
        }
    ));
}

#[test]
fn zero_state_and_cold_start_agree() {
    let net = cases::three_bus();
    let opf = driver(LossOpfConfig::default());
    let cold = opf.solve_loss(&net).unwrap();
    let explicit = opf.solve_loss_from(&net, LossState::zero(&net)).unwrap();
    assert_eq!(cold.iterations, explicit.iterations);
}

#[cfg(feature = "solver-clarabel")]
#[test]
fn good_lp_backend_reaches_the_same_dispatch() {
    use lossopf_algo::lp::LpBackend;

    let net = cases::three_bus();
    let reference = driver(LossOpfConfig::default()).solve_loss(&net).unwrap();
    let outcome = LossOpf::new(LossOpfConfig::default().with_backend(LpBackend::GoodLp))
        .unwrap()
        .solve_loss(&net)
        .unwrap();
    assert!((outcome.objective() - reference.objective()).abs() < 1e-3);

    let report = outcome.report(&net).unwrap();
    assert!(report.dual_results.lmp_usd_mwh.values().all(Option::is_none));
}
