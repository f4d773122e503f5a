//! Scenario sweep tests

use lossopf_algo::lp::ClarabelLp;
use lossopf_algo::opf::{LossOpf, LossOpfConfig};
use lossopf_algo::scenarios::{combine, contingency_scenarios, load_scenarios, wind_scenarios, DEFAULT_SEED};
use lossopf_algo::sweep::run_sweep_with;
use lossopf_algo::{run_sweep, Scenario, ScenarioStatus, SweepConfig};
use lossopf_core::{cases, LineId};
use std::sync::Arc;

fn driver(config: LossOpfConfig) -> LossOpf {
    LossOpf::with_solver(config, Arc::new(ClarabelLp))
}

#[test]
fn n_minus_one_sweep_solves_every_contingency() {
    let net = cases::six_bus();
    let scenarios = contingency_scenarios(&net);
    let summary = run_sweep_with(&driver(LossOpfConfig::default()), &net, &scenarios, 2).unwrap();

    assert_eq!(summary.results.len(), 8);
    assert_eq!(summary.solved, 8);
    for (i, r) in summary.results.iter().enumerate() {
        assert_eq!(r.index, i);
        assert_eq!(r.id, scenarios[i].id);
    }
    assert!(summary.mean_cost.unwrap() > 0.0);
}

#[test]
fn failed_and_skipped_scenarios_stay_out_of_aggregates() {
    let net = cases::three_bus();
    let scenarios = vec![
        Scenario::base(),
        Scenario::new("ghost-line").with_outage(LineId::new(42)),
    ];
    let summary = run_sweep_with(&driver(LossOpfConfig::default()), &net, &scenarios, 1).unwrap();
    assert_eq!((summary.solved, summary.failed), (1, 1));
    let ScenarioStatus::Solved { cost, .. } = summary.results[0].status else {
        panic!("base scenario should solve");
    };
    assert_eq!(summary.mean_cost, Some(cost));
    assert!(matches!(summary.results[1].status, ScenarioStatus::Failed { .. }));

    // a single pass can never meet the tolerance on a lossy network
    let capped = driver(LossOpfConfig::default().with_max_iterations(1));
    let summary = run_sweep_with(&capped, &net, &[Scenario::base()], 1).unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.mean_cost, None);
}

#[test]
fn sweep_is_deterministic_across_thread_counts() {
    let net = cases::six_bus_wind_battery();
    let scenarios = combine(&[
        wind_scenarios(&net, 3, DEFAULT_SEED),
        load_scenarios(&net, 2, DEFAULT_SEED),
    ]);
    assert_eq!(scenarios.len(), 6);

    let config = SweepConfig {
        threads: 1,
        ..SweepConfig::default()
    };
    let serial = run_sweep(&net, &scenarios, &config).unwrap();
    let parallel = run_sweep(&net, &scenarios, &SweepConfig { threads: 4, ..config }).unwrap();
    for (a, b) in serial.results.iter().zip(&parallel.results) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.status, b.status);
    }
}

#[test]
fn summary_exports_to_csv() {
    let net = cases::three_bus();
    let scenarios = load_scenarios(&net, 3, DEFAULT_SEED);
    let summary = run_sweep_with(&driver(LossOpfConfig::default()), &net, &scenarios, 0).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sweep.csv");
    summary.to_csv(&path).unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers[0], "index");
    assert_eq!(&headers[2], "status");
    let rows: Vec<_> = reader.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| &r[2] == "solved"));
}
