//! Multi-period dispatch tests

use lossopf_algo::lp::ClarabelLp;
use lossopf_algo::opf::{solve_multiperiod_with, LossOpf, LossOpfConfig, MultiPeriodStudy};
use lossopf_algo::OpfError;
use lossopf_core::{cases, GenId, LoadId, MegawattHours, Megawatts};
use std::sync::Arc;

fn driver() -> LossOpf {
    LossOpf::with_solver(LossOpfConfig::default(), Arc::new(ClarabelLp))
}

#[test]
fn storage_dynamics_hold_between_periods() {
    let net = cases::six_bus_wind_battery();
    let study = MultiPeriodStudy::from_multipliers(&net, 4, &[0.6, 1.0, 0.8, 0.9], &[0.2, 0.5, 1.0, 0.1])
        .unwrap()
        .with_initial_soc(GenId::new(7), MegawattHours(10.0));
    let outcome = solve_multiperiod_with(&driver(), &net, &study).unwrap();
    assert_eq!(outcome.periods.len(), 4);

    let battery = GenId::new(7);
    let mut soc = 10.0;
    for period in &outcome.periods {
        let dispatch = &period.battery[&battery];
        soc += dispatch.charge_mw * 0.95 - dispatch.discharge_mw / 0.95;
        let reported = period.battery_soc_mwh[&battery];
        assert!(
            (reported - soc).abs() < 1e-5,
            "period {}: soc {} vs {}",
            period.period,
            reported,
            soc
        );
        assert!(reported > -1e-6 && reported < 20.0 + 1e-6);
    }
}

#[test]
fn thermal_ramps_are_respected() {
    let net = cases::six_bus();
    let study = MultiPeriodStudy::from_multipliers(&net, 3, &[0.3, 1.0, 0.3], &[]).unwrap();
    let outcome = solve_multiperiod_with(&driver(), &net, &study).unwrap();

    for (id, ramp) in [(1, 25.0), (2, 35.0), (3, 30.0)] {
        let gen = GenId::new(id);
        for pair in outcome.periods.windows(2) {
            let step = pair[1].generation_mw[&gen] - pair[0].generation_mw[&gen];
            assert!(step.abs() <= ramp + 1e-5, "G{id} ramped {} MW", step);
        }
    }
}

#[test]
fn per_period_losses_sum_to_total() {
    let net = cases::six_bus();
    let outcome = solve_multiperiod_with(&driver(), &net, &MultiPeriodStudy::new(2)).unwrap();
    let summed: f64 = outcome.periods.iter().map(|p| p.total_loss_mw).sum();
    assert!((summed - outcome.total_loss_mw).abs() < 1e-12);
    // identical periods see identical losses
    let diff = outcome.periods[0].total_loss_mw - outcome.periods[1].total_loss_mw;
    assert!(diff.abs() < 1e-5);
    assert!(outcome.periods[0].lmp.values().all(Option::is_some));
}

#[test]
fn mismatched_series_is_rejected() {
    let net = cases::six_bus();
    let study = MultiPeriodStudy::new(3).with_load_series(LoadId::new(2), vec![Megawatts(40.0); 2]);
    let err = solve_multiperiod_with(&driver(), &net, &study).unwrap_err();
    assert!(matches!(err, OpfError::DataValidation(_)));
}
