//! Built-in benchmark systems.
//!
//! All three use a 100 MVA base. Line parameters are per-unit on that base.

use crate::{
    BatteryParams, Bus, BusId, CoreResult, Gen, GenId, Line, LineId, Load, LoadId, MegawattHours,
    Megawatts, Network,
};

type CaseBuilder = fn() -> Network;

/// Lookup table used by the CLI `--builtin` flag.
pub const BUILTIN: &[(&str, CaseBuilder)] = &[
    ("three-bus", three_bus),
    ("six-bus", six_bus),
    ("six-bus-wind-battery", six_bus_wind_battery),
];

pub fn builtin(name: &str) -> Option<Network> {
    BUILTIN
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, build)| build())
}

fn inserted<T>(result: CoreResult<T>) {
    debug_assert!(result.is_ok(), "built-in case: {:?}", result.err());
}

fn line(net: &mut Network, id: usize, from: usize, to: usize, r: f64, x: f64, flow_max: f64) {
    let line = Line::new(
        LineId::new(id),
        format!("L{from}-{to}"),
        BusId::new(from),
        BusId::new(to),
        r,
        x,
    )
    .with_flow_max(flow_max);
    inserted(net.add_line(line));
}

fn buses(net: &mut Network, count: usize) {
    for id in 1..=count {
        let bus = if id == 1 {
            Bus::slack(BusId::new(id), format!("Bus {id}"))
        } else {
            Bus::new(BusId::new(id), format!("Bus {id}"))
        };
        inserted(net.add_bus(bus));
    }
}

/// Three buses in a triangle, slack at bus 1.
///
/// Two thermal units (10 and 20 $/MWh, 15 pu each) and a 10 MW load at
/// bus 3 with a 400 $/MWh shedding cost. The 0.02 pu limit on line 1-2 binds
/// in the lossless dispatch.
pub fn three_bus() -> Network {
    let mut net = Network::new();
    buses(&mut net, 3);

    line(&mut net, 1, 1, 2, 0.10, 1.0, 0.02);
    line(&mut net, 2, 1, 3, 0.15, 1.0, 0.10);
    line(&mut net, 3, 2, 3, 0.05, 0.5, 0.10);

    let pmax_mw = 15.0 * net.base_mva.value();
    for (id, bus, cost) in [(1, 1, 10.0), (2, 2, 20.0)] {
        inserted(net.add_gen(
            Gen::thermal(GenId::new(id), format!("G{id}"), BusId::new(bus), cost)
                .with_p_limits(0.0, pmax_mw),
        ));
    }
    inserted(net.add_load(
        Load::new(LoadId::new(1), "D3", BusId::new(3), Megawatts(10.0)).with_shed_cost(400.0),
    ));
    net
}

fn six_bus_topology(net: &mut Network) {
    buses(net, 6);
    line(net, 1, 1, 2, 0.01, 0.10, 0.15);
    line(net, 2, 2, 3, 0.02, 0.17, 0.15);
    line(net, 3, 3, 4, 0.05, 0.10, 0.10);
    line(net, 4, 4, 5, 0.01, 0.15, 0.25);
    line(net, 5, 5, 6, 0.02, 0.18, 0.20);
    line(net, 6, 3, 6, 0.03, 0.13, 0.30);
    line(net, 7, 1, 5, 0.01, 0.14, 0.30);
    line(net, 8, 4, 2, 0.02, 0.12, 0.20);
}

fn six_bus_thermal_and_loads(net: &mut Network) {
    for (id, bus, cost, pmax) in [(1, 1, 10.0, 50.0), (2, 3, 20.0, 70.0), (3, 4, 30.0, 60.0)] {
        inserted(net.add_gen(
            Gen::thermal(GenId::new(id), format!("G{id}"), BusId::new(bus), cost)
                .with_p_limits(0.0, pmax)
                .with_ramp_limits(pmax / 2.0, pmax / 2.0),
        ));
    }
    for (id, bus, demand) in [(1, 2, 20.0), (2, 3, 40.0), (3, 4, 30.0), (4, 5, 30.0), (5, 6, 40.0)] {
        inserted(net.add_load(
            Load::new(LoadId::new(id), format!("D{bus}"), BusId::new(bus), Megawatts(demand))
                .with_shed_cost(400.0),
        ));
    }
}

/// Six buses and eight lines, thermal generation only (160 MW of load).
pub fn six_bus() -> Network {
    let mut net = Network::new();
    six_bus_topology(&mut net);
    six_bus_thermal_and_loads(&mut net);
    net
}

/// [`six_bus`] plus three wind farms and a 20 MWh battery at bus 2.
pub fn six_bus_wind_battery() -> Network {
    let mut net = six_bus();
    for (id, bus, available) in [(4, 1, 50.0), (5, 3, 70.0), (6, 4, 60.0)] {
        inserted(net.add_gen(Gen::wind(
            GenId::new(id),
            format!("W{id}"),
            BusId::new(bus),
            Megawatts(available),
        )));
    }
    let params = BatteryParams {
        capacity: MegawattHours(20.0),
        soc: MegawattHours(10.0),
        max_charge: Megawatts(5.0),
        max_discharge: Megawatts(5.0),
        cost_charge_per_mwh: 2.0,
        cost_discharge_per_mwh: 3.0,
        ..BatteryParams::default()
    };
    inserted(net.add_gen(Gen::battery(GenId::new(7), "B7", BusId::new(2), params)));
    net
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_cases_validate() {
        for (name, build) in BUILTIN {
            let net = build();
            assert!(net.validate().is_ok(), "{name} should validate");
        }
    }

    #[test]
    fn test_three_bus_shape() {
        let net = three_bus();
        let stats = net.stats();
        assert_eq!(stats.num_buses, 3);
        assert_eq!(stats.num_lines, 3);
        assert_eq!(stats.num_gens, 2);
        assert!((stats.total_load_mw - 10.0).abs() < 1e-12);
        assert!((net.generators()[0].pmax.value() - 1500.0).abs() < 1e-9);
    }

    #[test]
    fn test_six_bus_wind_battery_shape() {
        let stats = six_bus_wind_battery().stats();
        assert_eq!(stats.num_lines, 8);
        assert_eq!(stats.num_gens, 7);
        assert_eq!(stats.num_wind, 3);
        assert_eq!(stats.num_batteries, 1);
        assert!((stats.total_load_mw - 160.0).abs() < 1e-12);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "built-in case")]
    fn test_rejected_insert_is_not_silent() {
        let mut net = Network::new();
        buses(&mut net, 2);
        line(&mut net, 1, 1, 7, 0.01, 0.1, 1.0);
    }

    #[test]
    fn test_builtin_lookup() {
        assert!(builtin("six-bus").is_some());
        assert!(builtin("ieee-118").is_none());
    }
}
