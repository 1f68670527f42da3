//! Net3-style PDD scenario: a single pump feeding a pressure-driven
//! junction goes through a scheduled outage window. `ReconcilerConfig`'s
//! `pump_outages` isn't reachable through `run_service::run`, so this
//! drives `hydro-eps` directly -- the same path a caller with richer
//! scenario needs would use.
//!
//! During the outage the pump becomes a zero-loss bypass (no head gain),
//! so the junction's delivered fraction collapses to whatever the bare
//! reservoir head supports under the PDD law; outside it, the pump lifts
//! the junction deep into the fully-served pressure range.

use hydro_eps::{run_eps, EpsOptions};
use hydro_network::{LinkKind, NetworkBuilder, PumpMode, PipeStatus};
use hydro_reconciler::{PumpOutage, ReconcilerConfig};
use hydro_solver::DemandMode;

#[test]
fn demand_met_fraction_collapses_during_pump_outage() {
    let mut b = NetworkBuilder::new();
    let r1 = b.add_reservoir("R1", 0.7, None);
    let j1 = b.add_junction("J1", 0.0, 0.03, None, 0.0, 30.0);
    let curve = b.add_curve(vec![(0.03, 100.0)]);
    let pmp1 = b
        .add_pump(
            "PMP1",
            r1,
            j1,
            LinkKind::Pump {
                mode: PumpMode::Head,
                curve: Some(curve),
                power_w: None,
                base_status: PipeStatus::Open,
            },
        )
        .unwrap();
    let net = b.build().unwrap();

    let config = ReconcilerConfig {
        pump_outages: vec![PumpOutage {
            link: pmp1,
            start_s: 7_200.0,
            end_s: 64_800.0,
        }],
        ..ReconcilerConfig::default()
    };
    let opts = EpsOptions {
        dt_s: 3_600.0,
        duration_s: 86_400.0,
        mode: DemandMode::Pdd,
    };
    let record = run_eps(&net, &config, &opts).unwrap();
    assert_eq!(record.steps.len(), 25);

    let d_required = 0.03;
    let mut outage_fractions = Vec::new();
    for step in &record.steps {
        let demand = step.node_aux[&j1];
        let fraction = demand / d_required;
        if step.t_s >= 7_200.0 && step.t_s <= 64_800.0 {
            // Bypassed pump pins J1's head to R1's head (0.7 m) exactly,
            // so the PDD law's central-region closed form applies:
            // demand = d_required * sqrt((p - p0) / (pf - p0)).
            let expected = d_required * (0.7_f64 / 30.0).sqrt();
            assert!(
                (demand - expected).abs() < 1e-4,
                "t={}: demand {demand}, expected {expected}",
                step.t_s
            );
            outage_fractions.push(fraction);
        } else {
            assert!(
                fraction > 0.95,
                "t={}: expected near-full delivery outside the outage, got fraction {fraction}",
                step.t_s
            );
        }
    }

    assert_eq!(outage_fractions.len(), 17);
    let avg = outage_fractions.iter().sum::<f64>() / outage_fractions.len() as f64;
    assert!(
        (0.10..=0.20).contains(&avg),
        "average fraction-of-demand-met during outage was {avg}, expected within [0.10, 0.20]"
    );
}
