//! Net1-style single-pipe network, DD mode, 24h at a 1h hydraulic
//! timestep. Flat demand and no tanks means the converged solution is
//! identical at every reporting step, so the expected values below are
//! the closed-form Hazen-Williams solution, not a fitted approximation.

use std::io::Write;
use std::path::Path;

use hydro_app::{query, run_service};
use run_service::{RunOptions, RunRequest};

const NET1: &str = "\
[TITLE]
single reservoir feeding one junction, flat 24h demand

[JUNCTIONS]
J1 10.0 20

[RESERVOIRS]
R1 100.0

[PIPES]
P1 R1 J1 1000 0.3 130 0 OPEN

[TIMES]
DURATION 24:00
HYDRAULIC TIMESTEP 1:00

[OPTIONS]
UNITS LPS
HEADLOSS H-W

[END]
";

fn write_inp(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(text.as_bytes()).unwrap();
    path
}

#[test]
fn net1_dd_24h_matches_closed_form_hazen_williams() {
    let dir = std::env::temp_dir().join(format!("hydro-app-test-net1-{}", std::process::id()));
    let inp_path = write_inp(&dir, "net1.inp", NET1);

    let request = RunRequest {
        inp_path: &inp_path,
        options: RunOptions {
            use_cache: false,
            ..RunOptions::default()
        },
    };
    let response = run_service::run(&request, None).unwrap();
    assert_eq!(response.results.records.len(), 25);

    // r = 10.667 * C^-1.852 * D^-4.871 * L; h_loss = r * q^1.852 at q=0.02.
    let expected_head = 99.67381113856264;
    let expected_pressure = 89.67381113856264;
    let expected_flow = 0.02;
    let expected_demand = 0.02;

    let heads = query::extract_node_series(&response.results, "J1", "head").unwrap();
    let pressures = query::extract_node_series(&response.results, "J1", "pressure").unwrap();
    let demands = query::extract_node_series(&response.results, "J1", "actual_demand").unwrap();
    let flows = query::extract_link_series(&response.results, "P1", "flow").unwrap();

    assert_eq!(heads.len(), 25);
    for (t_s, head) in &heads {
        assert!(
            (head - expected_head).abs() < 1e-4,
            "head at t={t_s} was {head}, expected {expected_head}"
        );
    }
    for (t_s, pressure) in &pressures {
        assert!(
            (pressure - expected_pressure).abs() < 1e-4,
            "pressure at t={t_s} was {pressure}, expected {expected_pressure}"
        );
    }
    for (t_s, demand) in &demands {
        assert!(
            (demand - expected_demand).abs() < 1e-4,
            "demand at t={t_s} was {demand}, expected {expected_demand}"
        );
    }
    for (t_s, flow) in &flows {
        assert!(
            (flow - expected_flow).abs() < 1e-4,
            "flow at t={t_s} was {flow}, expected {expected_flow}"
        );
    }

    std::fs::remove_dir_all(&dir).ok();
}
