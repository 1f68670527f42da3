//! Time-based control sanity: a pipe is closed and reopened at fixed
//! clock times, and the flow/isolation state must track the control
//! exactly at every reporting step.

use std::io::Write;
use std::path::Path;

use hydro_app::{query, run_service};
use run_service::{RunOptions, RunRequest};

const NET1_WITH_CONTROL: &str = "\
[TITLE]
single pipe closed for a window in the middle of the run

[JUNCTIONS]
J1 10.0 20

[RESERVOIRS]
R1 100.0

[PIPES]
P1 R1 J1 1000 0.3 130 0 OPEN

[CONTROLS]
LINK P1 CLOSED AT TIME 2:00
LINK P1 OPEN AT TIME 4:00

[TIMES]
DURATION 6:00
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
fn pipe_closes_and_reopens_on_schedule() {
    let dir = std::env::temp_dir().join(format!("hydro-app-test-timectl-{}", std::process::id()));
    let inp_path = write_inp(&dir, "net1_ctl.inp", NET1_WITH_CONTROL);

    let request = RunRequest {
        inp_path: &inp_path,
        options: RunOptions {
            use_cache: false,
            ..RunOptions::default()
        },
    };
    let response = run_service::run(&request, None).unwrap();
    assert_eq!(response.results.records.len(), 7);

    let flows = query::extract_link_series(&response.results, "P1", "flow").unwrap();
    let heads = query::extract_node_series(&response.results, "J1", "head").unwrap();
    let demands = query::extract_node_series(&response.results, "J1", "actual_demand").unwrap();

    let expected_open_flow = 0.02;
    let expected_open_head = 99.67381113856264;
    let closed_window = [7200.0, 10800.0];

    for ((t_s, flow), (_, head)) in flows.iter().zip(heads.iter()) {
        if closed_window.contains(t_s) {
            assert_eq!(*flow, 0.0, "flow at t={t_s} should be pinned to 0 while closed");
            assert!(
                (head - 10.0).abs() < 1e-9,
                "isolated junction head at t={t_s} should equal its elevation, got {head}"
            );
        } else {
            assert!(
                (flow - expected_open_flow).abs() < 1e-4,
                "flow at t={t_s} was {flow}, expected {expected_open_flow}"
            );
            assert!(
                (head - expected_open_head).abs() < 1e-4,
                "head at t={t_s} was {head}, expected {expected_open_head}"
            );
        }
    }

    for (t_s, demand) in &demands {
        if closed_window.contains(t_s) {
            assert_eq!(*demand, 0.0, "isolated junction should deliver no demand at t={t_s}");
        } else {
            assert!((demand - 0.02).abs() < 1e-4);
        }
    }

    std::fs::remove_dir_all(&dir).ok();
}
