use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};

use hydro_app::{
    project_service, query, run_service, AppResult, RunOptions, RunProgressEvent, RunRequest,
    RunStage,
};
use hydro_results::DemandMode;

#[derive(Parser)]
#[command(name = "hydro-cli")]
#[command(about = "Extended-period hydraulic network simulation tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate an INP file without running it.
    Validate {
        /// Path to the EPANET INP file.
        inp_file: PathBuf,
    },
    /// Run an extended-period simulation.
    Run {
        /// Path to the EPANET INP file.
        inp_file: PathBuf,
        /// Total simulated duration, seconds. Falls back to the INP
        /// file's `[TIMES] DURATION` if omitted.
        #[arg(long)]
        duration: Option<f64>,
        /// Hydraulic timestep, seconds. Falls back to the INP file's
        /// `[TIMES] HYDRAULIC TIMESTEP` if omitted.
        #[arg(long)]
        step: Option<f64>,
        /// Demand law: DD (demand-driven) or PDD (pressure-driven).
        #[arg(long, value_enum, default_value = "dd")]
        mode: CliMode,
        /// Directory to persist the run under (defaults next to the
        /// INP file's own cache directory).
        #[arg(long)]
        out: Option<PathBuf>,
        /// Re-run even if a cached run with the same content hash exists.
        #[arg(long)]
        no_cache: bool,
    },
    /// List cached runs for an INP file.
    Runs {
        /// Path to the EPANET INP file.
        inp_file: PathBuf,
    },
    /// Show a summary of a cached run.
    ShowRun {
        /// Path to the EPANET INP file.
        inp_file: PathBuf,
        /// Run ID to display.
        run_id: String,
    },
    /// Export a node or link variable's time series as CSV.
    ExportSeries {
        /// Path to the EPANET INP file.
        inp_file: PathBuf,
        /// Run ID.
        run_id: String,
        /// `node` or `link`.
        #[arg(long, value_enum)]
        kind: SeriesKind,
        /// Node or link name.
        entity: String,
        /// Variable name (head, pressure, required_demand, actual_demand
        /// for nodes; flow, velocity for links).
        variable: String,
        /// Output CSV file path; defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliMode {
    Dd,
    Pdd,
}

impl From<CliMode> for DemandMode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Dd => DemandMode::Dd,
            CliMode::Pdd => DemandMode::Pdd,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SeriesKind {
    Node,
    Link,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { inp_file } => cmd_validate(&inp_file),
        Commands::Run {
            inp_file,
            duration,
            step,
            mode,
            out,
            no_cache,
        } => cmd_run(&inp_file, duration, step, mode, out.as_deref(), no_cache),
        Commands::Runs { inp_file } => cmd_runs(&inp_file),
        Commands::ShowRun { inp_file, run_id } => cmd_show_run(&inp_file, &run_id),
        Commands::ExportSeries {
            inp_file,
            run_id,
            kind,
            entity,
            variable,
            output,
        } => cmd_export_series(&inp_file, &run_id, kind, &entity, &variable, output.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn cmd_validate(inp_file: &Path) -> AppResult<()> {
    println!("Validating: {}", inp_file.display());
    let parsed = project_service::load_inp(inp_file)?;
    let summary = project_service::summarize(&parsed);

    println!("\u{2713} Parsed successfully");
    println!("  Junctions: {}", summary.junction_count);
    println!("  Reservoirs: {}", summary.reservoir_count);
    println!("  Tanks: {}", summary.tank_count);
    println!("  Pipes: {}", summary.pipe_count);
    println!("  Pumps: {}", summary.pump_count);
    println!("  Valves: {}", summary.valve_count);
    if let Some(d) = summary.duration_s {
        println!("  Duration: {d} s");
    }
    if let Some(dt) = summary.hydraulic_timestep_s {
        println!("  Hydraulic timestep: {dt} s");
    }
    if !summary.warnings.is_empty() {
        println!("  Warnings:");
        for w in &summary.warnings {
            println!("    - {w}");
        }
    }
    Ok(())
}

fn cmd_run(
    inp_file: &Path,
    duration: Option<f64>,
    step: Option<f64>,
    mode: CliMode,
    out: Option<&Path>,
    no_cache: bool,
) -> AppResult<()> {
    println!("Running: {}", inp_file.display());

    let request = RunRequest {
        inp_path: inp_file,
        options: RunOptions {
            dt_s: step,
            duration_s: duration,
            mode: mode.into(),
            use_cache: !no_cache,
            solver_version: env!("CARGO_PKG_VERSION").to_string(),
        },
    };

    let start = Instant::now();
    let mut last_emit = Instant::now();
    let response = run_service::run(
        &request,
        Some(&mut |event| {
            let emit_now = matches!(event.stage, RunStage::Completed | RunStage::SavingResults)
                || last_emit.elapsed().as_millis() >= 100;
            if emit_now {
                render_cli_progress(&event);
                last_emit = Instant::now();
            }
        }),
    )?;
    clear_progress_line();

    if response.from_cache {
        println!("\u{2713} Loaded from cache: {}", response.manifest.run_id);
    } else {
        println!("\u{2713} Simulation completed: {}", response.manifest.run_id);
    }

    println!(
        "  Parse: {:.3}s  Solve: {:.3}s  Save: {:.3}s  Total: {:.3}s",
        response.timing.parse_time_s,
        response.timing.solve_time_s,
        response.timing.save_time_s,
        response.timing.total_time_s,
    );
    println!("  Reporting steps: {}", response.results.records.len());

    let metrics = hydro_app::compute_service_metrics(&response.results);
    if let Some(frac) = metrics.avg_fraction_demand_met {
        println!("  Avg fraction of demand met: {:.3}", frac);
    }
    if let (Some(min_p), Some(max_p)) = (metrics.min_pressure_m, metrics.max_pressure_m) {
        println!("  Pressure range: {min_p:.2} - {max_p:.2} m");
    }

    if let Some(out_dir) = out {
        std::fs::create_dir_all(out_dir)?;
        let csv_path = out_dir.join(format!("{}.csv", response.manifest.run_id));
        write_summary_csv(&csv_path, &response.results)?;
        println!("  Wrote summary: {}", csv_path.display());
    }

    let _ = start.elapsed();
    Ok(())
}

fn write_summary_csv(path: &Path, results: &hydro_results::RunResults) -> AppResult<()> {
    let mut csv = String::from("time_s,node,head_m,pressure_m,required_demand_cms,actual_demand_cms\n");
    for record in &results.records {
        for node in &record.node_values {
            csv.push_str(&format!(
                "{},{},{},{},{},{}\n",
                record.time_s,
                node.name,
                node.head_m,
                node.pressure_m,
                node.required_demand_cms,
                node.actual_demand_cms,
            ));
        }
    }
    std::fs::write(path, csv)?;
    Ok(())
}

fn cmd_runs(inp_file: &Path) -> AppResult<()> {
    let runs = run_service::list_runs(inp_file)?;
    if runs.is_empty() {
        println!("No cached runs found for: {}", inp_file.display());
    } else {
        println!("Cached runs for {}:", inp_file.display());
        for manifest in runs {
            println!(
                "  {} ({}, mode={})",
                manifest.run_id, manifest.timestamp, manifest.mode
            );
        }
    }
    Ok(())
}

fn cmd_show_run(inp_file: &Path, run_id: &str) -> AppResult<()> {
    let response = run_service::load_run(inp_file, run_id)?;
    let summary = query::get_run_summary(&response.results)?;

    println!("Run: {run_id}");
    println!(
        "  Time range: {:.1} - {:.1} s",
        summary.time_range.0, summary.time_range.1
    );
    println!("  Reporting steps: {}", summary.record_count);
    println!("  Nodes: {}", summary.node_count);
    println!("  Links: {}", summary.link_count);

    println!("\nNodes:");
    for name in query::list_node_names(&response.results) {
        println!("  {name}");
    }
    println!("\nLinks:");
    for name in query::list_link_names(&response.results) {
        println!("  {name}");
    }

    Ok(())
}

fn cmd_export_series(
    inp_file: &Path,
    run_id: &str,
    kind: SeriesKind,
    entity: &str,
    variable: &str,
    output: Option<&Path>,
) -> AppResult<()> {
    let response = run_service::load_run(inp_file, run_id)?;

    let series = match kind {
        SeriesKind::Node => query::extract_node_series(&response.results, entity, variable)?,
        SeriesKind::Link => query::extract_link_series(&response.results, entity, variable)?,
    };

    let mut csv = String::from("time_s,value\n");
    for (t, val) in &series {
        csv.push_str(&format!("{t},{val}\n"));
    }

    if let Some(path) = output {
        std::fs::write(path, csv)?;
        println!(
            "\u{2713} Exported {} data points to {}",
            series.len(),
            path.display()
        );
    } else {
        print!("{csv}");
    }

    Ok(())
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(120));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &RunProgressEvent) {
    match event.stage {
        RunStage::Simulating => {
            if let (Some(step), Some(total)) = (event.step, event.total_steps) {
                let width = 28usize;
                let fraction = if total > 0 {
                    step as f64 / total as f64
                } else {
                    0.0
                };
                let filled = ((fraction * width as f64).round() as usize).min(width);
                let bar = format!(
                    "{}{}",
                    "#".repeat(filled),
                    "-".repeat(width.saturating_sub(filled))
                );
                print!(
                    "\r[{}] {:>3}/{:<3}  t={:.1}s  trials={}  elapsed={:.1}s",
                    bar,
                    step,
                    total,
                    event.t_s.unwrap_or(0.0),
                    event.trials.unwrap_or(0),
                    event.elapsed_wall_s,
                );
            } else {
                print!("\rSimulating...  elapsed={:.1}s", event.elapsed_wall_s);
            }
            let _ = io::stdout().flush();
        }
        _ => {
            let mut line = format!(
                "\r{}  elapsed={:.2}s",
                stage_label(event.stage),
                event.elapsed_wall_s
            );
            if let Some(msg) = &event.message {
                line.push_str(&format!("  {msg}"));
            }
            print!("{line}");
            let _ = io::stdout().flush();
        }
    }
}

fn stage_label(stage: RunStage) -> &'static str {
    match stage {
        RunStage::ParsingInput => "Parsing input",
        RunStage::Simulating => "Simulating",
        RunStage::SavingResults => "Saving results",
        RunStage::Completed => "Completed",
    }
}
