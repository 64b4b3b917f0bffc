//! Closed-loop balance simulation against the pendulum plant.
//!
//! Prints one JSON telemetry line per report interval on stdout. Logs go to
//! stderr (set `RUST_LOG=debug` for more).
//!
//! Usage:
//!   cargo run -p balbot_sitl --bin balbot_sim -- [OPTIONS]
//!
//! Options:
//!   -d, --duration <MS>   Simulated time to run (default: 10000)
//!   --report <MS>         Telemetry interval (default: 100)
//!   --seed <N>            Deterministic sensor noise
//!   --stand               Hold the body upright on a bench stand
//!   --tilt <DEG>          Initial body pitch (default: 0)
//!   --run                 Send the run command once calibrated
//!   --params <PATH>       Parameter file (created on first calibration)
//!   --realtime <FACTOR>   Pace against wall-clock time

use std::env;
use std::path::PathBuf;
use std::process;

use balbot_core::command::Command;
use balbot_core::MotionState;
use balbot_sitl::{
    MemoryStore, PendulumAdapter, PendulumConfig, SimulatorError, SitlBridge, TelemetryRecord,
    TimeMode,
};

struct Args {
    duration_ms: u64,
    report_ms: u64,
    seed: Option<u64>,
    stand: bool,
    tilt_deg: f32,
    run: bool,
    params: Option<PathBuf>,
    realtime: Option<f32>,
}

fn parse_args() -> Args {
    let mut args = Args {
        duration_ms: 10_000,
        report_ms: 100,
        seed: None,
        stand: false,
        tilt_deg: 0.0,
        run: false,
        params: None,
        realtime: None,
    };

    let raw: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < raw.len() {
        match raw[i].as_str() {
            "-d" | "--duration" => {
                i += 1;
                args.duration_ms = parse_arg(&raw, i, "duration");
            }
            "--report" => {
                i += 1;
                args.report_ms = parse_arg(&raw, i, "report");
            }
            "--seed" => {
                i += 1;
                args.seed = Some(parse_arg(&raw, i, "seed"));
            }
            "--stand" => args.stand = true,
            "--tilt" => {
                i += 1;
                args.tilt_deg = parse_arg(&raw, i, "tilt");
            }
            "--run" => args.run = true,
            "--params" => {
                i += 1;
                args.params = Some(parse_arg(&raw, i, "params"));
            }
            "--realtime" => {
                i += 1;
                args.realtime = Some(parse_arg(&raw, i, "realtime"));
            }
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            other => {
                eprintln!("Unknown option: {other}");
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    if args.report_ms == 0 {
        eprintln!("Error: report interval must be at least 1 ms");
        process::exit(1);
    }

    args
}

fn parse_arg<T: std::str::FromStr>(raw: &[String], i: usize, name: &str) -> T {
    raw.get(i)
        .unwrap_or_else(|| {
            eprintln!("Error: --{name} requires a value");
            process::exit(1);
        })
        .parse()
        .unwrap_or_else(|_| {
            eprintln!("Error: invalid value for --{name}");
            process::exit(1);
        })
}

fn print_usage() {
    eprintln!(
        "Usage: balbot_sim [OPTIONS]\n\
         \n\
         Options:\n\
         \x20 -d, --duration <MS>   Simulated time to run (default: 10000)\n\
         \x20 --report <MS>         Telemetry interval (default: 100)\n\
         \x20 --seed <N>            Deterministic sensor noise\n\
         \x20 --stand               Hold the body upright on a bench stand\n\
         \x20 --tilt <DEG>          Initial body pitch (default: 0)\n\
         \x20 --run                 Send the run command once calibrated\n\
         \x20 --params <PATH>       Parameter file (created on first calibration)\n\
         \x20 --realtime <FACTOR>   Pace against wall-clock time\n\
         \x20 -h, --help            Show this help"
    );
}

async fn simulate(
    bridge: &mut SitlBridge<PendulumAdapter>,
    args: &Args,
) -> Result<(), SimulatorError> {
    bridge.start().await?;

    let mut run_sent = false;
    let mut next_report_ms = 0;
    let end_us = bridge.sim_time_us() + args.duration_ms * 1000;

    while bridge.sim_time_us() < end_us {
        let snapshot = bridge.step().await?;

        if args.run && !run_sent && snapshot.state == MotionState::Idle {
            log::info!("Calibrated, sending run");
            bridge.submit(Command::Run(true))?;
            run_sent = true;
        }

        if snapshot.timestamp_ms >= next_report_ms {
            let record = TelemetryRecord::from(&snapshot);
            println!("{}", serde_json::to_string(&record)?);
            next_report_ms = snapshot.timestamp_ms + args.report_ms;
        }
    }

    bridge.stop().await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = parse_args();

    let config = PendulumConfig {
        supported: args.stand,
        initial_pitch_deg: args.tilt_deg,
        seed: args.seed,
        ..Default::default()
    };
    let adapter = PendulumAdapter::new("pendulum", config);

    let store = match &args.params {
        Some(path) => MemoryStore::open(path),
        None => MemoryStore::with_defaults(),
    };
    let store = store.unwrap_or_else(|e| {
        eprintln!("Error: failed to load parameters: {e}");
        process::exit(1);
    });

    let mut bridge = SitlBridge::new(adapter, store);
    if let Some(factor) = args.realtime {
        bridge.set_time_mode(TimeMode::Scaled { factor });
    }

    let result = tokio::select! {
        r = simulate(&mut bridge, &args) => r,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
