//! # Actuator Executable
//!
//! Runs a single actuator subsystem at a fixed cycle period:
//!
//!     - Load parameters and build the motor group
//!     - Bind the subsystem to the backend for the selected mode
//!     - Main loop:
//!         - Scripted demand acquisition
//!         - Subsystem processing (sensing, telemetry, characterization)
//!         - Cycle management
//!
//! Snapshots are archived in the session directory and can be played back by
//! running again in replay mode:
//!
//! ```text
//! act_exec --mode replay --replay sessions/<session>/arch/<name>/snapshot.csv
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use color_eyre::{Report, eyre::{WrapErr, eyre}};
use structopt::StructOpt;

// Internal
use act_lib::{
    backend::{load_archive, BackendSource, RobotMode},
    params::ActExecParams,
    script::{DemandScript, PendingDemands},
    subsystem::{ActSubsystem, InputData},
    telemetry::ArchiveSink,
};
use util::{
    raise_error,
    host,
    module::State,
    logger::logger_init,
    session::Session,
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "act_exec", about = "Actuator subsystem executable")]
struct Opt {
    /// Parameter file. Paths which don't exist are looked up in
    /// `$ACT_HAL_ROOT/params`.
    #[structopt(short, long, parse(from_os_str), default_value = "act_exec.toml")]
    params: PathBuf,

    /// Override the mode in the parameter file (real, sim or replay).
    #[structopt(short, long)]
    mode: Option<RobotMode>,

    /// Snapshot archive to play in replay mode.
    #[structopt(short, long, parse(from_os_str))]
    replay: Option<PathBuf>,

    /// Override the number of cycles to run for.
    #[structopt(short, long)]
    cycles: Option<u64>,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    // Initialise session
    let session = Session::new(
        "act_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Load parameters, which configure the logger
    let params: ActExecParams = if opt.params.exists() {
        util::params::load_path(&opt.params)
    }
    else {
        util::params::load(&opt.params.to_string_lossy())
    }.wrap_err_with(|| format!("Could not load exec params from {:?}", opt.params))?;

    // Initialise logger
    logger_init(&params.log, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Actuator Executable\n");
    info!("Running on: {}", host::get_host_info());
    info!("Session directory: {:?}\n", session.session_root);

    debug!("CLI options: {:?}", opt);

    // ---- VALIDATE PARAMETERS ----

    let mode = opt.mode.unwrap_or(params.mode);
    let num_cycles = opt.cycles.or(params.num_cycles);
    let cycle_period_s = params.subsystem.cycle_period_s;

    params.subsystem.validate()
        .wrap_err("Invalid subsystem parameters")?;

    let (leading, following) = params.motors()
        .wrap_err("Invalid motor configuration")?;

    info!(
        "Exec parameters loaded: {} in {} mode, {} s period",
        params.name, mode, cycle_period_s
    );
    debug!(
        "Leading motor configuration:\n{}",
        serde_json::to_string_pretty(leading.config())?
    );

    session.save("motors/leading.json", &leading);
    session.save("motors/following.json", &following);

    // ---- INITIALISE SUBSYSTEM ----

    info!("Initialising subsystem...");

    let mut subsystem = ActSubsystem::new(&params.name, mode, params.subsystem.clone())
        .wrap_err("Failed to create the subsystem")?
        .with_sink(Box::new(ArchiveSink::new(&session)));

    subsystem.set_leading_motor(leading)?;
    for f in following {
        subsystem.add_following_motor(f)?;
    }

    let source = match mode {
        RobotMode::Real => return Err(eyre!(
            "No motor controller driver is linked into this executable, \
            run in sim or replay mode instead"
        )),
        RobotMode::Sim => BackendSource::Sim(params.sim.clone()),
        RobotMode::Replay => {
            let path = opt.replay.clone()
                .or_else(|| params.replay_path.clone())
                .ok_or_else(|| eyre!("Replay mode requires a snapshot archive path"))?;

            BackendSource::Replay(
                load_archive(&path)
                    .wrap_err_with(|| format!("Failed to load replay from {:?}", path))?
            )
        }
    };

    subsystem.init(source)
        .wrap_err("Failed to initialise the subsystem")?;

    let mut script = DemandScript::new(params.demands.clone());
    if !script.is_empty() {
        info!(
            "Loaded script lasts {:.02} s and contains {} demands",
            script.duration_s(),
            script.len()
        );
    }

    info!("Initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let cycle_period = Duration::from_secs_f64(cycle_period_s);
    let mut num_consec_cycle_overruns: u64 = 0;
    let mut cycle: u64 = 0;
    let mut script_ended = script.is_empty();

    while num_cycles.map(|n| cycle < n).unwrap_or(true) {

        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // ---- DEMANDS ----

        let time_s = cycle as f64 * cycle_period_s;

        let input = match script.pending(time_s) {
            PendingDemands::Some(i) => i,
            PendingDemands::None => InputData::default(),
            PendingDemands::EndOfScript => {
                if !script_ended {
                    info!("End of demand script");
                    script_ended = true;
                }
                InputData::default()
            }
        };

        // ---- PROCESSING ----

        match subsystem.proc(&input) {
            Ok((snapshot, report)) => {
                if report.sysid_active {
                    debug!(
                        "{} at {:.3} V, position {:.4} rot",
                        snapshot.sysid_state,
                        report.sysid_voltage_v.unwrap_or(0.0),
                        snapshot.position_rot
                    );
                }
            },
            Err(e) if !e.is_fatal() => warn!("Subsystem processing error: {}", e),
            Err(e) => {
                if let Err(stop_err) = subsystem.stop_sysid() {
                    warn!("Could not stop characterization: {}", stop_err);
                }
                return Err(e).wrap_err_with(|| format!("Cycle {} failed", cycle));
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                num_consec_cycle_overruns = 0;
                thread::sleep(d);
            },
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period_s
                );
                num_consec_cycle_overruns += 1;

                // If number of overruns greater than the limit exit
                if num_consec_cycle_overruns > params.max_consec_overruns {
                    raise_error!(
                        "More than {} consecutive cycle overruns!",
                        params.max_consec_overruns
                    );
                }
            }
        }

        cycle += 1;
    }

    // ---- SHUTDOWN ----

    if let Err(e) = subsystem.stop_sysid() {
        warn!("Could not stop characterization: {}", e);
    }

    info!("End of execution after {} cycles", cycle);

    Ok(())
}
