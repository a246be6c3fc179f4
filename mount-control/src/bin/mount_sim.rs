//! Simulated mount session: slew to a target, optionally track it for a
//! while, and report the telemetry the axes accumulated.

use anyhow::Result;
use clap::Parser;
use mount_control::{FixedTimeSource, GearConfig, MountController, SettingsStore};
use mount_math::EquatorialCoord;
use pulse_engine::{Axis, EngineConfig, PulseEngine, SimulatedStepOutput};
use tracing::info;

#[derive(Parser, Debug)]
#[command(about = "Drive a simulated equatorial mount through a slew")]
struct Args {
    /// Target declination in degrees.
    #[arg(long, default_value_t = 20.0)]
    dec: f64,

    /// Target right ascension in degrees.
    #[arg(long, default_value_t = 180.0)]
    ra: f64,

    /// Local sidereal time to freeze the simulation at, decimal hours.
    #[arg(long, default_value_t = 0.0)]
    lst: f64,

    /// Seconds of sidereal tracking to simulate after the slew.
    #[arg(long, default_value_t = 0)]
    track_secs: u64,

    /// Optional settings directory; defaults apply when absent.
    #[arg(long)]
    config_dir: Option<std::path::PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let settings = match &args.config_dir {
        Some(dir) => SettingsStore::with_path(dir.clone()).load(),
        None => SettingsStore::new()?.load(),
    };

    let engine = PulseEngine::new(EngineConfig::default(), SimulatedStepOutput::new());
    let clock = FixedTimeSource::at_j2000(args.lst);
    let mut mount = MountController::new(engine, clock, GearConfig::default());
    mount.initialize();
    mount.set_pole(
        EquatorialCoord::new(settings.pole_dec_deg, settings.pole_ra_deg),
        settings.ra_offset_deg,
    );

    let tick_us = mount.engine().config().tick_resolution_us as u64;

    info!(dec = args.dec, ra = args.ra, "slewing");
    mount.move_absolute(args.dec, args.ra)?;
    let mut ticks = 0u64;
    while !mount.engine().is_idle() {
        mount.on_tick();
        ticks += 1;
    }
    info!(
        simulated_s = (ticks * tick_us) as f64 / 1e6,
        "slew complete"
    );

    let global = mount.global_orientation()?;
    info!(dec = global.dec_deg, ra = global.ra_deg, "arrived at");

    if args.track_secs > 0 {
        info!(secs = args.track_secs, "tracking");
        mount.set_tracking()?;
        for _ in 0..(args.track_secs * 1_000_000 / tick_us) {
            mount.on_tick();
        }
        mount.stop_tracking();
    }

    let (dec_revs, ra_revs) = mount.engine().made_revolutions();
    let output = mount.engine().output();
    info!(
        dec_revs,
        ra_revs,
        dec_edges = output.lines(Axis::Dec).edges,
        ra_edges = output.lines(Axis::Ra).edges,
        "final telemetry"
    );

    Ok(())
}
