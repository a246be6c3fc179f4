//! The pulse engine: command intake, the fixed-tick handler, and
//! telemetry.

use std::time::Duration;

use tracing::{debug, warn};

use crate::axis::AxisState;
use crate::command::{CommandQueue, MoveCommand};
use crate::config::EngineConfig;
use crate::output::{Axis, StepOutput};

/// Step pulse generator for the two mount axes.
///
/// Owns the per-axis pulse state, the command queue and the output lines.
/// [`on_tick`](Self::on_tick) is the only place axis pulse state advances;
/// on target hardware it is called from the periodic timer interrupt and
/// the remaining methods run in the foreground under the platform's
/// critical section.
#[derive(Debug)]
pub struct PulseEngine<O: StepOutput> {
    config: EngineConfig,
    output: O,
    dec: AxisState,
    ra: AxisState,
    queue: CommandQueue,
    dec_balance: i64,
    ra_balance: i64,
}

impl<O: StepOutput> PulseEngine<O> {
    pub fn new(config: EngineConfig, output: O) -> Self {
        let queue = CommandQueue::new(config.queue_capacity);
        Self {
            config,
            output,
            dec: AxisState::default(),
            ra: AxisState::default(),
            queue,
            dec_balance: 0,
            ra_balance: 0,
        }
    }

    /// Drive all output lines to a known idle state and zero the step
    /// balances. Must run once before any movement is issued; on target
    /// hardware this is also where the periodic timer gets armed.
    pub fn initialize(&mut self) {
        for axis in [Axis::Dec, Axis::Ra] {
            self.output.set_direction(axis, false);
            self.output.set_microstep(axis, false);
            self.output.set_step(axis, false);
        }
        self.dec_balance = 0;
        self.ra_balance = 0;
        self.queue.clear();
        debug!("pulse engine initialized");
    }

    /// True iff both axes have no pulses remaining.
    pub fn is_ready(&self) -> bool {
        self.dec.pulses_remaining == 0 && self.ra.pulses_remaining == 0
    }

    /// True iff both axes are idle and no command is queued.
    pub fn is_idle(&self) -> bool {
        self.is_ready() && self.queue.is_empty()
    }

    /// Number of commands waiting in the queue.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Abort all motion: zero both remaining-pulse counters and discard
    /// the queue. Pulses already emitted are not un-pulsed; the step lines
    /// are parked low. Safe to call from any state.
    pub fn stop(&mut self) {
        self.dec.clear();
        self.ra.clear();
        self.park_step_line(Axis::Dec);
        self.park_step_line(Axis::Ra);
        self.queue.clear();
        debug!("all motion stopped, queue cleared");
    }

    fn park_step_line(&mut self, axis: Axis) {
        let state = match axis {
            Axis::Dec => &mut self.dec,
            Axis::Ra => &mut self.ra,
        };
        state.step_high = false;
        self.output.set_step(axis, false);
    }

    /// Schedule a maximum-speed move using the configured fast delay ramp.
    /// With `queue` set and the engine busy, the command is queued instead
    /// of executed (dropped silently if the queue is full).
    pub fn fast_turn(&mut self, revs_dec: f64, revs_ra: f64, queue: bool) {
        let cmd = MoveCommand {
            revs_dec,
            revs_ra,
            delay_start_dec_us: self.config.dec.fast_delay_start_us as f64,
            delay_start_ra_us: self.config.ra.fast_delay_start_us as f64,
            delay_end_dec_us: self.config.dec.fast_delay_end_us as f64,
            delay_end_ra_us: self.config.ra.fast_delay_end_us as f64,
            microstepping: false,
        };
        self.turn(cmd, queue);
    }

    /// Schedule a constant-speed microstepped move. Speeds are motor
    /// revolutions per second; the per-axis step delay is derived as
    /// `1e6 / (speed * steps_per_rev * microstep_multiplier)` us.
    pub fn slow_turn(
        &mut self,
        revs_dec: f64,
        revs_ra: f64,
        speed_dec: f64,
        speed_ra: f64,
        queue: bool,
    ) {
        let mult = self.config.microstep_multiplier as f64;
        let delay_dec =
            1_000_000.0 / (speed_dec.abs() * self.config.dec.steps_per_rev as f64 * mult);
        let delay_ra = 1_000_000.0 / (speed_ra.abs() * self.config.ra.steps_per_rev as f64 * mult);
        let cmd = MoveCommand {
            revs_dec,
            revs_ra,
            delay_start_dec_us: delay_dec,
            delay_start_ra_us: delay_ra,
            delay_end_dec_us: delay_dec,
            delay_end_ra_us: delay_ra,
            microstepping: true,
        };
        self.turn(cmd, queue);
    }

    fn turn(&mut self, cmd: MoveCommand, queueing: bool) {
        if queueing && !self.is_ready() {
            if !self.queue.push(cmd) {
                warn!(
                    revs_dec = cmd.revs_dec,
                    revs_ra = cmd.revs_ra,
                    "command queue full, dropping newest command"
                );
            }
            return;
        }
        self.start_command(cmd);
    }

    /// Install a command on both axes. Direction and microstep lines are
    /// set here, at the move boundary, and never again until the next
    /// command starts.
    fn start_command(&mut self, cmd: MoveCommand) {
        debug!(
            revs_dec = cmd.revs_dec,
            revs_ra = cmd.revs_ra,
            microstepping = cmd.microstepping,
            "starting movement"
        );

        let dec_forward = cmd.revs_dec >= 0.0;
        let ra_forward = cmd.revs_ra >= 0.0;
        self.output
            .set_direction(Axis::Dec, direction_level(dec_forward, self.config.dec.direction_swap));
        self.output
            .set_direction(Axis::Ra, direction_level(ra_forward, self.config.ra.direction_swap));
        self.output.set_microstep(Axis::Dec, cmd.microstepping);
        self.output.set_microstep(Axis::Ra, cmd.microstepping);

        let mult = if cmd.microstepping {
            self.config.microstep_multiplier as f64
        } else {
            1.0
        };
        let steps_dec = cmd.revs_dec.abs() * self.config.dec.steps_per_rev as f64 * mult;
        let steps_ra = cmd.revs_ra.abs() * self.config.ra.steps_per_rev as f64 * mult;
        let effective_dec = steps_dec as u32;
        let effective_ra = steps_ra as u32;

        let tick_res = self.config.tick_resolution_us;
        self.dec.forward = dec_forward;
        self.dec.microstepping = cmd.microstepping;
        self.dec.load(
            effective_dec,
            cmd.delay_start_dec_us,
            cmd.delay_end_dec_us,
            tick_res,
        );
        self.ra.forward = ra_forward;
        self.ra.microstepping = cmd.microstepping;
        self.ra.load(
            effective_ra,
            cmd.delay_start_ra_us,
            cmd.delay_end_ra_us,
            tick_res,
        );

        // A full-step move quantizes to whole steps; chase the dropped
        // fraction with a queued microstepped move so telemetry lands
        // within one microstep of the request. The residual keeps the
        // sign of the original move.
        if !cmd.microstepping {
            let frac_dec = steps_dec - effective_dec as f64;
            let frac_ra = steps_ra - effective_ra as f64;
            if frac_dec > 0.0 || frac_ra > 0.0 {
                let residual_dec =
                    (frac_dec / self.config.dec.steps_per_rev as f64).copysign(cmd.revs_dec);
                let residual_ra =
                    (frac_ra / self.config.ra.steps_per_rev as f64).copysign(cmd.revs_ra);
                let mult = self.config.microstep_multiplier as f64;
                self.slow_turn(
                    residual_dec,
                    residual_ra,
                    self.config.dec.fast_revs_per_sec() / mult,
                    self.config.ra.fast_revs_per_sec() / mult,
                    true,
                );
            }
        }
    }

    /// The fixed-rate tick handler: dequeues the next command when both
    /// axes are idle, advances both pulse state machines, emits step
    /// edges, and applies the ramp update.
    pub fn on_tick(&mut self) {
        if self.is_ready() {
            if let Some(cmd) = self.queue.pop() {
                self.start_command(cmd);
            }
        }

        if self.dec.advance() {
            self.emit_edge(Axis::Dec);
        }
        if self.ra.advance() {
            self.emit_edge(Axis::Ra);
        }

        let tick_res = self.config.tick_resolution_us;
        self.dec.update_ramp(
            self.config.dec.accel_steps * 2,
            self.config.dec.accel_delay_us,
            tick_res,
        );
        self.ra.update_ramp(
            self.config.ra.accel_steps * 2,
            self.config.ra.accel_delay_us,
            tick_res,
        );
    }

    fn emit_edge(&mut self, axis: Axis) {
        let mult = self.config.microstep_multiplier as i64;
        let state = match axis {
            Axis::Dec => &mut self.dec,
            Axis::Ra => &mut self.ra,
        };
        state.step_high = !state.step_high;
        let level = state.step_high;
        let weight = if state.microstepping { 1 } else { mult };
        let delta = if state.forward { weight } else { -weight };
        match axis {
            Axis::Dec => self.dec_balance += delta,
            Axis::Ra => self.ra_balance += delta,
        }
        self.output.set_step(axis, level);
    }

    /// Cumulative signed motor revolutions per axis since initialization,
    /// derived from the accumulated pulse balance. Non-destructive
    /// point-in-time snapshot.
    pub fn made_revolutions(&self) -> (f64, f64) {
        let mult = self.config.microstep_multiplier as f64;
        let dec = self.dec_balance as f64 / 2.0 / self.config.dec.steps_per_rev as f64 / mult;
        let ra = self.ra_balance as f64 / 2.0 / self.config.ra.steps_per_rev as f64 / mult;
        (dec, ra)
    }

    /// Closed-form estimate of a fast turn's duration: ramp-up, cruise
    /// and ramp-down per axis, maximum across axes. Does not mutate
    /// engine state.
    pub fn estimate_fast_turn_time(&self, revs_dec: f64, revs_ra: f64) -> Duration {
        let steps_dec = revs_dec.abs() * self.config.dec.steps_per_rev as f64;
        let steps_ra = revs_ra.abs() * self.config.ra.steps_per_rev as f64;

        let ms_dec = estimate_axis_fast_turn_ms(
            steps_dec,
            self.config.dec.accel_steps,
            self.config.dec.accel_delay_us,
            self.config.dec.fast_delay_start_us,
            self.config.dec.fast_delay_end_us,
        );
        let ms_ra = estimate_axis_fast_turn_ms(
            steps_ra,
            self.config.ra.accel_steps,
            self.config.ra.accel_delay_us,
            self.config.ra.fast_delay_start_us,
            self.config.ra.fast_delay_end_us,
        );

        Duration::from_secs_f64(ms_dec.max(ms_ra) / 1000.0)
    }

    /// Current step delay of an axis in microseconds; diagnostic only.
    pub fn current_delay_us(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Dec => self.dec.current_delay_us(),
            Axis::Ra => self.ra.current_delay_us(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Access the output lines, mainly for test and simulation readback.
    pub fn output(&self) -> &O {
        &self.output
    }
}

/// Physical direction line level for a logical forward/reverse request.
fn direction_level(forward: bool, swap: bool) -> bool {
    if swap {
        forward
    } else {
        !forward
    }
}

/// Single-axis fast-turn duration estimate in milliseconds: walk the ramp
/// schedule (one delay decrement per `accel_each` steps) until cruise
/// delay or the move midpoint, then account for the symmetric ramp-down
/// and the cruise segment in closed form.
fn estimate_axis_fast_turn_ms(
    steps: f64,
    accel_each: u32,
    accel_amount_us: u32,
    delay_start_us: u32,
    delay_end_us: u32,
) -> f64 {
    let total_steps = steps.floor();
    let mut accel_steps = steps.floor();
    let mut delay_curr = delay_start_us as f64;
    let mut ramp_time_us = 0.0;

    accel_steps -= accel_each as f64;
    while accel_steps > steps / 2.0 && delay_curr > delay_end_us as f64 {
        ramp_time_us += delay_curr * accel_each as f64;
        delay_curr -= accel_amount_us as f64;
        accel_steps -= accel_each as f64;
    }
    accel_steps += accel_each as f64;

    (2.0 * ramp_time_us + (2.0 * accel_steps - total_steps) * delay_curr) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SimulatedStepOutput;
    use approx::assert_relative_eq;

    fn engine() -> PulseEngine<SimulatedStepOutput> {
        let mut e = PulseEngine::new(EngineConfig::default(), SimulatedStepOutput::new());
        e.initialize();
        e
    }

    fn run_to_idle(e: &mut PulseEngine<SimulatedStepOutput>, max_ticks: u64) {
        for _ in 0..max_ticks {
            if e.is_idle() {
                return;
            }
            e.on_tick();
        }
        panic!("engine did not go idle within {max_ticks} ticks");
    }

    #[test]
    fn test_ready_after_initialize() {
        let e = engine();
        assert!(e.is_ready());
        assert!(e.is_idle());
        assert_eq!(e.made_revolutions(), (0.0, 0.0));
    }

    #[test]
    fn test_fast_turn_telemetry_within_one_microstep() {
        let mut e = engine();
        // 1.37 revs = 2192 microsteps, -0.73 revs = -1168 microsteps:
        // both exact, so telemetry should match to the microstep.
        e.fast_turn(1.37, -0.73, false);
        run_to_idle(&mut e, 5_000_000);

        let (dec, ra) = e.made_revolutions();
        let microstep = 1.0 / (200.0 * 8.0);
        assert!((dec - 1.37).abs() <= microstep, "dec off by {}", dec - 1.37);
        assert!((ra + 0.73).abs() <= microstep, "ra off by {}", ra + 0.73);
    }

    #[test]
    fn test_fast_turn_fractional_revs_within_one_microstep() {
        let mut e = engine();
        // 0.3333 revs is not a whole number of full steps; the queued
        // microstepped residual move has to make up the difference.
        e.fast_turn(0.3333, 0.0, false);
        run_to_idle(&mut e, 5_000_000);

        let (dec, _) = e.made_revolutions();
        let microstep = 1.0 / (200.0 * 8.0);
        assert!(
            (dec - 0.3333).abs() <= microstep,
            "dec off by {}",
            dec - 0.3333
        );
    }

    #[test]
    fn test_slow_turn_reverse_direction_balance() {
        let mut e = engine();
        e.slow_turn(-0.05, 0.05, 1.0, 1.0, false);
        run_to_idle(&mut e, 5_000_000);

        let (dec, ra) = e.made_revolutions();
        assert_relative_eq!(dec, -0.05, epsilon = 1.0 / 1600.0);
        assert_relative_eq!(ra, 0.05, epsilon = 1.0 / 1600.0);
    }

    #[test]
    fn test_stop_clears_everything() {
        let mut e = engine();
        e.fast_turn(3.0, 3.0, false);
        for _ in 0..1000 {
            e.on_tick();
        }
        assert!(!e.is_ready());

        // Queue something behind the active move, then stop.
        e.fast_turn(1.0, 0.0, true);
        assert_eq!(e.queue_len(), 1);
        e.stop();

        assert!(e.is_ready());
        assert!(e.is_idle());
        assert_eq!(e.queue_len(), 0);
        assert!(!e.output().lines(Axis::Dec).step);
        assert!(!e.output().lines(Axis::Ra).step);
    }

    #[test]
    fn test_queued_commands_run_in_order_when_idle() {
        let mut e = engine();
        e.slow_turn(0.01, 0.0, 1.0, 1.0, false);
        e.slow_turn(0.01, 0.0, 1.0, 1.0, true);
        e.slow_turn(-0.005, 0.0, 1.0, 1.0, true);
        assert_eq!(e.queue_len(), 2);

        run_to_idle(&mut e, 5_000_000);
        let (dec, _) = e.made_revolutions();
        assert_relative_eq!(dec, 0.015, epsilon = 1.0 / 1600.0);
    }

    #[test]
    fn test_queue_overflow_drops_newest_silently() {
        let mut e = engine();
        e.slow_turn(0.01, 0.0, 1.0, 1.0, false);
        // Queue capacity is 8; the 9th queued command is dropped.
        for _ in 0..8 {
            e.slow_turn(0.01, 0.0, 1.0, 1.0, true);
        }
        assert_eq!(e.queue_len(), 8);
        e.slow_turn(1000.0, 0.0, 1.0, 1.0, true);
        assert_eq!(e.queue_len(), 8);

        run_to_idle(&mut e, 10_000_000);
        let (dec, _) = e.made_revolutions();
        // Only the 9 surviving commands executed; the oversized command
        // was the one dropped.
        assert_relative_eq!(dec, 0.09, epsilon = 1.0 / 1600.0);
    }

    #[test]
    fn test_estimate_does_not_mutate() {
        let e = engine();
        let d1 = e.estimate_fast_turn_time(2.0, 1.0);
        let d2 = e.estimate_fast_turn_time(2.0, 1.0);
        assert_eq!(d1, d2);
        assert!(e.is_ready());
        assert!(d1 > Duration::ZERO);
    }

    #[test]
    fn test_estimate_short_move_all_start_delay() {
        let e = engine();
        // 0.1 revs = 20 full steps, far too short to ramp: the estimate
        // is steps * start delay.
        let d = e.estimate_fast_turn_time(0.1, 0.0);
        assert_relative_eq!(d.as_secs_f64(), 20.0 * 2048.0 / 1e6, epsilon = 1e-9);
    }

    #[test]
    fn test_estimate_scales_with_longer_moves() {
        let e = engine();
        let short = e.estimate_fast_turn_time(1.0, 0.0);
        let long = e.estimate_fast_turn_time(10.0, 0.0);
        assert!(long > short);
        // A long move cruises at the end delay, so it must beat the
        // start-delay-only bound.
        let naive = 10.0 * 200.0 * 2048.0 / 1e6;
        assert!(long.as_secs_f64() < naive);
    }

    #[test]
    fn test_direction_line_levels() {
        let mut e = engine();
        e.fast_turn(0.01, -0.01, false);
        // Default polarity: forward drives the line low, reverse high.
        assert!(!e.output().lines(Axis::Dec).direction);
        assert!(e.output().lines(Axis::Ra).direction);
    }

    #[test]
    fn test_microstep_lines_follow_move_kind() {
        let mut e = engine();
        e.slow_turn(0.001, 0.001, 1.0, 1.0, false);
        assert!(e.output().lines(Axis::Dec).microstep);
        assert!(e.output().lines(Axis::Ra).microstep);
        run_to_idle(&mut e, 5_000_000);

        e.fast_turn(0.01, 0.01, false);
        assert!(!e.output().lines(Axis::Dec).microstep);
    }
}
