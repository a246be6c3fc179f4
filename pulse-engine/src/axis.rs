//! Per-axis pulse timing state machine.
//!
//! Each axis tracks how many pulses remain in the current move and how
//! many scheduling ticks separate consecutive pulses. Because the desired
//! step delay rarely divides evenly into tick units, the axis keeps a
//! Bresenham-style correction interval: every `pulses_to_correct` pulses
//! one extra tick is inserted so the long-run average pulse rate matches
//! the requested delay instead of the truncated one.

/// Pulse timing state for one axis. Mutated only from the tick handler
/// (directly or via the engine's move installation, which the platform
/// runs under the same critical section as the tick).
#[derive(Debug, Clone, Copy, Default)]
pub struct AxisState {
    /// Pulses in the whole current move (two per emitted step).
    pulses_total: u32,
    /// Pulses left until the move completes.
    pub(crate) pulses_remaining: u32,
    /// Whole ticks between consecutive pulses (truncated).
    ticks_per_pulse: u32,
    /// Ticks accumulated toward the next pulse.
    ticks_passed: u32,
    /// Pulses between inserted correction ticks; 0 disables correction.
    pulses_to_correct: u32,
    /// Pulses emitted since the last correction tick.
    pulses_until_correction: u32,
    /// True while the current tick is an inserted correction tick.
    correction: bool,
    /// Pulses emitted since the last ramp adjustment.
    pulses_to_accel: u32,
    /// Step delay at the start of the move, microseconds.
    start_delay_us: f64,
    /// Minimal step delay the ramp accelerates toward, microseconds.
    target_delay_us: f64,
    /// Step delay currently in effect, microseconds.
    current_delay_us: f64,
    /// Logical movement direction for this move.
    pub(crate) forward: bool,
    /// Microstep lines asserted for this move.
    pub(crate) microstepping: bool,
    /// Current level of the step output line.
    pub(crate) step_high: bool,
}

impl AxisState {
    /// Install a new move: `steps` output steps with the given delay
    /// profile. Resets the ramp counter and schedules the first pulses at
    /// the start delay.
    pub(crate) fn load(
        &mut self,
        steps: u32,
        start_delay_us: f64,
        target_delay_us: f64,
        tick_resolution_us: u32,
    ) {
        self.pulses_to_accel = 0;
        self.pulses_total = steps * 2;
        self.start_delay_us = start_delay_us;
        self.target_delay_us = target_delay_us;
        self.schedule(steps * 2, start_delay_us, tick_resolution_us);
    }

    /// Step-scheduling routine: the single source of truth for timing
    /// math. Derives ticks-per-pulse (`delay / 2 / tick_resolution`) and
    /// the fractional-error correction interval, and resets the tick
    /// accumulator.
    fn schedule(&mut self, pulses: u32, delay_us: f64, tick_resolution_us: u32) {
        self.current_delay_us = delay_us;
        self.pulses_remaining = pulses;

        let ideal_ticks_per_pulse = delay_us / 2.0 / tick_resolution_us as f64;
        self.ticks_per_pulse = ideal_ticks_per_pulse as u32;

        let err = ideal_ticks_per_pulse - self.ticks_per_pulse as f64;
        self.pulses_to_correct = if err == 0.0 { 0 } else { (1.0 / err) as u32 };

        self.ticks_passed = 0;
        self.pulses_until_correction = 0;
        self.correction = false;
    }

    /// Advance one scheduling tick. Returns true when a pulse edge is due;
    /// the caller toggles the step line and books the telemetry balance.
    pub(crate) fn advance(&mut self) -> bool {
        if self.pulses_remaining == 0 {
            return false;
        }
        // An inserted correction tick is consumed without counting toward
        // the next pulse, stretching that one interval by a single tick.
        if self.correction {
            self.correction = false;
            return false;
        }
        self.ticks_passed += 1;
        if self.ticks_passed < self.ticks_per_pulse {
            return false;
        }

        if self.pulses_to_correct != 0 {
            self.pulses_until_correction += 1;
            if self.pulses_until_correction == self.pulses_to_correct {
                self.pulses_until_correction = 0;
                self.correction = true;
            }
        }

        self.pulses_to_accel += 1;
        self.pulses_remaining -= 1;
        self.ticks_passed = 0;
        true
    }

    /// Trapezoid ramp update, executed every tick but effective only once
    /// `change_pulses` pulses have accumulated. Accelerates toward the
    /// target delay through the first half of the move and symmetrically
    /// decelerates back toward the start delay through the second half.
    /// Acceleration and deceleration are checked in the same tick so both
    /// axes stay phase-aligned.
    pub(crate) fn update_ramp(
        &mut self,
        change_pulses: u32,
        delay_amount_us: u32,
        tick_resolution_us: u32,
    ) {
        if self.pulses_to_accel < change_pulses {
            return;
        }

        let mut accel_desired = false;
        let mut decel_desired = false;

        if self.pulses_remaining > self.pulses_total / 2 {
            // First half of the move: still ramping up.
            accel_desired = self.current_delay_us > self.target_delay_us;
        } else {
            let ramp_room =
                ((self.start_delay_us - self.current_delay_us) / delay_amount_us as f64).floor();
            if ramp_room >= (self.pulses_remaining / change_pulses) as f64 {
                decel_desired = self.current_delay_us < self.start_delay_us;
            }
        }

        if accel_desired || decel_desired {
            let new_delay = if accel_desired {
                (self.current_delay_us - delay_amount_us as f64).max(self.target_delay_us)
            } else {
                (self.current_delay_us + delay_amount_us as f64).min(self.start_delay_us)
            };
            let remaining = self.pulses_remaining;
            self.schedule(remaining, new_delay, tick_resolution_us);
            // Rescheduling costs time; credit the ticks we likely missed.
            self.ticks_passed += 2;
        }

        self.pulses_to_accel = 0;
    }

    pub(crate) fn current_delay_us(&self) -> f64 {
        self.current_delay_us
    }

    pub(crate) fn clear(&mut self) {
        self.pulses_remaining = 0;
    }
}
