//! Timing-accuracy and ramp-shape tests, driven tick-by-tick against the
//! simulated output lines.

use pulse_engine::{Axis, EngineConfig, PulseEngine, SimulatedStepOutput};

fn engine() -> PulseEngine<SimulatedStepOutput> {
    let mut e = PulseEngine::new(EngineConfig::default(), SimulatedStepOutput::new());
    e.initialize();
    e
}

/// Run a constant-delay move to completion and check the total tick count
/// against the ideal (fractional) ticks-per-pulse rate.
fn assert_long_run_rate(step_delay_us: f64, revs: f64, max_rel_err: f64) {
    let mut e = engine();
    // slow_turn derives delay = 1e6 / (speed * 200 * 8); invert to hit
    // the delay under test.
    let speed = 1_000_000.0 / (step_delay_us * 1600.0);
    e.slow_turn(revs, 0.0, speed, 1.0, false);

    let pulses = (revs * 1600.0).floor() * 2.0;
    let ideal_ticks_per_pulse = step_delay_us / 2.0 / 64.0;
    let expected_ticks = pulses * ideal_ticks_per_pulse;

    let mut ticks = 0u64;
    while !e.is_idle() {
        e.on_tick();
        ticks += 1;
        assert!(
            ticks < expected_ticks as u64 * 2 + 1000,
            "move did not finish in a sane number of ticks"
        );
    }

    let rel_err = (ticks as f64 - expected_ticks).abs() / expected_ticks;
    assert!(
        rel_err < max_rel_err,
        "delay {step_delay_us} us: {ticks} ticks vs ideal {expected_ticks}, rel err {rel_err}"
    );
}

#[test]
fn test_long_run_rate_quarter_tick_fraction() {
    // 50336 us / 2 / 64 us = 393.25 ticks per pulse: one correction tick
    // every 4 pulses reproduces the quarter-tick fraction exactly.
    assert_long_run_rate(50336.0, 0.05, 0.001);
}

#[test]
fn test_long_run_rate_eighth_tick_fraction() {
    // 50320 us / 2 / 64 us = 393.125 ticks per pulse.
    assert_long_run_rate(50320.0, 0.05, 0.001);
}

#[test]
fn test_long_run_rate_fifth_tick_fraction() {
    // 2073.6 us / 2 / 64 us = 16.2 ticks per pulse.
    assert_long_run_rate(2073.6, 0.5, 0.001);
}

/// Record every delay change over a full fast move, as (pulse index,
/// new delay) pairs.
fn record_ramp(revs: f64) -> (Vec<(u64, f64)>, u64) {
    let mut e = engine();
    e.fast_turn(revs, 0.0, false);

    let mut changes = Vec::new();
    let mut last_delay = e.current_delay_us(Axis::Dec);
    let mut ticks = 0u64;
    while !e.is_idle() {
        e.on_tick();
        ticks += 1;
        let delay = e.current_delay_us(Axis::Dec);
        if delay != last_delay {
            changes.push((e.output().lines(Axis::Dec).edges, delay));
            last_delay = delay;
        }
        assert!(ticks < 50_000_000, "move did not finish");
    }
    (changes, e.output().lines(Axis::Dec).edges)
}

#[test]
fn test_ramp_is_monotonic_trapezoid_without_overshoot() {
    // 60 revs = 12000 full steps = 24000 pulses: long enough to reach
    // the cruise delay and ramp all the way back.
    let (changes, total_edges) = record_ramp(60.0);
    assert_eq!(total_edges, 24000);

    let decreases = changes.windows(2).filter(|w| w[1].1 < w[0].1).count();
    let first_increase = changes
        .iter()
        .zip(changes.iter().skip(1))
        .position(|(a, b)| b.1 > a.1);

    // The delay profile is down, flat, up: no decrease may follow the
    // first increase.
    if let Some(idx) = first_increase {
        for w in changes[idx..].windows(2) {
            assert!(
                w[1].1 >= w[0].1,
                "delay decreased again after ramp-down started"
            );
        }
    }

    // No overshoot on either side of the trapezoid.
    for (_, delay) in &changes {
        assert!(*delay >= 1024.0, "delay overshot past the target delay");
        assert!(*delay <= 2048.0, "delay overshot past the start delay");
    }

    // Full ramp reaches the cruise delay, and ramp-up and ramp-down are
    // symmetric in adjustment count (16 steps of 64 us each way).
    let min_delay = changes.iter().map(|(_, d)| *d).fold(f64::MAX, f64::min);
    assert_eq!(min_delay, 1024.0);
    let increases = changes.windows(2).filter(|w| w[1].1 > w[0].1).count();
    // First recorded change is itself a decrease from 2048.
    assert_eq!(decreases + 1, 16);
    assert_eq!(increases, 16);
}

#[test]
fn test_short_move_ramp_is_symmetric_and_bounded() {
    // 15 revs = 6000 pulses: the midpoint arrives before the full ramp,
    // so the move tops out above the cruise delay but stays symmetric.
    let (changes, total_edges) = record_ramp(15.0);
    assert_eq!(total_edges, 6000);

    let min_delay = changes.iter().map(|(_, d)| *d).fold(f64::MAX, f64::min);
    assert_eq!(min_delay, 1728.0);

    let decreases = changes.windows(2).filter(|w| w[1].1 < w[0].1).count();
    let increases = changes.windows(2).filter(|w| w[1].1 > w[0].1).count();
    assert_eq!(decreases + 1, increases);

    // Ends back at the start delay.
    assert_eq!(changes.last().map(|(_, d)| *d), Some(2048.0));
}
