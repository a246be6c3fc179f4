//! Mechanical and timing configuration for the pulse engine.
//!
//! Defaults match the reference mount build: NEMA 17 steppers (200 full
//! steps per revolution), A4988 drivers wired for x8 microstepping, and a
//! 64 us scheduling tick.

/// Per-axis stepper and ramp configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisConfig {
    /// Full steps per motor revolution.
    pub steps_per_rev: u32,
    /// The ramp is adjusted every this many full steps.
    pub accel_steps: u32,
    /// Delay change in microseconds applied at each ramp adjustment.
    /// Should be even.
    pub accel_delay_us: u32,
    /// Step delay in microseconds at the start (and end) of a fast move.
    pub fast_delay_start_us: u32,
    /// Minimal step delay in microseconds reached at cruise speed.
    pub fast_delay_end_us: u32,
    /// Swap the physical direction line polarity for this axis.
    pub direction_swap: bool,
}

impl AxisConfig {
    /// Motor revolutions per second at the fast-move start delay.
    pub fn fast_revs_per_sec(&self) -> f64 {
        1_000_000.0 / self.fast_delay_start_us as f64 / self.steps_per_rev as f64
    }
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            steps_per_rev: 200,
            accel_steps: 256,
            accel_delay_us: 64,
            fast_delay_start_us: 2048,
            fast_delay_end_us: 1024,
            direction_swap: false,
        }
    }
}

/// Whole-engine configuration: both axes plus shared timing parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub dec: AxisConfig,
    pub ra: AxisConfig,
    /// Microstep subdivision when the microstep lines are asserted.
    pub microstep_multiplier: u32,
    /// Period of the scheduling tick in microseconds.
    pub tick_resolution_us: u32,
    /// Capacity of the movement command queue.
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dec: AxisConfig::default(),
            ra: AxisConfig::default(),
            microstep_multiplier: 8,
            tick_resolution_us: 64,
            queue_capacity: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fast_revs_per_sec() {
        let cfg = AxisConfig::default();
        // 1e6 / 2048 / 200
        assert_relative_eq!(cfg.fast_revs_per_sec(), 2.44140625, epsilon = 1e-9);
    }
}
