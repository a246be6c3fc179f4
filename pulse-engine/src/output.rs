//! Hardware output abstraction for the stepper drivers.
//!
//! The wire-level contract is three digital lines per axis: a step pulse
//! line, a direction line and a microstep-enable line. Implementations
//! are assumed infallible; a GPIO write either happens or the board is
//! beyond software help.

/// One of the two mount axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Declination axis.
    Dec,
    /// Right-ascension axis.
    Ra,
}

/// Interface to the step/dir/microstep output lines.
///
/// Abstracts the motor driver pins so the pulse engine can run off-target
/// in tests. Direction and microstep lines are only changed at move
/// boundaries, never mid-pulse.
pub trait StepOutput {
    /// Drive the direction line for `axis`. `level` is the physical line
    /// level after any polarity swap has been applied by the engine.
    fn set_direction(&mut self, axis: Axis, level: bool);

    /// Assert or release the microstep-enable line for `axis`.
    fn set_microstep(&mut self, axis: Axis, enabled: bool);

    /// Drive the step line for `axis` to `level`. Each level change is one
    /// pulse edge; two edges make one (micro)step.
    fn set_step(&mut self, axis: Axis, level: bool);
}

/// Per-axis line state and edge counters for [`SimulatedStepOutput`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedAxisLines {
    /// Current direction line level.
    pub direction: bool,
    /// Current microstep-enable line level.
    pub microstep: bool,
    /// Current step line level.
    pub step: bool,
    /// Total step edges observed.
    pub edges: u64,
    /// Step edges signed by the direction line at the time of the edge
    /// (positive when the line was low, matching default polarity).
    pub signed_edges: i64,
}

/// Recording implementation of [`StepOutput`] for tests and simulation.
///
/// Counts every step edge per axis and remembers the last commanded line
/// levels so tests can assert on direction/microstep behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedStepOutput {
    pub dec: SimulatedAxisLines,
    pub ra: SimulatedAxisLines,
}

impl SimulatedStepOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines record for one axis.
    pub fn lines(&self, axis: Axis) -> &SimulatedAxisLines {
        match axis {
            Axis::Dec => &self.dec,
            Axis::Ra => &self.ra,
        }
    }

    fn lines_mut(&mut self, axis: Axis) -> &mut SimulatedAxisLines {
        match axis {
            Axis::Dec => &mut self.dec,
            Axis::Ra => &mut self.ra,
        }
    }
}

impl StepOutput for SimulatedStepOutput {
    fn set_direction(&mut self, axis: Axis, level: bool) {
        self.lines_mut(axis).direction = level;
    }

    fn set_microstep(&mut self, axis: Axis, enabled: bool) {
        self.lines_mut(axis).microstep = enabled;
    }

    fn set_step(&mut self, axis: Axis, level: bool) {
        let lines = self.lines_mut(axis);
        if lines.step != level {
            lines.edges += 1;
            lines.signed_edges += if lines.direction { -1 } else { 1 };
        }
        lines.step = level;
    }
}
