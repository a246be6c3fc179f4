//! Step pulse generation for the telescope mount axes.
//!
//! This crate turns movement commands (revolutions per axis plus a delay
//! profile) into acceleration-ramped step pulses emitted on a fixed-rate
//! scheduling tick. It knows nothing about astronomy: callers hand it
//! revolution counts, it hands back cumulative revolution telemetry.
//!
//! The hardware boundary is the [`StepOutput`] trait - three output lines
//! per axis (step, direction, microstep enable). The engine itself is
//! hardware-agnostic and can be driven tick-by-tick off-target, which is
//! how its tests work. On a real controller a periodic hardware timer
//! calls [`PulseEngine::on_tick`] and the foreground wraps its own calls
//! in whatever critical section the platform needs.

pub mod axis;
pub mod command;
pub mod config;
pub mod engine;
pub mod output;

pub use command::{CommandQueue, MoveCommand};
pub use config::{AxisConfig, EngineConfig};
pub use engine::PulseEngine;
pub use output::{Axis, SimulatedStepOutput, StepOutput};
