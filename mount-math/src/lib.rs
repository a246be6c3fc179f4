//! Spherical geometry for an equatorial telescope mount.
//!
//! A mount whose polar axis is not perfectly aligned with the celestial
//! pole sees the sky through a fixed rotation. This crate provides the
//! coordinate types, the rotation (transition) matrices between the
//! mount frame and the equatorial frame, and an evolutionary-strategy
//! solver that recovers the mount's true pole from observed star
//! positions.

pub mod alignment;
pub mod coord;
pub mod sphere;

pub use alignment::{
    solve_alignment, AlignmentError, AlignmentSolution, EsConfig, MIN_ALIGNMENT_PAIRS,
};
pub use coord::EquatorialCoord;
pub use sphere::{
    cartesian_to_polar, inverse_transition_matrix, polar_to_cartesian, polar_to_polar,
    transition_matrix,
};
