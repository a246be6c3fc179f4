//! All-star alignment: recovers the mount's true pole and right-ascension
//! offset from paired observations.
//!
//! Each calibration pair is a known equatorial coordinate (the kernel)
//! and the mount-local orientation at which it was actually observed
//! (the image). The solver searches for the transition-matrix parameters
//! minimizing the total squared cartesian distance between transformed
//! kernels and their images.
//!
//! The search is a (1+λ) evolutionary strategy rather than an exact
//! least-squares rotation fit; the stochastic search is robust where a
//! closed-form solver is sensitive to near-degenerate sample geometry.

use rand::Rng;
use rand_distr::StandardNormal;
use thiserror::Error;
use tracing::{debug, trace};

use crate::coord::{wrap_degrees, wrap_signed_degrees, EquatorialCoord};
use crate::sphere::{polar_to_cartesian, transition_matrix};

/// Minimum number of sample pairs a pole fit is attempted with.
pub const MIN_ALIGNMENT_PAIRS: usize = 3;

#[derive(Error, Debug)]
pub enum AlignmentError {
    #[error("alignment needs at least {MIN_ALIGNMENT_PAIRS} sample pairs, got {0}")]
    TooFewPairs(usize),

    #[error("kernel and image sample counts differ ({kernel} vs {image})")]
    LengthMismatch { kernel: usize, image: usize },
}

/// Tuning knobs for the evolutionary strategy.
#[derive(Debug, Clone)]
pub struct EsConfig {
    /// Offspring drawn per generation (the λ in (1+λ)).
    pub population: usize,
    /// Maximum number of generations to run.
    pub generations: u32,
    /// Initial mutation scale, in degrees.
    pub sigma: f64,
    /// Multiplicative σ decay applied every generation.
    pub sigma_decay: f64,
    /// Convergence threshold: the search stops early once the squared
    /// distance objective drops below `1 / precision`.
    pub precision: f64,
}

impl Default for EsConfig {
    fn default() -> Self {
        Self {
            population: 4,
            generations: 1250,
            sigma: 1.0,
            sigma_decay: 0.997,
            precision: 5e6,
        }
    }
}

/// Best parameters found by [`solve_alignment`].
#[derive(Debug, Clone, Copy)]
pub struct AlignmentSolution {
    pub pole: EquatorialCoord,
    pub ra_offset_deg: f64,
    /// `1 / (objective + 1)` of the returned parameters.
    pub fitness: f64,
    /// Generations actually run.
    pub generations: u32,
    /// Whether the convergence threshold was reached before the
    /// generation limit.
    ///
    /// Non-convergence is not an error: the best-found solution is
    /// still returned, and callers needing a guarantee inspect this.
    pub converged: bool,
}

#[derive(Clone, Copy)]
struct Candidate {
    pole_ra: f64,
    pole_dec: f64,
    offset: f64,
}

impl Candidate {
    fn mutated<R: Rng + ?Sized>(&self, sigma: f64, rng: &mut R) -> Self {
        let mut draw = || -> f64 { rng.sample::<f64, _>(StandardNormal) * sigma };
        Self {
            pole_ra: self.pole_ra + draw(),
            pole_dec: self.pole_dec + draw(),
            offset: self.offset + draw(),
        }
    }

    fn objective(&self, pairs: &[(nalgebra::Vector3<f64>, nalgebra::Vector3<f64>)]) -> f64 {
        let t = transition_matrix(
            EquatorialCoord::new(self.pole_dec, self.pole_ra),
            self.offset,
        );
        pairs.iter().map(|(x, y)| (t * x - y).norm_squared()).sum()
    }

    /// Folds the angles into their canonical ranges. The Euler-like
    /// factorization has a second representation of every rotation,
    /// `(ra+180, 180-dec, offset+180)`, so a declination outside
    /// [-90, 90] is mapped back through it rather than clamped.
    fn normalized(mut self) -> Self {
        self.pole_dec = wrap_signed_degrees(self.pole_dec);
        if self.pole_dec.abs() > 90.0 {
            self.pole_dec = wrap_signed_degrees(180.0 - self.pole_dec);
            self.pole_ra += 180.0;
            self.offset += 180.0;
        }
        self.pole_ra = wrap_degrees(self.pole_ra);
        self.offset = wrap_degrees(self.offset);
        self
    }
}

/// Fits pole declination/right-ascension and the right-ascension offset
/// to `kernel[i] -> image[i]` sample pairs with a (1+λ) evolutionary
/// strategy.
///
/// Each generation draws `population` Gaussian-perturbed offspring
/// around the incumbent and adopts the generation's best only when it
/// improves on the incumbent; σ decays every generation regardless.
pub fn solve_alignment<R: Rng + ?Sized>(
    kernel: &[EquatorialCoord],
    image: &[EquatorialCoord],
    config: &EsConfig,
    rng: &mut R,
) -> Result<AlignmentSolution, AlignmentError> {
    if kernel.len() != image.len() {
        return Err(AlignmentError::LengthMismatch {
            kernel: kernel.len(),
            image: image.len(),
        });
    }
    if kernel.len() < MIN_ALIGNMENT_PAIRS {
        return Err(AlignmentError::TooFewPairs(kernel.len()));
    }

    let pairs: Vec<_> = kernel
        .iter()
        .zip(image)
        .map(|(k, i)| (polar_to_cartesian(*k), polar_to_cartesian(*i)))
        .collect();

    debug!(pairs = pairs.len(), "starting all-star alignment fit");

    let mut incumbent = Candidate {
        pole_ra: rng.random_range(0.0..360.0),
        pole_dec: rng.random_range(-90.0..90.0),
        offset: rng.random_range(0.0..360.0),
    };
    let mut incumbent_objective = incumbent.objective(&pairs);

    let threshold = 1.0 / config.precision;
    let mut sigma = config.sigma;
    let mut generations_run = 0;
    let mut converged = false;

    for generation in 0..config.generations {
        generations_run = generation + 1;

        let mut best: Option<(Candidate, f64)> = None;
        for _ in 0..config.population {
            let offspring = incumbent.mutated(sigma, rng);
            let objective = offspring.objective(&pairs);
            if best.map_or(true, |(_, obj)| objective < obj) {
                best = Some((offspring, objective));
            }
        }

        if let Some((candidate, objective)) = best {
            if objective < incumbent_objective {
                incumbent = candidate;
                incumbent_objective = objective;
            }
        }

        if generation % 100 == 0 {
            trace!(
                generation,
                objective = incumbent_objective,
                sigma,
                "alignment progress"
            );
        }

        if incumbent_objective < threshold {
            converged = true;
            break;
        }
        sigma *= config.sigma_decay;
    }

    let solution = incumbent.normalized();
    let fitness = 1.0 / (incumbent_objective + 1.0);

    debug!(
        generations = generations_run,
        fitness, converged, "all-star alignment finished"
    );

    Ok(AlignmentSolution {
        pole: EquatorialCoord::new(solution.pole_dec, solution.pole_ra),
        ra_offset_deg: solution.offset,
        fitness,
        generations: generations_run,
        converged,
    })
}
