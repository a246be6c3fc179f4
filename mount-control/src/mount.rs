//! The mount controller: equatorial targets in, axis revolutions out.
//!
//! All pointing goes through the misalignment transform: a target in
//! equatorial coordinates is first shifted into the time-dependent
//! global frame (`180° − ra + 15°·LST`), then rotated into the mount's
//! local frame, and finally converted into motor revolutions through
//! the gear train. Slews are corrected once for the sidereal drift
//! accumulated over their own estimated duration.

use mount_math::alignment::{solve_alignment, AlignmentError, AlignmentSolution, EsConfig};
use mount_math::coord::{wrap_degrees, wrap_signed_degrees};
use mount_math::sphere::{inverse_transition_matrix, polar_to_polar, transition_matrix};
use mount_math::EquatorialCoord;
use nalgebra::Matrix3;
use pulse_engine::{PulseEngine, StepOutput};
use rand::Rng;
use thiserror::Error;
use tracing::{debug, info};

use crate::clock::{julian_centuries_since_j2000, TimeSource};

/// Gear train between motor shafts and mount axes.
#[derive(Debug, Clone)]
pub struct GearConfig {
    /// Motor gearbox reduction ratio, declination axis.
    pub reduction_dec: f64,
    /// Motor gearbox reduction ratio, right-ascension axis.
    pub reduction_ra: f64,
    /// Mount axis degrees per gearbox output revolution, declination.
    pub deg_per_mount_rev_dec: f64,
    /// Mount axis degrees per gearbox output revolution, right ascension.
    pub deg_per_mount_rev_ra: f64,
}

impl Default for GearConfig {
    fn default() -> Self {
        Self {
            reduction_dec: 8.0,
            reduction_ra: 8.0,
            deg_per_mount_rev_dec: 5.373_134_328_36,
            deg_per_mount_rev_ra: 2.686_567_164_18,
        }
    }
}

impl GearConfig {
    fn angle_to_revolutions(&self, dec_deg: f64, ra_deg: f64) -> (f64, f64) {
        (
            dec_deg * self.reduction_dec / self.deg_per_mount_rev_dec,
            ra_deg * self.reduction_ra / self.deg_per_mount_rev_ra,
        )
    }

    fn revolutions_to_angle(&self, dec_revs: f64, ra_revs: f64) -> (f64, f64) {
        (
            dec_revs * self.deg_per_mount_rev_dec / self.reduction_dec,
            ra_revs * self.deg_per_mount_rev_ra / self.reduction_ra,
        )
    }
}

#[derive(Error, Debug)]
pub enum MountError {
    #[error("target out of range (dec {dec_deg}, ra {ra_deg})")]
    TargetOutOfRange { dec_deg: f64, ra_deg: f64 },

    /// The integrated axis position left its mechanical bounds. Step
    /// tracking can no longer be trusted; the mount must be re-homed.
    #[error("mount orientation out of bounds (dec {dec_deg}, ra {ra_deg}), re-home required")]
    OrientationOutOfRange { dec_deg: f64, ra_deg: f64 },

    #[error(transparent)]
    Alignment(#[from] AlignmentError),
}

/// Motion planner for a two-axis equatorial mount.
pub struct MountController<O: StepOutput, T: TimeSource> {
    engine: PulseEngine<O>,
    clock: T,
    gears: GearConfig,
    pole: EquatorialCoord,
    ra_offset_deg: f64,
    transition: Matrix3<f64>,
    transition_inverse: Matrix3<f64>,
    tracking: bool,
}

impl<O: StepOutput, T: TimeSource> MountController<O, T> {
    pub fn new(engine: PulseEngine<O>, clock: T, gears: GearConfig) -> Self {
        let pole = EquatorialCoord::new(90.0, 0.0);
        let ra_offset_deg = 0.0;
        Self {
            engine,
            clock,
            gears,
            pole,
            ra_offset_deg,
            transition: transition_matrix(pole, ra_offset_deg),
            transition_inverse: inverse_transition_matrix(pole, ra_offset_deg),
            tracking: false,
        }
    }

    /// Resets the engine and the pole to the perfectly-aligned default.
    pub fn initialize(&mut self) {
        self.engine.initialize();
        self.tracking = false;
        self.set_pole(EquatorialCoord::new(90.0, 0.0), 0.0);
        info!("mount initialized");
    }

    /// Mount orientation in its own frame, integrated from motor
    /// telemetry. Leaving the mechanical bounds is fatal: the step
    /// count no longer corresponds to a physical pointing.
    pub fn local_orientation(&self) -> Result<EquatorialCoord, MountError> {
        let (dec_revs, ra_revs) = self.engine.made_revolutions();
        let (dec_deg, ra_deg) = self.gears.revolutions_to_angle(dec_revs, ra_revs);

        if !(-90.0..=90.0).contains(&dec_deg) || !(0.0..=360.0).contains(&ra_deg) {
            return Err(MountError::OrientationOutOfRange { dec_deg, ra_deg });
        }

        Ok(EquatorialCoord::new(dec_deg, ra_deg))
    }

    /// Mount orientation in equatorial coordinates at the current LST.
    pub fn global_orientation(&self) -> Result<EquatorialCoord, MountError> {
        let local = self.local_orientation()?;
        let mut global = polar_to_polar(&self.transition_inverse, local);
        global.ra_deg = self.to_time_global_ra(global.ra_deg);
        Ok(global)
    }

    /// Maps catalog right ascension onto the mount's global frame at
    /// the current LST. The global frame has its zero on the local
    /// meridian, with RA growing against the sky's rotation, hence the
    /// `180 − ra` flip.
    pub fn to_time_global_ra(&self, ra_deg: f64) -> f64 {
        wrap_degrees(180.0 - ra_deg + 15.0 * self.clock.local_sidereal_hours())
    }

    /// Same as [`Self::to_time_global_ra`], advanced by a slew lead in
    /// decimal hours.
    pub fn to_future_global_ra(&self, ra_deg: f64, future_hours: f64) -> f64 {
        wrap_degrees(180.0 - ra_deg + 15.0 * (self.clock.local_sidereal_hours() + future_hours))
    }

    fn check_target(dec_deg: f64, ra_deg: f64) -> Result<(), MountError> {
        if !(-90.0..=90.0).contains(&dec_deg) || !(0.0..360.0).contains(&ra_deg) {
            return Err(MountError::TargetOutOfRange { dec_deg, ra_deg });
        }
        Ok(())
    }

    /// Slews to an equatorial target at the current epoch.
    ///
    /// Two-pass targeting: the drift the sky accumulates during the
    /// slew itself (15°/hour for tens of seconds) is not negligible, so
    /// the move is first estimated against the current-time target and
    /// then re-aimed at where the target will be on arrival.
    pub fn move_absolute(&mut self, dec_deg: f64, ra_deg: f64) -> Result<(), MountError> {
        Self::check_target(dec_deg, ra_deg)?;

        self.stop_all();

        let aim = |controller: &Self, global_ra: f64| -> Result<(f64, f64), MountError> {
            let target = polar_to_polar(
                &controller.transition,
                EquatorialCoord::new(dec_deg, global_ra),
            );
            let origin = controller.local_orientation()?;
            Ok(controller.gears.angle_to_revolutions(
                target.dec_deg - origin.dec_deg,
                target.ra_deg - origin.ra_deg,
            ))
        };

        let (dec_revs, ra_revs) = aim(self, self.to_time_global_ra(ra_deg))?;
        let travel_hours =
            self.engine.estimate_fast_turn_time(dec_revs, ra_revs).as_secs_f64() / 3600.0;

        let (dec_revs, ra_revs) = aim(self, self.to_future_global_ra(ra_deg, travel_hours))?;

        info!(dec_deg, ra_deg, dec_revs, ra_revs, travel_hours, "absolute slew");
        self.engine.fast_turn(dec_revs, ra_revs, false);
        Ok(())
    }

    /// Slews to a J2000.0 catalog position, corrected for precession
    /// and nutation to the current epoch.
    ///
    /// First-order closed form, accurate to a few arc seconds over
    /// decades around J2000.
    pub fn move_absolute_j2000(&mut self, dec_deg: f64, ra_deg: f64) -> Result<(), MountError> {
        Self::check_target(dec_deg, ra_deg)?;

        let r = ra_deg.to_radians();
        let c = dec_deg.to_radians();
        let t = julian_centuries_since_j2000(self.clock.now_utc());

        let m = (1.281_232_3 * t + 0.000_387_9 * t * t + 0.000_010_1 * t * t * t).to_radians();
        let n = (0.556_753_0 * t - 0.000_118_5 * t * t - 0.000_011_6 * t * t * t).to_radians();

        let r_mid = r + 0.5 * (m + n * r.sin() * c.tan());
        let d_mid = c + 0.5 * n * r_mid.cos();

        let r_now = (r + m + n * r_mid.sin() * d_mid.tan()).rem_euclid(std::f64::consts::TAU);
        let d_now = (c + n * r_mid.cos()).to_degrees().clamp(-90.0, 90.0);

        self.move_absolute(d_now, r_now.to_degrees())
    }

    /// Slews by a delta in the mount's own frame, clamped to the axis
    /// bounds (declination mechanically, right ascension for cabling).
    pub fn move_relative_local(&mut self, dec_deg: f64, ra_deg: f64) -> Result<(), MountError> {
        self.stop_all();

        let origin = self.local_orientation()?;

        let mut dec_delta = dec_deg % 180.0;
        let mut ra_delta = ra_deg % 360.0;

        if origin.dec_deg + dec_delta < -90.0 {
            dec_delta = -90.0 - origin.dec_deg;
        } else if origin.dec_deg + dec_delta > 90.0 {
            dec_delta = 90.0 - origin.dec_deg;
        }

        if origin.ra_deg + ra_delta < 0.0 {
            ra_delta = -origin.ra_deg;
        } else if origin.ra_deg + ra_delta > 360.0 {
            ra_delta = 360.0 - origin.ra_deg;
        }

        let (dec_revs, ra_revs) = self.gears.angle_to_revolutions(dec_delta, ra_delta);

        debug!(dec_delta, ra_delta, "relative local slew");
        self.engine.fast_turn(dec_revs, ra_revs, false);
        Ok(())
    }

    /// Slews by a delta in equatorial coordinates. Crossing a pole
    /// reflects declination and flips right ascension by 180°.
    pub fn move_relative_global(&mut self, dec_deg: f64, ra_deg: f64) -> Result<(), MountError> {
        self.stop_all();

        let dec_delta = wrap_signed_degrees(dec_deg);
        let mut ra_delta = wrap_signed_degrees(ra_deg);

        let origin = self.local_orientation()?;
        let mut global = polar_to_polar(&self.transition_inverse, origin);

        global.dec_deg += dec_delta;
        if global.dec_deg > 90.0 {
            ra_delta += 180.0;
            global.dec_deg = 180.0 - global.dec_deg;
        } else if global.dec_deg < -90.0 {
            ra_delta += 180.0;
            global.dec_deg = -180.0 - global.dec_deg;
        }
        global.ra_deg = wrap_degrees(global.ra_deg + ra_delta);

        let aim = |controller: &Self, global: EquatorialCoord| -> (f64, f64) {
            let target = polar_to_polar(&controller.transition, global);
            controller.gears.angle_to_revolutions(
                target.dec_deg - origin.dec_deg,
                target.ra_deg - origin.ra_deg,
            )
        };

        // Same sidereal lead as move_absolute, here applied in degrees
        // directly to the global frame.
        let (dec_revs, ra_revs) = aim(self, global);
        let lead_deg =
            self.engine.estimate_fast_turn_time(dec_revs, ra_revs).as_secs_f64() * 15.0 / 3600.0;
        global.ra_deg = wrap_degrees(global.ra_deg + lead_deg);

        let (dec_revs, ra_revs) = aim(self, global);

        debug!(dec_delta, ra_delta, lead_deg, "relative global slew");
        self.engine.fast_turn(dec_revs, ra_revs, false);
        Ok(())
    }

    /// Starts sidereal tracking from the current pointing.
    ///
    /// A misaligned mount sees the sky's uniform 15°/hour rotation as
    /// motion on both axes. The axis split comes from a closed-form
    /// derivative of the transformed declination; the approximation is
    /// exact at perfect alignment and degrades with pole error, which
    /// is acceptable for the small misalignments left after all-star
    /// alignment. The velocity is held constant for a one-hour queued
    /// move rather than rescheduled continuously.
    pub fn set_tracking(&mut self) -> Result<(), MountError> {
        const SIDEREAL_DEG_PER_HOUR: f64 = 15.0;

        let target = self.global_orientation()?;
        let (speed_dec, speed_ra) = self.ra_speed_transform(SIDEREAL_DEG_PER_HOUR, target);

        let (dec_revs, ra_revs) = self.gears.angle_to_revolutions(speed_dec, speed_ra);

        info!(
            target_dec = target.dec_deg,
            target_ra = target.ra_deg,
            speed_dec_dps = speed_dec / 3600.0,
            speed_ra_dps = speed_ra / 3600.0,
            "tracking started"
        );

        self.engine
            .slow_turn(dec_revs, ra_revs, dec_revs / 3600.0, ra_revs / 3600.0, true);
        self.tracking = true;
        Ok(())
    }

    /// Splits an equatorial angular velocity (degrees/hour) into mount
    /// axis components, as seen through the misalignment.
    ///
    /// `w_dec` is the derivative of the transformed declination
    /// (`d(asin z')/dt`), and the remainder `w_ra = sqrt(1 − w_dec²)`
    /// rides on the polar axis.
    fn ra_speed_transform(&self, ra_speed: f64, point: EquatorialCoord) -> (f64, f64) {
        let coscos = self.pole.dec_deg.to_radians().cos() * point.dec_deg.to_radians().cos();
        let sinsin = self.pole.dec_deg.to_radians().sin() * point.dec_deg.to_radians().sin();
        let real_ra = (point.ra_deg - self.ra_offset_deg).to_radians();

        let z_transformed = sinsin - coscos * real_ra.cos();
        let z_derivative = coscos * real_ra.sin();

        let denom = (1.0 - z_transformed * z_transformed).sqrt();
        let w_dec = if denom <= 0.0 { 0.0 } else { z_derivative / denom };
        let w_ra = (1.0 - w_dec * w_dec).max(0.0).sqrt();

        (ra_speed * w_dec, ra_speed * w_ra)
    }

    /// Immediate stop of both axes, motion and tracking alike.
    pub fn stop_all(&mut self) {
        self.engine.stop();
        self.tracking = false;
    }

    pub fn stop_tracking(&mut self) {
        if !self.tracking {
            return;
        }
        self.engine.stop();
        self.tracking = false;
    }

    pub fn is_moving(&self) -> bool {
        !self.engine.is_ready()
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    /// Commits a new pole and offset, rebuilding both cached transition
    /// matrices wholesale.
    pub fn set_pole(&mut self, pole: EquatorialCoord, ra_offset_deg: f64) {
        self.transition = transition_matrix(pole, ra_offset_deg);
        self.transition_inverse = inverse_transition_matrix(pole, ra_offset_deg);
        self.pole = pole;
        self.ra_offset_deg = ra_offset_deg;
    }

    pub fn pole(&self) -> EquatorialCoord {
        self.pole
    }

    pub fn ra_offset_deg(&self) -> f64 {
        self.ra_offset_deg
    }

    /// Recovers the pole and RA offset from calibration sample pairs
    /// and commits the best-found solution, converged or not.
    pub fn all_star_alignment<R: Rng + ?Sized>(
        &mut self,
        kernel: &[EquatorialCoord],
        image: &[EquatorialCoord],
        config: &EsConfig,
        rng: &mut R,
    ) -> Result<AlignmentSolution, MountError> {
        let solution = solve_alignment(kernel, image, config, rng)?;
        self.set_pole(solution.pole, solution.ra_offset_deg);
        info!(
            pole_dec = solution.pole.dec_deg,
            pole_ra = solution.pole.ra_deg,
            ra_offset = solution.ra_offset_deg,
            converged = solution.converged,
            "alignment committed"
        );
        Ok(solution)
    }

    /// Advances the pulse engine by one timer tick.
    pub fn on_tick(&mut self) {
        self.engine.on_tick();
    }

    pub fn engine(&self) -> &PulseEngine<O> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut PulseEngine<O> {
        &mut self.engine
    }

    pub fn clock(&self) -> &T {
        &self.clock
    }
}
