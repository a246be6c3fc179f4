//! Unit-sphere conversions and mount-frame transition matrices.
//!
//! The transition matrix maps equatorial coordinates into the mount's
//! local frame. It is composed from three elementary rotations: a spin
//! about the celestial polar axis by the pole's right ascension, a tilt
//! by the pole's declination, and a final spin about the mount's polar
//! axis by the right-ascension offset. The composition order is part of
//! the frame definition and must not be changed; the inverse is built
//! from the individually inverted factors applied in reverse order.

use nalgebra::{Matrix3, Vector3};

use crate::coord::{wrap_degrees, EquatorialCoord};

/// Converts spherical coordinates with unit radius to cartesian.
pub fn polar_to_cartesian(polar: EquatorialCoord) -> Vector3<f64> {
    let rad_dec = polar.dec_deg.to_radians();
    let rad_ra = polar.ra_deg.to_radians();
    let cos_dec = rad_dec.cos();

    Vector3::new(cos_dec * rad_ra.cos(), cos_dec * rad_ra.sin(), rad_dec.sin())
}

/// Converts a unit cartesian vector back to spherical coordinates.
///
/// The z component is clamped before the arcsine so that vectors
/// perturbed marginally off the unit sphere by rotation round-off do
/// not produce NaN declinations.
pub fn cartesian_to_polar(cartesian: Vector3<f64>) -> EquatorialCoord {
    let ra = wrap_degrees(cartesian.y.atan2(cartesian.x).to_degrees());
    let dec = cartesian.z.clamp(-1.0, 1.0).asin().to_degrees();

    EquatorialCoord::new(dec, ra)
}

/// Applies a frame transition to a spherical coordinate.
pub fn polar_to_polar(transition: &Matrix3<f64>, polar: EquatorialCoord) -> EquatorialCoord {
    cartesian_to_polar(transition * polar_to_cartesian(polar))
}

/// Tilt by declination: rotates the pole down from the zenith.
pub fn dec_rotation(dec_deg: f64) -> Matrix3<f64> {
    let cos_dec = dec_deg.to_radians().cos();
    let sin_dec = dec_deg.to_radians().sin();

    #[rustfmt::skip]
    let m = Matrix3::new(
        sin_dec, 0.0, -cos_dec,
        0.0,     1.0,  0.0,
        cos_dec, 0.0,  sin_dec,
    );
    m
}

pub fn dec_rotation_inverse(dec_deg: f64) -> Matrix3<f64> {
    let cos_dec = dec_deg.to_radians().cos();
    let sin_dec = dec_deg.to_radians().sin();

    #[rustfmt::skip]
    let m = Matrix3::new(
         sin_dec, 0.0, cos_dec,
         0.0,     1.0, 0.0,
        -cos_dec, 0.0, sin_dec,
    );
    m
}

/// Spin about the polar axis by right ascension.
pub fn ra_rotation(ra_deg: f64) -> Matrix3<f64> {
    let cos_ra = ra_deg.to_radians().cos();
    let sin_ra = ra_deg.to_radians().sin();

    #[rustfmt::skip]
    let m = Matrix3::new(
         cos_ra, sin_ra, 0.0,
        -sin_ra, cos_ra, 0.0,
         0.0,    0.0,    1.0,
    );
    m
}

pub fn ra_rotation_inverse(ra_deg: f64) -> Matrix3<f64> {
    let cos_ra = ra_deg.to_radians().cos();
    let sin_ra = ra_deg.to_radians().sin();

    #[rustfmt::skip]
    let m = Matrix3::new(
        cos_ra, -sin_ra, 0.0,
        sin_ra,  cos_ra, 0.0,
        0.0,     0.0,    1.0,
    );
    m
}

/// Equatorial frame to mount frame.
pub fn transition_matrix(pole: EquatorialCoord, ra_offset_deg: f64) -> Matrix3<f64> {
    ra_rotation(ra_offset_deg) * dec_rotation(pole.dec_deg) * ra_rotation(pole.ra_deg)
}

/// Mount frame back to equatorial frame.
pub fn inverse_transition_matrix(pole: EquatorialCoord, ra_offset_deg: f64) -> Matrix3<f64> {
    ra_rotation_inverse(pole.ra_deg)
        * dec_rotation_inverse(pole.dec_deg)
        * ra_rotation_inverse(ra_offset_deg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_polar_cartesian_round_trip() {
        for &(dec, ra) in &[
            (0.0, 0.0),
            (45.0, 90.0),
            (-30.0, 200.0),
            (89.5, 359.0),
            (-89.5, 10.0),
        ] {
            let back = cartesian_to_polar(polar_to_cartesian(EquatorialCoord::new(dec, ra)));
            assert_relative_eq!(back.dec_deg, dec, epsilon = 1e-10);
            assert_relative_eq!(back.ra_deg, ra, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_cartesian_to_polar_clamps_z() {
        let off_sphere = Vector3::new(0.0, 0.0, 1.0 + 1e-15);
        let polar = cartesian_to_polar(off_sphere);
        assert!(polar.dec_deg.is_finite());
        assert_relative_eq!(polar.dec_deg, 90.0);
    }

    #[test]
    fn test_perfectly_aligned_pole_is_identity() {
        let t = transition_matrix(EquatorialCoord::new(90.0, 0.0), 0.0);
        assert_relative_eq!(t, Matrix3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_inverses() {
        let d = dec_rotation(37.0) * dec_rotation_inverse(37.0);
        let r = ra_rotation(122.0) * ra_rotation_inverse(122.0);
        assert_relative_eq!(d, Matrix3::identity(), epsilon = 1e-12);
        assert_relative_eq!(r, Matrix3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_transition_round_trip_on_the_sphere() {
        let pole = EquatorialCoord::new(70.0, 30.0);
        let offset = 10.0;
        let forward = transition_matrix(pole, offset);
        let inverse = inverse_transition_matrix(pole, offset);

        for &(dec, ra) in &[(10.0, 40.0), (45.0, 130.0), (-20.0, 220.0), (60.0, 310.0)] {
            let point = EquatorialCoord::new(dec, ra);
            let back = polar_to_polar(&inverse, polar_to_polar(&forward, point));
            assert_relative_eq!(back.dec_deg, dec, epsilon = 1e-9);
            assert_relative_eq!(back.ra_deg, ra, epsilon = 1e-9);
        }

        assert_relative_eq!(forward * inverse, Matrix3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_transition_preserves_norm() {
        let t = transition_matrix(EquatorialCoord::new(50.0, 200.0), 33.0);
        let v = polar_to_cartesian(EquatorialCoord::new(12.0, 250.0));
        assert_relative_eq!((t * v).norm(), 1.0, epsilon = 1e-12);
    }
}
