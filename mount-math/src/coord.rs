//! Equatorial coordinate pair and angle folding helpers.

/// A point on the celestial sphere, in degrees.
///
/// Declination is measured from the celestial equator (`[-90, 90]`),
/// right ascension eastward along it (`[0, 360)`). The same type also
/// carries mount-local orientations, where "declination" is the angle
/// from the mount's equatorial plane and "right ascension" the rotation
/// about its polar axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquatorialCoord {
    pub dec_deg: f64,
    pub ra_deg: f64,
}

impl EquatorialCoord {
    pub fn new(dec_deg: f64, ra_deg: f64) -> Self {
        Self { dec_deg, ra_deg }
    }
}

/// Folds an angle into `[0, 360)`.
pub fn wrap_degrees(angle_deg: f64) -> f64 {
    angle_deg.rem_euclid(360.0)
}

/// Folds an angle into `[-180, 180)`.
pub fn wrap_signed_degrees(angle_deg: f64) -> f64 {
    (angle_deg + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wrap_degrees() {
        assert_relative_eq!(wrap_degrees(370.0), 10.0);
        assert_relative_eq!(wrap_degrees(-10.0), 350.0);
        assert_relative_eq!(wrap_degrees(720.0), 0.0);
        assert_relative_eq!(wrap_degrees(359.5), 359.5);
    }

    #[test]
    fn test_wrap_signed_degrees() {
        assert_relative_eq!(wrap_signed_degrees(190.0), -170.0);
        assert_relative_eq!(wrap_signed_degrees(-190.0), 170.0);
        assert_relative_eq!(wrap_signed_degrees(45.0), 45.0);
        assert_relative_eq!(wrap_signed_degrees(-180.0), -180.0);
    }
}
