//! Time sources for sidereal pointing.
//!
//! Pointing needs the local sidereal time: the hour angle between the
//! local meridian and the zero of right ascension. It is derived from
//! UTC and the observer's longitude with the USNO closed-form GMST
//! approximation, good to about a second over the years this mount will
//! see.

use chrono::{DateTime, Utc};

/// Unix milliseconds of the J2000.0 epoch (2000-01-01 12:00:00 UTC).
pub const J2000_UNIX_MS: i64 = 946_728_000_000;

/// Provides calendar and sidereal time to the planner.
pub trait TimeSource {
    fn now_utc(&self) -> DateTime<Utc>;

    /// Local sidereal time in decimal hours, `[0, 24)`.
    fn local_sidereal_hours(&self) -> f64;
}

/// Days elapsed since the J2000.0 epoch, fractional.
pub fn days_since_j2000(utc: DateTime<Utc>) -> f64 {
    (utc.timestamp_millis() - J2000_UNIX_MS) as f64 / 86_400_000.0
}

/// Julian centuries elapsed since J2000.0, for the precession terms.
pub fn julian_centuries_since_j2000(utc: DateTime<Utc>) -> f64 {
    days_since_j2000(utc) / 36_525.0
}

/// Greenwich mean sidereal time in decimal hours, `[0, 24)`.
///
/// <https://aa.usno.navy.mil/faq/GAST>
pub fn gmst_hours(utc: DateTime<Utc>) -> f64 {
    (18.697_374_558 + 24.065_709_824_419_08 * days_since_j2000(utc)).rem_euclid(24.0)
}

/// Wall-clock time source for a fixed observer longitude.
#[derive(Debug, Clone)]
pub struct SystemClock {
    longitude_deg: f64,
}

impl SystemClock {
    pub fn new(longitude_deg: f64) -> Self {
        Self { longitude_deg }
    }
}

impl TimeSource for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_sidereal_hours(&self) -> f64 {
        (gmst_hours(self.now_utc()) + self.longitude_deg / 15.0).rem_euclid(24.0)
    }
}

/// Frozen time source for deterministic tests.
#[derive(Debug, Clone)]
pub struct FixedTimeSource {
    pub now: DateTime<Utc>,
    pub lst_hours: f64,
}

impl FixedTimeSource {
    pub fn new(now: DateTime<Utc>, lst_hours: f64) -> Self {
        Self { now, lst_hours }
    }

    /// Frozen at the J2000.0 epoch.
    pub fn at_j2000(lst_hours: f64) -> Self {
        Self {
            now: DateTime::from_timestamp_millis(J2000_UNIX_MS).unwrap_or_default(),
            lst_hours,
        }
    }
}

impl TimeSource for FixedTimeSource {
    fn now_utc(&self) -> DateTime<Utc> {
        self.now
    }

    fn local_sidereal_hours(&self) -> f64 {
        self.lst_hours
    }
}
