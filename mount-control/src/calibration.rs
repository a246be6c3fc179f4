//! Calibration sample collection for all-star alignment.

use mount_math::EquatorialCoord;
use tracing::warn;

/// Most sample pairs a single alignment run will use.
pub const MAX_CALIBRATION_PAIRS: usize = 12;

/// Bounded buffer of (kernel, image) sample pairs gathered during one
/// interactive alignment session.
///
/// The kernel is the catalog equatorial coordinate the user centered;
/// the image is the mount-local orientation it was actually found at.
#[derive(Debug, Default, Clone)]
pub struct CalibrationSession {
    kernel: Vec<EquatorialCoord>,
    image: Vec<EquatorialCoord>,
}

impl CalibrationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one sample pair. Returns false (and keeps the buffer
    /// unchanged) once the session is full.
    pub fn add_pair(&mut self, kernel: EquatorialCoord, image: EquatorialCoord) -> bool {
        if self.is_full() {
            warn!(
                limit = MAX_CALIBRATION_PAIRS,
                "calibration buffer full, sample rejected"
            );
            return false;
        }
        self.kernel.push(kernel);
        self.image.push(image);
        true
    }

    pub fn clear(&mut self) {
        self.kernel.clear();
        self.image.clear();
    }

    pub fn len(&self) -> usize {
        self.kernel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernel.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.kernel.len() >= MAX_CALIBRATION_PAIRS
    }

    pub fn kernel(&self) -> &[EquatorialCoord] {
        &self.kernel
    }

    pub fn image(&self) -> &[EquatorialCoord] {
        &self.image
    }
}
