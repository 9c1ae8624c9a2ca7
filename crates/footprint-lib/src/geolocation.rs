//! Best-effort device location used by "recenter on me"

use crate::{EngineError, Result};

/// Source of the user's current position
pub trait GeolocationProvider {
    /// Current position as `(lat, lon)` in degrees
    fn current_position(&self) -> Result<(f64, f64)>;
}

/// A position configured up front (e.g. from the command line)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedLocation {
    pub lat: f64,
    pub lon: f64,
}

impl FixedLocation {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl GeolocationProvider for FixedLocation {
    fn current_position(&self) -> Result<(f64, f64)> {
        let valid = self.lat.is_finite()
            && self.lon.is_finite()
            && self.lat.abs() <= 90.0
            && self.lon.abs() <= 180.0;
        if !valid {
            return Err(EngineError::GeolocationUnavailable(format!(
                "configured position ({}, {}) is out of range",
                self.lat, self.lon
            )));
        }
        Ok((self.lat, self.lon))
    }
}

/// Provider for hosts without any location source
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeolocation;

impl GeolocationProvider for NoGeolocation {
    fn current_position(&self) -> Result<(f64, f64)> {
        Err(EngineError::GeolocationUnavailable(
            "no location source configured".to_string(),
        ))
    }
}
