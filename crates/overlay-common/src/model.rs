//! Model-run provenance identity.

use serde::{Deserialize, Serialize};

/// Identity of one model run, as encoded in the remote file name.
///
/// Two downloads with equal `ModelRun`s carry the same raster, so the
/// freshness policy compares these instead of re-downloading payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRun {
    /// Model name, e.g. "RAQDPS" or "RDAQA"
    pub model: String,
    /// Pollutant file-name fragment the run was fetched for
    pub pollutant: String,
    /// Run date, `yyyyMMdd`
    pub date: String,
    /// Run hour of day, `HH` (observation analyses run hourly)
    pub run_hour: String,
    /// Forecast offset hour, zero-padded; "000" for observations
    pub offset_hour: String,
}

impl ModelRun {
    pub fn new(
        model: impl Into<String>,
        pollutant: impl Into<String>,
        date: impl Into<String>,
        run_hour: impl Into<String>,
        offset_hour: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            pollutant: pollutant.into(),
            date: date.into(),
            run_hour: run_hour.into(),
            offset_hour: offset_hour.into(),
        }
    }
}

impl std::fmt::Display for ModelRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}{} run {}Z+{}",
            self.model, self.date, self.pollutant, self.run_hour, self.offset_hour
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_field_wise() {
        let a = ModelRun::new("RDAQA", "_PM2.5_Sfc", "20250802", "13", "000");
        let b = ModelRun::new("RDAQA", "_PM2.5_Sfc", "20250802", "13", "000");
        let c = ModelRun::new("RDAQA", "_PM2.5_Sfc", "20250802", "14", "000");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
