//! Runner tuning knobs, loadable from JSON.

use crate::settings::SettingsError;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Which decoded image fixes the resolution passed to the fitter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizePolicy {
    /// The last successfully decoded image wins. Images are not compared.
    #[default]
    LastDecoded,
    /// The first processed image fixes the size; decoded images of any
    /// other size are skipped as `SizeMismatch`.
    Strict,
}

/// Configuration for [`CalibrationRunner`](crate::CalibrationRunner).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerOptions {
    /// Half side of the sub-pixel refinement window, in pixels.
    pub refine_half_window: u32,
    pub size_policy: SizePolicy,
    /// Fewer processed images than this fail the job before fitting.
    /// Values below 1 are treated as 1.
    pub min_processed_images: usize,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            refine_half_window: 11,
            size_policy: SizePolicy::LastDecoded,
            min_processed_images: 1,
        }
    }
}

impl RunnerOptions {
    /// Effective processed-image floor.
    #[inline]
    pub fn min_processed(&self) -> usize {
        self.min_processed_images.max(1)
    }

    /// Load options from a JSON file; missing fields take defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write these options to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
