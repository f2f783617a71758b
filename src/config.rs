use crate::core::{CombineParams, KinematicsParams, NoiseParams, RfiParams};
use crate::io::LoaderParams;
use crate::types::{SpectroError, SpectroResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Parameters of every pipeline stage. Missing JSON keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub loader: LoaderParams,
    pub combine: CombineParams,
    pub rfi: RfiParams,
    pub noise: NoiseParams,
    pub kinematics: KinematicsParams,
    /// Newkirk density-model fold (1-4)
    pub fold: u8,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            loader: LoaderParams::default(),
            combine: CombineParams::default(),
            rfi: RfiParams::default(),
            noise: NoiseParams::default(),
            kinematics: KinematicsParams::default(),
            fold: 1,
        }
    }
}

impl AnalysisConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> SpectroResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config: AnalysisConfig = serde_json::from_str(&contents).map_err(|e| {
            SpectroError::Format(format!("parsing config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        log::debug!("Loaded analysis config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> SpectroResult<()> {
        if !(1..=4).contains(&self.fold) {
            return Err(SpectroError::InvalidParameter(format!(
                "fold must be 1-4, got {}",
                self.fold
            )));
        }
        if self.combine.min_gap_seconds > self.combine.max_gap_seconds {
            return Err(SpectroError::InvalidParameter(
                "min_gap_seconds exceeds max_gap_seconds".to_string(),
            ));
        }
        if !(self.kinematics.seconds_per_sample > 0.0) {
            return Err(SpectroError::InvalidParameter(
                "seconds_per_sample must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_json(&self) -> SpectroResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SpectroError::Format(format!("serializing config: {}", e)))
    }
}
