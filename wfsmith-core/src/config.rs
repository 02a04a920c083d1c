use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level wfsmith configuration, matching `wfsmith.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WfsmithConfig {
    #[serde(default)]
    pub detect: DetectSection,
    #[serde(default)]
    pub synthesize: SynthesizeSection,
}

/// Options for the microstructure detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectSection {
    /// Unify partially-overlapping patterns into composites.
    #[serde(default)]
    pub combine: bool,
    /// Keep patterns whose frequency never varies with graph size.
    #[serde(default)]
    pub include_trivial: bool,
    /// How many of the smallest traces to record as interpolation anchors.
    #[serde(default = "default_bases")]
    pub bases: usize,
}

fn default_bases() -> usize {
    1
}

impl Default for DetectSection {
    fn default() -> Self {
        Self {
            combine: false,
            include_trivial: false,
            bases: 1,
        }
    }
}

/// Options for the synthesis engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizeSection {
    /// Seed for the injected random source; `None` seeds from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Allow cloning patterns with ambiguous structural overlap.
    #[serde(default)]
    pub allow_complex: bool,
}

impl Default for SynthesizeSection {
    fn default() -> Self {
        Self {
            seed: None,
            allow_complex: false,
        }
    }
}

impl WfsmithConfig {
    /// Load and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let config: Self = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.detect.bases == 0 {
            return Err(ConfigError::Invalid(
                "detect.bases must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
