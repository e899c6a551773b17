//! VM configuration

use crate::error::{VmError, VmResult};
use serde::{Deserialize, Serialize};

/// When precompiled straight-line segments are built for hot code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Never build segments
    #[default]
    Off,
    /// Build on the executing thread when code turns hot
    Inline,
    /// Build on the rayon pool when code turns hot
    Background,
}

/// VM configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VmConfig {
    /// Maximum number of analyzed code entries kept in the cache
    pub code_cache_capacity: usize,
    /// Segment analysis mode
    pub analysis_mode: AnalysisMode,
    /// Executions after which code is considered hot
    pub segment_threshold: u64,
    /// Log unexpected precompile faults at error level
    pub log_precompile_faults: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            code_cache_capacity: 16_384,
            analysis_mode: AnalysisMode::Off,
            segment_threshold: 57,
            log_precompile_faults: true,
        }
    }
}

impl VmConfig {
    /// Check invariants
    pub fn validate(&self) -> VmResult<()> {
        if self.code_cache_capacity == 0 {
            return Err(VmError::Configuration(
                "code cache capacity must be positive".to_string(),
            ));
        }
        if self.analysis_mode != AnalysisMode::Off && self.segment_threshold == 0 {
            return Err(VmError::Configuration(
                "segment threshold must be positive when analysis is on".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = VmConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis_mode, AnalysisMode::Off);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = VmConfig {
            code_cache_capacity: 0,
            ..VmConfig::default()
        };
        assert!(matches!(config.validate(), Err(VmError::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_zero_threshold_when_on() {
        let mut config = VmConfig {
            segment_threshold: 0,
            ..VmConfig::default()
        };
        assert!(config.validate().is_ok());
        config.analysis_mode = AnalysisMode::Inline;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let config: VmConfig =
            serde_json::from_str(r#"{"analysisMode": "background", "segmentThreshold": 3}"#)
                .unwrap();
        assert_eq!(config.analysis_mode, AnalysisMode::Background);
        assert_eq!(config.segment_threshold, 3);
        assert_eq!(config.code_cache_capacity, 16_384);
    }
}
