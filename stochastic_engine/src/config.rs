use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Engine-wide constants. Loaded from JSON, missing fields take the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Clock ticks per quarter note.
    pub ppqn: u32,
    /// Resolution the sequence divisor is expressed in.
    pub sequence_ppqn: u32,
    pub gate_queue_capacity: usize,
    pub cv_queue_capacity: usize,
    pub record_history_capacity: usize,
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ppqn: 192,
            sequence_ppqn: 48,
            gate_queue_capacity: 16,
            cv_queue_capacity: 16,
            record_history_capacity: 16,
            seed: 0x5EED,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.ppqn == 0 || self.sequence_ppqn == 0 {
            return Err(EngineError::InvalidConfig(
                "ppqn values must be non-zero".into(),
            ));
        }
        if self.ppqn % self.sequence_ppqn != 0 {
            return Err(EngineError::InvalidConfig(format!(
                "ppqn {} is not a multiple of sequence_ppqn {}",
                self.ppqn, self.sequence_ppqn
            )));
        }
        // A gate needs room for its on and off entries.
        if self.gate_queue_capacity < 2 {
            return Err(EngineError::InvalidConfig(format!(
                "gate_queue_capacity must be at least 2, got {}",
                self.gate_queue_capacity
            )));
        }
        if self.cv_queue_capacity == 0 || self.record_history_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "queue capacities must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Converts a sequence divisor into clock ticks.
    pub fn divisor_ticks(&self, sequence_divisor: i32) -> u32 {
        let scale = self.ppqn / self.sequence_ppqn.max(1);
        (sequence_divisor.max(1) as u32).saturating_mul(scale).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.divisor_ticks(12), 48);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            EngineConfig::from_json(r#"{ "seed": 7, "gate_queue_capacity": 32 }"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.gate_queue_capacity, 32);
        assert_eq!(config.ppqn, 192);
    }

    #[test]
    fn test_rejects_bad_ratio() {
        let err = EngineConfig::from_json(r#"{ "ppqn": 100, "sequence_ppqn": 48 }"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_tiny_gate_queue() {
        let config = EngineConfig {
            gate_queue_capacity: 1,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_divisor_ticks_saturates() {
        let config = EngineConfig::default();
        assert_eq!(config.divisor_ticks(0), 4);
        assert_eq!(config.divisor_ticks(i32::MAX), u32::MAX);
    }
}
