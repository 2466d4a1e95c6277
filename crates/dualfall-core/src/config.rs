use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::Size;

/// Configuration for a simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Grid width in cells
    pub width: usize,
    /// Grid height in cells
    pub height: usize,
    /// Row offset from the horizontal midline on which placed figures rest
    pub spawn_offset: i32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::classic()
    }
}

impl SimulationConfig {
    pub fn classic() -> Self {
        Self {
            width: 10,
            height: 28,
            spawn_offset: 0,
        }
    }

    pub fn compact() -> Self {
        Self {
            width: 4,
            height: 8,
            spawn_offset: 0,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Absolute row a placed figure's bottom edge aligns to.
    pub fn spawn_row(&self) -> i32 {
        (self.height / 2) as i32 + self.spawn_offset
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        let reason = if self.width == 0 {
            Some("width must be positive")
        } else if self.height < 2 {
            Some("height must leave a row for each mass")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(SimulationError::InvalidSize {
                width: self.width,
                height: self.height,
                reason,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        assert!(SimulationConfig::classic().validate().is_ok());
        assert!(SimulationConfig::compact().validate().is_ok());
        assert_eq!(SimulationConfig::compact().spawn_row(), 4);
    }

    #[test]
    fn test_rejects_degenerate_sizes() {
        let mut config = SimulationConfig::compact();
        config.width = 0;
        assert!(matches!(
            config.validate(),
            Err(SimulationError::InvalidSize { .. })
        ));
        config.width = 4;
        config.height = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: SimulationConfig = serde_json::from_str(r#"{"width": 6}"#).unwrap();
        assert_eq!(config.width, 6);
        assert_eq!(config.height, 28);
        assert_eq!(config.spawn_offset, 0);
    }
}
