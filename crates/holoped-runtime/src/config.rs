//! [`SessionConfig`] – tunables shared by the frame synchronizer and session.

use holoped_kernel::DEFAULT_SCALE;
use holoped_types::HoloError;
use serde::{Deserialize, Serialize};

/// Configuration bundle for a visualization session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Backend units per headset world unit.
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// Animation rate of a standing pedestrian.
    #[serde(default = "default_base_speed")]
    pub base_speed: f32,
    /// How strongly walking speed accelerates the animation.
    #[serde(default = "default_speed_multiplier")]
    pub speed_multiplier: f32,
}

fn default_scale() -> f32 {
    DEFAULT_SCALE
}
fn default_base_speed() -> f32 {
    1.6
}
fn default_speed_multiplier() -> f32 {
    0.5
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            base_speed: default_base_speed(),
            speed_multiplier: default_speed_multiplier(),
        }
    }
}

impl SessionConfig {
    /// Reject values the coordinate remap or animation cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`HoloError::Config`] when `scale` is not a positive finite
    /// number or either animation parameter is not finite.
    pub fn validate(&self) -> Result<(), HoloError> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(HoloError::Config(format!(
                "scale must be positive and finite, got {}",
                self.scale
            )));
        }
        if !self.base_speed.is_finite() || !self.speed_multiplier.is_finite() {
            return Err(HoloError::Config(
                "animation speed parameters must be finite".to_string(),
            ));
        }
        Ok(())
    }
}
