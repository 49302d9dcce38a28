//! Emotional modulation sliders and the prompt parameters they map to.
//!
//! Sliders are conventionally in `[0, 1]` but are never clamped; out of
//! range values flow straight through the mapping.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameter name → value, as persisted with each version.
pub type ParamMap = BTreeMap<String, f64>;

/// User-facing sliders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModulationParams {
    /// Higher is more dramatic, sharper beats.
    pub tension: f64,
    /// Higher is more guarded, less direct.
    pub emotional_distance: f64,
    /// Higher is more pauses, fewer lines.
    pub silence_density: f64,
}

impl Default for ModulationParams {
    fn default() -> Self {
        Self {
            tension: 0.5,
            emotional_distance: 0.5,
            silence_density: 0.3,
        }
    }
}

impl ModulationParams {
    pub fn new(tension: f64, emotional_distance: f64, silence_density: f64) -> Self {
        Self {
            tension,
            emotional_distance,
            silence_density,
        }
    }

    /// Map sliders onto the prompt's 1–10 scales.
    pub fn to_prompt_params(&self) -> PromptParams {
        PromptParams {
            emotional_intensity: 1.0 + self.tension * 9.0,
            emotional_distance: 1.0 + self.emotional_distance * 9.0,
            silence_density: self.silence_density,
        }
    }
}

/// Parameters as they appear in the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PromptParams {
    /// Roughly 1–10.
    pub emotional_intensity: f64,
    /// Roughly 1–10.
    pub emotional_distance: f64,
    pub silence_density: f64,
}

impl Default for PromptParams {
    fn default() -> Self {
        Self {
            emotional_intensity: 5.0,
            emotional_distance: 5.0,
            silence_density: 0.3,
        }
    }
}

impl PromptParams {
    /// Back onto a `[0, 1]`-style scale for reporting and persistence.
    ///
    /// The 1–10 values are divided by ten, so a tension slider of 0.5
    /// reports as 0.55.
    pub fn normalized(&self) -> ParamMap {
        let mut params = ParamMap::new();
        params.insert("tension".to_string(), self.emotional_intensity / 10.0);
        params.insert(
            "emotional_distance".to_string(),
            self.emotional_distance / 10.0,
        );
        params.insert("silence_density".to_string(), self.silence_density);
        params
    }
}

/// Reported parameters when generation ran without sliders.
pub fn default_emotional_params() -> ParamMap {
    let defaults = ModulationParams::default();
    let mut params = ParamMap::new();
    params.insert("tension".to_string(), defaults.tension);
    params.insert("emotional_distance".to_string(), defaults.emotional_distance);
    params.insert("silence_density".to_string(), defaults.silence_density);
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_prompt_mapping() {
        let params = ModulationParams::new(0.0, 1.0, 0.7).to_prompt_params();
        assert!(close(params.emotional_intensity, 1.0));
        assert!(close(params.emotional_distance, 10.0));
        assert!(close(params.silence_density, 0.7));
    }

    #[test]
    fn test_out_of_range_passes_through() {
        let params = ModulationParams::new(2.0, -1.0, 5.0).to_prompt_params();
        assert!(close(params.emotional_intensity, 19.0));
        assert!(close(params.emotional_distance, -8.0));
        assert!(close(params.silence_density, 5.0));
    }

    #[test]
    fn test_normalized_divides_by_ten() {
        let normalized = ModulationParams::default().to_prompt_params().normalized();
        assert!(close(normalized["tension"], 0.55));
        assert!(close(normalized["emotional_distance"], 0.55));
        assert!(close(normalized["silence_density"], 0.3));
    }

    #[test]
    fn test_default_emotional_params() {
        let params = default_emotional_params();
        assert_eq!(params.len(), 3);
        assert!(close(params["tension"], 0.5));
        assert!(close(params["silence_density"], 0.3));
    }
}
