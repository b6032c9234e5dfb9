//! Versioned disclosure-tier presets, checked against the registry once.

use lexrank_core::config::{PresetSettings, TierPreset};
use lexrank_core::error::{Error, Result};
use lexrank_core::registry::SpaceRegistry;
use lexrank_core::types::DisclosureTier;

use crate::composer::is_unit_weight;

#[derive(Debug, Clone)]
pub struct TierPresets {
    settings: PresetSettings,
}

impl TierPresets {
    pub fn new(settings: PresetSettings, registry: &SpaceRegistry) -> Result<Self> {
        let presets = Self { settings };
        for tier in DisclosureTier::ALL {
            validate(tier, presets.for_tier(tier), registry)?;
        }
        Ok(presets)
    }

    pub fn for_tier(&self, tier: DisclosureTier) -> &TierPreset {
        match tier {
            DisclosureTier::Discovery => &self.settings.discovery,
            DisclosureTier::Exploration => &self.settings.exploration,
            DisclosureTier::DeepDive => &self.settings.deep_dive,
        }
    }

    pub fn settings(&self) -> &PresetSettings {
        &self.settings
    }
}

fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

fn validate(tier: DisclosureTier, preset: &TierPreset, registry: &SpaceRegistry) -> Result<()> {
    for (name, weight) in &preset.weights {
        let space = registry
            .resolve(name)
            .map_err(|_| Error::config(format!("preset '{tier}' references unknown space '{name}'")))?;
        if space.entity != preset.entity {
            return Err(Error::config(format!(
                "preset '{tier}' targets {} but space '{name}' belongs to {}",
                preset.entity, space.entity
            )));
        }
        if !non_negative(*weight) {
            return Err(Error::config(format!("preset '{tier}': weight of '{name}' must be finite and >= 0")));
        }
    }
    if !preset.weights.values().any(|w| *w > 0.0) {
        return Err(Error::config(format!("preset '{tier}' has no positive weight")));
    }
    if !is_unit_weight(preset.hierarchy_weight) || !is_unit_weight(preset.recency_weight) {
        return Err(Error::config(format!(
            "preset '{tier}': hierarchy and recency weights must lie in [0, 1]"
        )));
    }
    Ok(())
}
