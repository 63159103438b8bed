//! Per-user preference document.
//!
//! Scalars have a single owner (the device editing them); the `custom*`
//! lists are user-extensible option sets that grow on every device and are
//! merged by union.

use serde::{Deserialize, Serialize};

/// User preferences synced alongside the records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferenceSet {
    /// UI theme name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    /// Distance unit shown in the UI (`"km"`, `"mi"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_unit: Option<String>,
    /// Initial map zoom level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_zoom: Option<f64>,
    /// Whether the periodic sync is enabled on this device.
    pub auto_sync: bool,
    /// User-defined behavior options.
    pub custom_behaviors: Vec<String>,
    /// User-defined color options.
    pub custom_colors: Vec<String>,
    /// User-defined tags.
    pub custom_tags: Vec<String>,
    /// User-defined named locations.
    pub custom_locations: Vec<String>,
}

impl PreferenceSet {
    /// Returns the extensible list fields as `(name, values)` pairs.
    pub fn option_lists(&self) -> [(&'static str, &Vec<String>); 4] {
        [
            ("customBehaviors", &self.custom_behaviors),
            ("customColors", &self.custom_colors),
            ("customTags", &self.custom_tags),
            ("customLocations", &self.custom_locations),
        ]
    }
}
