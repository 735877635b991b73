//! Per-sound volume settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Volume used for sounds that were never adjusted
pub const DEFAULT_VOLUME: u8 = 50;

/// Volume percentage (0-100) per sound id
///
/// Survives stop/play cycles; the surrounding settings layer decides whether
/// it is persisted beyond the session.
///
/// Loads from either `{"volumes": {"rain": 20}, "default": 50}` or a plain
/// `{"rain": 20}` map. Loaded values are clamped to 100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "VolumeFile")]
pub struct VolumeMap {
    volumes: HashMap<String, u8>,
    /// Volume for unset sounds; `None` reads as [`DEFAULT_VOLUME`]
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<u8>,
}

/// Accepted on-disk shapes of a volume map
#[derive(Deserialize)]
#[serde(untagged)]
enum VolumeFile {
    Full {
        volumes: HashMap<String, u8>,
        #[serde(default)]
        default: Option<u8>,
    },
    Plain(HashMap<String, u8>),
}

impl From<VolumeFile> for VolumeMap {
    fn from(file: VolumeFile) -> Self {
        let (volumes, default) = match file {
            VolumeFile::Full { volumes, default } => (volumes, default),
            VolumeFile::Plain(volumes) => (volumes, None),
        };
        VolumeMap {
            volumes: volumes
                .into_iter()
                .map(|(id, percent)| (id, percent.min(100)))
                .collect(),
            default: default.map(|percent| percent.min(100)),
        }
    }
}

impl VolumeMap {
    pub fn new() -> Self {
        VolumeMap {
            volumes: HashMap::new(),
            default: None,
        }
    }

    /// Create an empty map whose unset entries read as `default`
    pub fn with_default(default: u8) -> Self {
        VolumeMap {
            volumes: HashMap::new(),
            default: Some(default.min(100)),
        }
    }

    /// Use `default` for unset sounds unless the map already names one
    pub fn or_default(mut self, default: u8) -> Self {
        self.default.get_or_insert(default.min(100));
        self
    }

    /// Volume percentage for a sound
    pub fn get(&self, sound_id: &str) -> u8 {
        self.volumes
            .get(sound_id)
            .copied()
            .unwrap_or_else(|| self.default_volume())
    }

    /// Volume read by sounds that were never set
    pub fn default_volume(&self) -> u8 {
        self.default.unwrap_or(DEFAULT_VOLUME)
    }

    /// Set a sound's volume, clamped to 100
    pub fn set(&mut self, sound_id: &str, percent: u8) {
        self.volumes.insert(sound_id.to_string(), percent.min(100));
    }

    /// Volume as a linear gain in [0.0, 1.0]
    pub fn gain(&self, sound_id: &str) -> f32 {
        percent_to_gain(self.get(sound_id))
    }
}

impl Default for VolumeMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a volume percentage to a linear gain
pub fn percent_to_gain(percent: u8) -> f32 {
    percent.min(100) as f32 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_fifty() {
        let volumes = VolumeMap::new();
        assert_eq!(volumes.get("rain"), 50);
        assert!((volumes.gain("rain") - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_set_clamps() {
        let mut volumes = VolumeMap::new();
        volumes.set("rain", 80);
        volumes.set("wind", 250);
        assert_eq!(volumes.get("rain"), 80);
        assert_eq!(volumes.get("wind"), 100);
    }

    #[test]
    fn test_serde_roundtrip_keeps_default() {
        let json = r#"{"volumes": {"rain": 20}}"#;
        let volumes: VolumeMap = serde_json::from_str(json).unwrap();
        assert_eq!(volumes.get("rain"), 20);
        assert_eq!(volumes.get("snowfall"), DEFAULT_VOLUME);

        let mut saved = VolumeMap::with_default(70);
        saved.set("wind", 10);
        let json = serde_json::to_string(&saved).unwrap();
        let restored: VolumeMap = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, saved);
    }

    #[test]
    fn test_loaded_values_clamped() {
        let json = r#"{"volumes": {"rain": 250}, "default": 200}"#;
        let volumes: VolumeMap = serde_json::from_str(json).unwrap();
        assert_eq!(volumes.get("rain"), 100);
        assert_eq!(volumes.get("snowfall"), 100);
    }

    #[test]
    fn test_plain_map_accepted() {
        let volumes: VolumeMap = serde_json::from_str(r#"{"rain": 20, "wind": 180}"#).unwrap();
        assert_eq!(volumes.get("rain"), 20);
        assert_eq!(volumes.get("wind"), 100);
        assert_eq!(volumes.get("snowfall"), DEFAULT_VOLUME);
    }

    #[test]
    fn test_or_default_keeps_explicit_default() {
        assert_eq!(VolumeMap::new().or_default(70).get("rain"), 70);
        assert_eq!(VolumeMap::with_default(30).or_default(70).get("rain"), 30);
    }
}
