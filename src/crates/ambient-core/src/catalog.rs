//! Static catalog of ambient sounds

use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog loading errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Duplicate sound id: {0}")]
    DuplicateId(String),
}

/// Category a sound is filed under in the picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundCategory {
    Nature,
    Ambient,
}

impl fmt::Display for SoundCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoundCategory::Nature => write!(f, "nature"),
            SoundCategory::Ambient => write!(f, "ambient"),
        }
    }
}

/// A loopable recording the user can pick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioAsset {
    /// Stable identifier (e.g., "heavy-rain")
    pub id: String,
    /// Name shown in the picker
    pub name: String,
    /// Emoji icon shown next to the name
    pub icon: String,
    /// Asset path relative to the sounds base URL or directory
    pub path: String,
    pub category: SoundCategory,
}

impl AudioAsset {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        icon: impl Into<String>,
        path: impl Into<String>,
        category: SoundCategory,
    ) -> Self {
        AudioAsset {
            id: id.into(),
            name: name.into(),
            icon: icon.into(),
            path: path.into(),
            category,
        }
    }

    /// Lowercase file extension of the asset path, if any
    pub fn extension(&self) -> Option<String> {
        let file = self.path.rsplit('/').next()?;
        let (_, ext) = file.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }
}

/// An immutable list of sounds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoundCatalog {
    assets: Vec<AudioAsset>,
}

impl SoundCatalog {
    /// Build a catalog, rejecting duplicate ids
    pub fn new(assets: Vec<AudioAsset>) -> Result<Self, CatalogError> {
        for (i, asset) in assets.iter().enumerate() {
            if assets[..i].iter().any(|other| other.id == asset.id) {
                return Err(CatalogError::DuplicateId(asset.id.clone()));
            }
        }
        Ok(SoundCatalog { assets })
    }

    /// Parse a catalog from a JSON array of assets
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let assets: Vec<AudioAsset> = serde_json::from_str(json)?;
        Self::new(assets)
    }

    /// Nature recordings offered by the focus timer page
    pub fn focus_timer() -> Self {
        use SoundCategory::Nature;
        SoundCatalog {
            assets: vec![
                AudioAsset::new(
                    "heavy-rain",
                    "Heavy Rain",
                    "⛈️",
                    "370284__ztitchez__rain-heavy-early-morning_01.wav",
                    Nature,
                ),
                AudioAsset::new(
                    "wind",
                    "Stormy Winds",
                    "💨",
                    "502523__simon-spiers__stormy-winds-through-the-trees.mp3",
                    Nature,
                ),
                AudioAsset::new(
                    "snowfall",
                    "Snowfall",
                    "❄️",
                    "262259__shadydave__snowfall-final.mp3",
                    Nature,
                ),
                AudioAsset::new(
                    "birds-lake",
                    "Birds by the Lake",
                    "🐦",
                    "524853__ellanjellan__birds-bythelake.wav",
                    Nature,
                ),
                AudioAsset::new(
                    "campfire",
                    "Campfire",
                    "🪵",
                    "660297__ambient-x__campfire-deer-camp-hot-air-leaking-from-wet-wood-part-3.wav",
                    Nature,
                ),
                AudioAsset::new(
                    "forest-river",
                    "Forest & River",
                    "🌲",
                    "758785__garuda1982__forest-ambiance-with-flowing-river-distant-church-bells-and-joggers.wav",
                    Nature,
                ),
                AudioAsset::new(
                    "ocean-waves",
                    "Ocean Waves",
                    "🌊",
                    "790545__dudeawesome__wind-chimes-water-droplets-and-ocean-waves-loop.flac",
                    Nature,
                ),
            ],
        }
    }

    /// Sounds offered by the timer's sound panel, which can be layered
    pub fn sound_panel() -> Self {
        use SoundCategory::{Ambient, Nature};
        SoundCatalog {
            assets: vec![
                AudioAsset::new("rain", "Rain", "🌧️", "rain.mp3", Nature),
                AudioAsset::new("wind", "Wind", "💨", "wind.mp3", Nature),
                AudioAsset::new("fire", "Campfire", "🔥", "campfire.mp3", Nature),
                AudioAsset::new("waves", "Waves", "🌊", "waves.mp3", Nature),
                AudioAsset::new("birds", "Birds", "🐦", "birds.mp3", Nature),
                AudioAsset::new("thunder", "Thunder", "⛈️", "thunder.mp3", Nature),
                AudioAsset::new("cafe", "Cafe", "☕", "cafe.mp3", Ambient),
                AudioAsset::new("keyboard", "Keyboard", "⌨️", "keyboard.mp3", Ambient),
            ],
        }
    }

    /// Look up a sound by id
    pub fn get(&self, id: &str) -> Option<&AudioAsset> {
        self.assets.iter().find(|asset| asset.id == id)
    }

    /// Sounds in `category`, or all sounds for `None`
    pub fn filter(&self, category: Option<SoundCategory>) -> impl Iterator<Item = &AudioAsset> {
        self.assets
            .iter()
            .filter(move |asset| category.map_or(true, |c| asset.category == c))
    }

    /// Categories present in the catalog, in first-seen order
    pub fn categories(&self) -> Vec<SoundCategory> {
        let mut categories = Vec::new();
        for asset in &self.assets {
            if !categories.contains(&asset.category) {
                categories.push(asset.category);
            }
        }
        categories
    }

    pub fn iter(&self) -> impl Iterator<Item = &AudioAsset> {
        self.assets.iter()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalogs() {
        let focus = SoundCatalog::focus_timer();
        assert_eq!(focus.len(), 7);
        assert_eq!(focus.categories(), vec![SoundCategory::Nature]);
        assert_eq!(focus.get("ocean-waves").unwrap().extension().as_deref(), Some("flac"));

        let panel = SoundCatalog::sound_panel();
        assert_eq!(panel.filter(Some(SoundCategory::Ambient)).count(), 2);
        assert_eq!(panel.filter(None).count(), 8);
    }

    #[test]
    fn test_from_json() {
        let json = r#"[
            {
                "id": "rain",
                "name": "Rain",
                "icon": "🌧️",
                "path": "sounds/rain.WAV",
                "category": "nature"
            }
        ]"#;
        let catalog = SoundCatalog::from_json(json).unwrap();
        let rain = catalog.get("rain").unwrap();
        assert_eq!(rain.category, SoundCategory::Nature);
        assert_eq!(rain.extension().as_deref(), Some("wav"));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let asset = AudioAsset::new("rain", "Rain", "", "rain.mp3", SoundCategory::Nature);
        let err = SoundCatalog::new(vec![asset.clone(), asset]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId(id) if id == "rain"));
    }

    #[test]
    fn test_extension_missing() {
        let asset = AudioAsset::new("x", "X", "", "dir.d/noext", SoundCategory::Ambient);
        assert_eq!(asset.extension(), None);
    }
}
