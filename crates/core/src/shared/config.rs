use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detection::domain::model_kind::ModelKind;
use crate::shared::constants::{
    CAPTURE_CONFIDENCE_THRESHOLD, CROP_PADDING, DEFAULT_MODEL_BASE_URL, DEFAULT_MODEL_FILE,
    DISPLAY_SIZE, PASSPORT_FILE_NAME, PASSPORT_SIZE, TICK_INTERVAL_MS,
};
use crate::shared::image_size::ImageSize;

/// ONNX file backing each model choice. All three default to the same
/// YOLO-pose export; the choice then only changes detection options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFiles {
    pub fast_accurate: String,
    pub fast_lightweight: String,
    pub landmark_capable: String,
}

impl ModelFiles {
    pub fn for_kind(&self, kind: ModelKind) -> &str {
        match kind {
            ModelKind::FastAccurate => &self.fast_accurate,
            ModelKind::FastLightweight => &self.fast_lightweight,
            ModelKind::LandmarkCapable => &self.landmark_capable,
        }
    }
}

impl Default for ModelFiles {
    fn default() -> Self {
        Self {
            fast_accurate: DEFAULT_MODEL_FILE.to_string(),
            fast_lightweight: DEFAULT_MODEL_FILE.to_string(),
            landmark_capable: DEFAULT_MODEL_FILE.to_string(),
        }
    }
}

/// Persisted application settings.
///
/// Missing fields fall back to their defaults so older config files keep
/// loading after new settings are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub display_size: ImageSize,
    pub output_size: ImageSize,
    pub crop_padding: u32,
    pub output_file_name: String,
    pub capture_threshold: f64,
    pub tick_interval_ms: u64,
    pub model: ModelKind,
    pub model_base_url: String,
    pub model_files: ModelFiles,
    /// TTF/OTF overriding the bundled accuracy label font.
    pub font_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            display_size: DISPLAY_SIZE,
            output_size: PASSPORT_SIZE,
            crop_padding: CROP_PADDING,
            output_file_name: PASSPORT_FILE_NAME.to_string(),
            capture_threshold: CAPTURE_CONFIDENCE_THRESHOLD,
            tick_interval_ms: TICK_INTERVAL_MS,
            model: ModelKind::FastAccurate,
            model_base_url: DEFAULT_MODEL_BASE_URL.to_string(),
            model_files: ModelFiles::default(),
            font_path: None,
        }
    }
}

impl AppConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("PassportCam").join("config.json"))
    }

    /// Loads from the platform config dir, or defaults when absent/unreadable.
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring malformed config {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let path = Self::config_path().ok_or("could not determine config directory")?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
