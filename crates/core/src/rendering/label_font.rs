use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use thiserror::Error;

/// Default label height in pixels.
pub const DEFAULT_LABEL_SCALE: f32 = 16.0;

/// DejaVu Sans, shipped so labels render without any configuration.
static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

#[derive(Error, Debug)]
pub enum LabelFontError {
    #[error("failed to read font {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid font data in {0}")]
    Invalid(PathBuf),
    #[error("bundled label font is unreadable")]
    Bundled,
}

/// Font and pixel scale used for accuracy labels.
#[derive(Clone)]
pub struct LabelFont {
    font: FontArc,
    scale: PxScale,
}

impl std::fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelFont")
            .field("scale", &self.scale.y)
            .finish_non_exhaustive()
    }
}

impl LabelFont {
    pub fn new(font: FontArc, scale: f32) -> Self {
        Self {
            font,
            scale: PxScale::from(scale),
        }
    }

    /// Loads a TrueType/OpenType font from disk.
    pub fn load(path: &Path, scale: f32) -> Result<Self, LabelFontError> {
        let bytes = std::fs::read(path).map_err(|source| LabelFontError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let font =
            FontArc::try_from_vec(bytes).map_err(|_| LabelFontError::Invalid(path.to_path_buf()))?;
        Ok(Self::new(font, scale))
    }

    /// The font compiled into the crate.
    pub fn bundled(scale: f32) -> Result<Self, LabelFontError> {
        let font = FontArc::try_from_slice(BUNDLED_FONT).map_err(|_| LabelFontError::Bundled)?;
        Ok(Self::new(font, scale))
    }

    /// Loads the configured override font, falling back to the bundled one
    /// when none is configured or it cannot be loaded.
    pub fn from_config(path: Option<&Path>) -> Option<Self> {
        if let Some(path) = path {
            match Self::load(path, DEFAULT_LABEL_SCALE) {
                Ok(font) => {
                    log::info!("Loaded label font {}", path.display());
                    return Some(font);
                }
                Err(e) => log::warn!("{e}; using the bundled label font"),
            }
        }
        match Self::bundled(DEFAULT_LABEL_SCALE) {
            Ok(font) => Some(font),
            Err(e) => {
                log::error!("{e}; accuracy labels will not be drawn");
                None
            }
        }
    }

    pub fn font(&self) -> &FontArc {
        &self.font
    }

    pub fn scale(&self) -> PxScale {
        self.scale
    }
}
