use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The fixed set of detector models the operator can choose between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    FastAccurate,
    FastLightweight,
    LandmarkCapable,
}

/// Per-call detector settings derived from the selected model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionOptions {
    pub min_confidence: f64,
    /// Square network input resolution.
    pub input_size: u32,
    pub with_landmarks: bool,
}

impl ModelKind {
    pub const ALL: &[ModelKind] = &[
        ModelKind::FastAccurate,
        ModelKind::FastLightweight,
        ModelKind::LandmarkCapable,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::FastAccurate => "fast-accurate",
            ModelKind::FastLightweight => "fast-lightweight",
            ModelKind::LandmarkCapable => "landmark-capable",
        }
    }

    pub fn supports_landmarks(self) -> bool {
        matches!(self, ModelKind::LandmarkCapable)
    }

    pub fn options(self) -> DetectionOptions {
        match self {
            ModelKind::FastAccurate => DetectionOptions {
                min_confidence: 0.5,
                input_size: 640,
                with_landmarks: false,
            },
            ModelKind::FastLightweight => DetectionOptions {
                min_confidence: 0.5,
                input_size: 320,
                with_landmarks: false,
            },
            ModelKind::LandmarkCapable => DetectionOptions {
                min_confidence: 0.5,
                input_size: 640,
                with_landmarks: true,
            },
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| {
                let names: Vec<&str> = ModelKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("Unknown model '{s}', expected one of: {}", names.join(", "))
            })
    }
}
