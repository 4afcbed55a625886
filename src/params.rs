//! Inference parameter schema.
//!
//! `InferenceOptions::default()` is the only place default values are written
//! down. The command builder diffs against it and the reset action returns it.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, RetalkError};

/// Status text surfaced when a mandatory input is absent
pub const MISSING_INPUTS_MESSAGE: &str = "Please provide both face and audio inputs";

/// Expression template applied to the source face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionTemplate {
    Neutral,
    Smile,
    Sad,
    Angry,
    Surprise,
}

impl ExpressionTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpressionTemplate::Neutral => "neutral",
            ExpressionTemplate::Smile => "smile",
            ExpressionTemplate::Sad => "sad",
            ExpressionTemplate::Angry => "angry",
            ExpressionTemplate::Surprise => "surprise",
        }
    }
}

/// Face enhancement style applied after lip-sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FaceEnhancement {
    Original,
    Sad,
    Angry,
    Surprise,
}

impl FaceEnhancement {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaceEnhancement::Original => "original",
            FaceEnhancement::Sad => "sad",
            FaceEnhancement::Angry => "angry",
            FaceEnhancement::Surprise => "surprise",
        }
    }
}

/// Working resolution of the lip-sync network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(try_from = "u32", into = "u32")]
pub enum ImageSize {
    #[value(name = "256")]
    Px256,
    #[value(name = "384")]
    Px384,
    #[value(name = "512")]
    Px512,
}

impl ImageSize {
    pub fn pixels(&self) -> u32 {
        match self {
            ImageSize::Px256 => 256,
            ImageSize::Px384 => 384,
            ImageSize::Px512 => 512,
        }
    }
}

impl TryFrom<u32> for ImageSize {
    type Error = String;

    fn try_from(value: u32) -> std::result::Result<Self, Self::Error> {
        match value {
            256 => Ok(ImageSize::Px256),
            384 => Ok(ImageSize::Px384),
            512 => Ok(ImageSize::Px512),
            other => Err(format!("unsupported image size {}, expected 256, 384 or 512", other)),
        }
    }
}

impl From<ImageSize> for u32 {
    fn from(size: ImageSize) -> Self {
        size.pixels()
    }
}

/// Four related values (top, bottom, left, right) diffed and emitted as a unit.
///
/// For crop and bounding box regions `-1` means "infer automatically".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Sides {
    pub top: i32,
    pub bottom: i32,
    pub left: i32,
    pub right: i32,
}

impl Sides {
    pub const fn new(top: i32, bottom: i32, left: i32, right: i32) -> Self {
        Self { top, bottom, left, right }
    }

    /// Values in emission order: top, bottom, left, right
    pub fn values(&self) -> [i32; 4] {
        [self.top, self.bottom, self.left, self.right]
    }
}

impl From<[i32; 4]> for Sides {
    fn from([top, bottom, left, right]: [i32; 4]) -> Self {
        Self::new(top, bottom, left, right)
    }
}

impl From<Sides> for [i32; 4] {
    fn from(sides: Sides) -> Self {
        sides.values()
    }
}

impl fmt::Display for Sides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.top, self.bottom, self.left, self.right)
    }
}

impl FromStr for Sides {
    type Err = String;

    /// Accepts `top,bottom,left,right` (commas or whitespace)
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let values = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<i32>()
                    .map_err(|e| format!("invalid value '{}': {}", part, e))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        match values.as_slice() {
            [top, bottom, left, right] => Ok(Self::new(*top, *bottom, *left, *right)),
            _ => Err(format!(
                "expected 4 values (top,bottom,left,right), got {}",
                values.len()
            )),
        }
    }
}

/// Optional inference settings. Every field has a schema default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceOptions {
    /// Expression template
    pub expression: ExpressionTemplate,
    /// Output frames per second
    pub fps: f64,
    /// Padding around the detected face
    pub pads: Sides,
    /// Face detection batch size
    pub face_det_batch_size: u32,
    /// Lip-sync network batch size
    pub lnet_batch_size: u32,
    /// Network image size
    pub img_size: ImageSize,
    /// Crop region of the input video
    pub crop: Sides,
    /// Fixed face bounding box, bypassing detection
    pub bbox: Sides,
    /// Disable temporal smoothing of face detections
    pub nosmooth: bool,
    /// Treat the face input as a still image
    #[serde(rename = "static")]
    pub static_mode: bool,
    /// Face enhancement style
    pub up_face: FaceEnhancement,
    /// Use the first frame as the only reference
    pub one_shot: bool,
    /// Disable the relative L1 loss
    pub without_rl1: bool,
    /// Regenerate cached intermediate files
    pub re_preprocess: bool,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            expression: ExpressionTemplate::Neutral,
            fps: 25.0,
            pads: Sides::new(0, 20, 0, 0),
            face_det_batch_size: 4,
            lnet_batch_size: 16,
            img_size: ImageSize::Px384,
            crop: Sides::new(0, -1, 0, -1),
            bbox: Sides::new(-1, -1, -1, -1),
            nosmooth: false,
            static_mode: false,
            up_face: FaceEnhancement::Original,
            one_shot: false,
            without_rl1: false,
            re_preprocess: false,
        }
    }
}

/// Full set of user-adjustable parameters for one job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSet {
    /// Face video or image (mandatory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face: Option<PathBuf>,
    /// Driving audio (mandatory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<PathBuf>,
    #[serde(flatten)]
    pub options: InferenceOptions,
}

/// A parameter set whose mandatory inputs are known to be present
#[derive(Debug, Clone, Copy)]
pub struct ValidatedParameters<'a> {
    pub face: &'a Path,
    pub audio: &'a Path,
    pub options: &'a InferenceOptions,
}

impl ParameterSet {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(face: P, audio: Q) -> Self {
        Self {
            face: Some(face.into()),
            audio: Some(audio.into()),
            options: InferenceOptions::default(),
        }
    }

    /// Parameter set with every field back at its schema default
    pub fn reset() -> Self {
        Self::default()
    }

    /// Load a parameter file. Keys that are not parameters are rejected.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RetalkError::Config(format!("Failed to read parameter file: {}", e)))?;

        let table: toml::Table = toml::from_str(&content)
            .map_err(|e| RetalkError::Config(format!("Failed to parse parameter file: {}", e)))?;
        let unknown = unknown_keys(&table)?;
        if !unknown.is_empty() {
            return Err(RetalkError::Config(format!(
                "Unknown parameter(s) in parameter file: {}",
                unknown.join(", ")
            )));
        }

        toml::from_str(&content)
            .map_err(|e| RetalkError::Config(format!("Failed to parse parameter file: {}", e)))
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check the mandatory inputs. Empty paths count as missing.
    pub fn validate(&self) -> Result<ValidatedParameters<'_>> {
        match (present(&self.face), present(&self.audio)) {
            (Some(face), Some(audio)) => Ok(ValidatedParameters {
                face,
                audio,
                options: &self.options,
            }),
            _ => Err(RetalkError::Validation(MISSING_INPUTS_MESSAGE.to_string())),
        }
    }
}

// `flatten` rules out `deny_unknown_fields`, so known keys come from the
// serialized defaults
fn unknown_keys(table: &toml::Table) -> Result<Vec<String>> {
    let defaults = toml::Value::try_from(InferenceOptions::default())?;
    let known = defaults.as_table();

    Ok(table
        .keys()
        .filter(|key| {
            !matches!(key.as_str(), "face" | "audio")
                && !known.is_some_and(|known| known.contains_key(key.as_str()))
        })
        .cloned()
        .collect())
}

fn present(path: &Option<PathBuf>) -> Option<&Path> {
    path.as_deref().filter(|p| !p.as_os_str().is_empty())
}
