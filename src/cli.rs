use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::error::Result;
use crate::params::{ExpressionTemplate, FaceEnhancement, ImageSize, InferenceOptions, ParameterSet, Sides};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a lip-synced video from a face source and an audio track
    Generate {
        /// Face video or image
        #[arg(short, long)]
        face: Option<PathBuf>,

        /// Driving audio file
        #[arg(short, long)]
        audio: Option<PathBuf>,

        /// TOML parameter file (flags on the command line take precedence)
        #[arg(short, long)]
        params: Option<PathBuf>,

        /// Print the job report as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// Print every parameter at its default value
    Defaults {
        /// Print a configuration file template instead
        #[arg(long)]
        config_template: bool,
    },

    /// Prepare directories and check checkpoints and the inference program
    Check,
}

/// Inference options; unset flags keep the parameter file value or the default.
///
/// Boolean flags take an optional value, so `--static=false` turns off a
/// setting enabled in a parameter file.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct OptionArgs {
    /// Expression template
    #[arg(long = "exp-img", value_enum)]
    pub expression: Option<ExpressionTemplate>,

    /// Output frames per second
    #[arg(long)]
    pub fps: Option<f64>,

    /// Face padding as top,bottom,left,right
    #[arg(long, allow_hyphen_values = true)]
    pub pads: Option<Sides>,

    /// Face detection batch size
    #[arg(long)]
    pub face_det_batch_size: Option<u32>,

    /// Lip-sync network batch size
    #[arg(long)]
    pub lnet_batch_size: Option<u32>,

    /// Network image size
    #[arg(long, value_enum)]
    pub img_size: Option<ImageSize>,

    /// Crop region as top,bottom,left,right (-1 = auto)
    #[arg(long, allow_hyphen_values = true)]
    pub crop: Option<Sides>,

    /// Face bounding box as top,bottom,left,right (-1 = detect)
    #[arg(long = "box", allow_hyphen_values = true)]
    pub bbox: Option<Sides>,

    /// Disable temporal smoothing of face detections
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub nosmooth: Option<bool>,

    /// Treat the face input as a still image
    #[arg(long = "static", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub static_mode: Option<bool>,

    /// Face enhancement style
    #[arg(long, value_enum)]
    pub up_face: Option<FaceEnhancement>,

    /// Use the first frame as the only reference
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub one_shot: Option<bool>,

    /// Disable the relative L1 loss
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub without_rl1: Option<bool>,

    /// Regenerate cached intermediate files
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub re_preprocess: Option<bool>,
}

impl OptionArgs {
    /// Overlay the flags that were given onto `options`
    pub fn apply(&self, options: &mut InferenceOptions) {
        if let Some(expression) = self.expression {
            options.expression = expression;
        }
        if let Some(fps) = self.fps {
            options.fps = fps;
        }
        if let Some(pads) = self.pads {
            options.pads = pads;
        }
        if let Some(size) = self.face_det_batch_size {
            options.face_det_batch_size = size;
        }
        if let Some(size) = self.lnet_batch_size {
            options.lnet_batch_size = size;
        }
        if let Some(img_size) = self.img_size {
            options.img_size = img_size;
        }
        if let Some(crop) = self.crop {
            options.crop = crop;
        }
        if let Some(bbox) = self.bbox {
            options.bbox = bbox;
        }
        if let Some(up_face) = self.up_face {
            options.up_face = up_face;
        }
        if let Some(nosmooth) = self.nosmooth {
            options.nosmooth = nosmooth;
        }
        if let Some(static_mode) = self.static_mode {
            options.static_mode = static_mode;
        }
        if let Some(one_shot) = self.one_shot {
            options.one_shot = one_shot;
        }
        if let Some(without_rl1) = self.without_rl1 {
            options.without_rl1 = without_rl1;
        }
        if let Some(re_preprocess) = self.re_preprocess {
            options.re_preprocess = re_preprocess;
        }
    }
}

/// Combine a parameter file (if any) with command line values.
///
/// Input paths are made absolute against the current directory, since the
/// inference program runs inside its own working directory.
pub fn build_parameter_set(
    base: Option<ParameterSet>,
    face: Option<PathBuf>,
    audio: Option<PathBuf>,
    options: &OptionArgs,
) -> Result<ParameterSet> {
    let mut params = base.unwrap_or_else(ParameterSet::reset);
    if face.is_some() {
        params.face = face;
    }
    if audio.is_some() {
        params.audio = audio;
    }
    params.face = absolute_input(params.face)?;
    params.audio = absolute_input(params.audio)?;
    options.apply(&mut params.options);
    Ok(params)
}

// Empty paths are left for validation to reject
fn absolute_input(path: Option<PathBuf>) -> Result<Option<PathBuf>> {
    match path {
        Some(path) if !path.as_os_str().is_empty() => Ok(Some(std::path::absolute(&path)?)),
        other => Ok(other),
    }
}
