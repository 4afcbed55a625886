use rand::Rng;
use std::path::{Path, PathBuf};

use super::{CommandSpec, CommandSpecBuilder};
use crate::config::InferenceConfig;
use crate::params::{InferenceOptions, Sides, ValidatedParameters};

pub const FLAG_FACE: &str = "--face";
pub const FLAG_AUDIO: &str = "--audio";
pub const FLAG_OUTFILE: &str = "--outfile";
pub const FLAG_EXPRESSION: &str = "--exp_img";
pub const FLAG_FPS: &str = "--fps";
pub const FLAG_PADS: &str = "--pads";
pub const FLAG_FACE_DET_BATCH_SIZE: &str = "--face_det_batch_size";
pub const FLAG_LNET_BATCH_SIZE: &str = "--LNet_batch_size";
pub const FLAG_IMG_SIZE: &str = "--img_size";
pub const FLAG_CROP: &str = "--crop";
pub const FLAG_BOX: &str = "--box";
pub const FLAG_NOSMOOTH: &str = "--nosmooth";
pub const FLAG_STATIC: &str = "--static";
pub const FLAG_UP_FACE: &str = "--up_face";
pub const FLAG_ONE_SHOT: &str = "--one_shot";
pub const FLAG_WITHOUT_RL1: &str = "--without_rl1";
pub const FLAG_RE_PREPROCESS: &str = "--re_preprocess";

/// Lowest and highest numeric suffix of a generated output file
const OUTPUT_SUFFIX_RANGE: std::ops::RangeInclusive<u32> = 10_000..=99_999;

/// Builds inference command lines.
///
/// Optional settings only appear on the command line when they differ from
/// [`InferenceOptions::default`]; the external program applies its own
/// identical defaults otherwise.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: String,
    script: String,
}

impl CommandBuilder {
    pub fn new<S1: Into<String>, S2: Into<String>>(program: S1, script: S2) -> Self {
        Self {
            program: program.into(),
            script: script.into(),
        }
    }

    pub fn from_config(config: &InferenceConfig) -> Self {
        Self::new(&config.program, &config.script)
    }

    /// Build the command for one job writing to `outfile`
    pub fn build(&self, params: ValidatedParameters<'_>, outfile: &Path) -> CommandSpec {
        let defaults = InferenceOptions::default();
        let options = params.options;

        let mut cmd = CommandSpecBuilder::new(&self.program)
            .arg(&self.script)
            .arg(FLAG_FACE)
            .path(params.face)
            .arg(FLAG_AUDIO)
            .path(params.audio)
            .arg(FLAG_OUTFILE)
            .outfile(outfile);

        if options.expression != defaults.expression {
            cmd = cmd.option(FLAG_EXPRESSION, options.expression.as_str());
        }
        if options.fps != defaults.fps {
            cmd = cmd.option(FLAG_FPS, format_float(options.fps));
        }
        if options.pads != defaults.pads {
            cmd = cmd.option_values(FLAG_PADS, sides_args(&options.pads));
        }
        if options.face_det_batch_size != defaults.face_det_batch_size {
            cmd = cmd.option(FLAG_FACE_DET_BATCH_SIZE, options.face_det_batch_size.to_string());
        }
        if options.lnet_batch_size != defaults.lnet_batch_size {
            cmd = cmd.option(FLAG_LNET_BATCH_SIZE, options.lnet_batch_size.to_string());
        }
        if options.img_size != defaults.img_size {
            cmd = cmd.option(FLAG_IMG_SIZE, options.img_size.pixels().to_string());
        }
        if options.crop != defaults.crop {
            cmd = cmd.option_values(FLAG_CROP, sides_args(&options.crop));
        }
        if options.bbox != defaults.bbox {
            cmd = cmd.option_values(FLAG_BOX, sides_args(&options.bbox));
        }

        cmd = cmd
            .switch(FLAG_NOSMOOTH, options.nosmooth)
            .switch(FLAG_STATIC, options.static_mode);

        if options.up_face != defaults.up_face {
            cmd = cmd.option(FLAG_UP_FACE, options.up_face.as_str());
        }

        cmd.switch(FLAG_ONE_SHOT, options.one_shot)
            .switch(FLAG_WITHOUT_RL1, options.without_rl1)
            .switch(FLAG_RE_PREPROCESS, options.re_preprocess)
            .build()
    }

    /// `<program> --version`, used to probe that the interpreter is installed
    pub fn version_check(&self) -> CommandSpec {
        CommandSpecBuilder::new(&self.program)
            .arg("--version")
            .build()
    }
}

/// Output path of the form `<results_dir>/output_<5 digits>.<ext>`.
///
/// No shared counter is involved, so concurrent jobs only collide when they
/// draw the same suffix.
pub fn generate_output_path<R: Rng + ?Sized>(results_dir: &Path, ext: &str, rng: &mut R) -> PathBuf {
    let suffix = rng.gen_range(OUTPUT_SUFFIX_RANGE);
    results_dir.join(format!("output_{}.{}", suffix, ext))
}

/// Shortest round-trip form, keeping `.0` on integral values (`30.0`, `29.97`)
pub fn format_float(value: f64) -> String {
    format!("{:?}", value)
}

fn sides_args(sides: &Sides) -> Vec<String> {
    sides.values().iter().map(|v| v.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ExpressionTemplate, FaceEnhancement, ImageSize, ParameterSet};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    const OUTFILE: &str = "results/output_12345.mp4";

    fn build(params: &ParameterSet) -> CommandSpec {
        CommandBuilder::new("python", "inference.py")
            .build(params.validate().unwrap(), Path::new(OUTFILE))
    }

    fn base() -> ParameterSet {
        ParameterSet::new("a.mp4", "b.wav")
    }

    #[test]
    fn test_all_defaults_emit_only_mandatory_flags() {
        let spec = build(&base());
        assert_eq!(
            spec.tokens(),
            vec![
                "python", "inference.py", "--face", "a.mp4", "--audio", "b.wav", "--outfile",
                OUTFILE,
            ]
        );
        assert_eq!(spec.outfile(), Some(Path::new(OUTFILE)));
    }

    #[test]
    fn test_changed_fps_adds_single_flag() {
        let mut params = base();
        params.options.fps = 30.0;

        let spec = build(&params);
        assert_eq!(spec.flag_count(FLAG_FPS), 1);
        assert_eq!(spec.flag_values(FLAG_FPS), Some(vec!["30.0"]));
        assert_eq!(spec.args().len(), 7 + 2);
    }

    #[test]
    fn test_grouped_fields_emit_all_four_values() {
        let mut params = base();
        params.options.pads = Sides::new(5, 20, 0, 0);
        params.options.crop = Sides::new(0, -1, 0, 720);

        let spec = build(&params);
        assert_eq!(spec.flag_values(FLAG_PADS), Some(vec!["5", "20", "0", "0"]));
        assert_eq!(spec.flag_values(FLAG_CROP), Some(vec!["0", "-1", "0", "720"]));
        assert_eq!(spec.flag_count(FLAG_BOX), 0);
    }

    #[test]
    fn test_bounding_box_keeps_top_bottom_left_right_order() {
        let mut params = base();
        params.options.bbox = Sides::new(10, 200, 30, 240);

        let spec = build(&params);
        assert_eq!(spec.flag_values(FLAG_BOX), Some(vec!["10", "200", "30", "240"]));
    }

    #[test]
    fn test_every_option_changed() {
        let mut params = base();
        params.options = InferenceOptions {
            expression: ExpressionTemplate::Smile,
            fps: 29.97,
            pads: Sides::new(0, 10, 0, 0),
            face_det_batch_size: 8,
            lnet_batch_size: 32,
            img_size: ImageSize::Px512,
            crop: Sides::new(0, 480, 0, 640),
            bbox: Sides::new(1, 2, 3, 4),
            nosmooth: true,
            static_mode: true,
            up_face: FaceEnhancement::Surprise,
            one_shot: true,
            without_rl1: true,
            re_preprocess: true,
        };

        let spec = build(&params);
        assert_eq!(
            spec.args()[7..].to_vec(),
            vec![
                "--exp_img", "smile", "--fps", "29.97", "--pads", "0", "10", "0", "0",
                "--face_det_batch_size", "8", "--LNet_batch_size", "32", "--img_size", "512",
                "--crop", "0", "480", "0", "640", "--box", "1", "2", "3", "4", "--nosmooth",
                "--static", "--up_face", "surprise", "--one_shot", "--without_rl1",
                "--re_preprocess",
            ]
        );
    }

    #[test]
    fn test_boolean_flags_are_bare() {
        let mut params = base();
        params.options.one_shot = true;

        let spec = build(&params);
        assert_eq!(spec.flag_count(FLAG_ONE_SHOT), 1);
        assert_eq!(spec.args().last().and_then(|arg| arg.to_str()), Some(FLAG_ONE_SHOT));
        assert_eq!(spec.flag_count(FLAG_STATIC), 0);
    }

    #[test]
    fn test_setting_option_back_to_default_suppresses_flag() {
        let mut params = base();
        params.options.img_size = ImageSize::Px384;
        params.options.fps = 25.0;
        params.options.up_face = FaceEnhancement::Original;

        assert_eq!(build(&params), build(&base()));
    }

    #[test]
    fn test_version_check_has_no_outfile() {
        let spec = CommandBuilder::new("python", "inference.py").version_check();
        assert_eq!(spec.to_string(), "python --version");
        assert_eq!(spec.outfile(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_inputs_reach_the_command_unchanged() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let face = Path::new(OsStr::from_bytes(b"clip\xff.mp4"));
        let spec = build(&ParameterSet::new(face, "b.wav"));

        let position = spec.args().iter().position(|arg| arg == FLAG_FACE).unwrap();
        assert_eq!(Path::new(&spec.args()[position + 1]), face);
        assert_eq!(spec.args()[position + 3], "b.wav");
    }

    #[test]
    fn test_output_path_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let path = generate_output_path(Path::new("results"), "mp4", &mut rng);
            let name = path.file_name().unwrap().to_string_lossy().to_string();

            assert_eq!(path.parent(), Some(Path::new("results")));
            assert!(name.starts_with("output_") && name.ends_with(".mp4"), "{}", name);
            let digits = &name["output_".len()..name.len() - ".mp4".len()];
            assert_eq!(digits.len(), 5);
            assert!(OUTPUT_SUFFIX_RANGE.contains(&digits.parse::<u32>().unwrap()));
        }
    }

    #[test]
    fn test_successive_output_paths_rarely_collide() {
        let mut rng = StdRng::seed_from_u64(42);
        let paths: HashSet<PathBuf> = (0..50)
            .map(|_| generate_output_path(Path::new("results"), "mp4", &mut rng))
            .collect();
        assert!(paths.len() > 45, "{} distinct paths", paths.len());
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(30.0), "30.0");
        assert_eq!(format_float(29.97), "29.97");
        assert_eq!(format_float(25.5), "25.5");
    }
}
