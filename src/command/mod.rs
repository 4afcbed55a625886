// Command specification for the external inference program
//
// - Spec: immutable token sequence handed to the job runner
// - Builder: maps a validated parameter set onto a minimal command line

pub mod builder;

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

pub use builder::*;

/// Ordered command line for one inference job.
///
/// Built once by [`CommandBuilder`] and not modified afterwards. Arguments
/// are kept as OS strings so file names reach the child byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<OsString>,
    outfile: Option<PathBuf>,
}

impl CommandSpec {
    /// Program to launch (first token)
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Everything after the program name
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Output path the external program was told to write, if any
    pub fn outfile(&self) -> Option<&Path> {
        self.outfile.as_deref()
    }

    /// All tokens, program first
    pub fn tokens(&self) -> Vec<OsString> {
        std::iter::once(OsString::from(&self.program))
            .chain(self.args.iter().cloned())
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn flag_count(&self, flag: &str) -> usize {
        self.args.iter().filter(|arg| arg.as_os_str() == flag).count()
    }

    /// Values following `flag`, up to the next `--` token
    #[cfg(test)]
    pub(crate) fn flag_values(&self, flag: &str) -> Option<Vec<&str>> {
        let position = self.args.iter().position(|arg| arg.as_os_str() == flag)?;
        Some(
            self.args[position + 1..]
                .iter()
                .take_while(|arg| !is_flag(arg))
                .map(|arg| arg.to_str().unwrap_or_default())
                .collect(),
        )
    }
}

/// Lossy rendering for logs and diagnostics
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

// Negative numbers such as "-1" are values, not flags
#[cfg(test)]
fn is_flag(token: &OsStr) -> bool {
    token.to_str().is_some_and(|token| token.starts_with("--"))
}

/// Incremental construction of a [`CommandSpec`]
#[derive(Debug, Clone)]
pub(crate) struct CommandSpecBuilder {
    program: String,
    args: Vec<OsString>,
    outfile: Option<PathBuf>,
}

impl CommandSpecBuilder {
    pub(crate) fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            outfile: None,
        }
    }

    /// Add an argument
    pub(crate) fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Add a flag followed by one value
    pub(crate) fn option<S: AsRef<OsStr>>(self, flag: &str, value: S) -> Self {
        self.arg(flag).arg(value)
    }

    /// Add a flag followed by several values
    pub(crate) fn option_values<I, S>(mut self, flag: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.push(flag.into());
        self.args
            .extend(values.into_iter().map(|v| v.as_ref().to_os_string()));
        self
    }

    /// Add a bare flag when `enabled`
    pub(crate) fn switch(self, flag: &str, enabled: bool) -> Self {
        if enabled { self.arg(flag) } else { self }
    }

    /// Add a path argument
    pub(crate) fn path<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().as_os_str())
    }

    /// Add the output path argument and remember it for the existence check
    pub(crate) fn outfile(mut self, path: &Path) -> Self {
        self.outfile = Some(path.to_path_buf());
        self.path(path)
    }

    pub(crate) fn build(self) -> CommandSpec {
        CommandSpec {
            program: self.program,
            args: self.args,
            outfile: self.outfile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_tokens() {
        let spec = CommandSpecBuilder::new("python")
            .arg("inference.py")
            .option("--face", "a.mp4")
            .switch("--static", true)
            .switch("--nosmooth", false)
            .build();

        assert_eq!(spec.to_string(), "python inference.py --face a.mp4 --static");
        assert_eq!(spec.tokens()[0], "python");
        assert_eq!(spec.flag_count("--nosmooth"), 0);
        assert_eq!(spec.outfile(), None);
    }

    #[test]
    fn test_outfile_is_recorded_and_emitted() {
        let spec = CommandSpecBuilder::new("python")
            .arg("--outfile")
            .outfile(Path::new("results/out.mp4"))
            .build();

        assert_eq!(spec.outfile(), Some(Path::new("results/out.mp4")));
        assert_eq!(spec.flag_values("--outfile"), Some(vec!["results/out.mp4"]));
    }

    #[test]
    fn test_flag_values_keep_negative_numbers() {
        let spec = CommandSpecBuilder::new("python")
            .option_values("--crop", ["0", "-1", "10", "-1"])
            .arg("--static")
            .build();

        assert_eq!(spec.flag_values("--crop"), Some(vec!["0", "-1", "10", "-1"]));
        assert_eq!(spec.flag_values("--static"), Some(vec![]));
        assert_eq!(spec.flag_values("--box"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_path_is_passed_through_unchanged() {
        use std::os::unix::ffi::OsStrExt;

        let face = Path::new(OsStr::from_bytes(b"clip\xff.mp4"));
        let spec = CommandSpecBuilder::new("python").arg("--face").path(face).build();
        assert_eq!(Path::new(&spec.args()[1]), face);
        assert_eq!(spec.args()[1].as_bytes(), b"clip\xff.mp4");
        // Display stays printable
        assert_eq!(spec.to_string(), "python --face clip\u{fffd}.mp4");
    }
}
