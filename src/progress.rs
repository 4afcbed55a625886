use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

/// Receives coarse job milestones as (fraction in 0..=1, description)
pub trait ProgressReporter: Send + Sync {
    fn report(&self, fraction: f32, description: &str);
}

impl<F> ProgressReporter for F
where
    F: Fn(f32, &str) + Send + Sync,
{
    fn report(&self, fraction: f32, description: &str) {
        self(fraction, description)
    }
}

/// Discards progress events
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn report(&self, fraction: f32, description: &str) {
        debug!("Progress {:.0}%: {}", fraction * 100.0, description);
    }
}

const BAR_LENGTH: u64 = 100;

/// Terminal progress bar
pub struct ConsoleProgress {
    bar: ProgressBar,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(BAR_LENGTH);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { bar }
    }

    /// Stop drawing, leaving the last message on screen
    pub fn finish(&self) {
        self.bar.abandon();
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, fraction: f32, description: &str) {
        let position = (fraction.clamp(0.0, 1.0) * BAR_LENGTH as f32).round() as u64;
        self.bar.set_position(position);
        self.bar.set_message(description.to_string());
        if position >= BAR_LENGTH {
            self.bar.finish_with_message(description.to_string());
        }
    }
}
