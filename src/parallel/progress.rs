use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar over the points of one sweep, advanced once per collected
/// report. Hidden unless enabled, so callers can drive it unconditionally.
pub struct SweepProgress {
    bar: ProgressBar,
}

impl SweepProgress {
    pub fn new(total_points: usize, enabled: bool) -> Self {
        if !enabled {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new(total_points as u64);
        match ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} points ({percent}%) {msg}",
        ) {
            Ok(style) => bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏  ")),
            Err(e) => tracing::debug!("falling back to default progress style: {e}"),
        }
        Self { bar }
    }

    /// A bar that never draws.
    pub fn hidden() -> Self {
        Self::new(0, false)
    }

    pub fn inc(&self) {
        self.bar.inc(1);
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
