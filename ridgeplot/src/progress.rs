use indicatif::{ProgressBar, ProgressStyle};
use ridgeline::{ProgressSink, RenderProgress};

/// Mirrors render progress onto a terminal progress bar.
pub struct BarSink(ProgressBar);

impl Default for BarSink {
    fn default() -> Self {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::with_template("{msg}\n[{wide_bar:.cyan/blue}] {pos}/{len}")
                .expect("incorrect progress bar format string")
                .progress_chars("#>-"),
        );
        Self(pb)
    }
}

impl ProgressSink for BarSink {
    fn update(&self, progress: Option<&RenderProgress>) {
        match progress {
            Some(RenderProgress {
                total,
                completed,
                message,
            }) => {
                self.0.set_length(*total as u64);
                self.0.set_position(*completed as u64);
                self.0.set_message(message.clone());
            }
            None => self.0.finish_and_clear(),
        }
    }
}
