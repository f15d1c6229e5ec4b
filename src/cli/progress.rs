use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use cartero::ProgressSink;

/// Terminal progress bar fed by the batch processor
pub struct BarProgress {
    pb: ProgressBar,
}

impl BarProgress {
    pub fn new(total: usize) -> Result<Self> {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )?
                .progress_chars("#>-"),
        );
        Ok(Self { pb })
    }

    pub fn finish(&self, message: String) {
        self.pb.finish_with_message(message);
    }
}

impl ProgressSink for BarProgress {
    fn on_progress(&self, _percent: u8, done: usize, _total: usize) {
        self.pb.set_position(done as u64);
        self.pb.set_message("");
    }

    fn on_pause(&self, duration: Duration) {
        self.pb
            .set_message(format!("quota exhausted, paused {}s", duration.as_secs()));
    }
}
