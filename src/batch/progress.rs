use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Receiver of batch progress. No timing guarantees beyond throttling.
pub trait ProgressSink: Send + Sync {
    /// `percent` of `total` records done
    fn on_progress(&self, percent: u8, done: usize, total: usize);

    /// All workers paused for `duration` after a quota rejection
    fn on_pause(&self, _duration: Duration) {}
}

/// Discards every report
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _percent: u8, _done: usize, _total: usize) {}
}

/// Rate limits `on_progress` calls; the final 100% is always delivered.
pub(crate) struct Throttled<'a> {
    sink: &'a dyn ProgressSink,
    interval: Duration,
    last: Mutex<Option<(Instant, u8)>>,
}

impl<'a> Throttled<'a> {
    pub fn new(sink: &'a dyn ProgressSink, interval: Duration) -> Self {
        Self {
            sink,
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn report(&self, done: usize, total: usize) {
        let percent = percent(done, total);
        let now = Instant::now();
        {
            let mut last = self.last.lock();
            let due = match *last {
                None => true,
                Some((_, last_percent)) if done == total => last_percent != 100,
                Some((at, last_percent)) => {
                    percent != last_percent && now.duration_since(at) >= self.interval
                }
            };
            if !due {
                return;
            }
            *last = Some((now, percent));
        }
        self.sink.on_progress(percent, done, total);
    }

    pub fn paused(&self, duration: Duration) {
        self.sink.on_pause(duration);
    }
}

fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}
