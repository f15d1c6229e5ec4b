use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Open,
    PausedUntil(Instant),
}

/// Pool-wide pause with a single scheduled resume.
///
/// While paused, every waiter sleeps until the same deadline; the first one to
/// wake flips the gate open and the rest are released by the change notification.
pub struct PauseGate {
    state: watch::Sender<GateState>,
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PauseGate {
    pub fn new() -> Self {
        let (state, _) = watch::channel(GateState::Open);
        Self { state }
    }

    /// Close the gate for `duration`. Returns false if a pause is already running;
    /// that pause is kept as is.
    pub fn pause(&self, duration: Duration) -> bool {
        let until = Instant::now() + duration;
        self.state.send_if_modified(|state| match state {
            GateState::Open => {
                *state = GateState::PausedUntil(until);
                true
            }
            GateState::PausedUntil(_) => false,
        })
    }

    pub fn is_paused(&self) -> bool {
        matches!(*self.state.borrow(), GateState::PausedUntil(_))
    }

    /// Wait for the gate to open. Returns false if cancelled first.
    pub async fn wait(&self, cancel: &CancellationToken) -> bool {
        let mut rx = self.state.subscribe();
        loop {
            let until = match *rx.borrow_and_update() {
                GateState::Open => return true,
                GateState::PausedUntil(until) => until,
            };

            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = sleep_until(until) => {
                    self.state.send_if_modified(|state| {
                        if *state == GateState::PausedUntil(until) {
                            *state = GateState::Open;
                            true
                        } else {
                            false
                        }
                    });
                }
                _ = rx.changed() => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_pause_releases_every_waiter_once() {
        let gate = Arc::new(PauseGate::new());
        let cancel = CancellationToken::new();
        assert!(gate.wait(&cancel).await);

        assert!(gate.pause(Duration::from_secs(30)));
        assert!(!gate.pause(Duration::from_secs(90)));
        assert!(gate.is_paused());

        let started = Instant::now();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let cancel = cancel.clone();
                tokio::spawn(async move { gate.wait(&cancel).await })
            })
            .collect();
        for waiter in waiters {
            assert!(waiter.await.unwrap());
        }

        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(30) && waited < Duration::from_secs(31));
        assert!(!gate.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_wait() {
        let gate = PauseGate::new();
        let cancel = CancellationToken::new();
        gate.pause(Duration::from_secs(30));
        cancel.cancel();
        assert!(!gate.wait(&cancel).await);
        assert!(gate.is_paused());
    }
}
