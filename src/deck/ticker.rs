//! Cancellable fixed-cadence ticker
//!
//! Every start mints a fresh [`TickToken`]. The deck only honours ticks whose
//! token is still live, so a tick that was already queued when the ticker was
//! stopped or restarted is discarded on arrival.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{trace, warn};

/// Identity of one ticker run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickToken(u64);

struct Running {
    token: TickToken,
    // Dropping the sender wakes the tick thread immediately
    cancel: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

/// Periodic timer owned by the deck
pub struct Ticker {
    interval: Option<Duration>,
    next_token: u64,
    running: Option<Running>,
}

impl Ticker {
    /// Ticker that fires from a background thread every `interval`
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: Some(interval),
            next_token: 0,
            running: None,
        }
    }

    /// Ticker firing `hz` times per second
    pub fn from_hz(hz: u32) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / hz.max(1) as f64))
    }

    /// Ticker that tracks start/stop but never fires on its own. Ticks are
    /// driven by the owner, which keeps tests deterministic.
    pub fn manual() -> Self {
        Self {
            interval: None,
            next_token: 0,
            running: None,
        }
    }

    /// Cadence, or `None` for a manual ticker
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn is_active(&self) -> bool {
        self.running.is_some()
    }

    /// Token of the live run
    pub fn token(&self) -> Option<TickToken> {
        self.running.as_ref().map(|r| r.token)
    }

    /// Whether a tick carrying `token` should still be honoured
    pub fn is_current(&self, token: TickToken) -> bool {
        self.token() == Some(token)
    }

    /// Start ticking, cancelling any previous run first. `on_tick` is called
    /// from the tick thread and should only enqueue work.
    pub fn start<F>(&mut self, on_tick: F) -> TickToken
    where
        F: Fn(TickToken) + Send + 'static,
    {
        self.stop();

        self.next_token += 1;
        let token = TickToken(self.next_token);

        let (cancel, thread) = match self.interval {
            Some(interval) => {
                let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
                let handle = thread::spawn(move || loop {
                    match cancel_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => on_tick(token),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                });
                (Some(cancel_tx), Some(handle))
            }
            None => (None, None),
        };

        trace!("Ticker started: {:?}", token);
        self.running = Some(Running {
            token,
            cancel,
            thread,
        });
        token
    }

    /// Stop ticking. When this returns the tick thread has exited, so no
    /// further tick for the old token will be produced. Returns whether a run
    /// was active.
    pub fn stop(&mut self) -> bool {
        let Some(mut running) = self.running.take() else {
            return false;
        };

        drop(running.cancel.take());
        if let Some(handle) = running.thread.take() {
            if handle.join().is_err() {
                warn!("Tick thread panicked");
            }
        }
        trace!("Ticker stopped: {:?}", running.token);
        true
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_from_hz() {
        let ticker = Ticker::from_hz(60);
        let interval = ticker.interval().unwrap();
        assert!((interval.as_secs_f64() - 1.0 / 60.0).abs() < 1e-9);
        assert!(!ticker.is_active());
    }

    #[test]
    fn test_manual_ticker_tracks_tokens() {
        let mut ticker = Ticker::manual();
        assert_eq!(ticker.token(), None);

        let first = ticker.start(|_| {});
        assert!(ticker.is_active());
        assert!(ticker.is_current(first));

        let second = ticker.start(|_| {});
        assert_ne!(first, second);
        assert!(!ticker.is_current(first));
        assert!(ticker.is_current(second));

        assert!(ticker.stop());
        assert!(!ticker.is_current(second));
        assert!(!ticker.stop());
    }

    #[test]
    fn test_threaded_ticker_fires_and_stops() {
        let (tx, rx) = mpsc::channel();
        let mut ticker = Ticker::new(Duration::from_millis(5));
        let token = ticker.start(move |t| {
            let _ = tx.send(t);
        });

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut ticks = 0;
        while ticks < 3 && Instant::now() < deadline {
            if let Ok(t) = rx.recv_timeout(Duration::from_millis(100)) {
                assert_eq!(t, token);
                ticks += 1;
            }
        }
        assert_eq!(ticks, 3);

        let start = Instant::now();
        assert!(ticker.stop());
        // Cancellation wakes the thread instead of waiting out the interval
        assert!(start.elapsed() < Duration::from_secs(1));

        // Drain what was queued before stop returned; nothing arrives after
        while rx.try_recv().is_ok() {}
        thread::sleep(Duration::from_millis(30));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_restart_cancels_previous_thread() {
        let (tx, rx) = mpsc::channel();
        let mut ticker = Ticker::new(Duration::from_millis(2));

        let tx_first = tx.clone();
        let first = ticker.start(move |t| {
            let _ = tx_first.send(t);
        });
        let second = ticker.start(move |t| {
            let _ = tx.send(t);
        });
        assert_ne!(first, second);

        // Ticks from the first run may already be queued; none are sent after
        // the restart returned.
        while rx.try_recv().is_ok() {}
        thread::sleep(Duration::from_millis(20));
        let later: Vec<_> = rx.try_iter().collect();
        assert!(!later.is_empty());
        assert!(later.iter().all(|t| *t == second));

        drop(ticker);
    }
}
