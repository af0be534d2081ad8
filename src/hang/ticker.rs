//! Tick sources for the hang detector.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::time::Duration;

/// A source of ticks consumed by one background routine.
pub trait Ticker: Send + Sync + 'static {
    /// Block until the next tick. Returns `false` once the ticker is stopped.
    fn wait(&self) -> bool;

    /// Stop ticking. A blocked or later [`Ticker::wait`] returns `false`.
    fn stop(&self);
}

/// Ticks on a fixed wall-clock interval.
#[derive(Debug)]
pub struct IntervalTicker {
    interval: Duration,
    stop_tx: Mutex<Option<Sender<()>>>,
    stop_rx: Mutex<Receiver<()>>,
}

impl IntervalTicker {
    pub fn new(interval: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel();
        Self {
            interval,
            stop_tx: Mutex::new(Some(stop_tx)),
            stop_rx: Mutex::new(stop_rx),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Ticker for IntervalTicker {
    fn wait(&self) -> bool {
        let Ok(stop_rx) = self.stop_rx.lock() else {
            return false;
        };
        matches!(
            stop_rx.recv_timeout(self.interval),
            Err(RecvTimeoutError::Timeout)
        )
    }

    fn stop(&self) {
        if let Ok(mut stop_tx) = self.stop_tx.lock() {
            stop_tx.take();
        }
    }
}

/// A ticker driven by hand through its [`TickDriver`].
///
/// Each tick is acknowledged when the consumer comes back for the next one
/// (or stops the ticker), so [`TickDriver::tick`] returning means the tick
/// has been fully processed.
#[derive(Debug)]
pub struct ManualTicker {
    ticks: Mutex<Receiver<()>>,
    acks: Mutex<Option<Sender<()>>>,
    awaiting_ack: AtomicBool,
    stopped: AtomicBool,
}

/// The driving end of a [`ManualTicker`].
#[derive(Debug)]
pub struct TickDriver {
    ticks: Sender<()>,
    acks: Receiver<()>,
}

impl ManualTicker {
    pub fn new() -> (Self, TickDriver) {
        let (tick_tx, tick_rx) = mpsc::channel();
        let (ack_tx, ack_rx) = mpsc::channel();
        let ticker = Self {
            ticks: Mutex::new(tick_rx),
            acks: Mutex::new(Some(ack_tx)),
            awaiting_ack: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        };
        let driver = TickDriver {
            ticks: tick_tx,
            acks: ack_rx,
        };
        (ticker, driver)
    }

    fn ack(&self) {
        if self.awaiting_ack.swap(false, Ordering::SeqCst) {
            if let Ok(acks) = self.acks.lock() {
                if let Some(acks) = acks.as_ref() {
                    let _ = acks.send(());
                }
            }
        }
    }
}

impl Ticker for ManualTicker {
    fn wait(&self) -> bool {
        self.ack();
        if self.stopped.load(Ordering::SeqCst) {
            return false;
        }

        let received = match self.ticks.lock() {
            Ok(ticks) => ticks.recv().is_ok(),
            Err(_) => false,
        };
        if !received || self.stopped.load(Ordering::SeqCst) {
            return false;
        }

        self.awaiting_ack.store(true, Ordering::SeqCst);
        true
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.ack();
        if let Ok(mut acks) = self.acks.lock() {
            acks.take();
        }
    }
}

impl TickDriver {
    /// Deliver one tick and wait until it has been processed.
    ///
    /// Returns `false` if the ticker was stopped or dropped.
    pub fn tick(&self) -> bool {
        self.ticks.send(()).is_ok() && self.acks.recv().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn interval_ticker_ticks() {
        let ticker = IntervalTicker::new(Duration::from_millis(1));
        assert!(ticker.wait());
        assert!(ticker.wait());
    }

    #[test]
    fn interval_ticker_stop_unblocks_wait() {
        let ticker = Arc::new(IntervalTicker::new(Duration::from_secs(60)));
        let waiter = {
            let ticker = Arc::clone(&ticker);
            thread::spawn(move || ticker.wait())
        };

        let started = Instant::now();
        ticker.stop();
        assert!(!waiter.join().unwrap());
        assert!(started.elapsed() < Duration::from_secs(30));
        assert!(!ticker.wait());
    }

    #[test]
    fn manual_tick_returns_after_processing() {
        let (ticker, driver) = ManualTicker::new();
        let ticker = Arc::new(ticker);
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let consumer = {
            let ticker = Arc::clone(&ticker);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                while ticker.wait() {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        assert!(driver.tick());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(driver.tick());
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        drop(driver);
        consumer.join().unwrap();
    }

    #[test]
    fn manual_tick_after_stop_reports_false() {
        let (ticker, driver) = ManualTicker::new();
        ticker.stop();
        assert!(!ticker.wait());
        assert!(!driver.tick());
    }
}
