//! No-output detection for a running step.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::debug;

use super::ticker::{IntervalTicker, Ticker};

/// Tick interval used in production.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Signals once when no output has been written for `tick_limit` ticks.
///
/// The tick counter is incremented only by the background routine started
/// with [`HangDetector::start`]; every write through a writer returned by
/// [`HangDetector::wrap_writer`] resets it to zero. When the counter reaches
/// the limit a single `()` is sent on [`HangDetector::notifications`] and the
/// routine exits. The detector never touches the step's process.
///
/// # Example
///
/// ```
/// use runway::hang::{HangDetector, ManualTicker};
///
/// let (ticker, driver) = ManualTicker::new();
/// let detector = HangDetector::new(ticker, 2);
/// detector.start();
///
/// driver.tick();
/// assert!(detector.notifications().try_recv().is_err());
/// driver.tick();
/// assert!(detector.notifications().try_recv().is_ok());
/// ```
pub struct HangDetector {
    ticker: Arc<dyn Ticker>,
    tick_limit: u64,
    ticks: Arc<AtomicU64>,
    started: AtomicBool,
    notify_tx: SyncSender<()>,
    notify_rx: Receiver<()>,
}

impl HangDetector {
    /// Create a detector firing after `tick_limit` silent ticks.
    pub fn new(ticker: impl Ticker, tick_limit: u64) -> Self {
        let (notify_tx, notify_rx) = mpsc::sync_channel(1);
        Self {
            ticker: Arc::new(ticker),
            tick_limit,
            ticks: Arc::new(AtomicU64::new(0)),
            started: AtomicBool::new(false),
            notify_tx,
            notify_rx,
        }
    }

    /// Create a wall-clock detector firing after `timeout` without output.
    ///
    /// The limit is `floor(timeout / interval)` ticks.
    pub fn with_timeout(timeout: Duration, interval: Duration) -> Self {
        let tick_limit = timeout
            .as_nanos()
            .checked_div(interval.as_nanos())
            .unwrap_or(0);
        Self::new(
            IntervalTicker::new(interval),
            u64::try_from(tick_limit).unwrap_or(u64::MAX),
        )
    }

    pub fn tick_limit(&self) -> u64 {
        self.tick_limit
    }

    /// Start the background routine. Later calls do nothing.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let ticker = Arc::clone(&self.ticker);
        let ticks = Arc::clone(&self.ticks);
        let notify_tx = self.notify_tx.clone();
        let tick_limit = self.tick_limit;

        thread::spawn(move || {
            while ticker.wait() {
                let count = ticks.fetch_add(1, Ordering::SeqCst) + 1;
                if count >= tick_limit {
                    debug!("No output for {} ticks, signalling hang", count);
                    let _ = notify_tx.try_send(());
                    ticker.stop();
                    break;
                }
            }
        });
    }

    /// Stop the background routine without signalling.
    pub fn stop(&self) {
        self.ticker.stop();
    }

    /// Wrap a writer so that every write counts as output.
    pub fn wrap_writer<W: Write>(&self, inner: W) -> ActivityWriter<W> {
        ActivityWriter {
            inner,
            ticks: Arc::clone(&self.ticks),
        }
    }

    /// Receives exactly one `()` when the detector fires.
    pub fn notifications(&self) -> &Receiver<()> {
        &self.notify_rx
    }
}

impl Drop for HangDetector {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for HangDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HangDetector")
            .field("tick_limit", &self.tick_limit)
            .field("ticks", &self.ticks.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// A writer that resets its detector's tick counter on every write.
#[derive(Debug)]
pub struct ActivityWriter<W> {
    inner: W,
    ticks: Arc<AtomicU64>,
}

impl<W> ActivityWriter<W> {
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ActivityWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ticks.store(0, Ordering::SeqCst);
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
