//! Detection of steps that stopped producing output.
//!
//! - [`HangDetector`] - Counts silent ticks and signals once at a limit
//! - [`ActivityWriter`] - Resets the detector on every write
//! - [`Ticker`] - Tick source, [`IntervalTicker`] for wall-clock time and
//!   [`ManualTicker`] for driving ticks by hand

pub mod detector;
pub mod ticker;

pub use detector::{ActivityWriter, HangDetector, DEFAULT_TICK_INTERVAL};
pub use ticker::{IntervalTicker, ManualTicker, TickDriver, Ticker};
