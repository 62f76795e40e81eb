//! Tick sources.
//!
//! A [`TickSource`] is a lazy, restartable sequence of [`MarketTick`]s.
//! Ordering is enforced by the consumer (see [`crate::clock::SimClock`]),
//! so a source may yield out-of-order rows and let the engine reject them.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::clock::ClockError;
use crate::error::ErrorKind;
use crate::market::MarketTick;

/// Errors reading ticks or writing the event log.
#[derive(Debug, Error)]
pub enum FeedError {
    /// File could not be opened, read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Line could not be parsed as a tick.
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// Parser message.
        message: String,
    },

    /// Tick timestamp did not advance.
    #[error(transparent)]
    OutOfOrder(#[from] ClockError),

    /// Event could not be serialized.
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl FeedError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInput
    }

    /// Whether the source can keep going after this error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::OutOfOrder(_))
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Lazy, restartable sequence of ticks.
pub trait TickSource {
    /// Next tick, `None` when exhausted.
    fn next_tick(&mut self) -> Option<Result<MarketTick, FeedError>>;

    /// Rewind to the first tick.
    ///
    /// # Errors
    ///
    /// Fails when the underlying storage cannot be reopened.
    fn reset(&mut self) -> Result<(), FeedError>;
}

/// Ticks held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTickSource {
    ticks: Vec<MarketTick>,
    cursor: usize,
}

impl InMemoryTickSource {
    /// Source over `ticks`, in the given order.
    #[must_use]
    pub const fn new(ticks: Vec<MarketTick>) -> Self {
        Self { ticks, cursor: 0 }
    }

    /// All ticks.
    #[must_use]
    pub fn ticks(&self) -> &[MarketTick] {
        &self.ticks
    }
}

impl TickSource for InMemoryTickSource {
    fn next_tick(&mut self) -> Option<Result<MarketTick, FeedError>> {
        let tick = self.ticks.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(Ok(tick))
    }

    fn reset(&mut self) -> Result<(), FeedError> {
        self.cursor = 0;
        Ok(())
    }
}

/// Ticks streamed from a JSON-lines file, one [`MarketTick`] per line.
///
/// Blank lines are skipped. A malformed line yields a `Parse` error and
/// the source continues with the next line.
#[derive(Debug)]
pub struct JsonLinesTickSource {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line: usize,
}

impl JsonLinesTickSource {
    /// Open `path`.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FeedError> {
        let path = path.as_ref().to_path_buf();
        let lines = Self::reader(&path)?;
        Ok(Self {
            path,
            lines,
            line: 0,
        })
    }

    fn reader(path: &Path) -> Result<Lines<BufReader<File>>, FeedError> {
        let file = File::open(path).map_err(|e| FeedError::io(path, e))?;
        Ok(BufReader::new(file).lines())
    }

    /// Read every remaining tick into memory, failing on the first error.
    ///
    /// # Errors
    ///
    /// Any read or parse error.
    pub fn read_all(&mut self) -> Result<Vec<MarketTick>, FeedError> {
        let mut ticks = Vec::new();
        while let Some(tick) = self.next_tick() {
            ticks.push(tick?);
        }
        Ok(ticks)
    }
}

impl TickSource for JsonLinesTickSource {
    fn next_tick(&mut self) -> Option<Result<MarketTick, FeedError>> {
        loop {
            let raw = match self.lines.next()? {
                Ok(raw) => raw,
                Err(e) => return Some(Err(FeedError::io(&self.path, e))),
            };
            self.line += 1;
            if raw.trim().is_empty() {
                continue;
            }
            return Some(
                serde_json::from_str(&raw).map_err(|e| FeedError::Parse {
                    line: self.line,
                    message: e.to_string(),
                }),
            );
        }
    }

    fn reset(&mut self) -> Result<(), FeedError> {
        self.lines = Self::reader(&self.path)?;
        self.line = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::*;

    fn tick(secs: i64, price: rust_decimal::Decimal) -> MarketTick {
        MarketTick::new(Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(), price)
    }

    #[test]
    fn test_in_memory_source_resets() {
        let mut source = InMemoryTickSource::new(vec![tick(0, dec!(1)), tick(1, dec!(2))]);
        assert!(source.next_tick().is_some());
        assert!(source.next_tick().is_some());
        assert!(source.next_tick().is_none());
        source.reset().unwrap();
        let Some(Ok(first)) = source.next_tick() else {
            panic!("expected first tick after reset");
        };
        assert_eq!(first.price, dec!(1));
    }

    #[test]
    fn test_json_lines_source_skips_blank_and_reports_bad_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"timestamp":"2026-01-01T00:00:00Z","price":"50000"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(
            file,
            r#"{{"timestamp":"2026-01-01T01:00:00Z","price":"50100","perp_price":"50120"}}"#
        )
        .unwrap();

        let mut source = JsonLinesTickSource::open(file.path()).unwrap();
        let Some(Ok(first)) = source.next_tick() else {
            panic!("expected a tick");
        };
        assert_eq!(first.price, dec!(50000));

        let Some(Err(err)) = source.next_tick() else {
            panic!("expected a parse error");
        };
        assert!(matches!(err, FeedError::Parse { line: 3, .. }));
        assert!(err.is_recoverable());

        let Some(Ok(second)) = source.next_tick() else {
            panic!("expected a tick after the bad line");
        };
        assert_eq!(second.perp_price, Some(dec!(50120)));
        assert!(source.next_tick().is_none());

        source.reset().unwrap();
        assert!(source.read_all().is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let Err(err) = JsonLinesTickSource::open("/nonexistent/ticks.jsonl") else {
            panic!("expected open to fail");
        };
        assert!(!err.is_recoverable());
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
