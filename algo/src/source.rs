//! Bar tables and event sources
//!
//! A [`BarFrame`] is a time-indexed table with one column of bars per sid.
//! Event sources turn frames (or synthetic generators) into a stream of
//! [`TradeBar`]s ordered by timestamp.

use crate::error::{AlgoError, AlgoResult};
use crate::types::{Sid, TradeBar, DEFAULT_BAR_VOLUME};
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// OHLCV cell of a [`BarFrame`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// Flat bar at a single price
    pub fn flat(price: f64) -> Self {
        Self {
            open: price,
            high: price,
            low: price,
            close: price,
            volume: DEFAULT_BAR_VOLUME,
        }
    }
}

/// Long-format row of the CSV bar cache
#[derive(Debug, Serialize, Deserialize)]
struct CsvBar {
    dt: DateTime<Utc>,
    sid: Sid,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Time-indexed table of bars, one column per sid
///
/// The index is strictly increasing; a missing cell means the sid did not
/// trade at that timestamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BarFrame {
    index: Vec<DateTime<Utc>>,
    columns: IndexMap<Sid, Vec<Option<OhlcvBar>>>,
}

impl BarFrame {
    /// Create an empty frame over a strictly increasing index
    pub fn new(index: Vec<DateTime<Utc>>) -> AlgoResult<Self> {
        if index.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AlgoError::DataError(
                "Frame index must be strictly increasing".to_string(),
            ));
        }

        Ok(Self {
            index,
            columns: IndexMap::new(),
        })
    }

    /// Build a frame from price-only columns; NaN cells are treated as missing
    pub fn from_prices<S, I>(index: Vec<DateTime<Utc>>, columns: I) -> AlgoResult<Self>
    where
        S: Into<Sid>,
        I: IntoIterator<Item = (S, Vec<f64>)>,
    {
        let mut frame = Self::new(index)?;
        for (sid, prices) in columns {
            let cells = prices
                .into_iter()
                .map(|p| if p.is_nan() { None } else { Some(OhlcvBar::flat(p)) })
                .collect();
            frame.insert_column(sid, cells)?;
        }
        Ok(frame)
    }

    /// Build a frame from individual bars in any order
    pub fn from_bars(bars: Vec<TradeBar>) -> AlgoResult<Self> {
        let mut index: Vec<DateTime<Utc>> = bars.iter().map(|b| b.dt).collect();
        index.sort();
        index.dedup();

        let mut frame = Self::new(index)?;
        for bar in bars {
            let row = frame
                .index
                .binary_search(&bar.dt)
                .map_err(|_| AlgoError::DataError(format!("Unindexed bar at {}", bar.dt)))?;
            let len = frame.index.len();
            let column = frame
                .columns
                .entry(bar.sid.clone())
                .or_insert_with(|| vec![None; len]);
            if column[row].is_some() {
                return Err(AlgoError::DataError(format!(
                    "Duplicate bar for {} at {}",
                    bar.sid, bar.dt
                )));
            }
            column[row] = Some(OhlcvBar {
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
            });
        }
        Ok(frame)
    }

    /// Add or replace a column
    pub fn insert_column(
        &mut self,
        sid: impl Into<Sid>,
        cells: Vec<Option<OhlcvBar>>,
    ) -> AlgoResult<()> {
        let sid = sid.into();
        if cells.len() != self.index.len() {
            return Err(AlgoError::DataError(format!(
                "Column {} has {} rows, index has {}",
                sid,
                cells.len(),
                self.index.len()
            )));
        }
        self.columns.insert(sid, cells);
        Ok(())
    }

    /// Read a long-format CSV (`dt,sid,open,high,low,close,volume`)
    pub fn read_csv(path: impl AsRef<Path>) -> AlgoResult<Self> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let mut bars = Vec::new();
        for record in reader.deserialize() {
            let row: CsvBar = record?;
            bars.push(TradeBar {
                sid: row.sid,
                dt: row.dt,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
                price: row.close,
            });
        }

        tracing::debug!(path = %path.as_ref().display(), bars = bars.len(), "Loaded bar frame");
        Self::from_bars(bars)
    }

    /// Write the frame as long-format CSV
    pub fn write_csv(&self, path: impl AsRef<Path>) -> AlgoResult<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        for (row, dt) in self.index.iter().enumerate() {
            for (sid, column) in &self.columns {
                if let Some(cell) = column[row] {
                    writer.serialize(CsvBar {
                        dt: *dt,
                        sid: sid.clone(),
                        open: cell.open,
                        high: cell.high,
                        low: cell.low,
                        close: cell.close,
                        volume: cell.volume,
                    })?;
                }
            }
        }
        writer.flush()?;
        Ok(())
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn sids(&self) -> impl Iterator<Item = &Sid> {
        self.columns.keys()
    }

    pub fn contains_sid(&self, sid: &str) -> bool {
        self.columns.contains_key(sid)
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.index.first().copied()
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.index.last().copied()
    }

    /// Number of index rows
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty() || self.columns.is_empty()
    }

    /// Bar for a sid at an index row
    pub fn bar(&self, row: usize, sid: &str) -> Option<TradeBar> {
        let cell = (*self.columns.get(sid)?.get(row)?)?;
        Some(TradeBar {
            sid: sid.to_string(),
            dt: self.index[row],
            open: cell.open,
            high: cell.high,
            low: cell.low,
            close: cell.close,
            volume: cell.volume,
            price: cell.close,
        })
    }
}

/// A finite stream of trade events in non-decreasing timestamp order
pub trait EventSource: Iterator<Item = TradeBar> + Send {
    /// Identifier used in logs
    fn source_id(&self) -> &str;
}

/// Event source over a [`BarFrame`], restricted to a set of sids
///
/// Each index row yields one bar per requested sid that has a cell in that row.
pub struct DataFrameSource {
    frame: BarFrame,
    sids: Vec<Sid>,
    row: usize,
    col: usize,
}

impl DataFrameSource {
    pub fn new(frame: BarFrame, sids: &[Sid]) -> Self {
        let sids: Vec<Sid> = sids
            .iter()
            .filter(|sid| {
                let present = frame.contains_sid(sid);
                if !present {
                    tracing::warn!(sid = %sid, "Requested sid not present in bar frame");
                }
                present
            })
            .cloned()
            .collect();

        Self {
            frame,
            sids,
            row: 0,
            col: 0,
        }
    }

    /// Sids this source will emit
    pub fn sids(&self) -> &[Sid] {
        &self.sids
    }
}

impl Iterator for DataFrameSource {
    type Item = TradeBar;

    fn next(&mut self) -> Option<TradeBar> {
        while self.row < self.frame.len() {
            while self.col < self.sids.len() {
                let sid = &self.sids[self.col];
                self.col += 1;
                if let Some(bar) = self.frame.bar(self.row, sid) {
                    return Some(bar);
                }
            }
            self.row += 1;
            self.col = 0;
        }
        None
    }
}

impl EventSource for DataFrameSource {
    fn source_id(&self) -> &str {
        "DataFrameSource"
    }
}

/// Synthetic source alternating between two prices
///
/// Bar `i` trades at `base` when `i` is even and `base + delta` when odd.
pub struct UpDownSource {
    sid: Sid,
    start: DateTime<Utc>,
    interval: Duration,
    count: usize,
    base: f64,
    delta: f64,
    emitted: usize,
}

impl UpDownSource {
    pub fn new(
        sid: impl Into<Sid>,
        start: DateTime<Utc>,
        interval: Duration,
        count: usize,
        base: f64,
        delta: f64,
    ) -> Self {
        Self {
            sid: sid.into(),
            start,
            interval,
            count,
            base,
            delta,
            emitted: 0,
        }
    }
}

impl Iterator for UpDownSource {
    type Item = TradeBar;

    fn next(&mut self) -> Option<TradeBar> {
        if self.emitted >= self.count {
            return None;
        }

        let i = self.emitted;
        self.emitted += 1;

        let price = if i % 2 == 0 { self.base } else { self.base + self.delta };
        let dt = self.start + self.interval * i as i32;
        Some(TradeBar::from_price(self.sid.clone(), dt, price))
    }
}

impl EventSource for UpDownSource {
    fn source_id(&self) -> &str {
        "UpDownSource"
    }
}

/// Replays an already ordered list of events
pub struct ReplaySource {
    events: std::vec::IntoIter<TradeBar>,
}

impl ReplaySource {
    /// Wrap events; they are sorted by timestamp (stable) first
    pub fn new(mut events: Vec<TradeBar>) -> Self {
        events.sort_by_key(|bar| bar.dt);
        Self {
            events: events.into_iter(),
        }
    }
}

impl Iterator for ReplaySource {
    type Item = TradeBar;

    fn next(&mut self) -> Option<TradeBar> {
        self.events.next()
    }
}

impl EventSource for ReplaySource {
    fn source_id(&self) -> &str {
        "ReplaySource"
    }
}

/// Drain sources into one timestamp-ordered stream
///
/// Events sharing a timestamp keep the order of their sources.
pub fn merge_sources(sources: Vec<Box<dyn EventSource>>) -> Vec<TradeBar> {
    let mut events = Vec::new();
    for source in sources {
        let id = source.source_id().to_string();
        let before = events.len();
        events.extend(source);
        tracing::debug!(source = %id, events = events.len() - before, "Drained event source");
    }
    events.sort_by_key(|bar| bar.dt);
    events
}
