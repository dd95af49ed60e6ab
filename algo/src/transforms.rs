//! Stateful transforms applied to the event stream
//!
//! A transform sees every bar of one sid and produces a value once it has
//! enough history. [`StatefulTransform`] keeps an independent instance per sid.

use crate::error::{AlgoError, AlgoResult};
use crate::types::{Sid, TradeBar};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Per-sid streaming computation
pub trait Transform: Send {
    /// Consume one bar and return the current output, if warmed up
    fn update(&mut self, bar: &TradeBar) -> Option<f64>;
}

/// Builds a fresh transform instance for a newly seen sid
pub type TransformFactory = Arc<dyn Fn() -> Box<dyn Transform> + Send + Sync>;

/// Wraps a transform factory and keeps one state per sid
pub struct StatefulTransform {
    tag: String,
    factory: TransformFactory,
    states: HashMap<Sid, Box<dyn Transform>>,
}

impl StatefulTransform {
    pub fn new(tag: impl Into<String>, factory: TransformFactory) -> Self {
        Self {
            tag: tag.into(),
            factory,
            states: HashMap::new(),
        }
    }

    /// Tag under which outputs are published
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Feed a bar to the state for its sid
    pub fn update(&mut self, bar: &TradeBar) -> Option<f64> {
        let factory = &self.factory;
        self.states
            .entry(bar.sid.clone())
            .or_insert_with(|| factory())
            .update(bar)
    }
}

impl fmt::Debug for StatefulTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatefulTransform")
            .field("tag", &self.tag)
            .field("sids", &self.states.len())
            .finish()
    }
}

/// Rolling window of recent prices shared by the built-ins
#[derive(Debug, Clone)]
struct PriceWindow {
    window: usize,
    values: VecDeque<f64>,
}

impl PriceWindow {
    fn new(window: usize) -> Self {
        Self {
            window,
            values: VecDeque::with_capacity(window + 1),
        }
    }

    fn push(&mut self, value: f64) {
        self.values.push_back(value);
        if self.values.len() > self.window {
            self.values.pop_front();
        }
    }

    fn is_full(&self) -> bool {
        self.values.len() == self.window
    }
}

/// Simple moving average of trade prices over `window` bars
#[derive(Debug, Clone)]
pub struct MovingAverage {
    prices: PriceWindow,
}

impl MovingAverage {
    pub fn new(window: usize) -> Self {
        Self {
            prices: PriceWindow::new(window.max(1)),
        }
    }
}

impl Transform for MovingAverage {
    fn update(&mut self, bar: &TradeBar) -> Option<f64> {
        self.prices.push(bar.price);
        if !self.prices.is_full() {
            return None;
        }
        Some(self.prices.values.iter().sum::<f64>() / self.prices.window as f64)
    }
}

/// Sample standard deviation of trade prices over `window` bars
#[derive(Debug, Clone)]
pub struct MovingStdDev {
    prices: PriceWindow,
}

impl MovingStdDev {
    pub fn new(window: usize) -> Self {
        Self {
            prices: PriceWindow::new(window.max(2)),
        }
    }
}

impl Transform for MovingStdDev {
    fn update(&mut self, bar: &TradeBar) -> Option<f64> {
        self.prices.push(bar.price);
        if !self.prices.is_full() {
            return None;
        }

        let n = self.prices.window as f64;
        let mean = self.prices.values.iter().sum::<f64>() / n;
        let variance = self
            .prices
            .values
            .iter()
            .map(|p| (p - mean).powi(2))
            .sum::<f64>()
            / (n - 1.0);
        Some(variance.sqrt())
    }
}

/// Volume-weighted average price over `window` bars
#[derive(Debug, Clone)]
pub struct Vwap {
    window: usize,
    bars: VecDeque<(f64, f64)>,
}

impl Vwap {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            bars: VecDeque::new(),
        }
    }
}

impl Transform for Vwap {
    fn update(&mut self, bar: &TradeBar) -> Option<f64> {
        self.bars.push_back((bar.price, bar.volume));
        if self.bars.len() > self.window {
            self.bars.pop_front();
        }
        if self.bars.len() < self.window {
            return None;
        }

        let volume: f64 = self.bars.iter().map(|(_, v)| v).sum();
        if volume <= 0.0 {
            return None;
        }
        Some(self.bars.iter().map(|(p, v)| p * v).sum::<f64>() / volume)
    }
}

/// Fractional price change across `window` bars
#[derive(Debug, Clone)]
pub struct Returns {
    prices: PriceWindow,
}

impl Returns {
    pub fn new(window: usize) -> Self {
        // The window spans `window` changes, so it holds one extra price
        Self {
            prices: PriceWindow::new(window.max(1) + 1),
        }
    }
}

impl Transform for Returns {
    fn update(&mut self, bar: &TradeBar) -> Option<f64> {
        self.prices.push(bar.price);
        if !self.prices.is_full() {
            return None;
        }

        let first = *self.prices.values.front()?;
        if first == 0.0 {
            return None;
        }
        Some(bar.price / first - 1.0)
    }
}

/// Serializable description of a built-in transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransformSpec {
    MovingAverage { window: usize },
    MovingStdDev { window: usize },
    Vwap { window: usize },
    Returns { window: usize },
}

impl TransformSpec {
    /// Validate and turn the description into a factory
    pub fn factory(&self) -> AlgoResult<TransformFactory> {
        let window = match self {
            TransformSpec::MovingAverage { window }
            | TransformSpec::MovingStdDev { window }
            | TransformSpec::Vwap { window }
            | TransformSpec::Returns { window } => *window,
        };
        if window == 0 {
            return Err(AlgoError::InvalidParameter(format!(
                "{:?}: window must be positive",
                self
            )));
        }

        let factory: TransformFactory = match self {
            TransformSpec::MovingAverage { .. } => {
                Arc::new(move || Box::new(MovingAverage::new(window)) as Box<dyn Transform>)
            }
            TransformSpec::MovingStdDev { .. } => {
                Arc::new(move || Box::new(MovingStdDev::new(window)) as Box<dyn Transform>)
            }
            TransformSpec::Vwap { .. } => {
                Arc::new(move || Box::new(Vwap::new(window)) as Box<dyn Transform>)
            }
            TransformSpec::Returns { .. } => {
                Arc::new(move || Box::new(Returns::new(window)) as Box<dyn Transform>)
            }
        };
        Ok(factory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn bars(sid: &str, prices: &[f64]) -> Vec<TradeBar> {
        let start = Utc.with_ymd_and_hms(2013, 1, 2, 21, 0, 0).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| TradeBar::from_price(sid, start + Duration::days(i as i64), *p))
            .collect()
    }

    fn run(transform: &mut dyn Transform, prices: &[f64]) -> Vec<Option<f64>> {
        bars("LUV", prices).iter().map(|b| transform.update(b)).collect()
    }

    #[test]
    fn test_moving_average_warms_up() {
        let mut mavg = MovingAverage::new(3);
        let out = run(&mut mavg, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(out, vec![None, None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_moving_stddev() {
        let mut stddev = MovingStdDev::new(3);
        let out = run(&mut stddev, &[2.0, 4.0, 6.0]);
        assert_relative_eq!(out[2].unwrap(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_vwap_weights_by_volume() {
        let mut vwap = Vwap::new(2);
        let mut series = bars("LUV", &[10.0, 20.0]);
        series[0].volume = 300.0;
        series[1].volume = 100.0;

        assert_eq!(vwap.update(&series[0]), None);
        assert_relative_eq!(vwap.update(&series[1]).unwrap(), 12.5, epsilon = 1e-12);
    }

    #[test]
    fn test_returns_over_window() {
        let mut returns = Returns::new(2);
        let out = run(&mut returns, &[10.0, 11.0, 12.0, 9.0]);
        assert_eq!(out[1], None);
        assert_relative_eq!(out[2].unwrap(), 0.2, epsilon = 1e-12);
        assert_relative_eq!(out[3].unwrap(), 9.0 / 11.0 - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_stateful_transform_keeps_sids_apart() {
        let factory = TransformSpec::MovingAverage { window: 2 }.factory().unwrap();
        let mut transform = StatefulTransform::new("mavg", factory);

        let luv = bars("LUV", &[10.0, 12.0]);
        let kr = bars("KR", &[100.0, 200.0]);

        assert_eq!(transform.update(&luv[0]), None);
        assert_eq!(transform.update(&kr[0]), None);
        assert_eq!(transform.update(&luv[1]), Some(11.0));
        assert_eq!(transform.update(&kr[1]), Some(150.0));
        assert_eq!(transform.tag(), "mavg");
    }

    #[test]
    fn test_spec_from_yaml_and_validation() {
        let spec: TransformSpec = serde_yaml::from_str("type: Vwap\nwindow: 5\n").unwrap();
        assert_eq!(spec, TransformSpec::Vwap { window: 5 });

        let invalid = TransformSpec::Returns { window: 0 };
        assert!(matches!(invalid.factory(), Err(AlgoError::InvalidParameter(_))));
    }
}
