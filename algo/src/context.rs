//! Algorithm execution context

use crate::blotter::Blotter;
use crate::error::{AlgoError, AlgoResult};
use crate::types::{AlgoParams, Order, OrderId, Portfolio, Sid};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tickline_risk::{RiskContext, RiskEngine};

/// Algorithm execution context
///
/// Gives algorithms access to order placement (with pre-trade controls),
/// the current portfolio snapshot, simulation time and parameters. This is
/// the only interface between an algorithm and the simulation.
pub struct AlgoContext {
    /// Order book shared with the simulation loop
    blotter: Blotter,

    /// Trading controls
    risk_engine: Arc<Mutex<RiskEngine>>,

    /// Portfolio as of the current event
    portfolio: Portfolio,

    /// Current simulation time
    dt: Option<DateTime<Utc>>,

    exchange_tz: Tz,

    /// Latest trade price per sid
    last_prices: HashMap<Sid, f64>,

    /// Algorithm parameters
    pub params: AlgoParams,

    /// Values recorded during the current day
    recorded_vars: IndexMap<String, f64>,
}

impl AlgoContext {
    /// Create a new context
    pub fn new(risk_engine: Arc<Mutex<RiskEngine>>, exchange_tz: Tz, params: AlgoParams) -> Self {
        Self {
            blotter: Blotter::new(),
            risk_engine,
            portfolio: Portfolio::default(),
            dt: None,
            exchange_tz,
            last_prices: HashMap::new(),
            params,
            recorded_vars: IndexMap::new(),
        }
    }

    /// Place a market order for `amount` shares (+buy, -sell)
    ///
    /// Returns `None` when the amount is zero.
    pub fn order(&mut self, sid: &str, amount: i64) -> AlgoResult<Option<OrderId>> {
        let order = Order::market(sid, amount, self.order_dt());
        self.submit(order)
    }

    /// Place a limit order
    pub fn order_limit(&mut self, sid: &str, amount: i64, limit: f64) -> AlgoResult<Option<OrderId>> {
        let mut order = Order::market(sid, amount, self.order_dt());
        order.limit = Some(limit);
        self.submit(order)
    }

    /// Place a stop order
    pub fn order_stop(&mut self, sid: &str, amount: i64, stop: f64) -> AlgoResult<Option<OrderId>> {
        let mut order = Order::market(sid, amount, self.order_dt());
        order.stop = Some(stop);
        self.submit(order)
    }

    /// Order shares worth `value` at the latest price
    pub fn order_value(&mut self, sid: &str, value: f64) -> AlgoResult<Option<OrderId>> {
        let price = self.price(sid)?;
        self.order(sid, (value / price).trunc() as i64)
    }

    /// Order a fraction of the current portfolio value
    pub fn order_percent(&mut self, sid: &str, percent: f64) -> AlgoResult<Option<OrderId>> {
        let value = self.portfolio.portfolio_value * percent;
        self.order_value(sid, value)
    }

    /// Order the difference between the held and the target share amount
    pub fn order_target(&mut self, sid: &str, target: i64) -> AlgoResult<Option<OrderId>> {
        let held = self.portfolio.position_amount(sid);
        self.order(sid, target - held)
    }

    /// Adjust the position to be worth `target_value`
    pub fn order_target_value(&mut self, sid: &str, target_value: f64) -> AlgoResult<Option<OrderId>> {
        let price = self.price(sid)?;
        self.order_target(sid, (target_value / price).trunc() as i64)
    }

    /// Adjust the position to a fraction of the portfolio value
    pub fn order_target_percent(&mut self, sid: &str, percent: f64) -> AlgoResult<Option<OrderId>> {
        let value = self.portfolio.portfolio_value * percent;
        self.order_target_value(sid, value)
    }

    /// Cancel an open order
    pub fn cancel_order(&mut self, order_id: &str) -> AlgoResult<()> {
        self.blotter.cancel(order_id)
    }

    /// Open orders for a sid, oldest first
    pub fn open_orders(&self, sid: &str) -> Vec<&Order> {
        self.blotter.open_orders(sid)
    }

    /// Look up any order placed during the run
    pub fn get_order(&self, order_id: &str) -> Option<&Order> {
        self.blotter.get_order(order_id)
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Current simulation time, `None` before the first event
    pub fn get_datetime(&self) -> Option<DateTime<Utc>> {
        self.dt
    }

    /// Current simulation time in the exchange time zone
    pub fn exchange_time(&self) -> Option<DateTime<Tz>> {
        self.dt.map(|dt| dt.with_timezone(&self.exchange_tz))
    }

    /// Record a named value for the current day
    pub fn record(&mut self, name: impl Into<String>, value: f64) {
        self.recorded_vars.insert(name.into(), value);
    }

    /// Get algorithm parameter as typed value
    pub fn get_param<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.params.get_typed(key)
    }

    /// Latest trade price for a sid
    pub fn price(&self, sid: &str) -> AlgoResult<f64> {
        self.last_prices
            .get(sid)
            .copied()
            .filter(|p| *p > 0.0)
            .ok_or_else(|| AlgoError::PriceUnavailable(sid.to_string()))
    }

    /// Shared handle to the trading controls
    pub fn risk_engine(&self) -> Arc<Mutex<RiskEngine>> {
        Arc::clone(&self.risk_engine)
    }

    pub(crate) fn blotter_mut(&mut self) -> &mut Blotter {
        &mut self.blotter
    }

    pub(crate) fn blotter(&self) -> &Blotter {
        &self.blotter
    }

    pub(crate) fn set_datetime(&mut self, dt: DateTime<Utc>) {
        self.dt = Some(dt);
    }

    pub(crate) fn set_portfolio(&mut self, portfolio: Portfolio) {
        self.portfolio = portfolio;
    }

    pub(crate) fn update_price(&mut self, sid: &str, price: f64) {
        self.last_prices.insert(sid.to_string(), price);
    }

    pub(crate) fn take_recorded_vars(&mut self) -> IndexMap<String, f64> {
        std::mem::take(&mut self.recorded_vars)
    }

    /// Orders placed before the first event fill on the first bar
    fn order_dt(&self) -> DateTime<Utc> {
        self.dt.unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Run pre-trade controls and hand the order to the blotter
    fn submit(&mut self, order: Order) -> AlgoResult<Option<OrderId>> {
        if order.amount == 0 {
            return Ok(None);
        }

        // 0.0 marks a sid without a known price; notional limits then reject
        let price = self
            .last_prices
            .get(&order.sid)
            .copied()
            .or(order.limit)
            .or(order.stop)
            .unwrap_or(0.0);

        let risk_ctx = RiskContext {
            sid: order.sid.clone(),
            current_position: self.portfolio.position_amount(&order.sid),
            proposed_amount: order.amount,
            price,
            orders_today: self.blotter.orders_placed_on(order.dt.date_naive()),
        };

        let risk_decision = {
            let risk_engine = self.risk_engine.lock();
            risk_engine.evaluate(&risk_ctx)
        };

        if !risk_decision.allowed {
            self.blotter.reject(order);
            return Err(AlgoError::RiskRejected {
                policies: risk_decision.violated_policies,
            });
        }

        let sid = order.sid.clone();
        let amount = order.amount;
        let order_id = self.blotter.place(order);

        if let Some(id) = &order_id {
            tracing::debug!(order_id = %id, sid = %sid, amount, "Order placed");
        }

        Ok(order_id)
    }
}
