//! Order blotter
//!
//! Tracks every order an algorithm places and fills open orders against
//! incoming trade events through a slippage model.

use crate::error::{AlgoError, AlgoResult};
use crate::slippage::{CommissionModel, SlippageModel};
use crate::types::{Order, OrderId, OrderStatus, Sid, TradeBar, Transaction};
use chrono::NaiveDate;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Order book of the simulation
#[derive(Debug)]
pub struct Blotter {
    /// All orders in placement order
    orders: IndexMap<OrderId, Order>,
    /// Open order ids per sid, oldest first
    open: HashMap<Sid, Vec<OrderId>>,
    /// Every order id per UTC placement date, rejected ones included
    by_date: HashMap<NaiveDate, Vec<OrderId>>,
    /// Accepted orders per UTC placement date
    placed_by_date: HashMap<NaiveDate, usize>,
    next_order_id: u64,
}

impl Default for Blotter {
    fn default() -> Self {
        Self::new()
    }
}

impl Blotter {
    pub fn new() -> Self {
        Self {
            orders: IndexMap::new(),
            open: HashMap::new(),
            by_date: HashMap::new(),
            placed_by_date: HashMap::new(),
            next_order_id: 1,
        }
    }

    fn assign_id(&mut self, order: &mut Order) -> OrderId {
        let order_id = format!("order-{}", self.next_order_id);
        self.next_order_id += 1;
        order.id = order_id.clone();
        self.by_date
            .entry(order.dt.date_naive())
            .or_default()
            .push(order_id.clone());
        order_id
    }

    /// Place an order; zero amounts are ignored
    pub fn place(&mut self, mut order: Order) -> Option<OrderId> {
        if order.amount == 0 {
            return None;
        }

        let order_id = self.assign_id(&mut order);
        order.status = OrderStatus::Open;
        *self.placed_by_date.entry(order.dt.date_naive()).or_default() += 1;

        self.open
            .entry(order.sid.clone())
            .or_default()
            .push(order_id.clone());
        self.orders.insert(order_id.clone(), order);

        Some(order_id)
    }

    /// Keep a record of an order blocked before placement
    pub fn reject(&mut self, mut order: Order) -> OrderId {
        let order_id = self.assign_id(&mut order);
        order.status = OrderStatus::Rejected;
        self.orders.insert(order_id.clone(), order);
        order_id
    }

    /// Cancel an open order; cancelling a closed order is a no-op
    pub fn cancel(&mut self, order_id: &str) -> AlgoResult<()> {
        let order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| AlgoError::OrderNotFound(order_id.to_string()))?;

        if !order.is_open() {
            return Ok(());
        }

        order.status = OrderStatus::Cancelled;
        if let Some(ids) = self.open.get_mut(&order.sid) {
            ids.retain(|id| id != order_id);
        }

        tracing::debug!(order_id = %order_id, sid = %order.sid, "Order cancelled");
        Ok(())
    }

    pub fn get_order(&self, order_id: &str) -> Option<&Order> {
        self.orders.get(order_id)
    }

    /// Open orders for a sid, oldest first
    pub fn open_orders(&self, sid: &str) -> Vec<&Order> {
        self.open
            .get(sid)
            .map(|ids| ids.iter().filter_map(|id| self.orders.get(id)).collect())
            .unwrap_or_default()
    }

    /// Whether any order is still open
    pub fn has_open_orders(&self) -> bool {
        self.open.values().any(|ids| !ids.is_empty())
    }

    /// Orders placed (not rejected) on a UTC date
    pub fn orders_placed_on(&self, date: NaiveDate) -> usize {
        self.placed_by_date.get(&date).copied().unwrap_or(0)
    }

    /// Snapshot of every order created on a UTC date, rejected ones included
    pub fn orders_on(&self, date: NaiveDate) -> Vec<Order> {
        self.by_date
            .get(&date)
            .map(|ids| ids.iter().filter_map(|id| self.orders.get(id)).cloned().collect())
            .unwrap_or_default()
    }

    /// Fill open orders for the bar's sid
    ///
    /// Only orders placed strictly before the bar are eligible. Orders are
    /// filled oldest first and share the bar's volume.
    pub fn process_trade(
        &mut self,
        bar: &TradeBar,
        slippage: &dyn SlippageModel,
        commission: &CommissionModel,
    ) -> Vec<Transaction> {
        let Some(ids) = self.open.get_mut(&bar.sid) else {
            return Vec::new();
        };

        let mut transactions = Vec::new();
        let mut volume_used = 0.0;

        for order_id in ids.iter() {
            let Some(order) = self.orders.get_mut(order_id) else {
                continue;
            };
            if order.dt >= bar.dt || !order.check_triggers(bar.price) {
                continue;
            }

            let Some((price, amount)) = slippage.process_order(order, bar, volume_used) else {
                continue;
            };

            let cost = commission.calculate(order, amount);
            order.filled += amount;
            order.commission += cost;
            volume_used += amount.abs() as f64;

            if order.open_amount() == 0 {
                order.status = OrderStatus::Filled;
            }

            tracing::debug!(
                order_id = %order_id,
                sid = %bar.sid,
                amount,
                price,
                commission = cost,
                "Order filled"
            );

            transactions.push(Transaction {
                sid: bar.sid.clone(),
                amount,
                price,
                dt: bar.dt,
                order_id: order_id.clone(),
                commission: cost,
            });
        }

        let orders = &self.orders;
        ids.retain(|id| orders.get(id).map(|o| o.is_open()).unwrap_or(false));

        transactions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slippage::{FixedSlippage, VolumeShareSlippage};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2013, 1, 2, 21, 0, 0).unwrap()
    }

    fn bar(price: f64, dt: DateTime<Utc>) -> TradeBar {
        TradeBar::from_price("LUV", dt, price)
    }

    #[test]
    fn test_place_assigns_ids_and_skips_zero() {
        let mut blotter = Blotter::new();

        assert_eq!(blotter.place(Order::market("LUV", 0, t0())), None);
        assert_eq!(blotter.place(Order::market("LUV", 10, t0())), Some("order-1".to_string()));
        assert_eq!(blotter.place(Order::market("KR", -5, t0())), Some("order-2".to_string()));

        assert_eq!(blotter.open_orders("LUV").len(), 1);
        assert_eq!(blotter.orders_placed_on(t0().date_naive()), 2);
    }

    #[test]
    fn test_fills_only_after_placement() {
        let mut blotter = Blotter::new();
        let id = blotter.place(Order::market("LUV", 100, t0())).unwrap();

        let same_bar = blotter.process_trade(&bar(10.0, t0()), &FixedSlippage::default(), &CommissionModel::Zero);
        assert!(same_bar.is_empty());

        let next = t0() + Duration::days(1);
        let txns = blotter.process_trade(&bar(10.5, next), &FixedSlippage::default(), &CommissionModel::default());
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].amount, 100);
        assert_eq!(txns[0].price, 10.5);
        assert!((txns[0].commission - 3.0).abs() < 1e-12);

        let order = blotter.get_order(&id).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(blotter.open_orders("LUV").is_empty());
    }

    #[test]
    fn test_partial_fills_share_bar_volume() {
        let mut blotter = Blotter::new();
        let first = blotter.place(Order::market("LUV", 200, t0())).unwrap();
        let second = blotter.place(Order::market("LUV", 200, t0())).unwrap();

        let slippage = VolumeShareSlippage::default();
        let next = t0() + Duration::days(1);
        let txns = blotter.process_trade(&bar(10.0, next), &slippage, &CommissionModel::Zero);

        // 25% of 1000 shares: first order fills fully, second gets the rest
        assert_eq!(txns.iter().map(|t| t.amount).collect::<Vec<_>>(), vec![200, 50]);
        assert_eq!(blotter.get_order(&first).unwrap().status, OrderStatus::Filled);

        let open = blotter.open_orders("LUV");
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, second);
        assert_eq!(open[0].open_amount(), 150);
    }

    #[test]
    fn test_limit_order_waits_for_price() {
        let mut blotter = Blotter::new();
        let mut order = Order::market("LUV", -10, t0());
        order.limit = Some(11.0);
        blotter.place(order);

        let slippage = FixedSlippage::default();
        let day1 = t0() + Duration::days(1);
        assert!(blotter.process_trade(&bar(10.0, day1), &slippage, &CommissionModel::Zero).is_empty());

        let day2 = t0() + Duration::days(2);
        let txns = blotter.process_trade(&bar(11.5, day2), &slippage, &CommissionModel::Zero);
        assert_eq!(txns[0].amount, -10);
    }

    #[test]
    fn test_cancel_and_reject() {
        let mut blotter = Blotter::new();
        let id = blotter.place(Order::market("LUV", 10, t0())).unwrap();

        blotter.cancel(&id).unwrap();
        assert_eq!(blotter.get_order(&id).unwrap().status, OrderStatus::Cancelled);
        assert!(!blotter.has_open_orders());
        assert!(matches!(blotter.cancel("order-99"), Err(AlgoError::OrderNotFound(_))));

        let rejected = blotter.reject(Order::market("LUV", -10, t0()));
        assert_eq!(blotter.get_order(&rejected).unwrap().status, OrderStatus::Rejected);
        assert_eq!(blotter.orders_placed_on(t0().date_naive()), 1);
        assert_eq!(blotter.orders_on(t0().date_naive()).len(), 2);
    }

    #[test]
    fn test_orders_indexed_by_placement_date() {
        let mut blotter = Blotter::new();
        let day0 = t0().date_naive();
        let t1 = t0() + Duration::days(1);

        let first = blotter.place(Order::market("LUV", 10, t0())).unwrap();
        blotter.place(Order::market("LUV", 20, t1));
        blotter.reject(Order::market("LUV", -30, t1));
        blotter.cancel(&first).unwrap();

        // Snapshots reflect the latest order state
        let on_day0 = blotter.orders_on(day0);
        assert_eq!(on_day0.len(), 1);
        assert_eq!(on_day0[0].status, OrderStatus::Cancelled);

        assert_eq!(blotter.orders_on(t1.date_naive()).len(), 2);
        assert_eq!(blotter.orders_placed_on(t1.date_naive()), 1);
        assert_eq!(blotter.orders_placed_on(day0 - Duration::days(1)), 0);
        assert!(blotter.orders_on(day0 - Duration::days(1)).is_empty());
    }
}
