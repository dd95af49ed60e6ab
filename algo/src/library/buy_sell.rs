//! Alternating buy/sell algorithm

use crate::{AlgoContext, AlgoError, AlgoResult, Algorithm, AlgorithmMetadata, BarData, Sid};
use async_trait::async_trait;

/// Algorithm that sells and buys alternately
///
/// Each order is for `amount - offset^2` shares, starting with a sell. Run
/// against an [`UpDownSource`](crate::source::UpDownSource) it sells every
/// high and buys every low, so an offset of 0 produces the best return. It
/// exists to exercise parameter optimisation.
#[derive(Debug, Clone)]
pub struct BuySellAlgorithm {
    sids: Vec<Sid>,
    amount: i64,
    offset: i64,
    /// -1 to sell next, +1 to buy next
    buy_or_sell: i64,
    /// Signed size of every order issued
    pub orders: Vec<i64>,
    /// Prices seen for the traded sid
    pub prices: Vec<f64>,
    pub frame_count: usize,
    pub incr: usize,
    log_orders: bool,
}

impl BuySellAlgorithm {
    /// Trade a single sid
    pub fn new(sid: impl Into<Sid>, amount: i64, offset: i64) -> Self {
        Self {
            sids: vec![sid.into()],
            amount,
            offset,
            buy_or_sell: -1,
            orders: Vec::new(),
            prices: Vec::new(),
            frame_count: 0,
            incr: 0,
            log_orders: false,
        }
    }

    /// Subscribe to several sids and trade the first one, logging each order
    pub fn with_sids(sids: Vec<Sid>, amount: i64, offset: i64) -> Self {
        Self {
            sids,
            log_orders: true,
            ..Self::new(Sid::new(), amount, offset)
        }
    }

    /// Size of the next order
    pub fn order_size(&self) -> i64 {
        self.buy_or_sell * (self.amount - self.offset.pow(2))
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }
}

#[async_trait]
impl Algorithm for BuySellAlgorithm {
    async fn initialize(&mut self, _ctx: &mut AlgoContext) -> AlgoResult<()> {
        if self.sids.is_empty() || self.sids[0].is_empty() {
            return Err(AlgoError::SidsNotSet);
        }
        Ok(())
    }

    async fn handle_data(&mut self, ctx: &mut AlgoContext, data: &BarData) -> AlgoResult<()> {
        let sid = self.sids[0].clone();
        let order_size = self.order_size();

        match ctx.order(&sid, order_size) {
            Ok(_) => {}
            Err(AlgoError::RiskRejected { policies }) => {
                tracing::debug!(sid = %sid, order_size, ?policies, "Order rejected");
            }
            Err(e) => return Err(e),
        }
        if self.log_orders {
            tracing::debug!(sid = %sid, order_size, "ordering");
        }

        // Sell next time around
        self.buy_or_sell *= -1;

        self.orders.push(order_size);
        if let Some(price) = data.price(&sid) {
            self.prices.push(price);
        }

        self.frame_count += 1;
        self.incr += 1;
        Ok(())
    }

    fn sid_filter(&self) -> Vec<Sid> {
        self.sids.clone()
    }

    fn metadata(&self) -> AlgorithmMetadata {
        AlgorithmMetadata {
            name: "BuySell".to_string(),
            version: "1.0.0".to_string(),
            description: "Alternating sells and buys of a fixed size".to_string(),
            sids: self.sids.clone(),
        }
    }
}
