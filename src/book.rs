// src/book.rs
//
// Price-level book for a single shared price space. Adds and cancels move
// through the order index; quotes overwrite level aggregates directly and
// never touch the index.

use crate::wire::{OrderAdd, OrderCancel, Quote, Side};
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy)]
pub struct Order {
    pub order_id: u64,
    pub symbol_id: u32,
    pub price: i64,
    pub size: u32,
    pub side: Side,
}

#[derive(Default)]
pub struct OrderBook {
    bids: BTreeMap<i64, u64>,
    asks: BTreeMap<i64, u64>,
    orders: HashMap<u64, Order>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn levels_mut(&mut self, side: Side) -> &mut BTreeMap<i64, u64> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    /// A re-used order id overwrites the index entry; the old size stays in
    /// its level aggregate.
    pub fn on_order_add(&mut self, msg: &OrderAdd) {
        let order = Order {
            order_id: msg.order_id,
            symbol_id: msg.symbol_id,
            price: msg.price,
            size: msg.size,
            side: msg.side,
        };
        self.orders.insert(msg.order_id, order);
        *self.levels_mut(msg.side).entry(msg.price).or_insert(0) += u64::from(msg.size);
    }

    /// Unknown ids are a no-op. The stored order supplies price and side; the
    /// cancel message carries neither.
    pub fn on_order_cancel(&mut self, msg: &OrderCancel) {
        let Some(order) = self.orders.remove(&msg.order_id) else {
            return;
        };
        let levels = self.levels_mut(order.side);
        if let Some(agg) = levels.get_mut(&order.price) {
            if *agg > u64::from(order.size) {
                *agg -= u64::from(order.size);
            } else {
                levels.remove(&order.price);
            }
        }
    }

    /// Quotes are absolute snapshots at their prices, not deltas. A zero size
    /// is stored as a zero level; observers treat it as no liquidity.
    pub fn on_quote(&mut self, msg: &Quote) {
        self.bids.insert(msg.bid_price, u64::from(msg.bid_size));
        self.asks.insert(msg.ask_price, u64::from(msg.ask_size));
    }

    /// Highest bid price, or 0 when there are no bids.
    #[inline]
    pub fn best_bid(&self) -> i64 {
        self.bids.keys().next_back().copied().unwrap_or(0)
    }

    /// Lowest ask price, or 0 when there are no asks.
    #[inline]
    pub fn best_ask(&self) -> i64 {
        self.asks.keys().next().copied().unwrap_or(0)
    }

    pub fn spread(&self) -> i64 {
        let bid = self.best_bid();
        let ask = self.best_ask();
        if bid == 0 || ask == 0 {
            0
        } else {
            ask - bid
        }
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Best-first (price, aggregated size) pairs for each side.
    pub fn top_levels(&self, n: usize) -> (SmallVec<[(i64, u64); 8]>, SmallVec<[(i64, u64); 8]>) {
        let mut bids = SmallVec::new();
        let mut asks = SmallVec::new();
        for (p, s) in self.bids.iter().rev().take(n) {
            bids.push((*p, *s));
        }
        for (p, s) in self.asks.iter().take(n) {
            asks.push((*p, *s));
        }
        (bids, asks)
    }
}
