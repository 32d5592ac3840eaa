// src/process.rs
//
// Consumer side of the pipeline: pop, parse, update the book, record
// latency, and report once per second. The book survives across reports;
// parser counters and latency stats are interval-scoped.

use crate::book::OrderBook;
use crate::parser::{Body, MessageParser};
use crate::spsc::SpscRing;
use crate::stats::{LatencyStats, HISTOGRAM_LABELS};
use crate::util::{now_nanos, ShutdownFlag};
use crate::wire::RawFrame;
use hashbrown::HashSet;
use log::{debug, info};
use std::thread;

const REPORT_INTERVAL_NS: u64 = 1_000_000_000;
const REPORT_DEPTH: usize = 5;

pub struct Processor {
    parser: MessageParser,
    book: OrderBook,
    stats: LatencyStats,
    watched: HashSet<u32>,
    last_watched: u32,
    interval_start_ns: u64,
    interval_msgs: u64,
    interval_bytes: u64,
}

impl Processor {
    pub fn new(watched: HashSet<u32>) -> Self {
        Self {
            parser: MessageParser::default(),
            book: OrderBook::new(),
            stats: LatencyStats::default(),
            watched,
            last_watched: 0,
            interval_start_ns: now_nanos(),
            interval_msgs: 0,
            interval_bytes: 0,
        }
    }

    /// Runs until the flag is raised, then drains whatever the ingest thread
    /// already queued before returning.
    pub fn run(&mut self, ring: &SpscRing<RawFrame>, shutdown: &ShutdownFlag) {
        while !shutdown.is_raised() || !ring.is_empty() {
            match ring.try_pop() {
                Some(frame) => self.on_frame(&frame),
                None => {
                    // Keep the report cadence during quiet stretches.
                    self.maybe_report(now_nanos());
                    thread::yield_now();
                }
            }
        }
    }

    fn on_frame(&mut self, frame: &RawFrame) {
        let Some(msg) = self.parser.parse(frame) else {
            return;
        };

        let latency_ns = now_nanos().saturating_sub(frame.arrival_ts_ns);
        self.stats.record(latency_ns);
        self.interval_msgs += 1;
        self.interval_bytes += frame.len as u64;

        match msg.body {
            Body::Quote(quote) => {
                self.book.on_quote(&quote);
                if self.watched.contains(&quote.symbol_id) {
                    self.last_watched = quote.symbol_id;
                }
            }
            Body::OrderAdd(add) => self.book.on_order_add(&add),
            Body::OrderCancel(cancel) => self.book.on_order_cancel(&cancel),
            // Received and validated but not modeled by the book.
            Body::Trade(_) => {}
        }

        self.maybe_report(now_nanos());
    }

    fn maybe_report(&mut self, now_ns: u64) {
        let elapsed_ns = now_ns.saturating_sub(self.interval_start_ns);
        if elapsed_ns < REPORT_INTERVAL_NS {
            return;
        }
        let elapsed_s = elapsed_ns as f64 / 1e9;
        let snap = self.stats.snapshot();

        info!(
            "bbo bid={} ask={} spread={} live_orders={}",
            fmt_price(self.book.best_bid()),
            fmt_price(self.book.best_ask()),
            fmt_price(self.book.spread()),
            self.book.order_count(),
        );
        if self.last_watched != 0 {
            info!("watched symbol {} updated this interval", self.last_watched);
        }
        info!(
            "interval {:.2}s: msgs={} bytes={} rate={:.0}/s gaps={} invalid={}",
            elapsed_s,
            self.interval_msgs,
            self.interval_bytes,
            self.interval_msgs as f64 / elapsed_s,
            self.parser.sequence_gaps(),
            self.parser.invalid_messages(),
        );
        info!(
            "latency avg={}ns min={}ns max={}ns p50={}ns p95={}ns p99={}ns p999={}ns",
            snap.avg_ns, snap.min_ns, snap.max_ns, snap.p50_ns, snap.p95_ns, snap.p99_ns,
            snap.p999_ns,
        );
        let pct = |count: u64| {
            if self.interval_msgs == 0 {
                0.0
            } else {
                count as f64 / self.interval_msgs as f64 * 100.0
            }
        };
        info!(
            "latency hist: {}={} ({:.1}%) {}={} ({:.1}%) {}={} ({:.1}%) {}={} ({:.1}%) {}={} ({:.1}%)",
            HISTOGRAM_LABELS[0], snap.histogram[0], pct(snap.histogram[0]),
            HISTOGRAM_LABELS[1], snap.histogram[1], pct(snap.histogram[1]),
            HISTOGRAM_LABELS[2], snap.histogram[2], pct(snap.histogram[2]),
            HISTOGRAM_LABELS[3], snap.histogram[3], pct(snap.histogram[3]),
            HISTOGRAM_LABELS[4], snap.histogram[4], pct(snap.histogram[4]),
        );
        let (bids, asks) = self.book.top_levels(REPORT_DEPTH);
        debug!("top bids: {bids:?} top asks: {asks:?}");

        // Interval state rolls over; the book does not.
        self.parser.reset();
        self.stats.reset();
        self.interval_msgs = 0;
        self.interval_bytes = 0;
        self.last_watched = 0;
        self.interval_start_ns = now_ns;
    }

    #[cfg(test)]
    fn book(&self) -> &OrderBook {
        &self.book
    }

    #[cfg(test)]
    fn parser(&self) -> &MessageParser {
        &self.parser
    }
}

fn fmt_price(price: i64) -> String {
    if price == 0 {
        "n/a".to_string()
    } else {
        format!("{:.4}", price as f64 / 10_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{
        encode_order_add, encode_order_cancel, encode_quote, encode_trade, OrderAdd, OrderCancel,
        Quote, Side, Trade,
    };

    fn frame_of(len: usize, bytes: [u8; crate::wire::MAX_FRAME_BYTES]) -> RawFrame {
        RawFrame { bytes, len, arrival_ts_ns: now_nanos() }
    }

    fn quote_frame(seq: u32, bid: i64, ask: i64) -> RawFrame {
        let mut bytes = [0u8; crate::wire::MAX_FRAME_BYTES];
        let q = Quote { symbol_id: 1001, bid_price: bid, ask_price: ask, bid_size: 100, ask_size: 100 };
        let len = encode_quote(&mut bytes, seq, 0, &q);
        frame_of(len, bytes)
    }

    #[test]
    fn quote_updates_book() {
        let mut proc = Processor::new(HashSet::new());
        proc.on_frame(&quote_frame(1, 1_500_000, 1_500_050));
        assert_eq!(proc.book().best_bid(), 1_500_000);
        assert_eq!(proc.book().best_ask(), 1_500_050);
    }

    #[test]
    fn add_and_cancel_flow_through_dispatch() {
        let mut proc = Processor::new(HashSet::new());

        let mut bytes = [0u8; crate::wire::MAX_FRAME_BYTES];
        let add = OrderAdd { order_id: 10, symbol_id: 55, price: 1_000_000, size: 100, side: Side::Bid };
        let len = encode_order_add(&mut bytes, 1, 0, &add);
        proc.on_frame(&frame_of(len, bytes));
        assert_eq!(proc.book().best_bid(), 1_000_000);

        let mut bytes = [0u8; crate::wire::MAX_FRAME_BYTES];
        let cancel = OrderCancel { order_id: 10, symbol_id: 55 };
        let len = encode_order_cancel(&mut bytes, 2, 0, &cancel);
        proc.on_frame(&frame_of(len, bytes));
        assert_eq!(proc.book().best_bid(), 0);
        assert_eq!(proc.book().order_count(), 0);
    }

    #[test]
    fn trade_is_observed_but_changes_nothing() {
        let mut proc = Processor::new(HashSet::new());
        let mut bytes = [0u8; crate::wire::MAX_FRAME_BYTES];
        let trade = Trade { symbol_id: 1001, price: 1_500_000, size: 10, side: Side::Bid };
        let len = encode_trade(&mut bytes, 1, 0, &trade);
        proc.on_frame(&frame_of(len, bytes));
        assert_eq!(proc.book().best_bid(), 0);
        assert_eq!(proc.book().best_ask(), 0);
        assert_eq!(proc.parser().invalid_messages(), 0);
    }

    #[test]
    fn invalid_frame_counts_without_dispatch() {
        let mut proc = Processor::new(HashSet::new());
        let mut frame = quote_frame(1, 1_500_000, 1_500_050);
        frame.len = 4;
        proc.on_frame(&frame);
        assert_eq!(proc.parser().invalid_messages(), 1);
        assert_eq!(proc.book().best_bid(), 0);
    }

    #[test]
    fn run_drains_ring_after_shutdown() {
        let ring = SpscRing::new(16);
        for (seq, bid) in [(1u32, 1_500_000i64), (2, 1_500_100), (3, 1_500_050)] {
            assert!(ring.try_push(quote_frame(seq, bid, bid + 50)).is_ok());
        }
        let shutdown = ShutdownFlag::default();
        shutdown.raise();

        let mut proc = Processor::new(HashSet::new());
        // With the flag already raised, run() still consumes queued frames.
        proc.run(&ring, &shutdown);
        assert!(ring.is_empty());
        assert_eq!(proc.book().best_bid(), 1_500_100);
    }
}
