// Single-thread hot-loop benchmark: parse + book update + latency record per
// message, no sockets involved. Reports throughput and the percentile
// snapshot the receiver would print.
#![allow(dead_code)]

#[path = "../book.rs"]
mod book;
#[path = "../parser.rs"]
mod parser;
#[path = "../stats.rs"]
mod stats;
#[path = "../util.rs"]
mod util;
#[path = "../wire.rs"]
mod wire;

use book::OrderBook;
use parser::{Body, MessageParser};
use stats::LatencyStats;
use util::now_nanos;
use wire::{Quote, RawFrame};

fn parse_arg_usize(args: &[String], idx: usize, default: usize) -> usize {
    args.get(idx).and_then(|s| s.parse::<usize>().ok()).unwrap_or(default)
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let iterations = parse_arg_usize(&args, 1, 2_000_000);

    let mut parser = MessageParser::default();
    let mut book = OrderBook::new();
    let mut stats = LatencyStats::default();

    let quote = Quote {
        symbol_id: 1001,
        bid_price: 1_500_000,
        ask_price: 1_500_050,
        bid_size: 100,
        ask_size: 100,
    };

    let mut frame = RawFrame::default();
    let start_all = now_nanos();
    for i in 0..iterations {
        frame.len = wire::encode_quote(&mut frame.bytes, (i + 1) as u32, now_nanos(), &quote);
        frame.arrival_ts_ns = now_nanos();

        if let Some(msg) = parser.parse(&frame) {
            if let Body::Quote(q) = msg.body {
                book.on_quote(&q);
            }
        }
        stats.record(now_nanos() - frame.arrival_ts_ns);
    }
    let elapsed_s = (now_nanos() - start_all) as f64 / 1e9;

    let snap = stats.snapshot();
    println!(
        "bench_latency: iterations={} duration_s={:.3} throughput_mps={:.0} avg_ns={} p50_ns={} p95_ns={} p99_ns={} p999_ns={} gaps={} invalid={}",
        iterations,
        elapsed_s,
        iterations as f64 / elapsed_s,
        snap.avg_ns,
        snap.p50_ns,
        snap.p95_ns,
        snap.p99_ns,
        snap.p999_ns,
        parser.sequence_gaps(),
        parser.invalid_messages(),
    );
}
