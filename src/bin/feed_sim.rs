// Deterministic multicast feed generator for exercising the receiver: emits
// the four message kinds with strictly monotonic sequence numbers starting at
// 1, paced to a target message rate.
#![allow(dead_code)]

#[path = "../util.rs"]
mod util;
#[path = "../wire.rs"]
mod wire;

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use wire::{OrderAdd, OrderCancel, Quote, Side, Trade};

#[derive(Debug, Parser)]
#[command(name = "feed_sim", version, about = "Multicast market-data feed simulator")]
struct SimConfig {
    /// Multicast group to send to.
    #[arg(long, default_value = "239.255.0.1")]
    multicast: Ipv4Addr,

    #[arg(long, default_value_t = 5000)]
    port: u16,

    /// Target send rate in messages per second; 0 sends as fast as possible.
    #[arg(long, default_value_t = 1_000_000)]
    rate: u32,

    /// Number of distinct symbol ids (1000, 1001, ...).
    #[arg(long, default_value_t = 100)]
    symbols: u32,

    #[arg(long, default_value_t = 10)]
    duration: u64,
}

fn main() -> anyhow::Result<()> {
    let cfg = SimConfig::parse();
    eprintln!(
        "feed_sim -> {}:{} @ {} msg/sec for {}s",
        cfg.multicast, cfg.port, cfg.rate, cfg.duration
    );

    let sock = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    sock.set_multicast_ttl_v4(1)?;
    let dest = SocketAddr::new(IpAddr::V4(cfg.multicast), cfg.port);

    // Fixed seed keeps runs reproducible across hosts.
    let mut rng = StdRng::seed_from_u64(42);
    let symbols: Vec<u32> = (0..cfg.symbols.max(1)).map(|i| 1000 + i).collect();

    let mut sequence: u32 = 1;
    let mut order_id: u64 = 1;
    let mut buf = [0u8; 64];
    let mut sent: u64 = 0;

    let interval = if cfg.rate > 0 {
        Duration::from_nanos(1_000_000_000 / u64::from(cfg.rate))
    } else {
        Duration::ZERO
    };
    let mut next_send = Instant::now();
    let stop_time = Instant::now() + Duration::from_secs(cfg.duration);

    while Instant::now() < stop_time {
        let symbol_id = symbols[sequence as usize % symbols.len()];
        let ts_ns = util::now_nanos();

        let len = match rng.gen_range(1..=4u32) {
            1 => {
                let bid_price = 1_500_000 + rng.gen_range(-500..=500i64);
                let quote = Quote {
                    symbol_id,
                    bid_price,
                    ask_price: bid_price + 25,
                    bid_size: rng.gen_range(100..=500),
                    ask_size: rng.gen_range(100..=500),
                };
                wire::encode_quote(&mut buf, sequence, ts_ns, &quote)
            }
            2 => {
                let trade = Trade {
                    symbol_id,
                    price: 1_500_000 + rng.gen_range(-500..=500i64),
                    size: rng.gen_range(100..=500),
                    side: if rng.gen_bool(0.5) { Side::Bid } else { Side::Ask },
                };
                wire::encode_trade(&mut buf, sequence, ts_ns, &trade)
            }
            3 => {
                let add = OrderAdd {
                    order_id,
                    symbol_id,
                    price: 1_500_000 + rng.gen_range(-500..=500i64),
                    size: rng.gen_range(100..=500),
                    side: if rng.gen_bool(0.5) { Side::Bid } else { Side::Ask },
                };
                order_id += 1;
                wire::encode_order_add(&mut buf, sequence, ts_ns, &add)
            }
            _ => {
                // Cancel the most recently issued order id; before any add
                // this targets id 0, which the receiver ignores.
                let cancel = OrderCancel { order_id: order_id - 1, symbol_id };
                wire::encode_order_cancel(&mut buf, sequence, ts_ns, &cancel)
            }
        };
        sequence += 1;

        let _ = sock.send_to(&buf[..len], &dest.into());
        sent += 1;

        if !interval.is_zero() {
            let now = Instant::now();
            if next_send > now {
                std::thread::sleep(next_send - now);
            }
            next_send += interval;
        }
    }

    eprintln!("feed_sim finished: sent {} messages", sent);
    Ok(())
}
