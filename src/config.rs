// src/config.rs
use clap::Parser;
use std::net::Ipv4Addr;

/// Ring slots; one slot stays unused, so effective capacity is one less.
pub const RING_CAPACITY: usize = 65_536;

#[derive(Debug, Parser)]
#[command(name = "mdfeed", version, about = "Multicast market-data feed handler")]
pub struct Config {
    /// Multicast group to join.
    #[arg(long, default_value = "239.255.0.1")]
    pub multicast: Ipv4Addr,

    /// UDP port of the feed.
    #[arg(long, default_value_t = 5000)]
    pub port: u16,

    /// Run time in seconds; 0 runs until SIGINT/SIGTERM.
    #[arg(long, default_value_t = 0)]
    pub duration: u64,

    /// Comma-separated symbol ids to watch (observational only, no filtering).
    #[arg(long, value_delimiter = ',')]
    pub symbols: Vec<u32>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.multicast.is_multicast() {
            anyhow::bail!("--multicast must be a multicast IPv4 address, got {}", self.multicast);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_feed_contract() {
        let cfg = Config::parse_from(["mdfeed"]);
        assert_eq!(cfg.multicast, Ipv4Addr::new(239, 255, 0, 1));
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.duration, 0);
        assert!(cfg.symbols.is_empty());
        cfg.validate().unwrap();
    }

    #[test]
    fn symbols_split_on_commas() {
        let cfg = Config::parse_from(["mdfeed", "--symbols", "1001,1002,1003"]);
        assert_eq!(cfg.symbols, vec![1001, 1002, 1003]);
    }

    #[test]
    fn non_multicast_address_rejected() {
        let cfg = Config::parse_from(["mdfeed", "--multicast", "127.0.0.1"]);
        assert!(cfg.validate().is_err());
    }
}
