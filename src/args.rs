use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};
use std::time::Duration;

use crate::session::{DEFAULT_PAYLOAD_LEN, DEFAULT_TIMEOUT};

#[derive(Parser, Debug)]
#[command(version, about = "ICMP echo (ping) over a raw socket", long_about = None)]
struct Cli {
    /// IPv4 address or host name; prompted for when omitted
    destination: Option<String>,

    /// Stop after this many requests
    #[arg(short, long)]
    count: Option<u64>,

    /// Payload bytes per request
    #[arg(short, long, default_value_t = DEFAULT_PAYLOAD_LEN)]
    size: usize,

    /// Per-request timeout in milliseconds
    #[arg(short = 'W', long, default_value_t = DEFAULT_TIMEOUT.as_millis() as u64)]
    timeout: u64,

    /// Pause between requests in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    interval: u64,

    /// Drop replies whose ICMP checksum is wrong
    #[arg(long)]
    verify_checksum: bool,

    #[arg(short, long)]
    verbose: bool,
}

pub struct PingArgs {
    /// As typed by the user, for display.
    pub target: String,
    pub dst: Ipv4Addr,
    pub count: Option<u64>,
    pub size: usize,
    pub timeout: Duration,
    pub interval: Duration,
    pub verify_checksum: bool,
    pub verbose: bool,
}

pub fn parse() -> Result<PingArgs> {
    let cli = Cli::parse();

    let target = match cli.destination {
        Some(t) => t,
        None => prompt("Enter the target: ")?,
    };
    let dst = resolve(&target)?;

    Ok(PingArgs {
        target,
        dst,
        count: cli.count,
        size: cli.size,
        timeout: Duration::from_millis(cli.timeout),
        interval: Duration::from_millis(cli.interval),
        verify_checksum: cli.verify_checksum,
        verbose: cli.verbose,
    })
}

fn prompt(msg: &str) -> Result<String> {
    print!("{msg}");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read target")?;

    let line = line.trim();
    anyhow::ensure!(!line.is_empty(), "No target given");
    Ok(line.to_owned())
}

/// First IPv4 address for `target`, which may already be a literal.
pub fn resolve(target: &str) -> Result<Ipv4Addr> {
    if let Ok(ip) = target.parse::<Ipv4Addr>() {
        return Ok(ip);
    }

    (target, 0)
        .to_socket_addrs()
        .with_context(|| format!("Cannot resolve {target}"))?
        .find_map(|sa| match sa.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .with_context(|| format!("No IPv4 address for {target}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_needs_no_lookup() {
        assert_eq!(resolve("10.1.2.3").unwrap(), Ipv4Addr::new(10, 1, 2, 3));
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["pingrs", "127.0.0.1"]).unwrap();
        assert_eq!(cli.destination.as_deref(), Some("127.0.0.1"));
        assert_eq!(cli.count, None);
        assert_eq!(cli.size, 32);
        assert_eq!(cli.timeout, 3000);
        assert_eq!(cli.interval, 1000);
        assert!(!cli.verify_checksum);
    }

    #[test]
    fn flags() {
        let cli =
            Cli::try_parse_from(["pingrs", "-c", "5", "-s", "56", "-W", "250", "-v", "host"])
                .unwrap();
        assert_eq!(cli.count, Some(5));
        assert_eq!(cli.size, 56);
        assert_eq!(cli.timeout, 250);
        assert!(cli.verbose);
        assert_eq!(cli.destination.as_deref(), Some("host"));
    }
}
