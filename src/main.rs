// Ergonomic error handling
use anyhow::{Context, Result};

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// Local modules
mod args;
mod error;
mod icmp;
mod ip;
mod session;
mod stats;
mod transport;

use session::{Outcome, PingSession, SessionConfig};
use stats::PingStatistics;

/// Sends Echo Requests until Ctrl+C or `-c`, then prints statistics.
/// Needs root or CAP_NET_RAW for the raw socket.
fn main() -> Result<()> {
    let args = args::parse()?;

    let mut logger = env_logger::Builder::from_default_env();
    if args.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.format_timestamp_millis().init();

    // Ctrl+C only stops between attempts; a pending wait runs to its deadline
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    let config = SessionConfig {
        destination: args.dst,
        identifier: process_identifier(),
        payload_len: args.size,
        timeout: args.timeout,
        verify_checksum: args.verify_checksum,
    };
    log::debug!(
        "identifier={} timeout={:?}",
        config.identifier,
        config.timeout
    );
    let mut session = PingSession::new(config);

    println!("{}", banner(&args.target, args.size));

    let mut seq = 0u16;
    let mut sent_count = 0u64;

    while running.load(Ordering::SeqCst) {
        if args.count.is_some_and(|limit| sent_count >= limit) {
            break;
        }

        match session.attempt(seq).context("Ping aborted")? {
            Outcome::Matched(reply) => println!(
                "{} bytes from {}: icmp_seq={} ttl={} time={:.3} ms",
                reply.size, reply.source, reply.sequence, reply.ttl, reply.elapsed_ms
            ),
            Outcome::TimedOut { sequence } => println!("Request timeout for icmp_seq {sequence}"),
            Outcome::Errored(e) => println!("Ping failed for icmp_seq {seq}: {e}"),
        }
        sent_count += 1;
        seq = seq.wrapping_add(1);

        // No pause after the last request
        let last = args.count.is_some_and(|limit| sent_count >= limit);
        if !last && running.load(Ordering::SeqCst) {
            std::thread::sleep(args.interval);
        }
    }

    print_statistics(&args.target, &session.summarize());
    Ok(())
}

/// Tags this process's packets among other pingers on the host.
fn process_identifier() -> u16 {
    // Process id mixed with the thread id, as concurrent pingers may share a pid
    let mut hasher = DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    ((std::process::id() as u64 ^ hasher.finish()) & 0xFFFF) as u16
}

fn banner(target: &str, size: usize) -> String {
    format!("PING {target}: {size} bytes of data")
}

fn print_statistics(target: &str, stats: &PingStatistics) {
    println!("\n--- {target} ping statistics ---");
    println!(
        "{} packets transmitted, {} packets received, {:.1}% packet loss",
        stats.transmitted,
        stats.received,
        stats.loss_percent()
    );

    if let Some((min, avg, max)) = stats.rtt() {
        println!("round-trip min/avg/max = {min:.3}/{avg:.3}/{max:.3} ms");
    }
}
