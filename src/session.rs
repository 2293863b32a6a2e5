use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::error::PingError;
use crate::icmp::{self, ICMP_HEADER_LEN, IcmpHeader};
use crate::ip::{IPV4_HEADER_LEN, Ipv4Header};
use crate::stats::PingStatistics;
use crate::transport::{RawSocket, Received, Transport};

pub const DEFAULT_PAYLOAD_LEN: usize = 32;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Typical MTU; the buffer grows when the payload needs more.
const MIN_RECV_BUF: usize = 1500;

/// Fixed for the whole session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub destination: Ipv4Addr,
    pub identifier: u16,
    pub payload_len: usize,
    pub timeout: Duration,
    /// Drop replies whose ICMP checksum does not verify.
    pub verify_checksum: bool,
}

impl SessionConfig {
    pub fn new(destination: Ipv4Addr, identifier: u16) -> Self {
        SessionConfig {
            destination,
            identifier,
            payload_len: DEFAULT_PAYLOAD_LEN,
            timeout: DEFAULT_TIMEOUT,
            verify_checksum: false,
        }
    }
}

/// A matched Echo Reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// ICMP payload bytes, headers excluded.
    pub size: usize,
    pub source: Ipv4Addr,
    pub sequence: u16,
    pub ttl: u8,
    pub elapsed_ms: f64,
}

#[derive(Debug)]
pub enum Outcome {
    Matched(Reply),
    TimedOut { sequence: u16 },
    /// Send or receive failed; the next attempt may still succeed.
    Errored(PingError),
}

/// Pairs each Echo Request with its reply or records its loss.
///
/// `open` yields a fresh transport for every attempt, so the socket lives
/// exactly as long as one send/receive cycle.
pub struct PingSession<O = fn() -> Result<RawSocket, PingError>> {
    config: SessionConfig,
    stats: PingStatistics,
    payload: Vec<u8>,
    open: O,
}

impl PingSession {
    /// Session over real raw sockets.
    pub fn new(config: SessionConfig) -> Self {
        PingSession::with_transport(
            config,
            RawSocket::open as fn() -> Result<RawSocket, PingError>,
        )
    }
}

impl<O, T> PingSession<O>
where
    O: FnMut() -> Result<T, PingError>,
    T: Transport,
{
    pub fn with_transport(config: SessionConfig, open: O) -> Self {
        let payload = icmp::echo_payload(config.payload_len);
        PingSession {
            config,
            stats: PingStatistics::default(),
            payload,
            open,
        }
    }

    /// One full ping. `Err` only for failures that end the session.
    pub fn attempt(&mut self, seq: u16) -> Result<Outcome, PingError> {
        // Fresh socket per attempt; dropped (closed) on every return below
        let mut transport = (self.open)()?;

        let pkt = icmp::build_echo_request(self.config.identifier, seq, &self.payload);
        // Counted once the request exists, whatever happens to it next
        self.stats.record_transmit();

        let sent_at = match transport.send(self.config.destination, &pkt) {
            Ok(at) => at,
            Err(e) => {
                debug!("icmp_seq={seq}: {e}");
                return Ok(Outcome::Errored(e));
            }
        };
        trace!(
            "sent {} bytes to {} icmp_seq={seq}",
            pkt.len(),
            self.config.destination
        );

        // Absolute deadline, shared by every receive below
        let deadline = sent_at + self.config.timeout;
        let outcome = match self.wait_reply(&mut transport, deadline) {
            Ok(Some((at, bytes))) => self.record_reply(sent_at, at, &bytes)?,
            Ok(None) => Outcome::TimedOut { sequence: seq },
            Err(e) => {
                debug!("icmp_seq={seq}: {e}");
                Outcome::Errored(e)
            }
        };
        Ok(outcome)
    }

    /// Snapshot of the statistics so far.
    pub fn summarize(&self) -> PingStatistics {
        self.stats
    }

    // Loops on one absolute deadline so foreign traffic cannot extend the wait.
    fn wait_reply(
        &self,
        transport: &mut T,
        deadline: Instant,
    ) -> Result<Option<(Instant, Vec<u8>)>, PingError> {
        let buf_size = (IPV4_HEADER_LEN + ICMP_HEADER_LEN + self.payload.len()).max(MIN_RECV_BUF);

        loop {
            // Same deadline each pass, so only the time left is waited
            let (at, bytes) = match transport.receive_with_deadline(buf_size, deadline)? {
                Received::Timeout => return Ok(None),
                Received::Datagram { at, bytes } => (at, bytes),
            };

            // Anything else (our own request, other pingers, errors) is skipped
            if self.is_ours(&bytes) {
                return Ok(Some((at, bytes)));
            }
        }
    }

    fn is_ours(&self, datagram: &[u8]) -> bool {
        // ICMP starts right after the fixed 20-byte IPv4 header
        let message = datagram.get(IPV4_HEADER_LEN..).unwrap_or_default();
        let hdr = match IcmpHeader::decode(message) {
            Ok(hdr) => hdr,
            Err(e) => {
                debug!("discarding datagram: {e}");
                return false;
            }
        };

        if !hdr.is_echo_reply() || hdr.identifier != self.config.identifier {
            trace!(
                "discarding icmp type={} id={} seq={}",
                hdr.icmp_type, hdr.identifier, hdr.sequence
            );
            return false;
        }

        if self.config.verify_checksum && !icmp::verify(message) {
            debug!("discarding reply seq={}: bad checksum", hdr.sequence);
            return false;
        }
        true
    }

    fn record_reply(
        &mut self,
        sent_at: Instant,
        received_at: Instant,
        datagram: &[u8],
    ) -> Result<Outcome, PingError> {
        // is_ours already checked both lengths
        let ip = Ipv4Header::decode(datagram)?;
        if !Ipv4Header::checksum_ok(datagram) {
            trace!("reply from {} has a bad IPv4 header checksum", ip.source);
        }
        let icmp = IcmpHeader::decode(&datagram[IPV4_HEADER_LEN..])?;

        let elapsed_ms = received_at.saturating_duration_since(sent_at).as_secs_f64() * 1000.0;
        self.stats.record_reply(elapsed_ms);

        Ok(Outcome::Matched(Reply {
            size: datagram.len() - IPV4_HEADER_LEN - ICMP_HEADER_LEN,
            source: ip.source,
            sequence: icmp.sequence,
            ttl: ip.ttl,
            elapsed_ms,
        }))
    }
}
