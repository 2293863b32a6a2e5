// Raw socket creation and configuration
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use std::io::{self, Read};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use log::debug;

use crate::error::PingError;

/// Outcome of one bounded wait on the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Datagram { at: Instant, bytes: Vec<u8> },
    Timeout,
}

/// What the session needs from the network.
pub trait Transport {
    /// Transmits `bytes` and returns the instant just before the send.
    fn send(&mut self, dst: Ipv4Addr, bytes: &[u8]) -> Result<Instant, PingError>;

    /// Waits for one datagram of at most `buf_size` bytes until `deadline`.
    fn receive_with_deadline(
        &mut self,
        buf_size: usize,
        deadline: Instant,
    ) -> Result<Received, PingError>;
}

/// Time left before `deadline`, or `None` once it has passed.
pub fn remaining(deadline: Instant, now: Instant) -> Option<Duration> {
    deadline
        .checked_duration_since(now)
        .filter(|left| !left.is_zero())
}

/// AF_INET / SOCK_RAW / IPPROTO_ICMP socket. Received datagrams include the
/// IPv4 header. Closed when dropped.
pub struct RawSocket {
    sock: Socket,
}

/// SOCK_RAW is 3 on every target; `libc::SOCK_RAW` does not exist on Windows.
const SOCK_RAW: i32 = 3;

impl RawSocket {
    pub fn open() -> Result<RawSocket, PingError> {
        // Domain::IPV4 -> AF_INET
        // Type 3 -> SOCK_RAW, needs root / CAP_NET_RAW (Administrator on Windows)
        // Protocol::ICMPV4 -> IPPROTO_ICMP
        let sock = Socket::new(Domain::IPV4, Type::from(SOCK_RAW), Some(Protocol::ICMPV4))
            .map_err(PingError::PrivilegeDenied)?;
        Ok(RawSocket::from_socket(sock))
    }

    /// Wraps an already created socket.
    fn from_socket(sock: Socket) -> RawSocket {
        // Lets broadcast destinations through; pinging unicast works without it
        if let Err(e) = sock.set_broadcast(true) {
            debug!("SO_BROADCAST not set: {e}");
        }
        RawSocket { sock }
    }
}

impl Transport for RawSocket {
    fn send(&mut self, dst: Ipv4Addr, bytes: &[u8]) -> Result<Instant, PingError> {
        // Port is ignored for ICMP
        let dst_sa: SockAddr = SocketAddr::new(IpAddr::V4(dst), 0).into();

        let sent_at = Instant::now();
        self.sock
            .send_to(bytes, &dst_sa)
            .map_err(PingError::SendFailed)?;
        Ok(sent_at)
    }

    fn receive_with_deadline(
        &mut self,
        buf_size: usize,
        deadline: Instant,
    ) -> Result<Received, PingError> {
        // Raw ICMP reads hand back the IPv4 header followed by the ICMP message
        let mut buf = vec![0u8; buf_size];

        loop {
            // Time left is recomputed on every pass, never reset to the full timeout
            let Some(left) = remaining(deadline, Instant::now()) else {
                return Ok(Received::Timeout);
            };

            // A zero read timeout would mean "block forever"
            self.sock
                .set_read_timeout(Some(left.max(Duration::from_millis(1))))
                .map_err(PingError::ReceiveFailed)?;

            match self.sock.read(&mut buf) {
                Ok(n) => {
                    // Keep only what the kernel wrote
                    buf.truncate(n);
                    return Ok(Received::Datagram {
                        at: Instant::now(),
                        bytes: buf,
                    });
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock
                            | io::ErrorKind::TimedOut
                            | io::ErrorKind::Interrupted
                    ) =>
                {
                    // Read timeout fired or a signal woke us; the deadline check decides
                    continue;
                }
                Err(e) => return Err(PingError::ReceiveFailed(e)),
            }
        }
    }
}
