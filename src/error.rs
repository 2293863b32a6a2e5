use thiserror::Error;

#[derive(Error, Debug)]
pub enum PingError {
    /// Raw socket creation refused. Fatal for the whole session.
    #[error("cannot open raw ICMP socket (are you root / CAP_NET_RAW?): {0}")]
    PrivilegeDenied(#[source] std::io::Error),

    #[error("failed to send echo request: {0}")]
    SendFailed(#[source] std::io::Error),

    #[error("failed to receive: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    #[error("malformed packet: need {needed} bytes, got {got}")]
    MalformedPacket { needed: usize, got: usize },
}
