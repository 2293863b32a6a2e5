use std::net::Ipv4Addr;

use crate::error::PingError;
use crate::icmp::checksum;

/// Replies are parsed assuming an option-less IPv4 header.
pub const IPV4_HEADER_LEN: usize = 20;

/// https://en.wikipedia.org/wiki/IPv4#Header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version_ihl: u8,
    pub tos: u8,
    pub total_length: u16,
    pub identification: u16,
    pub flags_fragment: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
}

impl Ipv4Header {
    /// Decodes the leading 20 bytes. The header checksum is not validated.
    pub fn decode(buf: &[u8]) -> Result<Self, PingError> {
        if buf.len() < IPV4_HEADER_LEN {
            return Err(PingError::MalformedPacket {
                needed: IPV4_HEADER_LEN,
                got: buf.len(),
            });
        }

        Ok(Ipv4Header {
            version_ihl: buf[0],
            tos: buf[1],
            total_length: u16::from_be_bytes([buf[2], buf[3]]),
            identification: u16::from_be_bytes([buf[4], buf[5]]),
            flags_fragment: u16::from_be_bytes([buf[6], buf[7]]),
            ttl: buf[8],
            protocol: buf[9],
            checksum: u16::from_be_bytes([buf[10], buf[11]]),
            source: Ipv4Addr::new(buf[12], buf[13], buf[14], buf[15]),
            destination: Ipv4Addr::new(buf[16], buf[17], buf[18], buf[19]),
        })
    }

    /// Recomputes the header checksum over `raw`. Informational only: the
    /// kernel already validated it and callers must not drop packets on it.
    pub fn checksum_ok(raw: &[u8]) -> bool {
        raw.len() >= IPV4_HEADER_LEN && checksum(&raw[..IPV4_HEADER_LEN]) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 127.0.0.1 -> 127.0.0.1, ICMP, ttl 64, total length 60
    const LOOPBACK_HEADER: [u8; 20] = [
        0x45, 0x00, 0x00, 0x3c, 0x1c, 0x46, 0x40, 0x00, 0x40, 0x01, 0x00, 0x00, 127, 0, 0, 1,
        127, 0, 0, 1,
    ];

    fn with_checksum(mut hdr: [u8; 20]) -> [u8; 20] {
        hdr[10] = 0;
        hdr[11] = 0;
        let csum = checksum(&hdr).to_be_bytes();
        hdr[10] = csum[0];
        hdr[11] = csum[1];
        hdr
    }

    #[test]
    fn decodes_fields() {
        let hdr = Ipv4Header::decode(&LOOPBACK_HEADER).unwrap();
        assert_eq!(hdr.version_ihl, 0x45);
        assert_eq!(hdr.tos, 0);
        assert_eq!(hdr.total_length, 60);
        assert_eq!(hdr.identification, 0x1c46);
        assert_eq!(hdr.flags_fragment, 0x4000);
        assert_eq!(hdr.ttl, 64);
        assert_eq!(hdr.protocol, 1);
        assert_eq!(hdr.source, Ipv4Addr::LOCALHOST);
        assert_eq!(hdr.destination, Ipv4Addr::LOCALHOST);
    }

    #[test]
    fn bad_checksum_is_still_decoded() {
        let mut raw = with_checksum(LOOPBACK_HEADER);
        assert!(Ipv4Header::checksum_ok(&raw));
        raw[11] ^= 0xFF;
        assert!(!Ipv4Header::checksum_ok(&raw));
        assert!(Ipv4Header::decode(&raw).is_ok());
    }

    #[test]
    fn short_buffer_is_malformed() {
        let err = Ipv4Header::decode(&LOOPBACK_HEADER[..19]).unwrap_err();
        assert!(matches!(err, PingError::MalformedPacket { needed: 20, got: 19 }));
    }
}
