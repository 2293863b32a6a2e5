use crate::error::PingError;

pub const ICMP_ECHO_REPLY: u8 = 0;
pub const ICMP_ECHO_REQUEST: u8 = 8;
pub const ICMP_HEADER_LEN: usize = 8;

const PAYLOAD_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Internet checksum (RFC 1071).
///
/// Words are read big-endian, so the result goes on the wire with `to_be_bytes`.
/// An odd trailing byte is summed as if followed by a zero byte.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum = data
        .chunks(2)
        .map(|word| match *word {
            [hi, lo] => u16::from_be_bytes([hi, lo]),
            [hi] => u16::from_be_bytes([hi, 0]),
            _ => unreachable!("chunks(2) yields one or two bytes"),
        })
        .fold(0u32, |acc, word| acc.wrapping_add(u32::from(word)));

    // End-around carry
    while sum > 0xFFFF {
        sum = (sum >> 16) + (sum & 0xFFFF);
    }
    !(sum as u16)
}

/// Reproducible payload of `len` bytes: `A-Z0-9` repeated.
pub fn echo_payload(len: usize) -> Vec<u8> {
    PAYLOAD_ALPHABET.iter().copied().cycle().take(len).collect()
}

fn echo_header(ident: u16, seq: u16, csum: u16) -> [u8; ICMP_HEADER_LEN] {
    let [c0, c1] = csum.to_be_bytes();
    let [i0, i1] = ident.to_be_bytes();
    let [s0, s1] = seq.to_be_bytes();
    [ICMP_ECHO_REQUEST, 0, c0, c1, i0, i1, s0, s1]
}

/// Builds an ICMPv4 Echo Request (type=8, code=0).
///
/// The checksum covers its own field, so the packet is assembled twice: once
/// with a zero placeholder to compute the sum, then again with the real value.
pub fn build_echo_request(ident: u16, seq: u16, payload: &[u8]) -> Vec<u8> {
    let mut pkt = Vec::with_capacity(ICMP_HEADER_LEN + payload.len());
    pkt.extend_from_slice(&echo_header(ident, seq, 0));
    pkt.extend_from_slice(payload);

    let csum = checksum(&pkt);

    pkt.clear();
    pkt.extend_from_slice(&echo_header(ident, seq, csum));
    pkt.extend_from_slice(payload);
    pkt
}

/// ICMP header view. Fields after the first 4 bytes are the echo
/// identifier/sequence pair; other message types are decoded the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpHeader {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
    pub identifier: u16,
    pub sequence: u16,
}

impl IcmpHeader {
    pub fn decode(buf: &[u8]) -> Result<Self, PingError> {
        if buf.len() < ICMP_HEADER_LEN {
            return Err(PingError::MalformedPacket {
                needed: ICMP_HEADER_LEN,
                got: buf.len(),
            });
        }

        Ok(IcmpHeader {
            icmp_type: buf[0],
            code: buf[1],
            checksum: u16::from_be_bytes([buf[2], buf[3]]),
            identifier: u16::from_be_bytes([buf[4], buf[5]]),
            sequence: u16::from_be_bytes([buf[6], buf[7]]),
        })
    }

    pub fn is_echo_reply(&self) -> bool {
        self.icmp_type == ICMP_ECHO_REPLY
    }
}

/// True when `message` (header plus payload) carries a valid checksum.
pub fn verify(message: &[u8]) -> bool {
    checksum(message) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_known_vector() {
        // RFC 1071 section 3 example words
        let data = [0x00, 0x01, 0xf2, 0x03, 0xf4, 0xf5, 0xf6, 0xf7];
        assert_eq!(checksum(&data), !0xddf2);
    }

    #[test]
    fn checksum_of_empty_input() {
        assert_eq!(checksum(&[]), 0xFFFF);
    }

    #[test]
    fn odd_length_is_zero_padded() {
        let odd = [0x12, 0x34, 0x56];
        let padded = [0x12, 0x34, 0x56, 0x00];
        assert_eq!(checksum(&odd), checksum(&padded));
    }

    #[test]
    fn carries_are_folded() {
        let data = [0xFF; 64];
        assert_eq!(checksum(&data), 0x0000);
    }

    #[test]
    fn fold_takes_more_than_one_pass() {
        // 0xFFFF * 0x10001 words leave a carry after the first fold
        let data: Vec<u8> = std::iter::repeat([0xFF, 0xFF]).take(0x10001).flatten().collect();
        assert_eq!(checksum(&data), 0x0000);
        assert_eq!(checksum(&[0x80, 0x00, 0x80, 0x00]), 0xFFFE);
    }

    #[test]
    fn packet_with_checksum_verifies() {
        for len in [0, 1, 7, 32, 56, 1000] {
            let pkt = build_echo_request(0xBEEF, 42, &echo_payload(len));
            assert!(verify(&pkt), "payload length {len}");
        }
    }

    #[test]
    fn echo_request_layout() {
        let pkt = build_echo_request(1234, 7, b"abc");
        assert_eq!(pkt.len(), ICMP_HEADER_LEN + 3);
        assert_eq!(pkt[0], ICMP_ECHO_REQUEST);
        assert_eq!(pkt[1], 0);
        assert_eq!(&pkt[4..6], &1234u16.to_be_bytes());
        assert_eq!(&pkt[6..8], &7u16.to_be_bytes());
        assert_eq!(&pkt[8..], b"abc");

        let mut zeroed = pkt.clone();
        zeroed[2] = 0;
        zeroed[3] = 0;
        assert_eq!(u16::from_be_bytes([pkt[2], pkt[3]]), checksum(&zeroed));
    }

    #[test]
    fn decode_returns_what_was_encoded() {
        for (ident, seq, len) in [(0u16, 0u16, 0usize), (1234, 0, 32), (0xFFFF, 0xFFFF, 5)] {
            let pkt = build_echo_request(ident, seq, &echo_payload(len));
            let hdr = IcmpHeader::decode(&pkt).unwrap();
            assert_eq!(hdr.icmp_type, ICMP_ECHO_REQUEST);
            assert_eq!(hdr.identifier, ident);
            assert_eq!(hdr.sequence, seq);
            assert!(!hdr.is_echo_reply());
        }
    }

    #[test]
    fn decode_rejects_short_buffer() {
        let err = IcmpHeader::decode(&[0, 0, 0, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, PingError::MalformedPacket { needed: 8, got: 7 }));
    }

    #[test]
    fn payload_is_reproducible() {
        assert_eq!(echo_payload(0), Vec::<u8>::new());
        assert_eq!(echo_payload(3), b"ABC");
        assert_eq!(echo_payload(38), echo_payload(38));
        assert_eq!(&echo_payload(38)[36..], b"AB");
    }
}
