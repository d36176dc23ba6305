//! ITS PDU header
//!
//! Header is 6 bytes:
//! - Byte 0: Protocol version
//! - Byte 1: Message id (1 = DENM)
//! - Bytes 2-5: Sender station id (LE)
//!
//! The message id sits at a fixed offset so foreign traffic can be rejected
//! before a full decode.

use bytes::BufMut;
use denm_core::{DenmError, DenmResult, PduHeader, StationId};

/// Header size in bytes
pub const HEADER_SIZE: usize = 6;

/// Protocol version written in every header
pub const PROTOCOL_VERSION: u8 = 2;

/// Message id of a decentralized environmental notification
pub const DENM_MESSAGE_ID: u8 = 1;

/// Offset of the message id inside the payload
pub const MESSAGE_ID_OFFSET: usize = 1;

/// Header for a DENM sent by `station_id`
pub fn denm_header(station_id: StationId) -> PduHeader {
    PduHeader {
        protocol_version: PROTOCOL_VERSION,
        message_id: DENM_MESSAGE_ID,
        station_id,
    }
}

/// Read the message id tag without decoding anything else
#[inline]
pub fn peek_message_id(buf: &[u8]) -> Option<u8> {
    buf.get(MESSAGE_ID_OFFSET).copied()
}

/// True when the payload is tagged as a DENM
#[inline]
pub fn is_denm(buf: &[u8]) -> bool {
    peek_message_id(buf) == Some(DENM_MESSAGE_ID)
}

/// Parse header from bytes
pub fn parse_header(buf: &[u8]) -> DenmResult<PduHeader> {
    if buf.len() < HEADER_SIZE {
        return Err(DenmError::BufferTooShort {
            expected: HEADER_SIZE,
            actual: buf.len(),
        });
    }

    let protocol_version = buf[0];
    let message_id = buf[MESSAGE_ID_OFFSET];
    let station_id = StationId::from_bytes([buf[2], buf[3], buf[4], buf[5]]);

    Ok(PduHeader {
        protocol_version,
        message_id,
        station_id,
    })
}

/// Serialize header into a buffer
pub fn write_header(header: &PduHeader, buf: &mut impl BufMut) {
    buf.put_u8(header.protocol_version);
    buf.put_u8(header.message_id);
    buf.put_slice(&header.station_id.to_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = denm_header(StationId::new(0x1234_5678));
        let mut buf = Vec::new();
        write_header(&header, &mut buf);

        assert_eq!(buf.len(), HEADER_SIZE);
        assert_eq!(parse_header(&buf).unwrap(), header);
    }

    #[test]
    fn test_tag_at_fixed_offset() {
        let mut buf = Vec::new();
        write_header(&denm_header(StationId::new(7)), &mut buf);

        assert!(is_denm(&buf));
        buf[MESSAGE_ID_OFFSET] = 2; // CAM
        assert!(!is_denm(&buf));
        assert_eq!(peek_message_id(&[0x02]), None);
    }

    #[test]
    fn test_header_too_short() {
        let result = parse_header(&[2, 1, 0]);
        assert!(matches!(result, Err(DenmError::BufferTooShort { .. })));
    }
}
