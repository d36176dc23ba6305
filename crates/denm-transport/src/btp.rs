//! BTP-B style port header
//!
//! Header is 4 bytes:
//! - Bytes 0-1: Destination port (BE)
//! - Bytes 2-3: Destination port info (BE)
//!
//! DENMs are addressed to port 2002.

use bytes::{BufMut, Bytes, BytesMut};
use denm_core::{DenmError, DenmResult};

/// Header size in bytes
pub const BTP_HEADER_SIZE: usize = 4;

/// Well-known destination port of the DEN service
pub const DENM_PORT: u16 = 2002;

/// Port header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BtpHeader {
    pub destination_port: u16,
    pub destination_port_info: u16,
}

impl BtpHeader {
    pub fn new(destination_port: u16) -> Self {
        BtpHeader {
            destination_port,
            destination_port_info: 0,
        }
    }

    pub fn parse(buf: &[u8]) -> DenmResult<Self> {
        if buf.len() < BTP_HEADER_SIZE {
            return Err(DenmError::BufferTooShort {
                expected: BTP_HEADER_SIZE,
                actual: buf.len(),
            });
        }
        Ok(BtpHeader {
            destination_port: u16::from_be_bytes([buf[0], buf[1]]),
            destination_port_info: u16::from_be_bytes([buf[2], buf[3]]),
        })
    }

    pub fn write(&self, buf: &mut impl BufMut) {
        buf.put_u16(self.destination_port);
        buf.put_u16(self.destination_port_info);
    }
}

/// Prefix `payload` with a port header
pub fn frame(destination_port: u16, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(BTP_HEADER_SIZE + payload.len());
    BtpHeader::new(destination_port).write(&mut buf);
    buf.put_slice(payload);
    buf.freeze()
}

/// Split a datagram into its port header and payload
pub fn unframe(datagram: &[u8]) -> DenmResult<(BtpHeader, &[u8])> {
    let header = BtpHeader::parse(datagram)?;
    Ok((header, &datagram[BTP_HEADER_SIZE..]))
}
