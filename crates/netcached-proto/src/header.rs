use bytes::{Buf, BufMut, BytesMut};

use crate::{ProtoError, MAGIC_REQUEST, MAGIC_RESPONSE};

/// The fixed 24-byte header carried by every request and response.
///
/// All multi-byte fields are big-endian. `body_len` covers extras + key +
/// value; the value length is whatever remains after the first two.
///
/// ```text
///  0| magic         | opcode        | key_len                       |
///  4| extras_len    | data_type     | status / vbucket              |
///  8| body_len                                                      |
/// 12| opaque                                                        |
/// 16| cas                                                           |
/// 20|                                                               |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u8,
    pub opcode: u8,
    pub key_len: u16,
    pub extras_len: u8,
    pub data_type: u8,
    /// vbucket id in requests (ignored); status code in responses.
    pub status: u16,
    pub body_len: u32,
    pub opaque: u32,
    pub cas: u64,
}

impl Header {
    pub const SIZE: usize = 24;

    /// Unpack a header from the first 24 bytes of `buf`. Rejects short
    /// buffers and unknown magic values.
    pub fn parse(mut buf: &[u8]) -> Result<Header, ProtoError> {
        if buf.len() < Self::SIZE {
            return Err(ProtoError::IncompleteHeader);
        }
        let h = Header {
            magic: buf.get_u8(),
            opcode: buf.get_u8(),
            key_len: buf.get_u16(),
            extras_len: buf.get_u8(),
            data_type: buf.get_u8(),
            status: buf.get_u16(),
            body_len: buf.get_u32(),
            opaque: buf.get_u32(),
            cas: buf.get_u64(),
        };
        if h.magic != MAGIC_REQUEST && h.magic != MAGIC_RESPONSE {
            return Err(ProtoError::BadMagic(h.magic));
        }
        Ok(h)
    }

    /// Length of the value segment, `body_len - extras_len - key_len`.
    /// A declared body shorter than extras + key is a framing error.
    pub fn value_len(&self) -> Result<usize, ProtoError> {
        let declared = self.extras_len as usize + self.key_len as usize;
        (self.body_len as usize)
            .checked_sub(declared)
            .ok_or(ProtoError::BadBodyLen {
                body_len: self.body_len,
                extras_len: self.extras_len,
                key_len: self.key_len,
            })
    }

    pub fn write_to(&self, out: &mut BytesMut) {
        out.reserve(Self::SIZE);
        out.put_u8(self.magic);
        out.put_u8(self.opcode);
        out.put_u16(self.key_len);
        out.put_u8(self.extras_len);
        out.put_u8(self.data_type);
        out.put_u16(self.status);
        out.put_u32(self.body_len);
        out.put_u32(self.opaque);
        out.put_u64(self.cas);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_parse_round_trip() {
        let h = Header {
            magic: MAGIC_REQUEST,
            opcode: 0x01,
            key_len: 3,
            extras_len: 8,
            data_type: 0,
            status: 0,
            body_len: 14,
            opaque: 0xDEAD_BEEF,
            cas: 7,
        };
        let mut out = BytesMut::new();
        h.write_to(&mut out);
        assert_eq!(out.len(), Header::SIZE);
        assert_eq!(Header::parse(&out).unwrap(), h);
    }

    #[test]
    fn layout_is_big_endian() {
        let mut out = BytesMut::new();
        Header {
            magic: MAGIC_RESPONSE,
            opcode: 0x00,
            key_len: 0x0102,
            extras_len: 4,
            data_type: 0,
            status: 0x0081,
            body_len: 0x0A0B_0C0D,
            opaque: 0x0000_00FF,
            cas: 0,
        }
        .write_to(&mut out);
        assert_eq!(
            &out[..],
            &[
                0x81, 0x00, 0x01, 0x02, // magic, opcode, key_len
                0x04, 0x00, 0x00, 0x81, // extras_len, data_type, status
                0x0A, 0x0B, 0x0C, 0x0D, // body_len
                0x00, 0x00, 0x00, 0xFF, // opaque
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // cas
            ]
        );
    }

    #[test]
    fn reject_short_buffer() {
        assert_eq!(
            Header::parse(&[0u8; 10]),
            Err(ProtoError::IncompleteHeader)
        );
    }

    #[test]
    fn reject_unknown_magic() {
        let mut buf = [0u8; 24];
        buf[0] = 0x7f;
        assert_eq!(Header::parse(&buf), Err(ProtoError::BadMagic(0x7f)));
    }

    #[test]
    fn value_len_underflow_is_an_error() {
        let mut buf = [0u8; 24];
        buf[0] = MAGIC_REQUEST;
        let mut h = Header::parse(&buf).unwrap();
        h.extras_len = 2;
        h.key_len = 4;
        h.body_len = 3;
        assert!(h.value_len().is_err());
        h.body_len = 6;
        assert_eq!(h.value_len().unwrap(), 0);
        h.body_len = 10;
        assert_eq!(h.value_len().unwrap(), 4);
    }
}
