use std::fmt;

use bytes::Bytes;

use crate::{Header, Opcode, Status, MAGIC_REQUEST, MAGIC_RESPONSE};

/// A single request or response message.
///
/// The length fields of the header are not stored; they are recomputed from
/// the three body segments when the message is put back on the wire.
#[derive(Clone, PartialEq, Eq)]
pub struct Message {
    pub magic: u8,
    pub opcode: u8,
    pub data_type: u8,
    /// vbucket id in requests (ignored); status code in responses.
    pub status: u16,
    pub opaque: u32,
    pub cas: u64,
    pub extras: Bytes,
    pub key: Bytes,
    pub value: Bytes,
}

impl Message {
    /// Empty request with the given opcode; the caller fills in the body.
    pub fn request(opcode: Opcode) -> Message {
        Message {
            magic: MAGIC_REQUEST,
            opcode: opcode as u8,
            data_type: 0,
            status: 0,
            opaque: 0,
            cas: 0,
            extras: Bytes::new(),
            key: Bytes::new(),
            value: Bytes::new(),
        }
    }

    /// Response shell for `request`: opcode and opaque echoed, cas and
    /// data_type zeroed, body empty.
    pub fn response(request: &Message, status: Status) -> Message {
        Message {
            magic: MAGIC_RESPONSE,
            opcode: request.opcode,
            data_type: 0,
            status: status as u16,
            opaque: request.opaque,
            cas: 0,
            extras: Bytes::new(),
            key: Bytes::new(),
            value: Bytes::new(),
        }
    }

    pub fn body_len(&self) -> usize {
        self.extras.len() + self.key.len() + self.value.len()
    }

    /// Header with the length fields computed from the current body.
    pub fn header(&self) -> Header {
        Header {
            magic: self.magic,
            opcode: self.opcode,
            key_len: self.key.len() as u16,
            extras_len: self.extras.len() as u8,
            data_type: self.data_type,
            status: self.status,
            body_len: self.body_len() as u32,
            opaque: self.opaque,
            cas: self.cas,
        }
    }
}

// Values can be megabytes; print their length, not their bytes.
impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("magic", &format_args!("{:#04x}", self.magic))
            .field("opcode", &format_args!("{:#04x}", self.opcode))
            .field("data_type", &self.data_type)
            .field("status", &format_args!("{:#06x}", self.status))
            .field("opaque", &self.opaque)
            .field("cas", &self.cas)
            .field("extras", &self.extras)
            .field("key", &self.key)
            .field("value_len", &self.value.len())
            .finish()
    }
}
