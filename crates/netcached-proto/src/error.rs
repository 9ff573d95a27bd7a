use thiserror::Error;

/// Violations of the wire format. All of these are connection-fatal: the
/// stream cannot be resynchronized after one, so the handler logs and closes
/// without writing a response.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtoError {
    /// Fewer than 24 header bytes arrived before the stream ended.
    #[error("incorrect header")]
    IncompleteHeader,

    /// Magic byte is neither request (0x80) nor response (0x81).
    #[error("incorrect packet (magic {0:#04x})")]
    BadMagic(u8),

    /// `body_len` is smaller than `extras_len + key_len`.
    #[error("incorrect bodylen ({body_len} < {extras_len} + {key_len})")]
    BadBodyLen {
        body_len: u32,
        extras_len: u8,
        key_len: u16,
    },

    /// Declared value exceeds the framing cap.
    #[error("value too large ({0} bytes)")]
    ValueTooLarge(usize),

    /// Stream ended inside the declared body.
    #[error("incorrect bodylen (truncated body)")]
    IncompleteBody,
}
