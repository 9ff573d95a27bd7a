use bytes::BytesMut;
use netcached_proto::{Header, Message, ProtoError, MAX_FRAME_VALUE_BYTES};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Everything that can go wrong while reading one message off the wire.
/// Both variants end the connection; framing errors get no response.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    Framing(#[from] ProtoError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Read one message from `r`. `Ok(None)` means the peer closed the stream
/// between messages, which is the clean way for a client to leave.
///
/// `buf` carries bytes across calls; with pipelined clients the tail of one
/// read may already hold the next request.
pub async fn read_message<R: AsyncRead + Unpin>(
    r: &mut R,
    buf: &mut BytesMut,
) -> Result<Option<Message>, DecodeError> {
    while buf.len() < Header::SIZE {
        let n = r.read_buf(buf).await?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(ProtoError::IncompleteHeader.into());
        }
    }

    let header = Header::parse(&buf[..Header::SIZE])?;
    let value_len = header.value_len()?;
    if value_len > MAX_FRAME_VALUE_BYTES {
        return Err(ProtoError::ValueTooLarge(value_len).into());
    }

    // The whole body is pulled in before dispatch, whatever the opcode; an
    // oversized-but-under-cap value on a GET is read here and rejected later.
    let total = Header::SIZE + header.body_len as usize;
    while buf.len() < total {
        let n = r.read_buf(buf).await?;
        if n == 0 {
            return Err(ProtoError::IncompleteBody.into());
        }
    }

    let frame = buf.split_to(total).freeze();
    let extras_end = Header::SIZE + header.extras_len as usize;
    let key_end = extras_end + header.key_len as usize;
    Ok(Some(Message {
        magic: header.magic,
        opcode: header.opcode,
        data_type: header.data_type,
        status: header.status,
        opaque: header.opaque,
        cas: header.cas,
        extras: frame.slice(Header::SIZE..extras_end),
        key: frame.slice(extras_end..key_end),
        value: frame.slice(key_end..total),
    }))
}

/// Write one message to `w`. Header, extras and key go out as one buffer;
/// the value is its own write and is never copied.
pub async fn write_message<W: AsyncWrite + Unpin>(
    w: &mut W,
    msg: &Message,
) -> std::io::Result<()> {
    let mut head = BytesMut::with_capacity(Header::SIZE + msg.extras.len() + msg.key.len());
    msg.header().write_to(&mut head);
    head.extend_from_slice(&msg.extras);
    head.extend_from_slice(&msg.key);
    w.write_all(&head).await?;
    w.write_all(&msg.value).await?;
    w.flush().await
}
