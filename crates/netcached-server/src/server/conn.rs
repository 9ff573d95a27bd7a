use anyhow::bail;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::net::TcpStream;

use netcached_proto::{Message, Opcode, Status, MAGIC_REQUEST, MAX_SET_VALUE_BYTES};

use crate::codec;
use crate::server::Context;
use crate::store::OutOfMemory;

/// Drive one client's request/response loop until it disconnects or breaks
/// the framing. Semantic failures are answered in-band; framing and internal
/// errors bubble up and close the connection without a response.
pub async fn handle_conn(mut stream: TcpStream, ctx: &Context) -> anyhow::Result<()> {
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        let request = match codec::read_message(&mut stream, &mut buf).await? {
            Some(m) => m,
            None => return Ok(()), // peer closed between messages
        };
        tracing::debug!("recv {:?}", request);

        // this is only a server
        if request.magic != MAGIC_REQUEST {
            bail!("received a response");
        }

        let response = match Opcode::from_u8(request.opcode) {
            Some(Opcode::Get) => do_get(&request, ctx),
            Some(Opcode::Set) => do_set(&request, ctx)?,
            None => {
                let mut resp = Message::response(&request, Status::UnknownCommand);
                resp.value = Bytes::from_static(b"unknown command, only get and set allowed");
                resp
            }
        };

        if response.status != 0 {
            tracing::debug!(
                "error response status={:#04x} value={:?}",
                response.status,
                response.value
            );
        }
        codec::write_message(&mut stream, &response).await?;
    }
}

fn do_get(request: &Message, ctx: &Context) -> Message {
    if !request.extras.is_empty() || !request.value.is_empty() || request.key.is_empty() {
        let mut resp = Message::response(request, Status::InvalidArguments);
        resp.value = Bytes::from_static(b"invalid arguments");
        return resp;
    }

    match ctx.cache.get(&request.key) {
        Some((flags, value)) => {
            ctx.metrics.inc_hit();
            let mut extras = BytesMut::with_capacity(4);
            extras.put_u32(flags);
            let mut resp = Message::response(request, Status::Ok);
            resp.extras = extras.freeze();
            resp.value = value;
            resp
        }
        None => {
            ctx.metrics.inc_miss();
            let mut resp = Message::response(request, Status::KeyNotFound);
            resp.value = Bytes::from_static(b"key not found");
            resp
        }
    }
}

fn do_set(request: &Message, ctx: &Context) -> anyhow::Result<Message> {
    if request.extras.is_empty() || request.key.is_empty() || request.value.is_empty() {
        let mut resp = Message::response(request, Status::InvalidArguments);
        resp.value = Bytes::from_static(b"invalid arguments");
        return Ok(resp);
    }

    if request.cas != 0 {
        tracing::debug!("ignoring cas attribute in request");
    }

    if request.value.len() > MAX_SET_VALUE_BYTES {
        let mut resp = Message::response(request, Status::ValueTooLarge);
        resp.value = Bytes::from_static(b"value too large");
        return Ok(resp);
    }

    let (flags, _expiration) = parse_set_extras(&request.extras)?;
    match ctx
        .cache
        .put(request.key.clone(), flags, request.value.clone())
    {
        Ok(()) => Ok(Message::response(request, Status::Ok)),
        Err(OutOfMemory) => {
            let mut resp = Message::response(request, Status::OutOfMemory);
            resp.value = Bytes::from_static(b"out of memory");
            Ok(resp)
        }
    }
}

/// SET extras are exactly eight bytes: flags then expiration, both u32.
/// Any other non-empty length is unrecoverable and ends the connection.
fn parse_set_extras(extras: &[u8]) -> anyhow::Result<(u32, u32)> {
    if extras.len() != 8 {
        bail!("incorrect extras length {}", extras.len());
    }
    let mut buf = extras;
    Ok((buf.get_u32(), buf.get_u32()))
}
