//! Async client for the netcached binary protocol. One request in flight at
//! a time per connection, which is all the server-side loop supports anyway.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

use netcached_proto::{Header, Message, Opcode, ProtoError, Status};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Proto(#[from] ProtoError),

    /// The server answered with a non-success status.
    #[error("server error {status:?}: {message}")]
    Server { status: Status, message: String },

    /// Response status not in the protocol table.
    #[error("unknown status {0:#06x}")]
    UnknownStatus(u16),

    #[error("malformed response: {0}")]
    Malformed(&'static str),

    #[error("key too long ({0} bytes, max 65535)")]
    KeyTooLong(usize),
}

pub struct Client {
    stream: TcpStream,
    next_opaque: u32,
}

impl Client {
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ClientError> {
        Ok(Self {
            stream: TcpStream::connect(addr).await?,
            next_opaque: 1,
        })
    }

    /// Store `value` under `key` with the given client flags.
    pub async fn set(&mut self, key: &[u8], flags: u32, value: &[u8]) -> Result<(), ClientError> {
        let mut req = Message::request(Opcode::Set);
        let mut extras = BytesMut::with_capacity(8);
        extras.put_u32(flags);
        extras.put_u32(0); // expiration; the server ignores it
        req.extras = extras.freeze();
        req.key = self.key_bytes(key)?;
        req.value = Bytes::copy_from_slice(value);
        req.opaque = self.take_opaque();

        let resp = self.roundtrip(req).await?;
        match Status::from_u16(resp.status) {
            Some(Status::Ok) => Ok(()),
            Some(status) => Err(server_error(status, &resp)),
            None => Err(ClientError::UnknownStatus(resp.status)),
        }
    }

    /// Fetch `key`; `Ok(None)` on a miss.
    pub async fn get(&mut self, key: &[u8]) -> Result<Option<(u32, Bytes)>, ClientError> {
        let mut req = Message::request(Opcode::Get);
        req.key = self.key_bytes(key)?;
        req.opaque = self.take_opaque();

        let resp = self.roundtrip(req).await?;
        match Status::from_u16(resp.status) {
            Some(Status::Ok) => {
                if resp.extras.len() != 4 {
                    return Err(ClientError::Malformed("flags extras not 4 bytes"));
                }
                let flags = (&resp.extras[..]).get_u32();
                Ok(Some((flags, resp.value)))
            }
            Some(Status::KeyNotFound) => Ok(None),
            Some(status) => Err(server_error(status, &resp)),
            None => Err(ClientError::UnknownStatus(resp.status)),
        }
    }

    /// Send one message as-is and read one response. Protocol-level callers
    /// get full control of every field, opaque included.
    pub async fn roundtrip(&mut self, req: Message) -> Result<Message, ClientError> {
        self.send(&req).await?;
        self.read_response().await
    }

    async fn send(&mut self, msg: &Message) -> Result<(), ClientError> {
        let mut out = BytesMut::with_capacity(Header::SIZE + msg.body_len());
        msg.header().write_to(&mut out);
        out.extend_from_slice(&msg.extras);
        out.extend_from_slice(&msg.key);
        out.extend_from_slice(&msg.value);
        self.stream.write_all(&out).await?;
        Ok(())
    }

    async fn read_response(&mut self) -> Result<Message, ClientError> {
        let mut head = [0u8; Header::SIZE];
        self.stream.read_exact(&mut head).await?;
        let header = Header::parse(&head)?;

        let mut body = vec![0u8; header.body_len as usize];
        self.stream.read_exact(&mut body).await?;
        let body = Bytes::from(body);

        let extras_end = header.extras_len as usize;
        let key_end = extras_end + header.key_len as usize;
        if key_end > body.len() {
            return Err(ClientError::Malformed("body shorter than extras + key"));
        }
        Ok(Message {
            magic: header.magic,
            opcode: header.opcode,
            data_type: header.data_type,
            status: header.status,
            opaque: header.opaque,
            cas: header.cas,
            extras: body.slice(..extras_end),
            key: body.slice(extras_end..key_end),
            value: body.slice(key_end..),
        })
    }

    fn key_bytes(&self, key: &[u8]) -> Result<Bytes, ClientError> {
        if key.len() > usize::from(u16::MAX) {
            return Err(ClientError::KeyTooLong(key.len()));
        }
        Ok(Bytes::copy_from_slice(key))
    }

    fn take_opaque(&mut self) -> u32 {
        let opaque = self.next_opaque;
        self.next_opaque = self.next_opaque.wrapping_add(1);
        opaque
    }
}

fn server_error(status: Status, resp: &Message) -> ClientError {
    ClientError::Server {
        status,
        message: String::from_utf8_lossy(&resp.value).into_owned(),
    }
}
