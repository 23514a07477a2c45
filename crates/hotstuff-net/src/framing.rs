//! Wire framing (§6.1): `len: u32 big-endian ∥ payload_bytes`, where
//! `payload_bytes` is a `postcard`-encoded [`Payload`].
//!
//! `postcard` is the teacher's canonical wire-encoding crate (see
//! `kimberlite-wire`'s use of `postcard::to_allocvec` for the bytes that
//! get signed); framing itself is written directly against
//! `tokio::io::{AsyncReadExt, AsyncWriteExt}` rather than a codec crate,
//! matching how thin the teacher's own wire layer is.

use hotstuff_types::Payload;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// A frame longer than this is refused outright — generous enough for any
/// legitimate block, small enough to bound an attacker's memory claim
/// before a single byte of the body has been read.
pub const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("i/o error while framing a message")]
    Io(#[from] std::io::Error),
    #[error("failed to encode payload")]
    Encode(#[source] postcard::Error),
    #[error("failed to decode payload")]
    Decode(#[source] postcard::Error),
    #[error("frame length {0} exceeds the maximum of {MAX_FRAME_BYTES}")]
    FrameTooLarge(u32),
}

pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &Payload) -> Result<(), FramingError> {
    let bytes = postcard::to_allocvec(payload).map_err(FramingError::Encode)?;
    let len = u32::try_from(bytes.len()).map_err(|_| FramingError::FrameTooLarge(u32::MAX))?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Payload, FramingError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(FramingError::FrameTooLarge(len));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    postcard::from_bytes(&body).map_err(FramingError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotstuff_types::{Block, Command, ClientId, ViewNumber};

    #[tokio::test]
    async fn round_trips_a_command_payload() {
        let payload = Payload::Command(Command::new("SET", vec!["A".into(), "1".into()], ClientId::new(1), 0));
        let mut buf = Vec::new();
        write_frame(&mut buf, &payload).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let decoded = read_frame(&mut cursor).await.unwrap();
        match decoded {
            Payload::Command(cmd) => assert_eq!(cmd.op, "SET"),
            Payload::Protocol(_) => panic!("expected a Command payload"),
        }
    }

    #[tokio::test]
    async fn round_trips_a_protocol_payload_with_a_block() {
        let block = Block::new(vec![], Some(Block::genesis().hash()), ViewNumber::new(1));
        let msg = hotstuff_types::ProtocolMessage::prepare(ViewNumber::new(1), hotstuff_types::ReplicaId::new(0), block, hotstuff_types::QC::genesis());
        let payload = Payload::Protocol(msg);
        let mut buf = Vec::new();
        write_frame(&mut buf, &payload).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let decoded = read_frame(&mut cursor).await.unwrap();
        assert!(matches!(decoded, Payload::Protocol(_)));
    }

    #[tokio::test]
    async fn rejects_a_frame_declaring_an_oversized_length() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_FRAME_BYTES + 1).to_be_bytes());
        let mut cursor = std::io::Cursor::new(buf);
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, FramingError::FrameTooLarge(_)));
    }
}
