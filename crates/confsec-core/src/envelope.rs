//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! The output envelope's chunk framing: a length-prefixed stream of a header
//! record, zero or more data chunks, a zero-length footer marker, and a
//! footer record. Lengths are encoded as QUIC variable-length integers
//! (RFC 9000 §16) via `quinn_proto::VarInt`, reusing the same varint already
//! in play for this node's QUIC-adjacent transport work.

use bytes::BytesMut;
use quinn_proto::VarInt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{CoreError, EnvelopeError};
use confsec_types::envelope::{EnvelopeFooter, EnvelopeHeader, MAX_CHUNK_LEN};

async fn write_varint<W: AsyncWrite + Unpin>(writer: &mut W, value: u64) -> Result<(), CoreError> {
    let varint = VarInt::from_u64(value).map_err(|_| EnvelopeError::ValueTooLarge)?;
    let mut buf = BytesMut::with_capacity(8);
    varint.encode(&mut buf);
    writer.write_all(&buf).await?;
    Ok(())
}

async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<u64>, CoreError> {
    let first = match reader.read_u8().await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let tag = first >> 6;
    let len = 1usize << tag; // 1, 2, 4, or 8 bytes total, per RFC 9000 §16.
    let mut bytes = [0u8; 8];
    bytes[0] = first;
    if len > 1 {
        reader
            .read_exact(&mut bytes[1..len])
            .await
            .map_err(|_| EnvelopeError::MalformedVarint)?;
    }
    let mut slice = &bytes[..len];
    let varint = VarInt::decode(&mut slice).map_err(|_| EnvelopeError::MalformedVarint)?;
    Ok(Some(varint.into_inner()))
}

/// Writes the output envelope to any async byte sink, enforcing chunk-size
/// and ordering invariants as it goes.
pub struct EnvelopeWriter<W> {
    inner: W,
    header_written: bool,
    footer_written: bool,
}

impl<W: AsyncWrite + Unpin> EnvelopeWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            header_written: false,
            footer_written: false,
        }
    }

    pub async fn write_header(&mut self, header: &EnvelopeHeader) -> Result<(), CoreError> {
        if self.header_written {
            return Err(EnvelopeError::MissingHeader.into());
        }
        let bytes = bincode::serialize(header)?;
        write_varint(&mut self.inner, bytes.len() as u64).await?;
        self.inner.write_all(&bytes).await?;
        self.header_written = true;
        Ok(())
    }

    pub async fn write_data(&mut self, chunk: &[u8]) -> Result<(), CoreError> {
        if !self.header_written {
            return Err(EnvelopeError::MissingHeader.into());
        }
        if self.footer_written {
            return Err(EnvelopeError::DataAfterFooter.into());
        }
        if chunk.len() > MAX_CHUNK_LEN {
            return Err(EnvelopeError::ChunkTooLarge(chunk.len()).into());
        }
        write_varint(&mut self.inner, chunk.len() as u64).await?;
        self.inner.write_all(chunk).await?;
        Ok(())
    }

    pub async fn write_footer(&mut self, footer: &EnvelopeFooter) -> Result<(), CoreError> {
        if !self.header_written {
            return Err(EnvelopeError::MissingHeader.into());
        }
        if self.footer_written {
            return Err(EnvelopeError::DataAfterFooter.into());
        }
        write_varint(&mut self.inner, 0).await?; // zero-length footer marker
        let bytes = bincode::serialize(footer)?;
        write_varint(&mut self.inner, bytes.len() as u64).await?;
        self.inner.write_all(&bytes).await?;
        self.footer_written = true;
        self.inner.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// One unit read from an envelope stream.
#[derive(Debug)]
pub enum EnvelopeChunk {
    Data(Vec<u8>),
    Footer(EnvelopeFooter),
}

/// Reads an output envelope from any async byte source.
pub struct EnvelopeReader<R> {
    inner: R,
    header_read: bool,
    footer_read: bool,
}

impl<R: AsyncRead + Unpin> EnvelopeReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            header_read: false,
            footer_read: false,
        }
    }

    pub async fn read_header(&mut self) -> Result<EnvelopeHeader, CoreError> {
        let len = read_varint(&mut self.inner)
            .await?
            .ok_or(EnvelopeError::MissingHeader)?;
        let mut bytes = vec![0u8; len as usize];
        self.inner.read_exact(&mut bytes).await?;
        let header = bincode::deserialize(&bytes)?;
        self.header_read = true;
        Ok(header)
    }

    /// Reads the next chunk. Returns `Ok(None)` only if the stream ends
    /// before the footer marker, which is itself an error the caller should
    /// treat as [`EnvelopeError::MissingFooter`].
    pub async fn read_next(&mut self) -> Result<EnvelopeChunk, CoreError> {
        if !self.header_read {
            return Err(EnvelopeError::MissingHeader.into());
        }
        if self.footer_read {
            return Err(EnvelopeError::DataAfterFooter.into());
        }
        let len = read_varint(&mut self.inner)
            .await?
            .ok_or(EnvelopeError::MissingFooter)?;
        if len == 0 {
            let footer_len = read_varint(&mut self.inner)
                .await?
                .ok_or(EnvelopeError::MissingFooter)?;
            let mut bytes = vec![0u8; footer_len as usize];
            self.inner.read_exact(&mut bytes).await?;
            let footer = bincode::deserialize(&bytes)?;
            self.footer_read = true;
            return Ok(EnvelopeChunk::Footer(footer));
        }
        if len as usize > MAX_CHUNK_LEN {
            return Err(EnvelopeError::ChunkTooLarge(len as usize).into());
        }
        let mut bytes = vec![0u8; len as usize];
        self.inner.read_exact(&mut bytes).await?;
        Ok(EnvelopeChunk::Data(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_header_data_and_footer() {
        let mut buf = Vec::new();
        {
            let mut writer = EnvelopeWriter::new(&mut buf);
            writer
                .write_header(&EnvelopeHeader::new("application/json", 0))
                .await
                .unwrap();
            writer.write_data(b"chunk one").await.unwrap();
            writer.write_data(b"chunk two").await.unwrap();
            writer
                .write_footer(&EnvelopeFooter::with_refund(185))
                .await
                .unwrap();
        }

        let mut reader = EnvelopeReader::new(&buf[..]);
        let header = reader.read_header().await.unwrap();
        assert_eq!(header.media_type, "application/json");

        let mut data_chunks = Vec::new();
        loop {
            match reader.read_next().await.unwrap() {
                EnvelopeChunk::Data(d) => data_chunks.push(d),
                EnvelopeChunk::Footer(f) => {
                    assert_eq!(f.refund_amount, Some(185));
                    break;
                }
            }
        }
        assert_eq!(data_chunks, vec![b"chunk one".to_vec(), b"chunk two".to_vec()]);
    }

    #[tokio::test]
    async fn oversized_chunk_is_rejected_before_writing() {
        let mut buf = Vec::new();
        let mut writer = EnvelopeWriter::new(&mut buf);
        writer
            .write_header(&EnvelopeHeader::new("application/octet-stream", 0))
            .await
            .unwrap();
        let oversized = vec![0u8; MAX_CHUNK_LEN + 1];
        let err = writer.write_data(&oversized).await.unwrap_err();
        assert!(matches!(err, CoreError::Envelope(EnvelopeError::ChunkTooLarge(_))));
    }

    #[tokio::test]
    async fn data_after_footer_is_rejected() {
        let mut buf = Vec::new();
        let mut writer = EnvelopeWriter::new(&mut buf);
        writer
            .write_header(&EnvelopeHeader::new("application/octet-stream", 0))
            .await
            .unwrap();
        writer.write_footer(&EnvelopeFooter::none()).await.unwrap();
        let err = writer.write_data(b"too late").await.unwrap_err();
        assert!(matches!(err, CoreError::Envelope(EnvelopeError::DataAfterFooter)));
    }

    #[tokio::test]
    async fn truncated_stream_without_footer_errors() {
        let mut buf = Vec::new();
        {
            let mut writer = EnvelopeWriter::new(&mut buf);
            writer
                .write_header(&EnvelopeHeader::new("application/json", 0))
                .await
                .unwrap();
            writer.write_data(b"partial").await.unwrap();
        }
        // Truncate before the footer marker ever arrives.
        let mut reader = EnvelopeReader::new(&buf[..]);
        reader.read_header().await.unwrap();
        assert!(matches!(reader.read_next().await.unwrap(), EnvelopeChunk::Data(_)));
        let err = reader.read_next().await.unwrap_err();
        assert!(matches!(err, CoreError::Envelope(EnvelopeError::MissingFooter)));
    }

    #[tokio::test]
    async fn empty_single_chunk_footer_only_stream_round_trips() {
        let mut buf = Vec::new();
        {
            let mut writer = EnvelopeWriter::new(&mut buf);
            writer
                .write_header(&EnvelopeHeader::new("application/json", 0))
                .await
                .unwrap();
            writer.write_footer(&EnvelopeFooter::none()).await.unwrap();
        }
        let mut reader = EnvelopeReader::new(&buf[..]);
        reader.read_header().await.unwrap();
        match reader.read_next().await.unwrap() {
            EnvelopeChunk::Footer(f) => assert_eq!(f.refund_amount, None),
            EnvelopeChunk::Data(_) => panic!("expected footer, got data"),
        }
    }
}
