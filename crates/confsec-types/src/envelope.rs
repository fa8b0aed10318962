//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Wire records carried by the output envelope's header and footer chunks.
//! The chunk framing itself (quicvarint length prefixes, the 32 KiB cap, the
//! header/footer ordering) lives in `confsec_core::envelope`; this module
//! only defines what the header and footer chunks *contain*.

use serde::{Deserialize, Serialize};

/// Maximum size, in bytes, of any single chunk on the wire.
pub const MAX_CHUNK_LEN: usize = 32 * 1024;

/// The first chunk of every output stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    pub media_type: String,
    /// 0 means the stream is not chunked at a fixed size; the sealer emits
    /// pieces of whatever size it produced them in (still capped at
    /// [`MAX_CHUNK_LEN`]).
    pub max_chunk_len: u32,
}

impl EnvelopeHeader {
    pub fn new(media_type: impl Into<String>, max_chunk_len: u32) -> Self {
        Self {
            media_type: media_type.into(),
            max_chunk_len,
        }
    }

    pub fn is_chunked(&self) -> bool {
        self.max_chunk_len > 0
    }
}

/// The record carried by the final, footer chunk. Refund accounting is the
/// only post-stream metadata this node reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeFooter {
    pub refund_amount: Option<i64>,
}

impl EnvelopeFooter {
    pub fn with_refund(amount: i64) -> Self {
        Self {
            refund_amount: Some(amount),
        }
    }

    pub fn none() -> Self {
        Self { refund_amount: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_chunked_flag_follows_max_chunk_len() {
        assert!(!EnvelopeHeader::new("application/octet-stream", 0).is_chunked());
        assert!(EnvelopeHeader::new("application/octet-stream", 16384).is_chunked());
    }

    #[test]
    fn footer_round_trips_through_bincode() {
        let footer = EnvelopeFooter::with_refund(185);
        let bytes = bincode::serialize(&footer).unwrap();
        let decoded: EnvelopeFooter = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded.refund_amount, Some(185));
    }

    #[test]
    fn absent_refund_round_trips() {
        let footer = EnvelopeFooter::none();
        let bytes = bincode::serialize(&footer).unwrap();
        let decoded: EnvelopeFooter = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded.refund_amount, None);
    }
}
