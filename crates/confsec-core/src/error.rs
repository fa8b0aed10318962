//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

use thiserror::Error;

/// HPKE-suite-level failures. Any variant here, surfaced in the worker, maps
/// to the "request decapsulation failed" exit code (see `confsec_worker`).
#[derive(Debug, Error)]
pub enum HpkeError {
    #[error("encapsulated key is not a valid P-256 point")]
    InvalidEncapsulatedKey,

    #[error("recipient public key is malformed")]
    InvalidRecipientKey,

    #[error("AEAD authentication failed")]
    AeadAuthenticationFailed,

    #[error("key derivation failed")]
    KeyDerivationFailed,

    #[error("sequence number space exhausted")]
    SequenceOverflow,
}

/// TPM-backend failures. Both the simulator and the hardware backend report
/// through this type so callers never need to know which is in use.
#[derive(Debug, Error)]
pub enum TpmError {
    #[error("TPM device open failed: {0}")]
    DeviceOpen(String),

    #[error("TPM policy session rejected the live PCR values")]
    PolicyMismatch,

    #[error("TPM handle {0:#x} not found")]
    HandleNotFound(u32),

    #[error("TPM ECDH-Z operation failed: {0}")]
    EcdhZ(String),

    #[error("TPM session close failed: {0}")]
    SessionClose(String),
}

/// Output-envelope chunk-framing failures.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("chunk of {0} bytes exceeds the 32 KiB wire cap")]
    ChunkTooLarge(usize),

    #[error("varint length prefix is malformed")]
    MalformedVarint,

    #[error("value does not fit in a quicvarint")]
    ValueTooLarge,

    #[error("stream ended before the footer marker")]
    MissingFooter,

    #[error("data chunk appeared after the footer")]
    DataAfterFooter,

    #[error("header chunk missing at stream position 0")]
    MissingHeader,
}

/// Top-level error type for `confsec-core`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Hpke(#[from] HpkeError),

    #[error(transparent)]
    Tpm(#[from] TpmError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("wire encoding failed: {0}")]
    Bincode(#[from] bincode::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Types(#[from] confsec_types::error::TypesError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
