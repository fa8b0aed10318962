//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Reads the AEAD-protected request blob from stdin and reconstructs the
//! client's plaintext request. Any failure here — HPKE setup, AEAD open, or a
//! malformed plaintext — is a single "request decapsulation failed" outcome;
//! the worker exits with [`crate::WORKER_DECAPSULATION_FAILURE_EXIT_CODE`]
//! before ever writing an envelope header, so the dispatcher can map it to a
//! plain HTTP 400 without inspecting worker stdout at all.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use confsec_core::error::CoreError;

use crate::cli::WorkerConfig;
use crate::hpke_receiver::{self};
use crate::request::PlaintextRequest;

#[derive(Debug, Error)]
pub enum DecapsulationError {
    #[error("failed to read request ciphertext from stdin: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Hpke(#[from] CoreError),
    #[error("decapsulated plaintext is not a well-formed request: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub async fn decapsulate<R: AsyncRead + Unpin>(
    config: &WorkerConfig,
    mut stdin: R,
) -> Result<(confsec_core::hpke::HpkeReceiverContext, PlaintextRequest), DecapsulationError> {
    let mut ciphertext = Vec::new();
    stdin.read_to_end(&mut ciphertext).await?;

    let mut ctx = hpke_receiver::setup(config)?;
    let plaintext = hpke_receiver::open(&mut ctx, &ciphertext)?;
    let request: PlaintextRequest = serde_json::from_slice(&plaintext)?;

    Ok((ctx, request))
}
