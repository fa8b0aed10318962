//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Hands the assembled evidence list to the dispatcher over a UNIX stream
//! socket: a 4-byte big-endian length prefix followed by the bincode-encoded
//! payload. Exactly one connection per boot; the dispatcher is not always up
//! yet when the attestor reaches this step, so connection attempts are
//! retried with bounded backoff up to the configured timeout.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use confsec_types::evidence::SignedEvidenceList;

use crate::error::AttestorError;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

pub async fn send_evidence(
    socket_path: &str,
    evidence: &SignedEvidenceList,
    timeout: Duration,
) -> Result<(), AttestorError> {
    let payload = evidence
        .to_bincode()
        .map_err(|e| AttestorError::HandOff(e.to_string()))?;

    let deadline = Instant::now() + timeout;
    let mut backoff = INITIAL_BACKOFF;

    loop {
        match UnixStream::connect(socket_path).await {
            Ok(mut stream) => {
                stream
                    .write_all(&(payload.len() as u32).to_be_bytes())
                    .await?;
                stream.write_all(&payload).await?;
                stream.shutdown().await?;
                info!(bytes = payload.len(), "evidence handed off to dispatcher");
                return Ok(());
            }
            Err(e) => {
                if Instant::now() >= deadline {
                    return Err(AttestorError::HandOff(format!(
                        "dispatcher socket unreachable after {timeout:?}: {e}"
                    )));
                }
                warn!(error = %e, "dispatcher socket not ready yet, retrying");
                sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}
