//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! The dispatcher's one-shot receive-evidence step: before listening for
//! HTTP, accept exactly one connection on a UNIX socket, read the attestor's
//! evidence bundle, and extract what the rest of the dispatcher needs from
//! it. Also schedules this process's own pre-expiry termination based on the
//! NVIDIA intermediate certificates' `NotAfter` fields.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::AsyncReadExt;
use tokio::net::UnixListener;
use tracing::{info, warn};

use confsec_types::evidence::{PcrMap, SignedEvidenceList};

use crate::error::DispatcherError;

const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;
const TERMINATION_LEAD_TIME: Duration = Duration::from_secs(60);

/// The subset of the evidence bundle the dispatcher keeps around for the
/// life of the process.
#[derive(Debug, Clone)]
pub struct EvidenceSummary {
    pub rek_public_key: Vec<u8>,
    pub rek_tpm_name: Vec<u8>,
    pub golden_pcrs: PcrMap,
    pub earliest_nvidia_cert_expiry: Option<DateTime<Utc>>,
}

pub async fn receive_evidence(
    socket_path: &str,
    timeout: Duration,
) -> Result<(SignedEvidenceList, EvidenceSummary), DispatcherError> {
    if Path::new(socket_path).exists() {
        std::fs::remove_file(socket_path)?;
    }

    let listener = UnixListener::bind(socket_path).map_err(|e| DispatcherError::SocketBind {
        path: socket_path.to_string(),
        source: e,
    })?;

    info!(path = socket_path, "waiting for attestor hand-off");
    let (mut stream, _) = tokio::time::timeout(timeout, listener.accept())
        .await
        .map_err(|_| DispatcherError::HandoffTimeout)??;

    let mut len_bytes = [0u8; 4];
    stream.read_exact(&mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_PAYLOAD_BYTES {
        return Err(DispatcherError::PayloadTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;

    let evidence = SignedEvidenceList::from_bincode(&payload)?;
    let summary = summarize(&evidence)?;

    info!(
        pieces = evidence.len(),
        golden_pcrs = summary.golden_pcrs.len(),
        "evidence received from attestor"
    );

    Ok((evidence, summary))
}

fn summarize(evidence: &SignedEvidenceList) -> Result<EvidenceSummary, DispatcherError> {
    let rek_public_key = evidence.rek_public_bytes()?.to_vec();
    let rek_tpm_name = evidence.rek_tpm_name()?.to_vec();
    let golden_pcrs = evidence.pcr_map()?;
    let earliest_nvidia_cert_expiry = earliest_expiry(&evidence.nvidia_intermediate_certs());

    Ok(EvidenceSummary {
        rek_public_key,
        rek_tpm_name,
        golden_pcrs,
        earliest_nvidia_cert_expiry,
    })
}

fn earliest_expiry(der_certs: &[&[u8]]) -> Option<DateTime<Utc>> {
    der_certs
        .iter()
        .filter_map(|der| {
            let (_, cert) = x509_parser::parse_x509_certificate(der).ok()?;
            let ts = cert.validity().not_after.timestamp();
            DateTime::<Utc>::from_timestamp(ts, 0)
        })
        .min()
}

/// Spawns a background task that sends `SIGTERM` to this process one minute
/// before the earliest NVIDIA intermediate certificate would expire, so the
/// node rotates out before its attestation would fail to verify. A `None`
/// expiry (no NVIDIA evidence pieces present) schedules nothing.
pub fn schedule_self_termination(expiry: Option<DateTime<Utc>>) {
    let Some(expiry) = expiry else {
        return;
    };

    tokio::spawn(async move {
        let terminate_at = expiry - chrono::Duration::from_std(TERMINATION_LEAD_TIME).unwrap();
        let now = Utc::now();
        let delay = (terminate_at - now).to_std().unwrap_or(Duration::ZERO);

        warn!(
            terminate_at = %terminate_at,
            delay_secs = delay.as_secs(),
            "scheduled self-termination ahead of NVIDIA certificate expiry"
        );
        tokio::time::sleep(delay).await;

        warn!("NVIDIA certificate expiry approaching, sending SIGTERM to self");
        unsafe {
            libc::kill(libc::getpid(), libc::SIGTERM);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use confsec_types::evidence::EvidencePiece;
    use confsec_types::evidence::EvidenceType;
    use tokio::io::AsyncWriteExt;

    fn sample_evidence() -> SignedEvidenceList {
        let mut pcrs = PcrMap::new();
        pcrs.insert(0, vec![0xAA; 32]);

        let mut list = SignedEvidenceList::default();
        list.push(EvidencePiece::new(
            EvidenceType::RekPublicArea,
            b"rek-pub".to_vec(),
            b"rek-name".to_vec(),
        ));
        list.push(EvidencePiece::new(
            EvidenceType::TpmPcrQuote,
            bincode::serialize(&pcrs).unwrap(),
            vec![],
        ));
        list
    }

    #[tokio::test]
    async fn receives_and_summarizes_evidence() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("router.sock");
        let socket_path_str = socket_path.to_str().unwrap().to_string();

        let evidence = sample_evidence();
        let payload = evidence.to_bincode().unwrap();

        let socket_path_clone = socket_path_str.clone();
        let client = tokio::spawn(async move {
            // Give the server a moment to bind before connecting.
            for _ in 0..50 {
                if let Ok(mut stream) = tokio::net::UnixStream::connect(&socket_path_clone).await {
                    stream
                        .write_all(&(payload.len() as u32).to_be_bytes())
                        .await
                        .unwrap();
                    stream.write_all(&payload).await.unwrap();
                    stream.shutdown().await.unwrap();
                    return;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            panic!("never connected");
        });

        let (_evidence, summary) =
            receive_evidence(&socket_path_str, Duration::from_secs(5)).await.unwrap();
        client.await.unwrap();

        assert_eq!(summary.rek_public_key, b"rek-pub");
        assert_eq!(summary.rek_tpm_name, b"rek-name");
        assert_eq!(summary.golden_pcrs.get(&0), Some(&vec![0xAAu8; 32]));
    }

    #[tokio::test]
    async fn times_out_when_nobody_connects() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("router.sock");
        let result = receive_evidence(socket_path.to_str().unwrap(), Duration::from_millis(200)).await;
        assert!(matches!(result, Err(DispatcherError::HandoffTimeout)));
    }

    #[test]
    fn no_nvidia_certs_means_no_scheduled_expiry() {
        assert_eq!(earliest_expiry(&[]), None);
    }
}
