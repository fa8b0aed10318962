//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Assembles the signed evidence list in the fixed order downstream
//! consumers (the dispatcher) rely on for indexing by type.

use confsec_types::evidence::{EvidencePiece, EvidenceType, SignedEvidenceList};

use crate::config::Cloud;
use crate::error::AttestorError;
use crate::gpu::GpuAttestor;
use crate::tpm_boot::TpmBootMaterial;

/// Raw bytes for the pieces this function cannot itself produce (the CVM
/// quote, its collateral, and the measured-boot event log come from the
/// hypervisor/firmware, not from this process).
pub struct ExternalEvidence {
    pub cvm_quote: Vec<u8>,
    pub cvm_quote_type: EvidenceType,
    pub quote_collateral: Option<Vec<u8>>,
    pub ak_cert_chain: Option<Vec<u8>>,
    pub event_log: Vec<u8>,
}

pub fn assemble(
    cloud: Cloud,
    gpu: &dyn GpuAttestor,
    tpm: &TpmBootMaterial,
    external: &ExternalEvidence,
    transparency_bundle_b64: &str,
    attestation_nonce: &[u8],
) -> Result<SignedEvidenceList, AttestorError> {
    let mut list = SignedEvidenceList::default();

    list.push(EvidencePiece {
        evidence_type: external.cvm_quote_type,
        data: external.cvm_quote.clone(),
        signature: Vec::new(),
    });

    if let Some(collateral) = &external.quote_collateral {
        list.push(EvidencePiece {
            evidence_type: EvidenceType::QuoteCollateral,
            data: collateral.clone(),
            signature: Vec::new(),
        });
    }

    match cloud {
        Cloud::Gce | Cloud::Azure => {
            let chain = external.ak_cert_chain.clone().ok_or_else(|| {
                AttestorError::EvidenceAssembly(
                    "AK certificate chain required for GCE/Azure but not supplied".into(),
                )
            })?;
            list.push(EvidencePiece {
                evidence_type: EvidenceType::AkCertChain,
                data: chain,
                signature: Vec::new(),
            });
        }
        Cloud::BareMetal => {
            list.push(EvidencePiece {
                evidence_type: EvidenceType::AkPublicArea,
                data: tpm.ak_public.clone(),
                signature: Vec::new(),
            });
        }
    }

    let gpu_token = gpu
        .gpu_attestation_token(attestation_nonce)
        .map_err(|e| AttestorError::EvidenceAssembly(e.to_string()))?;
    list.push(EvidencePiece {
        evidence_type: EvidenceType::GpuAttestationToken,
        data: gpu_token,
        signature: Vec::new(),
    });

    let switch_token = gpu
        .switch_attestation_token(attestation_nonce)
        .map_err(|e| AttestorError::EvidenceAssembly(e.to_string()))?;
    list.push(EvidencePiece {
        evidence_type: EvidenceType::GpuSwitchAttestationToken,
        data: switch_token,
        signature: Vec::new(),
    });

    list.push(EvidencePiece {
        evidence_type: EvidenceType::GpuIntermediateCert,
        data: gpu
            .gpu_intermediate_certs()
            .map_err(|e| AttestorError::EvidenceAssembly(e.to_string()))?,
        signature: Vec::new(),
    });
    list.push(EvidencePiece {
        evidence_type: EvidenceType::SwitchIntermediateCert,
        data: gpu
            .switch_intermediate_certs()
            .map_err(|e| AttestorError::EvidenceAssembly(e.to_string()))?,
        signature: Vec::new(),
    });

    // REK certify-creation proof: AK certifies the REK was produced under
    // the golden policy, referencing the stored creation ticket and hash.
    list.push(EvidencePiece {
        evidence_type: EvidenceType::RekCreationCertification,
        data: tpm.certify_rek_creation(),
        signature: tpm.ak_public.clone(),
    });

    // REK public area: `data` carries the public key bytes, `signature`
    // carries the TPM name digest (see `SignedEvidenceList::rek_tpm_name`).
    list.push(EvidencePiece {
        evidence_type: EvidenceType::RekPublicArea,
        data: tpm.rek_public.clone(),
        signature: tpm.rek_tpm_name.clone(),
    });

    if !transparency_bundle_b64.is_empty() {
        use base64::Engine as _;
        let bundle = base64::engine::general_purpose::STANDARD
            .decode(transparency_bundle_b64)
            .map_err(|e| AttestorError::EvidenceAssembly(format!("transparency bundle: {e}")))?;
        list.push(EvidencePiece {
            evidence_type: EvidenceType::ImageTransparencyBundle,
            data: bundle,
            signature: Vec::new(),
        });
    }

    // TPM quote signed by AK over the golden PCR selection.
    list.push(EvidencePiece {
        evidence_type: EvidenceType::TpmPcrQuote,
        data: tpm.pcr_quote.clone(),
        signature: tpm.pcr_quote_signature.clone(),
    });

    list.push(EvidencePiece {
        evidence_type: EvidenceType::MeasuredBootEventLog,
        data: external.event_log.clone(),
        signature: Vec::new(),
    });

    Ok(list)
}
