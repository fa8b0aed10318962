//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Evidence bundle wire types produced once by the boot attestor and consumed
//! once by the dispatcher at hand-off.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TypesError};

/// Closed enumeration of evidence kinds. Order matters on the wire (the list
/// preserves assembly order) but lookups are by `EvidenceType`, not position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EvidenceType {
    CvmQuoteTdx,
    CvmQuoteSevSnp,
    QuoteCollateral,
    AkCertChain,
    AkPublicArea,
    RekPublicArea,
    RekCreationCertification,
    TpmPcrQuote,
    MeasuredBootEventLog,
    GpuAttestationToken,
    GpuSwitchAttestationToken,
    GpuIntermediateCert,
    SwitchIntermediateCert,
    ImageTransparencyBundle,
}

/// A single tagged evidence record. `data` and `signature` are opaque to this
/// crate; downstream verification interprets them according to `evidence_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidencePiece {
    pub evidence_type: EvidenceType,
    #[serde(with = "serde_bytes_vec")]
    pub data: Vec<u8>,
    #[serde(with = "serde_bytes_vec")]
    pub signature: Vec<u8>,
}

impl EvidencePiece {
    pub fn new(evidence_type: EvidenceType, data: Vec<u8>, signature: Vec<u8>) -> Self {
        Self {
            evidence_type,
            data,
            signature,
        }
    }
}

// serde(with = "serde_bytes") style module, written inline rather than pulling
// in the `serde_bytes` crate for two fields.
mod serde_bytes_vec {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        serde::Deserialize::deserialize(d)
    }
}

/// Mapping PCR index to digest bytes. The indices used for measurement policy
/// are fixed at boot; `BTreeMap` gives a stable iteration/wire order.
pub type PcrMap = BTreeMap<u32, Vec<u8>>;

/// The ordered, immutable evidence bundle produced once per boot.
///
/// Created exactly once; flows boot attestor → dispatcher over the evidence
/// socket; never mutated thereafter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignedEvidenceList {
    pieces: Vec<EvidencePiece>,
}

impl SignedEvidenceList {
    pub fn new(pieces: Vec<EvidencePiece>) -> Self {
        Self { pieces }
    }

    pub fn push(&mut self, piece: EvidencePiece) {
        self.pieces.push(piece);
    }

    pub fn iter(&self) -> impl Iterator<Item = &EvidencePiece> {
        self.pieces.iter()
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    fn first_of(&self, t: EvidenceType) -> Option<&EvidencePiece> {
        self.pieces.iter().find(|p| p.evidence_type == t)
    }

    fn all_of(&self, t: EvidenceType) -> impl Iterator<Item = &EvidencePiece> {
        self.pieces.iter().filter(move |p| p.evidence_type == t)
    }

    /// REK public key bytes, read from the REK-public-area piece's `data` field.
    pub fn rek_public_bytes(&self) -> Result<&[u8]> {
        self.first_of(EvidenceType::RekPublicArea)
            .map(|p| p.data.as_slice())
            .ok_or(TypesError::MissingEvidence("RekPublicArea"))
    }

    /// REK TPM name, read from the REK-public-area piece's `signature` field
    /// (the field is reused as a carrier for the name digest, per the wire
    /// contract between the attestor and the dispatcher).
    pub fn rek_tpm_name(&self) -> Result<&[u8]> {
        self.first_of(EvidenceType::RekPublicArea)
            .map(|p| p.signature.as_slice())
            .ok_or(TypesError::MissingEvidence("RekPublicArea"))
    }

    /// The golden PCR map, decoded from the TPM-quote evidence piece's `data`.
    pub fn pcr_map(&self) -> Result<PcrMap> {
        let piece = self
            .first_of(EvidenceType::TpmPcrQuote)
            .ok_or(TypesError::MissingEvidence("TpmPcrQuote"))?;
        Ok(bincode::deserialize(&piece.data)?)
    }

    /// DER bytes of every GPU/switch intermediate certificate, in evidence order.
    pub fn nvidia_intermediate_certs(&self) -> Vec<&[u8]> {
        self.all_of(EvidenceType::GpuIntermediateCert)
            .chain(self.all_of(EvidenceType::SwitchIntermediateCert))
            .map(|p| p.data.as_slice())
            .collect()
    }

    pub fn to_bincode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bincode(bytes: &[u8]) -> Result<Self> {
        let list: Self = bincode::deserialize(bytes)?;
        if list.is_empty() {
            return Err(TypesError::EmptyEvidenceList);
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_list() -> SignedEvidenceList {
        let mut pcrs: PcrMap = PcrMap::new();
        pcrs.insert(0, vec![0xAA; 32]);
        pcrs.insert(7, vec![0xBB; 32]);

        let mut list = SignedEvidenceList::default();
        list.push(EvidencePiece::new(
            EvidenceType::CvmQuoteTdx,
            vec![1, 2, 3],
            vec![9, 9],
        ));
        list.push(EvidencePiece::new(
            EvidenceType::RekPublicArea,
            b"rek-pubkey".to_vec(),
            b"rek-name".to_vec(),
        ));
        list.push(EvidencePiece::new(
            EvidenceType::TpmPcrQuote,
            bincode::serialize(&pcrs).unwrap(),
            b"ak-sig".to_vec(),
        ));
        list.push(EvidencePiece::new(
            EvidenceType::GpuIntermediateCert,
            b"der-cert-1".to_vec(),
            vec![],
        ));
        list
    }

    #[test]
    fn round_trips_through_bincode() {
        let list = sample_list();
        let bytes = list.to_bincode().unwrap();
        let decoded = SignedEvidenceList::from_bincode(&bytes).unwrap();
        assert_eq!(decoded.len(), list.len());
        assert_eq!(decoded.rek_public_bytes().unwrap(), b"rek-pubkey");
    }

    #[test]
    fn extracts_rek_fields() {
        let list = sample_list();
        assert_eq!(list.rek_public_bytes().unwrap(), b"rek-pubkey");
        assert_eq!(list.rek_tpm_name().unwrap(), b"rek-name");
    }

    #[test]
    fn extracts_pcr_map() {
        let list = sample_list();
        let pcrs = list.pcr_map().unwrap();
        assert_eq!(pcrs.get(&0), Some(&vec![0xAAu8; 32]));
        assert_eq!(pcrs.get(&7), Some(&vec![0xBBu8; 32]));
    }

    #[test]
    fn extracts_intermediate_certs() {
        let list = sample_list();
        let certs = list.nvidia_intermediate_certs();
        assert_eq!(certs, vec![b"der-cert-1".as_slice()]);
    }

    #[test]
    fn missing_rek_piece_errors() {
        let list = SignedEvidenceList::default();
        assert!(list.rek_public_bytes().is_err());
    }

    #[test]
    fn empty_list_rejected_on_decode() {
        let empty = SignedEvidenceList::default();
        let bytes = bincode::serialize(&empty).unwrap();
        assert!(matches!(
            SignedEvidenceList::from_bincode(&bytes),
            Err(TypesError::EmptyEvidenceList)
        ));
    }
}
