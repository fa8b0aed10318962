//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! A fixed-suite HPKE (RFC 9180) implementation: KEM = DHKEM(P-256),
//! KDF = HKDF-SHA256, AEAD = AES-128-GCM. The KEM's private-key operation
//! (ECDH-Z) is never performed in-process — it is delegated to a
//! [`TpmEcdhZ`] implementation, so the shared secret never requires holding
//! the REK's scalar in worker memory.
//!
//! Request and response share one encapsulation, directionally separated the
//! way RFC 9458 (Oblivious HTTP) separates its request and response AEAD
//! contexts: the worker opens the request under the HPKE key schedule
//! directly, then derives a distinct response key from the schedule's
//! exporter secret and a fresh response nonce, so request and response never
//! reuse a nonce space.

use aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Key, Nonce};
use hkdf::Hkdf;
use p256::PublicKey;
use rand::RngCore;
use sha2::Sha256;

use crate::error::{CoreError, HpkeError};
use crate::tpm::TpmEcdhZ;
use confsec_types::evidence::PcrMap;

const KEM_ID: u16 = 0x0010; // DHKEM(P-256, HKDF-SHA256)
const KDF_ID: u16 = 0x0001; // HKDF-SHA256
const AEAD_ID: u16 = 0x0001; // AES-128-GCM

const NK: usize = 16; // AES-128-GCM key length
const NN: usize = 12; // AES-128-GCM nonce length
const NH: usize = 32; // SHA-256 output length

fn labeled_extract(suite_id: &[u8], salt: &[u8], label: &[u8], ikm: &[u8]) -> Hkdf<Sha256> {
    let mut labeled_ikm = Vec::with_capacity(7 + suite_id.len() + label.len() + ikm.len());
    labeled_ikm.extend_from_slice(b"HPKE-v1");
    labeled_ikm.extend_from_slice(suite_id);
    labeled_ikm.extend_from_slice(label);
    labeled_ikm.extend_from_slice(ikm);
    let (_, hkdf) = Hkdf::<Sha256>::extract(Some(salt), &labeled_ikm);
    hkdf
}

fn labeled_expand(suite_id: &[u8], prk: &Hkdf<Sha256>, label: &[u8], info: &[u8], len: usize) -> Vec<u8> {
    let mut labeled_info = Vec::with_capacity(2 + 7 + suite_id.len() + label.len() + info.len());
    labeled_info.extend_from_slice(&(len as u16).to_be_bytes());
    labeled_info.extend_from_slice(b"HPKE-v1");
    labeled_info.extend_from_slice(suite_id);
    labeled_info.extend_from_slice(label);
    labeled_info.extend_from_slice(info);
    let mut out = vec![0u8; len];
    prk.expand(&labeled_info, &mut out)
        .expect("HKDF-SHA256 expand length is always valid for our fixed output sizes");
    out
}

fn hpke_suite_id() -> [u8; 10] {
    let mut id = [0u8; 10];
    id[0..4].copy_from_slice(b"HPKE");
    id[4..6].copy_from_slice(&KEM_ID.to_be_bytes());
    id[6..8].copy_from_slice(&KDF_ID.to_be_bytes());
    id[8..10].copy_from_slice(&AEAD_ID.to_be_bytes());
    id
}

fn kem_suite_id() -> [u8; 5] {
    let mut id = [0u8; 5];
    id[0..3].copy_from_slice(b"KEM");
    id[3..5].copy_from_slice(&KEM_ID.to_be_bytes());
    id
}

/// RFC 9180 §4.1 `ExtractAndExpand`, specialised to DHKEM(P-256).
fn extract_and_expand(dh: &[u8], kem_context: &[u8]) -> [u8; 32] {
    let suite_id = kem_suite_id();
    let prk = labeled_extract(&suite_id, &[], b"eae_prk", dh);
    let out = labeled_expand(&suite_id, &prk, b"shared_secret", kem_context, 32);
    let mut secret = [0u8; 32];
    secret.copy_from_slice(&out);
    secret
}

/// The base-mode (no PSK) key schedule, RFC 9180 §5.1.
struct KeySchedule {
    key: [u8; NK],
    base_nonce: [u8; NN],
    exporter_secret: [u8; NH],
}

fn key_schedule(shared_secret: &[u8; 32], info: &[u8]) -> KeySchedule {
    let suite_id = hpke_suite_id();
    let psk_id_hash = labeled_extract(&suite_id, &[], b"psk_id_hash", &[]);
    let psk_id_hash = labeled_expand(&suite_id, &psk_id_hash, b"psk_id_hash_out", &[], NH);
    let info_hash = labeled_extract(&suite_id, &[], b"info_hash", info);
    let info_hash = labeled_expand(&suite_id, &info_hash, b"info_hash_out", &[], NH);

    let mut context = Vec::with_capacity(1 + psk_id_hash.len() + info_hash.len());
    context.push(0x00); // mode_base
    context.extend_from_slice(&psk_id_hash);
    context.extend_from_slice(&info_hash);

    let secret = labeled_extract(&suite_id, shared_secret, b"secret", &[]);
    let key_bytes = labeled_expand(&suite_id, &secret, b"key", &context, NK);
    let base_nonce_bytes = labeled_expand(&suite_id, &secret, b"base_nonce", &context, NN);
    let exporter_bytes = labeled_expand(&suite_id, &secret, b"exp", &context, NH);

    let mut key = [0u8; NK];
    key.copy_from_slice(&key_bytes);
    let mut base_nonce = [0u8; NN];
    base_nonce.copy_from_slice(&base_nonce_bytes);
    let mut exporter_secret = [0u8; NH];
    exporter_secret.copy_from_slice(&exporter_bytes);

    KeySchedule {
        key,
        base_nonce,
        exporter_secret,
    }
}

fn seq_nonce(base_nonce: &[u8; NN], seq: u64) -> [u8; NN] {
    let mut nonce = *base_nonce;
    let seq_bytes = seq.to_be_bytes();
    for (i, b) in seq_bytes.iter().enumerate() {
        nonce[NN - 8 + i] ^= b;
    }
    nonce
}

/// A single incrementing-sequence-number AEAD context (RFC 9180 §5.2).
struct SequencedAead {
    cipher: Aes128Gcm,
    base_nonce: [u8; NN],
    seq: u64,
}

impl SequencedAead {
    fn new(key: &[u8; NK], base_nonce: [u8; NN]) -> Self {
        let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key));
        Self {
            cipher,
            base_nonce,
            seq: 0,
        }
    }

    fn next_nonce(&mut self) -> Result<[u8; NN], CoreError> {
        if self.seq == u64::MAX {
            return Err(HpkeError::SequenceOverflow.into());
        }
        let nonce = seq_nonce(&self.base_nonce, self.seq);
        self.seq += 1;
        Ok(nonce)
    }

    fn seal(&mut self, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CoreError> {
        let nonce = self.next_nonce()?;
        self.cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| HpkeError::AeadAuthenticationFailed.into())
    }

    fn open(&mut self, aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CoreError> {
        let nonce = self.next_nonce()?;
        self.cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| HpkeError::AeadAuthenticationFailed.into())
    }
}

/// A receiver-side HPKE context: opens the request under the base key
/// schedule, then — on demand — derives a response sealer from the exporter
/// secret so the response never shares a nonce space with the request.
pub struct HpkeReceiverContext {
    request_aead: SequencedAead,
    exporter_secret: [u8; NH],
    enc: Vec<u8>,
}

/// The response-direction AEAD, derived once per request.
pub struct ResponseSealer {
    aead: SequencedAead,
    /// Random nonce distinguishing this response's key derivation; carried on
    /// the wire ahead of the sealed chunks so the peer can re-derive the key.
    pub response_nonce: [u8; NK],
}

impl ResponseSealer {
    pub fn seal_chunk(&mut self, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CoreError> {
        self.aead.seal(aad, plaintext)
    }
}

impl HpkeReceiverContext {
    /// RFC 9180 `SetupBaseR`, with the DH step routed through `tpm`.
    pub fn setup(
        enc: &[u8],
        recipient_public_key: &[u8],
        tpm: &dyn TpmEcdhZ,
        golden_pcrs: &PcrMap,
        info: &[u8],
    ) -> Result<Self, CoreError> {
        let peer_public =
            PublicKey::from_sec1_bytes(enc).map_err(|_| HpkeError::InvalidEncapsulatedKey)?;
        PublicKey::from_sec1_bytes(recipient_public_key)
            .map_err(|_| HpkeError::InvalidRecipientKey)?;

        let dh = tpm.ecdh_z(&peer_public, golden_pcrs)?;

        let mut kem_context = Vec::with_capacity(enc.len() + recipient_public_key.len());
        kem_context.extend_from_slice(enc);
        kem_context.extend_from_slice(recipient_public_key);

        let shared_secret = extract_and_expand(&dh, &kem_context);
        let schedule = key_schedule(&shared_secret, info);

        Ok(Self {
            request_aead: SequencedAead::new(&schedule.key, schedule.base_nonce),
            exporter_secret: schedule.exporter_secret,
            enc: enc.to_vec(),
        })
    }

    /// Opens the single request blob. The worker calls this exactly once.
    pub fn open_request(&mut self, aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CoreError> {
        self.request_aead.open(aad, ciphertext)
    }

    /// Derives a fresh response-direction AEAD from the exporter secret and a
    /// random response nonce (RFC 9458 §4.3 response-key derivation).
    pub fn response_sealer(&self) -> ResponseSealer {
        let mut response_nonce = [0u8; NK];
        rand::rngs::OsRng.fill_bytes(&mut response_nonce);
        self.response_sealer_with_nonce(response_nonce)
    }

    fn response_sealer_with_nonce(&self, response_nonce: [u8; NK]) -> ResponseSealer {
        let mut salt = Vec::with_capacity(self.enc.len() + NK);
        salt.extend_from_slice(&self.enc);
        salt.extend_from_slice(&response_nonce);

        let suite_id = hpke_suite_id();
        let prk = labeled_extract(&suite_id, &salt, b"response_secret", &self.exporter_secret);
        let key_bytes = labeled_expand(&suite_id, &prk, b"response_key", &[], NK);
        let nonce_bytes = labeled_expand(&suite_id, &prk, b"response_nonce", &[], NN);

        let mut key = [0u8; NK];
        key.copy_from_slice(&key_bytes);
        let mut base_nonce = [0u8; NN];
        base_nonce.copy_from_slice(&nonce_bytes);

        ResponseSealer {
            aead: SequencedAead::new(&key, base_nonce),
            response_nonce,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tpm::SimulatorTpm;
    use confsec_types::evidence::PcrMap;

    fn golden() -> PcrMap {
        let mut m = PcrMap::new();
        m.insert(0, vec![0x42; 32]);
        m
    }

    /// Stands in for the client: performs the sender-side HPKE setup
    /// directly (it holds no TPM — it has the REK's *public* key only, plus
    /// its own freshly generated ephemeral key pair).
    fn client_seal(
        rek_public_key: &PublicKey,
        info: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> (Vec<u8>, Vec<u8>) {
        let esk = p256::SecretKey::random(&mut rand::rngs::OsRng);
        let enc = esk.public_key().to_encoded_point(false).as_bytes().to_vec();
        let dh = p256::ecdh::diffie_hellman(esk.to_nonzero_scalar(), rek_public_key.as_affine());

        let mut kem_context = Vec::new();
        kem_context.extend_from_slice(&enc);
        kem_context.extend_from_slice(rek_public_key.to_encoded_point(false).as_bytes());
        let shared_secret = extract_and_expand(dh.raw_secret_bytes(), &kem_context);
        let schedule = key_schedule(&shared_secret, info);

        let mut aead = SequencedAead::new(&schedule.key, schedule.base_nonce);
        let ciphertext = aead.seal(aad, plaintext).unwrap();
        (enc, ciphertext)
    }

    #[test]
    fn request_round_trips_through_tpm_gated_receiver() {
        let pcrs = golden();
        let (tpm, rek_pub_bytes) = SimulatorTpm::generate(pcrs.clone());
        let rek_pub = PublicKey::from_sec1_bytes(&rek_pub_bytes).unwrap();

        let info = b"confsec-request-v1";
        let aad = b"";
        let plaintext = b"POST /v1/chat/completions plaintext body";
        let (enc, ciphertext) = client_seal(&rek_pub, info, aad, plaintext);

        let mut ctx =
            HpkeReceiverContext::setup(&enc, &rek_pub_bytes, &tpm, &pcrs, info).unwrap();
        let opened = ctx.open_request(aad, &ciphertext).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn wrong_encapsulated_key_fails_to_open() {
        let pcrs = golden();
        let (tpm, rek_pub_bytes) = SimulatorTpm::generate(pcrs.clone());
        let rek_pub = PublicKey::from_sec1_bytes(&rek_pub_bytes).unwrap();
        let info = b"confsec-request-v1";
        let (_enc, ciphertext) = client_seal(&rek_pub, info, b"", b"hello");

        // A different, unrelated ephemeral key claims to have sealed this.
        let other_esk = p256::SecretKey::random(&mut rand::rngs::OsRng);
        let wrong_enc = other_esk.public_key().to_encoded_point(false).as_bytes().to_vec();

        let mut ctx =
            HpkeReceiverContext::setup(&wrong_enc, &rek_pub_bytes, &tpm, &pcrs, info).unwrap();
        assert!(ctx.open_request(b"", &ciphertext).is_err());
    }

    #[test]
    fn response_direction_uses_a_distinct_key_from_request() {
        let pcrs = golden();
        let (tpm, rek_pub_bytes) = SimulatorTpm::generate(pcrs.clone());
        let rek_pub = PublicKey::from_sec1_bytes(&rek_pub_bytes).unwrap();
        let info = b"confsec-request-v1";
        let (enc, ciphertext) = client_seal(&rek_pub, info, b"", b"hello");

        let mut ctx =
            HpkeReceiverContext::setup(&enc, &rek_pub_bytes, &tpm, &pcrs, info).unwrap();
        ctx.open_request(b"", &ciphertext).unwrap();

        let mut sealer_a = ctx.response_sealer();
        let mut sealer_b = ctx.response_sealer();
        let sealed_a = sealer_a.seal_chunk(b"", b"chunk").unwrap();
        let sealed_b = sealer_b.seal_chunk(b"", b"chunk").unwrap();

        // Independent random response nonces mean independent derived keys,
        // so encrypting identical plaintext produces different ciphertext.
        assert_ne!(sealed_a, sealed_b);
    }

    #[test]
    fn policy_mismatch_prevents_setup() {
        let pcrs = golden();
        let (tpm, rek_pub_bytes) = SimulatorTpm::generate(pcrs.clone());
        let rek_pub = PublicKey::from_sec1_bytes(&rek_pub_bytes).unwrap();
        let info = b"confsec-request-v1";
        let (enc, _ciphertext) = client_seal(&rek_pub, info, b"", b"hello");

        let mut wrong_pcrs = PcrMap::new();
        wrong_pcrs.insert(0, vec![0xFF; 32]);

        let result = HpkeReceiverContext::setup(&enc, &rek_pub_bytes, &tpm, &wrong_pcrs, info);
        assert!(result.is_err());
    }
}
