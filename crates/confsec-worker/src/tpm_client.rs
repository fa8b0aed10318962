//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! The worker's TPM backend. Unlike `confsec_core::tpm::SimulatorTpm` (an
//! in-memory stand-in that holds the REK's scalar directly, used only by
//! `confsec-core`'s own tests), the worker is handed nothing but the REK's
//! *public* bytes and name over argv — it always speaks the real TPM2
//! command protocol via `tss-esapi`, whether the other end is silicon
//! (`-tpm_device`) or a software TPM simulator (`-tpm_simulator_cmd_addr` /
//! `-tpm_simulator_platform_addr`). Grounded on the policy-session and
//! `TPM2_ECDH_ZGen` flow in `confsec_core::tpm::hardware::HardwareTpm`.

use std::convert::TryFrom;
use std::str::FromStr;

use confsec_core::error::{CoreError, TpmError};
use confsec_core::tpm::TpmEcdhZ;
use confsec_types::evidence::PcrMap;
use p256::PublicKey;
use tss_esapi::attributes::SessionAttributesBuilder;
use tss_esapi::constants::SessionType;
use tss_esapi::handles::KeyHandle;
use tss_esapi::interface_types::algorithm::HashingAlgorithm;
use tss_esapi::interface_types::session_handles::PolicySession;
use tss_esapi::structures::{EccPoint, PcrSelectionListBuilder, PcrSlot, SymmetricDefinition};
use tss_esapi::tcti_ldr::{DeviceConfig, TctiNameConf};
use tss_esapi::Context;

enum TpmTarget {
    /// A real TPM device node, e.g. `/dev/tpmrm0`.
    Device(String),
    /// A software TPM simulator (swtpm / IBM TSS simulator) reachable over
    /// TCP, addressed as `mssim:port=<cmd>[,platform-port=<platform>]`.
    Simulator(String),
}

pub struct WorkerTpm {
    target: TpmTarget,
    handle: u32,
}

impl WorkerTpm {
    /// `cmd_addr`/`platform_addr` are `host:port` pairs for the IBM/swtpm
    /// software TPM simulator's command and platform sockets; when absent in
    /// simulate mode, the simulator's documented default command port is
    /// used.
    pub fn new(
        device_path: &str,
        simulate: bool,
        cmd_addr: Option<&str>,
        platform_addr: Option<&str>,
        handle: u32,
    ) -> Self {
        let target = if simulate {
            let cmd_port = cmd_addr.and_then(port_of).unwrap_or(2321);
            let conf = match platform_addr.and_then(port_of) {
                Some(platform_port) => format!("mssim:port={cmd_port},platform-port={platform_port}"),
                None => format!("mssim:port={cmd_port}"),
            };
            TpmTarget::Simulator(conf)
        } else {
            TpmTarget::Device(device_path.to_string())
        };

        Self { target, handle }
    }

    fn open_context(&self) -> Result<Context, CoreError> {
        let tcti = match &self.target {
            TpmTarget::Device(path) => TctiNameConf::Device(
                DeviceConfig::from_str(path).map_err(|e| TpmError::DeviceOpen(e.to_string()))?,
            ),
            TpmTarget::Simulator(conf) => {
                TctiNameConf::from_str(conf).map_err(|e| TpmError::DeviceOpen(e.to_string()))?
            }
        };
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

fn port_of(addr: &str) -> Option<u16> {
    addr.rsplit(':').next()?.parse().ok()
}

impl TpmEcdhZ for WorkerTpm {
    fn ecdh_z(&self, peer_public: &PublicKey, golden_pcrs: &PcrMap) -> Result<Vec<u8>, CoreError> {
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

        let selection = Self::pcr_selection(golden_pcrs)
            .build()
            .map_err(|e| TpmError::EcdhZ(format!("invalid golden PCR selection: {e}")))?;

        context
            .execute_with_session(Some(session), |ctx| {
                ctx.policy_pcr(PolicySession::try_from(session)?, None, selection)
            })
            .map_err(|_| TpmError::PolicyMismatch)?;

        let result = (|| -> Result<Vec<u8>, CoreError> {
            let point = peer_public.to_encoded_point(false);
            let handle = KeyHandle::from(self.handle);
            let z = context
                .execute_with_session(Some(session), |ctx| {
                    ctx.ecdh_z_gen(
                        handle,
                        EccPoint::try_from(point.as_bytes()).map_err(|_| {
                            tss_esapi::Error::WrapperError(tss_esapi::WrapperErrorKind::InvalidParam)
                        })?,
                    )
                })
                .map_err(|e| TpmError::EcdhZ(e.to_string()))?;
            Ok(z.x().as_bytes().to_vec())
        })();

        let _ = context.flush_context(session.into());
        result
    }
}
