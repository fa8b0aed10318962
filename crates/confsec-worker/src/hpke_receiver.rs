//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Wires the parsed CLI config to `confsec_core`'s HPKE receiver, routing its
//! one private-key operation through [`crate::tpm_client::WorkerTpm`].

use confsec_core::error::CoreError;
use confsec_core::hpke::HpkeReceiverContext;

use crate::cli::WorkerConfig;
use crate::tpm_client::WorkerTpm;

/// No additional authenticated data is bound to the request AEAD: the
/// encapsulated key and recipient public key already anchor the KEM context,
/// and the media type is carried as HPKE's `info` rather than as AAD.
const REQUEST_AAD: &[u8] = b"";

pub fn setup(config: &WorkerConfig) -> Result<HpkeReceiverContext, CoreError> {
    let tpm = WorkerTpm::new(
        &config.tpm_device,
        config.tpm_simulate,
        config.tpm_simulator_cmd_addr.as_deref(),
        config.tpm_simulator_platform_addr.as_deref(),
        config.tpm_handle,
    );

    HpkeReceiverContext::setup(
        &config.request_encapsulated_key,
        &config.rek_public_key,
        &tpm,
        &config.golden_pcrs,
        config.request_media_type.as_bytes(),
    )
}

/// Opens the single request ciphertext blob read from stdin.
pub fn open(ctx: &mut HpkeReceiverContext, ciphertext: &[u8]) -> Result<Vec<u8>, CoreError> {
    ctx.open_request(REQUEST_AAD, ciphertext)
}
