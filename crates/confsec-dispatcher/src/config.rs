//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Dispatcher configuration loaded from the environment, mirroring the
//! `Config::from_env()` convention used across this workspace's server
//! binaries.

use std::env;
use std::time::Duration;

use anyhow::Result;

pub const CONFSEC_REQUEST_MEDIA_TYPE: &str = "application/vnd.confsec.request+v1";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub evidence_socket_path: String,
    pub evidence_handoff_timeout: Duration,
    pub worker_binary_path: String,
    pub llm_base_url: String,
    pub worker_service_timeout: Duration,
    pub tpm_device: String,
    pub tpm_handle: u32,
    pub tpm_simulate: bool,
    pub tpm_simulator_cmd_addr: Option<String>,
    pub tpm_simulator_platform_addr: Option<String>,
    /// Model identifiers this node is configured to serve, passed to every
    /// worker as repeated `-model` flags.
    pub permitted_models: Vec<String>,
    /// Ed25519 public key the worker uses to verify the badge attached to
    /// each request, base64-encoded in the environment.
    pub badge_public_key: [u8; 32],
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8443".to_string())
            .parse()
            .unwrap_or(8443);

        let evidence_socket_path =
            env::var("CONFSEC_EVIDENCE_SOCKET").unwrap_or_else(|_| "/tmp/router.sock".to_string());

        let evidence_handoff_timeout = Duration::from_secs(
            env::var("CONFSEC_EVIDENCE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        );

        let worker_binary_path = env::var("CONFSEC_WORKER_BINARY")
            .unwrap_or_else(|_| "/usr/local/bin/confsec-worker".to_string());

        let llm_base_url =
            env::var("CONFSEC_LLM_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:11434".to_string());

        let worker_service_timeout = Duration::from_secs(
            env::var("CONFSEC_WORKER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(120),
        );

        let tpm_device = env::var("CONFSEC_TPM_DEVICE").unwrap_or_else(|_| "/dev/tpmrm0".to_string());

        let tpm_handle = env::var("CONFSEC_TPM_HANDLE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0x8101_0002);

        let tpm_simulate = env::var("CONFSEC_TPM_SIMULATE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);

        let permitted_models = env::var("CONFSEC_PERMITTED_MODELS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let badge_public_key = {
            use base64::Engine as _;
            let raw = env::var("CONFSEC_BADGE_PUBLIC_KEY_B64").unwrap_or_default();
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(raw)
                .unwrap_or_default();
            let mut key = [0u8; 32];
            let copy_len = bytes.len().min(32);
            key[..copy_len].copy_from_slice(&bytes[..copy_len]);
            key
        };

        Ok(Config {
            port,
            evidence_socket_path,
            evidence_handoff_timeout,
            worker_binary_path,
            llm_base_url,
            worker_service_timeout,
            tpm_device,
            tpm_handle,
            tpm_simulate,
            tpm_simulator_cmd_addr: env::var("CONFSEC_TPM_SIMULATOR_CMD_ADDR").ok(),
            tpm_simulator_platform_addr: env::var("CONFSEC_TPM_SIMULATOR_PLATFORM_ADDR").ok(),
            permitted_models,
            badge_public_key,
        })
    }
}
