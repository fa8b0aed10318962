//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Argv parsing for the worker's per-request CLI surface.
//!
//! The dispatcher's `worker_spawn::build_argv` emits single-dash, Go-flag-
//! style arguments (`-tpm_key_handle 2149580802`, not `--tpm-key-handle`).
//! `clap`'s derive parser always expects a double-dash long form, so it
//! cannot parse this wire contract without renaming every flag — which would
//! break the dispatcher/worker argv agreement. Per the one-shot-init design
//! note (global flag registries replaced by a pure parser returning a
//! config value), this is a small hand-rolled parser instead: it owns no
//! global state and is exercised directly in tests with a `Vec<String>`,
//! exactly as that note asks for.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use confsec_types::evidence::PcrMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("missing value for flag {0}")]
    MissingValue(&'static str),
    #[error("unrecognised flag {0}")]
    UnknownFlag(String),
    #[error("missing required flag {0}")]
    MissingFlag(&'static str),
    #[error("flag {flag} is not valid base64: {source}")]
    Base64(&'static str, #[source] base64::DecodeError),
    #[error("flag {flag} could not be parsed: {source}")]
    ParseInt(&'static str, #[source] std::num::ParseIntError),
    #[error("flag {0} is not a valid bool (expected \"true\" or \"false\")")]
    ParseBool(&'static str),
    #[error("flag {0} is not a valid duration (expected e.g. \"30s\")")]
    ParseDuration(&'static str),
    #[error("golden PCR map failed to decode: {0}")]
    PcrMap(#[from] bincode::Error),
}

/// Parsed worker configuration for one request. Construction never touches
/// the process environment or argv directly — [`parse`] does that, so tests
/// can build a `WorkerConfig` from an arbitrary argument list.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub tpm_handle: u32,
    pub tpm_device: String,
    pub rek_public_key: Vec<u8>,
    pub rek_tpm_name: Vec<u8>,
    pub golden_pcrs: PcrMap,
    pub tpm_simulate: bool,
    pub tpm_simulator_cmd_addr: Option<String>,
    pub tpm_simulator_platform_addr: Option<String>,
    pub llm_base_url: String,
    pub service_timeout: Duration,
    pub traceparent: String,
    pub request_media_type: String,
    pub request_encapsulated_key: Vec<u8>,
    pub request_credit_amount: i64,
    pub badge_public_key: [u8; 32],
    pub permitted_models: Vec<String>,
}

/// Parses `-service_timeout`'s `"<digits>s"` form. The dispatcher only ever
/// emits whole seconds (see `worker_spawn::build_argv`), so that is all this
/// accepts.
fn parse_duration(flag: &'static str, raw: &str) -> Result<Duration, CliError> {
    let secs = raw
        .strip_suffix('s')
        .ok_or(CliError::ParseDuration(flag))?
        .parse::<u64>()
        .map_err(|_| CliError::ParseDuration(flag))?;
    Ok(Duration::from_secs(secs))
}

fn decode_b64(flag: &'static str, raw: &str) -> Result<Vec<u8>, CliError> {
    BASE64.decode(raw).map_err(|e| CliError::Base64(flag, e))
}

pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<WorkerConfig, CliError> {
    let mut tpm_handle = None;
    let mut tpm_device = None;
    let mut rek_public_key = None;
    let mut rek_tpm_name = None;
    let mut golden_pcrs = None;
    let mut tpm_simulate = None;
    let mut tpm_simulator_cmd_addr = None;
    let mut tpm_simulator_platform_addr = None;
    let mut llm_base_url = None;
    let mut service_timeout = None;
    let mut traceparent = String::new();
    let mut request_media_type = None;
    let mut request_encapsulated_key = None;
    let mut request_credit_amount = None;
    let mut badge_public_key = None;
    let mut permitted_models = Vec::new();

    let mut it = args.into_iter();
    while let Some(flag) = it.next() {
        macro_rules! value {
            ($name:expr) => {
                it.next().ok_or(CliError::MissingValue($name))?
            };
        }

        match flag.as_str() {
            "-tpm_key_handle" => {
                let raw = value!("-tpm_key_handle");
                tpm_handle = Some(raw.parse().map_err(|e| CliError::ParseInt("-tpm_key_handle", e))?);
            }
            "-tpm_device" => tpm_device = Some(value!("-tpm_device")),
            "-tpm_base64_public_key" => {
                rek_public_key = Some(decode_b64("-tpm_base64_public_key", &value!("-tpm_base64_public_key"))?)
            }
            "-tpm_base64_public_key_name" => {
                rek_tpm_name = Some(decode_b64(
                    "-tpm_base64_public_key_name",
                    &value!("-tpm_base64_public_key_name"),
                )?)
            }
            "-tpm_base64_pcr_values" => {
                let decoded = decode_b64("-tpm_base64_pcr_values", &value!("-tpm_base64_pcr_values"))?;
                golden_pcrs = Some(bincode::deserialize::<PcrMap>(&decoded)?);
            }
            "-tpm_simulate" => {
                let raw = value!("-tpm_simulate");
                tpm_simulate = Some(match raw.as_str() {
                    "true" => true,
                    "false" => false,
                    _ => return Err(CliError::ParseBool("-tpm_simulate")),
                });
            }
            "-tpm_simulator_cmd_addr" => tpm_simulator_cmd_addr = Some(value!("-tpm_simulator_cmd_addr")),
            "-tpm_simulator_platform_addr" => {
                tpm_simulator_platform_addr = Some(value!("-tpm_simulator_platform_addr"))
            }
            "-llm_base_url" => llm_base_url = Some(value!("-llm_base_url")),
            "-service_timeout" => {
                service_timeout = Some(parse_duration("-service_timeout", &value!("-service_timeout"))?)
            }
            "-traceparent" => traceparent = value!("-traceparent"),
            "-request_media_type" => request_media_type = Some(value!("-request_media_type")),
            "-request_encapsulated_key" => {
                request_encapsulated_key = Some(decode_b64(
                    "-request_encapsulated_key",
                    &value!("-request_encapsulated_key"),
                )?)
            }
            "-request_credit_amount" => {
                let raw = value!("-request_credit_amount");
                request_credit_amount =
                    Some(raw.parse().map_err(|e| CliError::ParseInt("-request_credit_amount", e))?);
            }
            "-badge_public_key" => {
                let decoded = decode_b64("-badge_public_key", &value!("-badge_public_key"))?;
                let mut key = [0u8; 32];
                let n = decoded.len().min(32);
                key[..n].copy_from_slice(&decoded[..n]);
                badge_public_key = Some(key);
            }
            "-model" => permitted_models.push(value!("-model")),
            other => return Err(CliError::UnknownFlag(other.to_string())),
        }
    }

    Ok(WorkerConfig {
        tpm_handle: tpm_handle.ok_or(CliError::MissingFlag("-tpm_key_handle"))?,
        tpm_device: tpm_device.ok_or(CliError::MissingFlag("-tpm_device"))?,
        rek_public_key: rek_public_key.ok_or(CliError::MissingFlag("-tpm_base64_public_key"))?,
        rek_tpm_name: rek_tpm_name.ok_or(CliError::MissingFlag("-tpm_base64_public_key_name"))?,
        golden_pcrs: golden_pcrs.ok_or(CliError::MissingFlag("-tpm_base64_pcr_values"))?,
        tpm_simulate: tpm_simulate.unwrap_or(false),
        tpm_simulator_cmd_addr,
        tpm_simulator_platform_addr,
        llm_base_url: llm_base_url.ok_or(CliError::MissingFlag("-llm_base_url"))?,
        service_timeout: service_timeout.ok_or(CliError::MissingFlag("-service_timeout"))?,
        traceparent,
        request_media_type: request_media_type.ok_or(CliError::MissingFlag("-request_media_type"))?,
        request_encapsulated_key: request_encapsulated_key
            .ok_or(CliError::MissingFlag("-request_encapsulated_key"))?,
        request_credit_amount: request_credit_amount
            .ok_or(CliError::MissingFlag("-request_credit_amount"))?,
        badge_public_key: badge_public_key.ok_or(CliError::MissingFlag("-badge_public_key"))?,
        permitted_models,
    })
}
