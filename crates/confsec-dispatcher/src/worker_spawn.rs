//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Spawns one worker subprocess per request, builds its argv from the
//! per-request parameters and the node's evidence summary, and manages its
//! lifecycle: stdin/stdout piping, stderr inheritance, and SIGTERM-then-
//! SIGKILL cancellation.

use std::process::Stdio;
use std::time::Duration;

use base64::Engine as _;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::warn;

use crate::error::TransportError;

/// Grace period between SIGTERM and SIGKILL when cancelling a worker.
const TERMINATE_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Per-request parameters the dispatcher passes to the worker, mirroring the
/// worker CLI flags one for one.
pub struct WorkerRequest<'a> {
    pub binary_path: &'a str,
    pub tpm_handle: u32,
    pub tpm_device: &'a str,
    pub rek_public_key: &'a [u8],
    pub rek_tpm_name: &'a [u8],
    pub pcr_values: &'a [u8],
    pub tpm_simulate: bool,
    pub tpm_simulator_cmd_addr: Option<&'a str>,
    pub tpm_simulator_platform_addr: Option<&'a str>,
    pub llm_base_url: &'a str,
    pub service_timeout: Duration,
    pub traceparent: &'a str,
    pub request_media_type: &'a str,
    pub request_encapsulated_key: &'a str,
    pub request_credit_amount: i64,
    pub badge_public_key: &'a [u8],
    pub permitted_models: &'a [String],
}

fn build_argv(req: &WorkerRequest<'_>) -> Vec<String> {
    let b64 = base64::engine::general_purpose::STANDARD;
    let mut argv = vec![
        "-tpm_key_handle".to_string(),
        req.tpm_handle.to_string(),
        "-tpm_device".to_string(),
        req.tpm_device.to_string(),
        "-tpm_base64_public_key".to_string(),
        b64.encode(req.rek_public_key),
        "-tpm_base64_public_key_name".to_string(),
        b64.encode(req.rek_tpm_name),
        "-tpm_base64_pcr_values".to_string(),
        b64.encode(req.pcr_values),
        "-tpm_simulate".to_string(),
        req.tpm_simulate.to_string(),
    ];

    if let Some(addr) = req.tpm_simulator_cmd_addr {
        argv.push("-tpm_simulator_cmd_addr".to_string());
        argv.push(addr.to_string());
    }
    if let Some(addr) = req.tpm_simulator_platform_addr {
        argv.push("-tpm_simulator_platform_addr".to_string());
        argv.push(addr.to_string());
    }

    argv.push("-llm_base_url".to_string());
    argv.push(req.llm_base_url.to_string());
    argv.push("-service_timeout".to_string());
    argv.push(format!("{}s", req.service_timeout.as_secs()));
    argv.push("-traceparent".to_string());
    argv.push(req.traceparent.to_string());
    argv.push("-request_media_type".to_string());
    argv.push(req.request_media_type.to_string());
    argv.push("-request_encapsulated_key".to_string());
    argv.push(req.request_encapsulated_key.to_string());
    argv.push("-request_credit_amount".to_string());
    argv.push(req.request_credit_amount.to_string());
    argv.push("-badge_public_key".to_string());
    argv.push(b64.encode(req.badge_public_key));

    for model in req.permitted_models {
        argv.push("-model".to_string());
        argv.push(model.clone());
    }

    argv
}

/// A running worker process with its stdin/stdout handles detached for
/// independent piping.
pub struct SpawnedWorker {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
}

pub fn spawn(req: &WorkerRequest<'_>) -> Result<SpawnedWorker, TransportError> {
    let argv = build_argv(req);

    let mut child = Command::new(req.binary_path)
        .args(&argv)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(TransportError::Spawn)?;

    let stdin = child.stdin.take().expect("stdin was piped");
    let stdout = child.stdout.take().expect("stdout was piped");

    Ok(SpawnedWorker { child, stdin, stdout })
}

/// Sends SIGTERM to the child, then SIGKILL if it hasn't exited within
/// [`TERMINATE_GRACE_PERIOD`], so its TPM session is released promptly
/// either way.
pub async fn cancel(child: &mut Child) {
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }

    let outcome = tokio::time::timeout(TERMINATE_GRACE_PERIOD, child.wait()).await;
    if outcome.is_err() {
        warn!("worker did not exit after SIGTERM, sending SIGKILL");
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

/// Maps a worker's exit status to an HTTP status, per the request-
/// decapsulation-failure exit code carved out in the error taxonomy.
pub fn exit_status_to_http(status: std::process::ExitStatus) -> u16 {
    match status.code() {
        Some(0) => 200,
        Some(crate::error::WORKER_DECAPSULATION_FAILURE_EXIT_CODE) => 400,
        _ => 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> WorkerRequest<'static> {
        WorkerRequest {
            binary_path: "/usr/local/bin/confsec-worker",
            tpm_handle: 0x8101_0002,
            tpm_device: "/dev/tpmrm0",
            rek_public_key: b"rek-pub",
            rek_tpm_name: b"rek-name",
            pcr_values: b"pcrs",
            tpm_simulate: true,
            tpm_simulator_cmd_addr: None,
            tpm_simulator_platform_addr: None,
            llm_base_url: "http://127.0.0.1:11434",
            service_timeout: Duration::from_secs(120),
            traceparent: "00-trace-span-01",
            request_media_type: "application/vnd.confsec.request+v1",
            request_encapsulated_key: "ZW5jLWtleQ==",
            request_credit_amount: 200,
            badge_public_key: b"badge-pub",
            permitted_models: &[],
        }
    }

    #[test]
    fn argv_carries_every_flag_in_declared_order() {
        let argv = build_argv(&sample_request());
        assert_eq!(argv[0], "-tpm_key_handle");
        assert!(argv.contains(&"-tpm_simulate".to_string()));
        assert!(argv.contains(&"-llm_base_url".to_string()));
        assert!(argv.contains(&"-request_credit_amount".to_string()));
        assert!(argv.contains(&"-badge_public_key".to_string()));
    }

    #[test]
    fn repeatable_model_flag_appears_once_per_model() {
        let mut req = sample_request();
        let models = vec!["llama3.2:1b".to_string(), "qwen2.5:3b".to_string()];
        req.permitted_models = &models;
        let argv = build_argv(&req);
        let count = argv.iter().filter(|a| *a == "-model").count();
        assert_eq!(count, 2);
    }

    #[test]
    fn simulator_addresses_are_omitted_when_absent() {
        let argv = build_argv(&sample_request());
        assert!(!argv.contains(&"-tpm_simulator_cmd_addr".to_string()));
    }

    #[test]
    fn simulator_addresses_appear_when_present() {
        let mut req = sample_request();
        req.tpm_simulator_cmd_addr = Some("127.0.0.1:2321");
        req.tpm_simulator_platform_addr = Some("127.0.0.1:2322");
        let argv = build_argv(&req);
        assert!(argv.contains(&"127.0.0.1:2321".to_string()));
        assert!(argv.contains(&"127.0.0.1:2322".to_string()));
    }

    #[test]
    fn exit_code_for_decapsulation_failure_maps_to_400() {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            let status = std::process::ExitStatus::from_raw(
                crate::error::WORKER_DECAPSULATION_FAILURE_EXIT_CODE << 8,
            );
            assert_eq!(exit_status_to_http(status), 400);
        }
    }
}
