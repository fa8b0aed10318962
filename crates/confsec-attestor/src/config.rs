//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Boot-attestor configuration. A pure `clap`-derived struct — no global flag
//! registry, so tests build a `Config` directly without touching argv.

use std::time::Duration;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Cloud {
    Gce,
    Azure,
    BareMetal,
}

#[derive(Debug, Parser, Clone)]
#[command(name = "confsec-attestor", about = "Boot-time measurement attestor")]
pub struct Config {
    /// Cloud environment, selecting which CVM quote and AK-certificate path to take.
    #[arg(long, value_enum, default_value = "bare-metal")]
    pub cloud: Cloud,

    /// UNIX socket path the dispatcher is listening on for the evidence hand-off.
    #[arg(long, default_value = "/tmp/router.sock")]
    pub dispatcher_socket: String,

    /// Overall timeout for the hand-off connection attempt.
    #[arg(long, value_parser = humantime_secs, default_value = "60")]
    pub handoff_timeout: Duration,

    /// Run against the in-memory TPM simulator instead of a real device.
    #[arg(long, default_value_t = true)]
    pub tpm_simulate: bool,

    #[arg(long, default_value = "/dev/tpmrm0")]
    pub tpm_device: String,

    #[arg(long, default_value_t = 0x8101_0001)]
    pub ak_handle: u32,

    #[arg(long, default_value_t = 0x8101_0002)]
    pub rek_handle: u32,

    #[arg(long, default_value_t = 0x0150_0001)]
    pub creation_ticket_nv_index: u32,

    #[arg(long, default_value_t = 0x0150_0002)]
    pub creation_hash_nv_index: u32,

    /// PCR indices forming the golden measurement policy.
    #[arg(long, value_delimiter = ',', default_value = "0,1,2,3,4,5,6,7")]
    pub pcr_selection: Vec<u32>,

    /// Base64-encoded image transparency log bundle, read from config at boot.
    #[arg(long, default_value = "")]
    pub transparency_bundle_b64: String,

    /// Skip reloading the inference-engine systemd unit (useful under test).
    #[arg(long, default_value_t = false)]
    pub skip_engine_reload: bool,

    /// Base URL of the local inference engine (vLLM/Ollama) health + completion API.
    #[arg(long, default_value = "http://127.0.0.1:11434")]
    pub engine_base_url: String,

    /// Model identifiers to prewarm with a one-token completion.
    #[arg(long = "model")]
    pub models: Vec<String>,

    /// Simulate the GPU admin interface instead of querying real hardware.
    #[arg(long, default_value_t = true)]
    pub gpu_simulate: bool,
}

fn humantime_secs(s: &str) -> Result<Duration, String> {
    s.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| e.to_string())
}
