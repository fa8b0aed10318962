//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

use clap::Parser;
use tracing::{error, info, info_span};

use confsec_attestor::config::Config;
use confsec_attestor::evidence::{self, ExternalEvidence};
use confsec_attestor::gpu::{GpuAttestor, SimulatedGpu};
use confsec_attestor::handoff;
use confsec_attestor::tpm_boot::{BootTpm, SimulatedBootTpm};
use confsec_types::evidence::EvidenceType;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::parse();

    if let Err(e) = run(config).await {
        error!(error = %e, "boot attestor failed, exiting");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(config: Config) -> anyhow::Result<()> {
    if !config.gpu_simulate {
        anyhow::bail!("real GPU admin interface not wired up; run with --gpu-simulate");
    }
    let mut gpu = SimulatedGpu::new();

    info!("checking GPU state");
    let state = gpu.query_state()?;
    if !state.valid_for_confidential_compute() {
        anyhow::bail!("GPU not in valid state for confidential computing");
    }

    if !config.tpm_simulate {
        anyhow::bail!(
            "real TPM boot provisioning requires the `hardware-tpm` feature and a host-specific \
             AK materialisation path; run with --tpm-simulate for now"
        );
    }

    info!("provisioning TPM");
    let _tpm_span = info_span!("tpm_provisioning").entered();
    let mut tpm = SimulatedBootTpm::new(0);
    let material = tpm.prepare(&config.pcr_selection)?;
    drop(_tpm_span);
    let _ = (&config.tpm_device, config.ak_handle, config.rek_handle);

    info!("assembling evidence");
    let external = ExternalEvidence {
        cvm_quote: Vec::new(),
        cvm_quote_type: EvidenceType::CvmQuoteTdx,
        quote_collateral: None,
        ak_cert_chain: None,
        event_log: Vec::new(),
    };
    let nonce = material.rek_tpm_name.clone();
    let bundle = evidence::assemble(
        config.cloud,
        &gpu,
        &material,
        &external,
        &config.transparency_bundle_b64,
        &nonce,
    )?;
    info!(pieces = bundle.len(), "evidence assembled");

    gpu.enable_ready_state()?;

    info!(socket = %config.dispatcher_socket, "handing off evidence to dispatcher");
    handoff::send_evidence(&config.dispatcher_socket, &bundle, config.handoff_timeout).await?;

    info!("warming up inference engine");
    confsec_attestor::engine_init::warm_up(
        None,
        config.skip_engine_reload,
        &config.engine_base_url,
        &config.models,
    )
    .await?;

    info!("boot attestor complete");
    Ok(())
}
