//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Final boot step: bring the local inference engine up and warm the
//! declared models so the first real request does not pay a cold-start cost.

use std::time::Duration;

use tracing::{info, warn};

use crate::error::AttestorError;

const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(500);
const HEALTH_POLL_ATTEMPTS: u32 = 60;

/// Reloads the engine's systemd unit (unless `skip_reload`), unless the
/// caller chooses to skip it — useful under test and on hosts where the
/// engine is managed by something other than systemd.
pub trait EngineUnit: Send + Sync {
    fn reload(&self) -> Result<(), AttestorError>;
}

pub struct SystemdEngineUnit {
    pub unit_name: String,
}

impl EngineUnit for SystemdEngineUnit {
    fn reload(&self) -> Result<(), AttestorError> {
        let status = std::process::Command::new("systemctl")
            .args(["reload-or-restart", &self.unit_name])
            .status()
            .map_err(|e| AttestorError::EngineWarmUp(e.to_string()))?;
        if !status.success() {
            return Err(AttestorError::EngineWarmUp(format!(
                "systemctl reload-or-restart {} exited with {status}",
                self.unit_name
            )));
        }
        Ok(())
    }
}

pub async fn warm_up(
    unit: Option<&dyn EngineUnit>,
    skip_reload: bool,
    base_url: &str,
    models: &[String],
) -> Result<(), AttestorError> {
    if !skip_reload {
        if let Some(unit) = unit {
            unit.reload()?;
        }
    }

    wait_for_health(base_url).await?;

    for model in models {
        prewarm_model(base_url, model).await?;
    }

    Ok(())
}

async fn wait_for_health(base_url: &str) -> Result<(), AttestorError> {
    let client = reqwest::Client::new();
    let url = format!("{}/health", base_url.trim_end_matches('/'));

    for attempt in 0..HEALTH_POLL_ATTEMPTS {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(attempt, "inference engine reported healthy");
                return Ok(());
            }
            Ok(resp) => {
                warn!(attempt, status = %resp.status(), "engine health check not yet ready");
            }
            Err(e) => {
                warn!(attempt, error = %e, "engine health check failed");
            }
        }
        tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
    }

    Err(AttestorError::EngineWarmUp(format!(
        "engine at {base_url} did not become healthy within {:?}",
        HEALTH_POLL_INTERVAL * HEALTH_POLL_ATTEMPTS
    )))
}

async fn prewarm_model(base_url: &str, model: &str) -> Result<(), AttestorError> {
    let client = reqwest::Client::new();
    let url = format!("{}/api/generate", base_url.trim_end_matches('/'));
    let body = serde_json::json!({
        "model": model,
        "prompt": "hi",
        "stream": false,
        "options": { "num_predict": 1 },
    });

    let resp = client
        .post(&url)
        .json(&body)
        .send()
        .await
        .map_err(|e| AttestorError::EngineWarmUp(format!("prewarm {model}: {e}")))?;

    if !resp.status().is_success() {
        return Err(AttestorError::EngineWarmUp(format!(
            "prewarm {model} returned {}",
            resp.status()
        )));
    }
    info!(model, "model prewarmed");
    Ok(())
}
