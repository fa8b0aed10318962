//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Forwards a validated request to the configured LLM backend. Rewrites
//! `Content-Type`/`Accept` to what the backend actually expects, and honors
//! the dispatcher-configured per-request timeout.

use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use reqwest::Client;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmClientError {
    #[error("LLM backend request failed: {0}")]
    Request(#[from] reqwest::Error),
}

pub struct LlmResponse {
    pub status: u16,
    pub body: Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send + Unpin>,
}

/// Posts `body` to `base_url` + `path`, rewriting headers the same way
/// regardless of which of the four schemas it is.
pub async fn forward(
    base_url: &str,
    path: &str,
    body: Vec<u8>,
    timeout: Duration,
) -> Result<LlmResponse, LlmClientError> {
    let client = Client::builder().timeout(timeout).build()?;
    let url = format!("{}{}", base_url.trim_end_matches('/'), path);

    let response = client
        .post(url)
        .header("content-type", "application/json")
        .header("accept", "application/json, text/event-stream")
        .body(body)
        .send()
        .await?;

    let status = response.status().as_u16();
    let body = Box::new(response.bytes_stream());

    Ok(LlmResponse { status, body })
}
