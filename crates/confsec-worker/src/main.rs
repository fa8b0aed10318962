//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! The per-request worker process: decapsulates the HPKE-sealed request from
//! stdin, validates it, forwards it to the LLM (or a diagnostic responder),
//! and writes the HPKE-sealed, refund-annotated response envelope to stdout.

mod cli;
mod decapsulate;
mod diagnostics;
mod hpke_receiver;
mod llm_client;
mod refund;
mod request;
mod tpm_client;
mod validators;

use std::process::ExitCode;

use futures_util::StreamExt;
use tracing_subscriber::EnvFilter;

use confsec_core::envelope::EnvelopeWriter;
use confsec_core::hpke::HpkeReceiverContext;
use confsec_types::envelope::{EnvelopeFooter, EnvelopeHeader};
use confsec_types::refund::RefundRates;
use confsec_types::schema::{ErrorBody, ValidationError};

use cli::WorkerConfig;
use diagnostics::{DiagnosticBody, Exec};
use request::PlaintextRequest;

/// Mirrors `confsec_dispatcher::error::WORKER_DECAPSULATION_FAILURE_EXIT_CODE`:
/// the dispatcher maps exactly this exit code to a plain HTTP 400 without
/// reading any worker stdout, since decapsulation failure means there is no
/// HPKE context left to seal an error response with in the first place.
pub const WORKER_DECAPSULATION_FAILURE_EXIT_CODE: u8 = 20;

const RESPONSE_AAD: &[u8] = b"";

fn init_tracing(traceparent: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    tracing::info!(traceparent, "worker starting");
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match cli::parse(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("argument error: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.traceparent);

    let (mut ctx, req) = match decapsulate::decapsulate(&config, tokio::io::stdin()).await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!(error = %e, "request decapsulation failed");
            return ExitCode::from(WORKER_DECAPSULATION_FAILURE_EXIT_CODE);
        }
    };

    run_request(&config, &mut ctx, req).await
}

async fn run_request(
    config: &WorkerConfig,
    ctx: &mut HpkeReceiverContext,
    req: PlaintextRequest,
) -> ExitCode {
    let rates = RefundRates::default();
    let is_ollama = req.path.starts_with("/api/");

    match validators::run(&req, &config.permitted_models, &config.badge_public_key) {
        Ok(validated) => {
            let exec = req.header("x-confsec-exec").and_then(Exec::parse);
            match exec {
                Some(exec) => run_diagnostic(ctx, config, &rates, exec).await,
                None => {
                    run_llm(
                        ctx,
                        config,
                        &rates,
                        is_ollama,
                        &req.path,
                        validated.body,
                    )
                    .await
                }
            }
        }
        Err(e) => write_validation_error(ctx, config.request_credit_amount, e).await,
    }
}

async fn run_diagnostic(
    ctx: &mut HpkeReceiverContext,
    config: &WorkerConfig,
    rates: &RefundRates,
    exec: Exec,
) -> ExitCode {
    let response = match exec {
        Exec::Noop => diagnostics::noop(),
        Exec::Simulated => diagnostics::simulated(config.request_credit_amount, rates),
        Exec::Diagnostic(name) => diagnostics::diagnostic_named(&name),
    };

    let refund = match response.status {
        200..=299 => refund::compute(config.request_credit_amount, response.usage, rates),
        _ => refund::full_refund(config.request_credit_amount),
    };

    write_response(ctx, response.content_type, response.body, refund).await
}

async fn run_llm(
    ctx: &mut HpkeReceiverContext,
    config: &WorkerConfig,
    rates: &RefundRates,
    is_ollama: bool,
    path: &str,
    body: Vec<u8>,
) -> ExitCode {
    let llm_response = match llm_client::forward(
        &config.llm_base_url,
        path,
        body,
        config.service_timeout,
    )
    .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "llm backend call failed");
            let refund = refund::full_refund(config.request_credit_amount);
            let body = serde_json::to_vec(&ErrorBody {
                code: "ErrUpstreamUnavailable".to_string(),
                error: e.to_string(),
                message: "the LLM backend could not be reached".to_string(),
            })
            .unwrap_or_default();
            return write_response(ctx, "application/json", DiagnosticBody::Buffered(body), refund)
                .await;
        }
    };

    let status = llm_response.status;
    let mut recorder = refund::Recorder::new(is_ollama);
    let mut sealer = ctx.response_sealer();
    let mut writer = EnvelopeWriter::new(tokio::io::stdout());

    let content_type = if is_ollama {
        "application/x-ndjson"
    } else {
        "application/json"
    };

    if let Err(e) = writer
        .write_header(&EnvelopeHeader::new(content_type, 0))
        .await
    {
        tracing::error!(error = %e, "failed to write envelope header");
        return ExitCode::FAILURE;
    }
    if let Err(e) = writer.write_data(&sealer.response_nonce).await {
        tracing::error!(error = %e, "failed to write response nonce");
        return ExitCode::FAILURE;
    }

    let mut body = llm_response.body;
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "llm response stream errored mid-flight");
                break;
            }
        };
        recorder.observe(&chunk);
        match sealer.seal_chunk(RESPONSE_AAD, &chunk) {
            Ok(sealed) => {
                if writer.write_data(&sealed).await.is_err() {
                    return ExitCode::FAILURE;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to seal response chunk");
                return ExitCode::FAILURE;
            }
        }
    }
    recorder.finish();

    let refund = if (200..300).contains(&status) {
        refund::compute(config.request_credit_amount, recorder.usage(), rates)
    } else {
        refund::full_refund(config.request_credit_amount)
    };

    let footer = EnvelopeFooter {
        refund_amount: refund.footer_amount(),
    };
    if writer.write_footer(&footer).await.is_err() {
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn write_validation_error(
    ctx: &mut HpkeReceiverContext,
    credit_amount: i64,
    error: ValidationError,
) -> ExitCode {
    let body = serde_json::to_vec(&ErrorBody::from(error)).unwrap_or_default();
    let refund = refund::full_refund(credit_amount);
    write_response(ctx, "application/json", DiagnosticBody::Buffered(body), refund).await
}

/// Shared tail: seal `body` (buffered or streamed) behind a response sealer
/// and write the full envelope (header, response nonce, sealed chunks,
/// refund footer) to stdout.
async fn write_response(
    ctx: &mut HpkeReceiverContext,
    content_type: &str,
    body: DiagnosticBody,
    refund: confsec_types::refund::Refund,
) -> ExitCode {
    let mut sealer = ctx.response_sealer();
    let mut writer = EnvelopeWriter::new(tokio::io::stdout());

    if writer
        .write_header(&EnvelopeHeader::new(content_type, 0))
        .await
        .is_err()
    {
        return ExitCode::FAILURE;
    }
    if writer.write_data(&sealer.response_nonce).await.is_err() {
        return ExitCode::FAILURE;
    }

    match body {
        DiagnosticBody::Buffered(bytes) => {
            if !bytes.is_empty() {
                match sealer.seal_chunk(RESPONSE_AAD, &bytes) {
                    Ok(sealed) => {
                        if writer.write_data(&sealed).await.is_err() {
                            return ExitCode::FAILURE;
                        }
                    }
                    Err(_) => return ExitCode::FAILURE,
                }
            }
        }
        DiagnosticBody::Stream(mut stream) => {
            while let Some(chunk) = stream.next().await {
                match sealer.seal_chunk(RESPONSE_AAD, &chunk) {
                    Ok(sealed) => {
                        if writer.write_data(&sealed).await.is_err() {
                            return ExitCode::FAILURE;
                        }
                    }
                    Err(_) => return ExitCode::FAILURE,
                }
            }
        }
    }

    let footer = EnvelopeFooter {
        refund_amount: refund.footer_amount(),
    };
    if writer.write_footer(&footer).await.is_err() {
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
