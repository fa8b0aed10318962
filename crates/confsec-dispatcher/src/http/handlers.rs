//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! The single catch-all handler: validates the handful of headers the
//! dispatcher itself is responsible for, spawns a worker, pipes the request
//! body to it, and streams its envelope-framed response back out with the
//! refund amount as an HTTP trailer.

use axum::body::{to_bytes, Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine as _;
use http_body::Frame;
use http_body_util::StreamBody;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{error, warn};

use confsec_core::envelope::{EnvelopeChunk, EnvelopeReader};
use confsec_types::schema::ErrorBody;

use crate::config::CONFSEC_REQUEST_MEDIA_TYPE;
use crate::error::RequestError;
use crate::worker_spawn::{self, SpawnedWorker, WorkerRequest};

use super::state::AppState;

const MAX_ENCAPSULATED_KEY_B64_LEN: usize = 512;
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

const PING_HEADER: &str = "x-confsec-ping";
const ENCAPSULATED_KEY_HEADER: &str = "x-encapsulated-key";
const CREDIT_AMOUNT_HEADER: &str = "x-confsec-credit-amount";
const REFUND_TRAILER: &str = "x-confsec-refund-amount";

pub async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Response {
    if headers.get(PING_HEADER).and_then(|v| v.to_str().ok()) == Some("routercom") {
        return "routercom".into_response();
    }

    if method != Method::POST {
        return validation_error_response(RequestError::ErrInvalidMethod);
    }

    if let Err(e) = validate_content_type(&headers) {
        return validation_error_response(e);
    }

    let encapsulated_key = match validate_encapsulated_key(&headers) {
        Ok(v) => v,
        Err(e) => return validation_error_response(e),
    };

    let credit_amount = match validate_credit_amount(&headers) {
        Ok(v) => v,
        Err(e) => return validation_error_response(e),
    };

    let traceparent = headers
        .get("traceparent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let body_bytes = match to_bytes(body, MAX_REQUEST_BODY_BYTES).await {
        Ok(b) => b,
        Err(_) => return validation_error_response(RequestError::ErrBodyTooLarge),
    };

    let pcr_values = match bincode::serialize(&state.evidence.golden_pcrs) {
        Ok(v) => v,
        Err(e) => return internal_error(format!("could not marshal PCR map: {e}")),
    };

    let worker_req = WorkerRequest {
        binary_path: &state.config.worker_binary_path,
        tpm_handle: state.config.tpm_handle,
        tpm_device: &state.config.tpm_device,
        rek_public_key: &state.evidence.rek_public_key,
        rek_tpm_name: &state.evidence.rek_tpm_name,
        pcr_values: &pcr_values,
        tpm_simulate: state.config.tpm_simulate,
        tpm_simulator_cmd_addr: state.config.tpm_simulator_cmd_addr.as_deref(),
        tpm_simulator_platform_addr: state.config.tpm_simulator_platform_addr.as_deref(),
        llm_base_url: &state.config.llm_base_url,
        service_timeout: state.config.worker_service_timeout,
        traceparent: &traceparent,
        request_media_type: CONFSEC_REQUEST_MEDIA_TYPE,
        request_encapsulated_key: &encapsulated_key,
        request_credit_amount: credit_amount,
        badge_public_key: &state.config.badge_public_key,
        permitted_models: &state.config.permitted_models,
    };

    let worker = match worker_spawn::spawn(&worker_req) {
        Ok(w) => w,
        Err(e) => {
            error!(error = %e, "failed to spawn worker");
            return internal_error(e.to_string());
        }
    };

    let SpawnedWorker {
        mut child,
        mut stdin,
        stdout,
    } = worker;

    if let Err(e) = stdin.write_all(&body_bytes).await {
        warn!(error = %e, "failed writing request body to worker stdin");
        worker_spawn::cancel(&mut child).await;
        return internal_error("failed to deliver request to worker".to_string());
    }
    if let Err(e) = stdin.shutdown().await {
        warn!(error = %e, "failed closing worker stdin");
    }
    drop(stdin);

    let mut reader = EnvelopeReader::new(stdout);
    let header = match reader.read_header().await {
        Ok(h) => h,
        Err(e) => {
            warn!(error = %e, "worker produced no envelope header");
            worker_spawn::cancel(&mut child).await;
            let status = child.wait().await.ok();
            let http_status = status.map(worker_spawn::exit_status_to_http).unwrap_or(500);
            return status_error(http_status, "worker failed before producing a response".to_string());
        }
    };

    let (tx, rx) = mpsc::channel::<Result<Frame<Bytes>, std::io::Error>>(8);
    let guard = state.in_flight.add();

    tokio::spawn(async move {
        let _guard = guard;
        loop {
            match reader.read_next().await {
                Ok(EnvelopeChunk::Data(chunk)) => {
                    if tx.send(Ok(Frame::data(Bytes::from(chunk)))).await.is_err() {
                        worker_spawn::cancel(&mut child).await;
                        return;
                    }
                }
                Ok(EnvelopeChunk::Footer(footer)) => {
                    let trailers = refund_trailers(footer.refund_amount);
                    let _ = tx.send(Ok(Frame::trailers(trailers))).await;
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "envelope stream ended before a footer arrived");
                    let _ = tx
                        .send(Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, e.to_string())))
                        .await;
                    break;
                }
            }
        }

        match child.wait().await {
            Ok(status) if !status.success() => {
                warn!(status = ?status, "worker exited non-zero after streaming its response")
            }
            Err(e) => warn!(error = %e, "failed to reap worker"),
            _ => {}
        }
    });

    let stream = futures_util::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) });
    let response_body = Body::new(StreamBody::new(stream));

    let mut builder = Response::builder().status(StatusCode::OK);
    if let Ok(value) = HeaderValue::from_str(&header.media_type) {
        builder = builder.header(header::CONTENT_TYPE, value);
    }
    if header.is_chunked() {
        builder = builder.header(header::TRANSFER_ENCODING, "chunked");
    }
    builder = builder.header("trailer", REFUND_TRAILER);

    match builder.body(response_body) {
        Ok(resp) => resp,
        Err(e) => internal_error(e.to_string()),
    }
}

fn refund_trailers(refund_amount: Option<i64>) -> HeaderMap {
    let mut trailers = HeaderMap::new();
    let Some(amount) = refund_amount else {
        return trailers;
    };
    let Ok(bytes) = bincode::serialize(&amount) else {
        return trailers;
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    if let Ok(value) = HeaderValue::from_str(&encoded) {
        trailers.insert(HeaderName::from_static(REFUND_TRAILER), value);
    }
    trailers
}

fn validate_content_type(headers: &HeaderMap) -> Result<(), RequestError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if content_type != CONFSEC_REQUEST_MEDIA_TYPE {
        return Err(RequestError::ErrInvalidContentType);
    }
    Ok(())
}

fn validate_encapsulated_key(headers: &HeaderMap) -> Result<String, RequestError> {
    let value = headers
        .get(ENCAPSULATED_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    // The taxonomy has no dedicated "malformed encapsulated key" code; these
    // all fail the same length/shape check the worker's header validator
    // performs, so they share its closest header-shape code.
    if value.is_empty() || value.len() > MAX_ENCAPSULATED_KEY_B64_LEN {
        return Err(RequestError::ErrHeaderTooLarge);
    }
    base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(|_| RequestError::ErrHeaderTooLarge)?;
    Ok(value.to_string())
}

fn validate_credit_amount(headers: &HeaderMap) -> Result<i64, RequestError> {
    let value = headers
        .get(CREDIT_AMOUNT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    match value.parse::<i64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(RequestError::ErrMissingField),
    }
}

fn validation_error_response(e: RequestError) -> Response {
    let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::BAD_REQUEST);
    let body = ErrorBody {
        code: format!("{e:?}"),
        error: e.to_string(),
        message: e.to_string(),
    };
    (status, Json(body)).into_response()
}

fn internal_error(message: String) -> Response {
    status_error(500, message)
}

fn status_error(status: u16, message: String) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let code = if status == StatusCode::BAD_REQUEST {
        "ErrRequestDecapsulationFailure"
    } else {
        "ErrInternal"
    };
    let body = ErrorBody {
        code: code.to_string(),
        error: message.clone(),
        message,
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_must_match_exactly() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert_eq!(
            validate_content_type(&headers),
            Err(RequestError::ErrInvalidContentType)
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(CONFSEC_REQUEST_MEDIA_TYPE),
        );
        assert_eq!(validate_content_type(&headers), Ok(()));
    }

    #[test]
    fn encapsulated_key_rejects_empty_and_oversized() {
        let headers = HeaderMap::new();
        assert_eq!(
            validate_encapsulated_key(&headers),
            Err(RequestError::ErrHeaderTooLarge)
        );

        let mut headers = HeaderMap::new();
        let oversized = "a".repeat(600);
        headers.insert(
            HeaderName::from_static(ENCAPSULATED_KEY_HEADER),
            HeaderValue::from_str(&oversized).unwrap(),
        );
        assert_eq!(
            validate_encapsulated_key(&headers),
            Err(RequestError::ErrHeaderTooLarge)
        );
    }

    #[test]
    fn encapsulated_key_accepts_valid_base64() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(ENCAPSULATED_KEY_HEADER),
            HeaderValue::from_static("ZW5jLWtleQ=="),
        );
        assert_eq!(validate_encapsulated_key(&headers).unwrap(), "ZW5jLWtleQ==");
    }

    #[test]
    fn credit_amount_must_be_positive() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(CREDIT_AMOUNT_HEADER),
            HeaderValue::from_static("0"),
        );
        assert_eq!(validate_credit_amount(&headers), Err(RequestError::ErrMissingField));

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(CREDIT_AMOUNT_HEADER),
            HeaderValue::from_static("200"),
        );
        assert_eq!(validate_credit_amount(&headers), Ok(200));
    }

    #[test]
    fn refund_trailer_is_absent_when_no_refund() {
        assert!(refund_trailers(None).is_empty());
    }

    #[test]
    fn refund_trailer_carries_base64_encoded_amount() {
        let trailers = refund_trailers(Some(185));
        let value = trailers
            .get(HeaderName::from_static(REFUND_TRAILER))
            .unwrap()
            .to_str()
            .unwrap();
        let decoded = base64::engine::general_purpose::STANDARD.decode(value).unwrap();
        let amount: i64 = bincode::deserialize(&decoded).unwrap();
        assert_eq!(amount, 185);
    }
}
