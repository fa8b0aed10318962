//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

use thiserror::Error;

/// Startup-time failures: evidence hand-off never happened or was malformed.
/// Distinct from per-request errors — any of these abort the dispatcher
/// before it ever starts listening for HTTP.
#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error("evidence socket timed out waiting for the attestor to connect")]
    HandoffTimeout,

    #[error("evidence payload of {0} bytes exceeds the 1 MiB hand-off limit")]
    PayloadTooLarge(usize),

    #[error("evidence payload could not be decoded: {0}")]
    Unmarshal(#[from] confsec_types::error::TypesError),

    #[error("evidence socket bind failed at {path}: {source}")]
    SocketBind {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One variant per `code` string named in the worker's validation taxonomy —
/// the enum *is* the stable contract clients parse out of the encrypted
/// envelope's error body. The dispatcher itself only raises the pre-worker
/// subset (`ErrInvalidContentType`-adjacent header checks) before a worker is
/// ever spawned; the rest pass through from the worker's own JSON body and
/// are represented here so the dispatcher's status-mapping table is total.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    #[error("unsupported path")]
    ErrUnsupportedPath,
    #[error("invalid method")]
    ErrInvalidMethod,
    #[error("query parameters present")]
    ErrQueryParamsPresent,
    #[error("path mismatch")]
    ErrPathMismatch,
    #[error("transfer-encoding not allowed")]
    ErrTransferEncodingNotAllowed,
    #[error("blocked header present")]
    ErrBlockedHeaderPresent,
    #[error("header too large")]
    ErrHeaderTooLarge,
    #[error("invalid content type")]
    ErrInvalidContentType,
    #[error("invalid hostname")]
    ErrInvalidHostname,
    #[error("badge missing")]
    ErrBadgeMissing,
    #[error("invalid badge")]
    ErrInvalidBadge,
    #[error("body too large")]
    ErrBodyTooLarge,
    #[error("content-length mismatch")]
    ErrContentLengthMismatch,
    #[error("invalid json")]
    ErrInvalidJson,
    #[error("extra json data")]
    ErrExtraJsonData,
    #[error("missing field")]
    ErrMissingField,
    #[error("unsupported model")]
    ErrUnsupportedModel,
}

impl RequestError {
    pub fn http_status(self) -> u16 {
        match self {
            RequestError::ErrUnsupportedPath => 404,
            _ => 400,
        }
    }
}

/// Per-request transport failures: spawning or piping to the worker process
/// failed outright (not a validation rejection, which the worker itself
/// reports inside the encrypted envelope).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to spawn worker: {0}")]
    Spawn(std::io::Error),

    #[error("worker pipe I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker exited with unexpected status: {0}")]
    UnexpectedExit(i32),
}

impl TransportError {
    pub fn http_status(&self) -> u16 {
        500
    }
}

/// Exit code the worker uses for "request decapsulation failed", mapped to
/// HTTP 400 by the dispatcher rather than 500.
pub const WORKER_DECAPSULATION_FAILURE_EXIT_CODE: i32 = 20;
