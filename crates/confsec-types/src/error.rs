//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

use thiserror::Error;

/// Errors raised while building or parsing the wire types in this crate.
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("bincode encoding failed: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("signature malformed: expected {expected} bytes, got {got}")]
    SignatureLength { expected: usize, got: usize },

    #[error("signature verification failed")]
    SignatureVerification,

    #[error("evidence piece missing: {0}")]
    MissingEvidence(&'static str),

    #[error("evidence list empty")]
    EmptyEvidenceList,
}

pub type Result<T> = std::result::Result<T, TypesError>;
