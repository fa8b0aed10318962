//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

use thiserror::Error;

/// Every variant reaching `main` terminates the process nonzero — there is no
/// partial publication of evidence.
#[derive(Debug, Error)]
pub enum AttestorError {
    #[error("GPU not in valid state for confidential computing: {0}")]
    GpuNotReady(String),

    #[error("TPM provisioning failed: {0}")]
    TpmProvisioning(String),

    #[error("evidence assembly failed: {0}")]
    EvidenceAssembly(String),

    #[error("hand-off to dispatcher failed: {0}")]
    HandOff(String),

    #[error("inference engine warm-up failed: {0}")]
    EngineWarmUp(String),

    #[error(transparent)]
    Core(#[from] confsec_core::error::CoreError),

    #[error(transparent)]
    Types(#[from] confsec_types::error::TypesError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
