//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Core cryptographic library for the confsec confidential-compute inference
//! node: TPM-gated HPKE, the output envelope's chunk codec, and the TPM
//! ECDH-Z abstraction shared by the attestor, dispatcher, and worker.
//!
//! This crate has no network or process-management concerns of its own —
//! those live in `confsec-attestor`, `confsec-dispatcher`, and
//! `confsec-worker`, all built on top of it.

pub mod envelope;
pub mod error;
pub mod hpke;
pub mod tpm;

pub mod prelude {
    pub use crate::envelope::{EnvelopeChunk, EnvelopeReader, EnvelopeWriter};
    pub use crate::error::{CoreError, EnvelopeError, HpkeError, Result, TpmError};
    pub use crate::hpke::{HpkeReceiverContext, ResponseSealer};
    pub use crate::tpm::{SimulatorTpm, TpmEcdhZ};
}
