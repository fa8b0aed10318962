//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Boot-time measurement attestor: brings the node into a provably-attested
//! state once per boot, assembles a signed evidence bundle, hands it to the
//! dispatcher, then warms the local inference engine.

pub mod config;
pub mod engine_init;
pub mod error;
pub mod evidence;
pub mod gpu;
pub mod handoff;
pub mod tpm_boot;

pub use config::{Cloud, Config};
pub use error::AttestorError;
