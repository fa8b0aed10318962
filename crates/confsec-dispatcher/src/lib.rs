//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! The dispatcher (routercom): receives the attestor's one-time evidence
//! hand-off, then exposes the node as an HTTP endpoint that spawns one
//! isolated worker subprocess per inbound confsec request.

pub mod config;
pub mod error;
pub mod evidence_socket;
pub mod http;
pub mod waitgroup;
pub mod worker_spawn;

pub mod prelude {
    pub use crate::config::{Config, CONFSEC_REQUEST_MEDIA_TYPE};
    pub use crate::error::{DispatcherError, RequestError, TransportError};
    pub use crate::evidence_socket::{receive_evidence, schedule_self_termination, EvidenceSummary};
    pub use crate::http::{create_router, AppState};
    pub use crate::waitgroup::WaitGroup;
}
