//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

use std::sync::Arc;

use crate::config::Config;
use crate::evidence_socket::EvidenceSummary;
use crate::waitgroup::WaitGroup;

/// Shared state for every request handler: the node's fixed config, the
/// attestor's one-time evidence hand-off, and a waitgroup graceful shutdown
/// blocks on.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub evidence: Arc<EvidenceSummary>,
    pub in_flight: WaitGroup,
}

impl AppState {
    pub fn new(config: Config, evidence: EvidenceSummary) -> Self {
        Self {
            config: Arc::new(config),
            evidence: Arc::new(evidence),
            in_flight: WaitGroup::new(),
        }
    }
}
