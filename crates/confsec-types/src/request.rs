//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! The per-request parameters conveyed from the dispatcher to the worker.
//! The request ciphertext itself is not part of this struct — it arrives
//! separately on the worker's stdin.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::evidence::PcrMap;

/// Maximum length, in base64 characters, of the encapsulated key header.
pub const MAX_ENCAPSULATED_KEY_B64_LEN: usize = 512;

/// Everything the dispatcher hands a worker about one request, carried as
/// command-line arguments. This struct is the typed form both sides agree on;
/// `confsec_dispatcher` renders it to argv and `confsec_worker` parses argv
/// back into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundRequestEnvelope {
    pub media_type: String,
    pub encapsulated_key: Vec<u8>,
    pub credit_amount: i64,
    pub trace_context: String,
    pub permitted_models: Vec<String>,
    pub badge_public_key: [u8; 32],
    pub rek_public_key: Vec<u8>,
    pub rek_tpm_name: Vec<u8>,
    pub golden_pcrs: PcrMap,
    pub tpm_handle: u32,
    pub tpm_device: Option<String>,
    pub tpm_simulate: bool,
    pub tpm_simulator_cmd_addr: Option<String>,
    pub tpm_simulator_platform_addr: Option<String>,
    pub llm_base_url: String,
    pub service_timeout: Duration,
}

impl InboundRequestEnvelope {
    /// `credit_amount` must be a positive integer; enforced before a worker
    /// is ever spawned (see `confsec_dispatcher`'s per-request header checks).
    pub fn credit_amount_valid(&self) -> bool {
        self.credit_amount > 0
    }

    pub fn encapsulated_key_b64_len_valid(base64_len: usize) -> bool {
        base64_len > 0 && base64_len <= MAX_ENCAPSULATED_KEY_B64_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InboundRequestEnvelope {
        InboundRequestEnvelope {
            media_type: "application/vnd.confsec.request".into(),
            encapsulated_key: vec![1, 2, 3],
            credit_amount: 200,
            trace_context: "00-trace-00-01".into(),
            permitted_models: vec!["llama3.2:1b".into()],
            badge_public_key: [7u8; 32],
            rek_public_key: vec![4, 5, 6],
            rek_tpm_name: vec![7, 8, 9],
            golden_pcrs: PcrMap::new(),
            tpm_handle: 0x8100_0001,
            tpm_device: None,
            tpm_simulate: true,
            tpm_simulator_cmd_addr: Some("127.0.0.1:2321".into()),
            tpm_simulator_platform_addr: Some("127.0.0.1:2322".into()),
            llm_base_url: "http://127.0.0.1:11434".into(),
            service_timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn rejects_nonpositive_credit_amount() {
        let mut req = sample();
        req.credit_amount = 0;
        assert!(!req.credit_amount_valid());
        req.credit_amount = -5;
        assert!(!req.credit_amount_valid());
        req.credit_amount = 1;
        assert!(req.credit_amount_valid());
    }

    #[test]
    fn encapsulated_key_length_bound() {
        assert!(!InboundRequestEnvelope::encapsulated_key_b64_len_valid(0));
        assert!(InboundRequestEnvelope::encapsulated_key_b64_len_valid(512));
        assert!(!InboundRequestEnvelope::encapsulated_key_b64_len_valid(513));
    }
}
