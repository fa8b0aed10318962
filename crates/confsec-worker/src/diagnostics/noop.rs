//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! The `noop` diagnostic responder: two fixed NDJSON lines.

use confsec_types::refund::TokenUsage;

use super::{DiagnosticBody, DiagnosticResponse};

pub fn noop() -> DiagnosticResponse {
    let mut body = Vec::new();
    body.extend_from_slice(br#"{"response":"noop","done":false}"#);
    body.push(b'\n');
    body.extend_from_slice(br#"{"response":"","done":true,"prompt_eval_count":1,"eval_count":4}"#);
    body.push(b'\n');

    DiagnosticResponse {
        status: 200,
        content_type: "application/x-ndjson",
        body: DiagnosticBody::Buffered(body),
        usage: Some(TokenUsage {
            input_tokens: 1,
            output_tokens: 4,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_exactly_two_ndjson_lines() {
        let resp = noop();
        let DiagnosticBody::Buffered(body) = resp.body else {
            panic!("expected a buffered body");
        };
        let text = String::from_utf8(body).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(resp.usage, Some(TokenUsage { input_tokens: 1, output_tokens: 4 }));
    }
}
