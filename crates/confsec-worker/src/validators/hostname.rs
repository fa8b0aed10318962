//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Third pre-auth validator: the `Host` header must equal a fixed, never-
//! dialed hostname under the reserved `.invalid` TLD (RFC 2606). The worker
//! never resolves or connects to this name — its only purpose is to make
//! accidental SSRF-style host confusion with the dispatcher's own listener
//! address structurally impossible, since no DNS resolver will ever answer
//! for it.
use confsec_types::schema::ValidationError;

use crate::request::PlaintextRequest;

pub const FIXED_HOSTNAME: &str = "worker.confsec.invalid";

pub fn validate(req: &PlaintextRequest) -> Result<(), ValidationError> {
    match req.header("host") {
        Some(host) if host.eq_ignore_ascii_case(FIXED_HOSTNAME) => Ok(()),
        _ => Err(ValidationError::ErrInvalidHostname),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn req_with_host(host: Option<&str>) -> PlaintextRequest {
        let mut headers = BTreeMap::new();
        if let Some(h) = host {
            headers.insert("Host".to_string(), h.to_string());
        }
        PlaintextRequest {
            method: "POST".into(),
            path: "/v1/chat/completions".into(),
            query: String::new(),
            headers,
            body: vec![],
        }
    }

    #[test]
    fn accepts_the_fixed_hostname() {
        assert_eq!(validate(&req_with_host(Some(FIXED_HOSTNAME))), Ok(()));
    }

    #[test]
    fn is_case_insensitive() {
        assert_eq!(
            validate(&req_with_host(Some("WORKER.CONFSEC.INVALID"))),
            Ok(())
        );
    }

    #[test]
    fn rejects_any_other_host() {
        assert_eq!(
            validate(&req_with_host(Some("example.com"))),
            Err(ValidationError::ErrInvalidHostname)
        );
    }

    #[test]
    fn rejects_missing_host() {
        assert_eq!(validate(&req_with_host(None)), Err(ValidationError::ErrInvalidHostname));
    }
}
