//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Second pre-auth validator: header shape and the blocked-header list.

use confsec_types::schema::ValidationError;

use crate::request::PlaintextRequest;

/// Headers the worker refuses to forward, since both name re-entry into
/// chunked/compressed framing the worker's own envelope already owns.
const BLOCKED_HEADERS: [&str; 2] = ["transfer-encoding", "content-encoding"];

/// Per-header value length above which the request is rejected outright,
/// independent of (and tighter than) the later body-size check.
const MAX_HEADER_VALUE_BYTES: usize = 1024;

pub fn validate(req: &PlaintextRequest) -> Result<(), ValidationError> {
    if let Some(te) = req.header("transfer-encoding") {
        if te.eq_ignore_ascii_case("chunked") {
            return Err(ValidationError::ErrTransferEncodingNotAllowed);
        }
    }

    for blocked in BLOCKED_HEADERS {
        if req.header(blocked).is_some() {
            return Err(ValidationError::ErrBlockedHeaderPresent);
        }
    }

    match req.header("content-type") {
        Some(ct) if ct.eq_ignore_ascii_case("application/json") => {}
        _ => return Err(ValidationError::ErrInvalidContentType),
    }

    if req.headers.values().any(|v| v.len() > MAX_HEADER_VALUE_BYTES) {
        return Err(ValidationError::ErrHeaderTooLarge);
    }

    match req.header("x-confsec-badge") {
        Some(v) if !v.is_empty() => Ok(()),
        _ => Err(ValidationError::ErrBadgeMissing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn base() -> PlaintextRequest {
        PlaintextRequest {
            method: "POST".into(),
            path: "/v1/chat/completions".into(),
            query: String::new(),
            headers: BTreeMap::from([
                ("Content-Type".to_string(), "application/json".to_string()),
                ("X-Confsec-Badge".to_string(), "badge-bytes".to_string()),
            ]),
            body: vec![],
        }
    }

    #[test]
    fn accepts_a_well_formed_header_set() {
        assert_eq!(validate(&base()), Ok(()));
    }

    #[test]
    fn rejects_chunked_transfer_encoding() {
        let mut req = base();
        req.headers.insert("Transfer-Encoding".into(), "chunked".into());
        assert_eq!(
            validate(&req),
            Err(ValidationError::ErrTransferEncodingNotAllowed)
        );
    }

    #[test]
    fn rejects_content_encoding() {
        let mut req = base();
        req.headers.insert("Content-Encoding".into(), "gzip".into());
        assert_eq!(validate(&req), Err(ValidationError::ErrBlockedHeaderPresent));
    }

    #[test]
    fn rejects_wrong_content_type() {
        let mut req = base();
        req.headers.insert("Content-Type".into(), "text/plain".into());
        assert_eq!(validate(&req), Err(ValidationError::ErrInvalidContentType));
    }

    #[test]
    fn rejects_oversized_header_values() {
        let mut req = base();
        req.headers.insert("X-Big".into(), "a".repeat(2000));
        assert_eq!(validate(&req), Err(ValidationError::ErrHeaderTooLarge));
    }

    #[test]
    fn rejects_missing_badge() {
        let mut req = base();
        req.headers.remove("X-Confsec-Badge");
        assert_eq!(validate(&req), Err(ValidationError::ErrBadgeMissing));
    }
}
