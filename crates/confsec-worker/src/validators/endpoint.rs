//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! First pre-auth validator: method, path, and query-string shape.

use confsec_types::schema::{RequestPath, ValidationError};

use crate::request::PlaintextRequest;

pub fn validate(req: &PlaintextRequest) -> Result<RequestPath, ValidationError> {
    if req.method != "POST" {
        return Err(ValidationError::ErrInvalidMethod);
    }
    if !req.query.is_empty() {
        return Err(ValidationError::ErrQueryParamsPresent);
    }
    if req.path != req.clean_path() {
        return Err(ValidationError::ErrPathMismatch);
    }
    RequestPath::from_path(&req.path).ok_or(ValidationError::ErrUnsupportedPath)
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
            headers: BTreeMap::new(),
            body: vec![],
        }
    }

    #[test]
    fn accepts_a_permitted_path() {
        assert_eq!(validate(&base()), Ok(RequestPath::OpenAiChat));
    }

    #[test]
    fn rejects_non_post() {
        let mut req = base();
        req.method = "GET".into();
        assert_eq!(validate(&req), Err(ValidationError::ErrInvalidMethod));
    }

    #[test]
    fn rejects_query_params() {
        let mut req = base();
        req.query = "foo=bar".into();
        assert_eq!(validate(&req), Err(ValidationError::ErrQueryParamsPresent));
    }

    #[test]
    fn rejects_path_needing_normalisation() {
        let mut req = base();
        req.path = "/v1/../v1/chat/completions".into();
        assert_eq!(validate(&req), Err(ValidationError::ErrPathMismatch));
    }

    #[test]
    fn rejects_unknown_path() {
        let mut req = base();
        req.path = "/v1/unknown".into();
        assert_eq!(validate(&req), Err(ValidationError::ErrUnsupportedPath));
    }
}
