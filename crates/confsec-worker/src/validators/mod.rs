//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Runs the worker's strict-order validation pipeline: pre-auth checks
//! (endpoint, header, hostname), badge authorisation, then the post-auth
//! body validator.

mod auth;
mod body;
mod endpoint;
mod header;
mod hostname;

use confsec_types::schema::ValidationError;

use crate::request::PlaintextRequest;

/// Outcome of a full pipeline pass: the resolved model name and the request
/// body to forward (possibly re-marshaled by the schema validator).
pub struct ValidatedRequest {
    pub model: String,
    pub body: Vec<u8>,
}

pub fn run(
    req: &PlaintextRequest,
    permitted_models: &[String],
    badge_public_key: &[u8; 32],
) -> Result<ValidatedRequest, ValidationError> {
    let path = endpoint::validate(req)?;
    header::validate(req)?;
    hostname::validate(req)?;

    let badge_models = auth::validate(req, badge_public_key)?;

    let (model, body) = body::validate(
        path,
        &req.body,
        req.header("content-length"),
        permitted_models,
        &badge_models,
    )?;

    Ok(ValidatedRequest { model, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use confsec_types::badge::{Badge, Credentials};
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;
    use std::collections::BTreeMap;

    fn signed_badge_header(models: Vec<&str>, signing_key: &SigningKey) -> String {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;

        let credentials = Credentials {
            permitted_models: models.into_iter().map(String::from).collect(),
        };
        let msg = bincode::serialize(&credentials).unwrap();
        let signature = signing_key.sign(&msg);
        let badge = Badge::new(credentials, signature.to_bytes());
        STANDARD.encode(badge.to_bincode().unwrap())
    }

    #[test]
    fn full_pipeline_accepts_a_well_formed_request() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let badge_header = signed_badge_header(vec!["llama3.2:1b"], &signing_key);

        let req = PlaintextRequest {
            method: "POST".into(),
            path: "/api/generate".into(),
            query: String::new(),
            headers: BTreeMap::from([
                ("Host".to_string(), hostname::FIXED_HOSTNAME.to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
                ("X-Confsec-Badge".to_string(), badge_header),
            ]),
            body: br#"{"model":"llama3.2:1b","prompt":"hi"}"#.to_vec(),
        };

        let permitted = vec!["llama3.2:1b".to_string()];
        let result = run(&req, &permitted, &signing_key.verifying_key().to_bytes()).unwrap();
        assert_eq!(result.model, "llama3.2:1b");
    }

    #[test]
    fn pipeline_short_circuits_on_the_first_failing_check() {
        // Bad path and bad host both fail; endpoint runs first.
        let req = PlaintextRequest {
            method: "GET".into(),
            path: "/unsupported".into(),
            query: String::new(),
            headers: BTreeMap::new(),
            body: vec![],
        };
        assert_eq!(
            run(&req, &[], &[0u8; 32]),
            Err(ValidationError::ErrInvalidMethod)
        );
    }
}
