//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Authorisation step: decode and verify the `X-Confsec-Badge` header,
//! handing back the model list it permits.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use confsec_types::badge::Badge;
use confsec_types::schema::ValidationError;
use ed25519_dalek::VerifyingKey;

use crate::request::PlaintextRequest;

pub fn validate(
    req: &PlaintextRequest,
    badge_public_key: &[u8; 32],
) -> Result<Vec<String>, ValidationError> {
    let header = req
        .header("x-confsec-badge")
        .ok_or(ValidationError::ErrBadgeMissing)?;

    let bytes = STANDARD
        .decode(header)
        .map_err(|_| ValidationError::ErrInvalidBadge)?;
    let badge = Badge::from_bincode(&bytes).map_err(|_| ValidationError::ErrInvalidBadge)?;

    let key = VerifyingKey::from_bytes(badge_public_key)
        .map_err(|_| ValidationError::ErrInvalidBadge)?;
    badge
        .verify(&key)
        .map_err(|_| ValidationError::ErrInvalidBadge)?;

    Ok(badge.credentials.permitted_models)
}
