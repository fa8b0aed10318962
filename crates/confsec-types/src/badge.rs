//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! The badge credential carried in the `X-Confsec-Badge` header.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TypesError};

/// The permitted-models list issued by the external badge authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub permitted_models: Vec<String>,
}

impl Credentials {
    pub fn permits(&self, model: &str) -> bool {
        self.permitted_models.iter().any(|m| m == model)
    }

    /// Canonical bytes the signature is computed over. Bincode gives a
    /// deterministic encoding for a plain struct of owned `String`s, which is
    /// what the signer and verifier both need to agree on.
    fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}

/// A credentials record plus the issuing authority's Ed25519 signature over
/// its canonical bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Badge {
    pub credentials: Credentials,
    #[serde(with = "signature_bytes")]
    pub signature: [u8; 64],
}

mod signature_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 64], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 64], D::Error> {
        let v: Vec<u8> = Vec::deserialize(d)?;
        v.try_into()
            .map_err(|v: Vec<u8>| serde::de::Error::invalid_length(v.len(), &"64 bytes"))
    }
}

impl Badge {
    pub fn new(credentials: Credentials, signature: [u8; 64]) -> Self {
        Self {
            credentials,
            signature,
        }
    }

    /// Ed25519-verifies the signature over the credentials' canonical bytes.
    /// An empty or malformed signature is rejected the same as a forged one.
    pub fn verify(&self, key: &VerifyingKey) -> Result<()> {
        if self.signature == [0u8; 64] {
            return Err(TypesError::SignatureLength {
                expected: 64,
                got: 0,
            });
        }
        let sig = Signature::from_bytes(&self.signature);
        let msg = self.credentials.canonical_bytes()?;
        key.verify(&msg, &sig)
            .map_err(|_| TypesError::SignatureVerification)
    }

    pub fn to_bincode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bincode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    fn signed_badge(models: Vec<&str>) -> (Badge, VerifyingKey) {
        let signing_key = SigningKey::generate(&mut OsRng);
        let credentials = Credentials {
            permitted_models: models.into_iter().map(String::from).collect(),
        };
        let msg = bincode::serialize(&credentials).unwrap();
        let signature = signing_key.sign(&msg);
        (
            Badge::new(credentials, signature.to_bytes()),
            signing_key.verifying_key(),
        )
    }

    #[test]
    fn verifies_a_well_formed_badge() {
        let (badge, key) = signed_badge(vec!["llama3.2:1b"]);
        assert!(badge.verify(&key).is_ok());
    }

    #[test]
    fn rejects_wrong_key() {
        let (badge, _) = signed_badge(vec!["llama3.2:1b"]);
        let (_, other_key) = signed_badge(vec!["llama3.2:1b"]);
        assert!(badge.verify(&other_key).is_err());
    }

    #[test]
    fn rejects_empty_signature() {
        let (mut badge, key) = signed_badge(vec!["llama3.2:1b"]);
        badge.signature = [0u8; 64];
        assert!(badge.verify(&key).is_err());
    }

    #[test]
    fn permits_checks_membership() {
        let (badge, _) = signed_badge(vec!["llama3.2:1b", "phi3:mini"]);
        assert!(badge.credentials.permits("phi3:mini"));
        assert!(!badge.credentials.permits("privatemodel1.0"));
    }

    #[test]
    fn round_trips_through_bincode() {
        let (badge, _) = signed_badge(vec!["llama3.2:1b"]);
        let bytes = badge.to_bincode().unwrap();
        let decoded = Badge::from_bincode(&bytes).unwrap();
        assert_eq!(decoded.credentials, badge.credentials);
        assert_eq!(decoded.signature, badge.signature);
    }
}
