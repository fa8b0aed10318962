//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! The plaintext request reconstructed from the decapsulated ciphertext: the
//! client's original method, URL, headers, and body, exactly as the
//! dispatcher's HTTP handler saw them before encryption.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaintextRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub headers: BTreeMap<String, String>,
    #[serde(with = "body_bytes")]
    pub body: Vec<u8>,
}

mod body_bytes {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        serde::Deserialize::deserialize(d)
    }
}

impl PlaintextRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Same normalisation the endpoint validator compares `path` against:
    /// collapses `.`/`..` segments and repeated slashes. Paths that need
    /// normalisation are rejected outright rather than silently cleaned.
    pub fn clean_path(&self) -> String {
        let mut segments: Vec<&str> = Vec::new();
        for seg in self.path.split('/') {
            match seg {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        format!("/{}", segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PlaintextRequest {
        PlaintextRequest {
            method: "POST".into(),
            path: "/v1/chat/completions".into(),
            query: String::new(),
            headers: BTreeMap::from([("Content-Type".to_string(), "application/json".to_string())]),
            body: b"{}".to_vec(),
        }
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = sample();
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn clean_path_is_identity_for_already_clean_paths() {
        let req = sample();
        assert_eq!(req.clean_path(), "/v1/chat/completions");
    }

    #[test]
    fn clean_path_collapses_traversal_segments() {
        let mut req = sample();
        req.path = "/v1/../v1/chat/completions".into();
        assert_eq!(req.clean_path(), "/v1/chat/completions");
    }
}
