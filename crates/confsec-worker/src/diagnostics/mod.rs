//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Locally-synthesised responses for the `X-Confsec-Exec` diagnostic header,
//! used to exercise the envelope/refund path without a real LLM backend.

mod archive;
mod noop;
mod simulated;

use std::pin::Pin;

use futures_util::Stream;

use confsec_types::refund::TokenUsage;

pub use archive::diagnostic_named;
pub use noop::noop;
pub use simulated::simulated;

/// Either a single buffered body or a stream of already-framed chunks; both
/// are written through the same envelope-chunk loop in `main`.
pub enum DiagnosticBody {
    Buffered(Vec<u8>),
    Stream(Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>),
}

pub struct DiagnosticResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: DiagnosticBody,
    /// Token usage to feed straight into refund accounting, bypassing the
    /// refund recorder's own line-scraping (the diagnostic responders know
    /// their own counts exactly).
    pub usage: Option<TokenUsage>,
}

/// The one non-diagnostic exec value recognised at the top: anything named
/// `diagnostic-<name>` defers to the embedded archive.
pub const DIAGNOSTIC_PREFIX: &str = "diagnostic-";

pub enum Exec {
    Noop,
    Simulated,
    Diagnostic(String),
}

impl Exec {
    pub fn parse(header: &str) -> Option<Self> {
        match header {
            "noop" => Some(Self::Noop),
            "simulated" => Some(Self::Simulated),
            other if other.starts_with(DIAGNOSTIC_PREFIX) => {
                Some(Self::Diagnostic(other[DIAGNOSTIC_PREFIX.len()..].to_string()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_every_exec_kind() {
        assert!(matches!(Exec::parse("noop"), Some(Exec::Noop)));
        assert!(matches!(Exec::parse("simulated"), Some(Exec::Simulated)));
        assert!(matches!(
            Exec::parse("diagnostic-error"),
            Some(Exec::Diagnostic(name)) if name == "error"
        ));
    }

    #[test]
    fn unrecognised_header_is_none() {
        assert!(Exec::parse("bogus").is_none());
    }
}
