//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Shared wire types for the confsec confidential-compute inference node.
//!
//! This crate provides the canonical type definitions shared by the boot
//! attestor, the dispatcher, and the worker: the evidence bundle, the badge
//! credential, the per-request envelope handed from dispatcher to worker, the
//! four validated request schemas, and refund accounting's pure formula.
//!
//! # Quick Start
//!
//! ```rust
//! use confsec_types::prelude::*;
//!
//! let rates = RefundRates::default();
//! let refund = rates.raw_refund(200, 10, 5);
//! assert_eq!(refund, 185.0);
//! ```

pub mod badge;
pub mod envelope;
pub mod error;
pub mod evidence;
pub mod refund;
pub mod request;
pub mod schema;

/// Prelude module for convenient glob imports.
pub mod prelude {
    pub use crate::badge::{Badge, Credentials};
    pub use crate::envelope::{EnvelopeFooter, EnvelopeHeader, MAX_CHUNK_LEN};
    pub use crate::error::{Result, TypesError};
    pub use crate::evidence::{EvidencePiece, EvidenceType, PcrMap, SignedEvidenceList};
    pub use crate::refund::{Refund, RefundRates, TokenUsage};
    pub use crate::request::InboundRequestEnvelope;
    pub use crate::schema::{
        ChatMessage, ErrorBody, OllamaChatRequest, OllamaGenerateRequest, OpenAiChatRequest,
        OpenAiCompletionsRequest, RequestPath, StreamOptions, ValidateRequest, ValidatedOutcome,
        ValidationError,
    };
}
