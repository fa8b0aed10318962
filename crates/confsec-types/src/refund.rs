//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Refund accounting: the pure parts (credit-multiplier constants and the
//! credit-used formula) live here so both the worker and its tests can share
//! them without pulling in an RNG. Probabilistic rounding, which needs one,
//! lives in `confsec_worker::refund`.

/// Per-token credit multipliers. Fixed defaults per the open-question
/// resolution recorded in `DESIGN.md`; overridable so a deployment can retune
/// without a rebuild.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefundRates {
    pub input_multiplier: f64,
    pub output_multiplier: f64,
}

impl Default for RefundRates {
    fn default() -> Self {
        Self {
            input_multiplier: 0.5,
            output_multiplier: 2.0,
        }
    }
}

impl RefundRates {
    /// `creditUsed = inputTokens * I + outputTokens * O`.
    pub fn credit_used(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        input_tokens as f64 * self.input_multiplier + output_tokens as f64 * self.output_multiplier
    }

    /// `refund = creditAmount - creditUsed`, unrounded. Negative or zero means
    /// no refund is owed.
    pub fn raw_refund(&self, credit_amount: i64, input_tokens: u64, output_tokens: u64) -> f64 {
        credit_amount as f64 - self.credit_used(input_tokens, output_tokens)
    }
}

/// Observed token counts, however they were reported (Ollama's
/// `prompt_eval_count`/`eval_count` or OpenAI's `usage.prompt_tokens`/
/// `usage.completion_tokens`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// The outcome of refund accounting for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refund {
    /// A refund amount was computed (2xx with parsed usage, positive result).
    Amount(i64),
    /// The full credit amount is refunded (4xx/5xx response).
    Exact(i64),
    /// No refund is available: usage could not be parsed, or the computed
    /// amount was not positive. Never surfaced as an error to the client.
    None,
}

impl Refund {
    pub fn footer_amount(&self) -> Option<i64> {
        match self {
            Self::Amount(v) | Self::Exact(v) => Some(*v),
            Self::None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rates_match_open_question_resolution() {
        let rates = RefundRates::default();
        assert_eq!(rates.input_multiplier, 0.5);
        assert_eq!(rates.output_multiplier, 2.0);
    }

    #[test]
    fn scenario_openai_chat_non_stream() {
        let rates = RefundRates::default();
        let raw = rates.raw_refund(200, 10, 5);
        assert_eq!(raw, 185.0);
    }

    #[test]
    fn scenario_ollama_generate_stream() {
        let rates = RefundRates::default();
        let raw = rates.raw_refund(200, 29, 54);
        assert!((raw - 77.5).abs() < 1e-9);
    }

    #[test]
    fn footer_amount_extraction() {
        assert_eq!(Refund::Amount(77).footer_amount(), Some(77));
        assert_eq!(Refund::Exact(200).footer_amount(), Some(200));
        assert_eq!(Refund::None.footer_amount(), None);
    }
}
