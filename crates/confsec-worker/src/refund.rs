//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Probabilistic-rounding refund computation and the response-scraping
//! "recorder" that reads token usage off a forwarded LLM response without
//! altering the bytes the client ultimately receives.

use rand::Rng;

use confsec_types::refund::{Refund, RefundRates, TokenUsage};

/// `refund = creditAmount - creditUsed`, rounded by flipping a coin weighted
/// by the fractional part: a raw refund of 77.3 rounds up 30% of the time,
/// down 70% of the time. Non-positive raw refunds never round up to 0 or
/// above — they report [`Refund::None`].
pub fn compute(credit_amount: i64, usage: Option<TokenUsage>, rates: &RefundRates) -> Refund {
    let Some(usage) = usage else {
        return Refund::None;
    };
    let raw = rates.raw_refund(credit_amount, usage.input_tokens, usage.output_tokens);
    if raw <= 0.0 {
        return Refund::None;
    }
    let floor = raw.floor();
    let fractional = raw - floor;
    let rounded = if rand::thread_rng().gen_bool(fractional) {
        floor + 1.0
    } else {
        floor
    };
    Refund::Amount(rounded as i64)
}

/// Full-credit refund for any 4xx/5xx response.
pub fn full_refund(credit_amount: i64) -> Refund {
    Refund::Exact(credit_amount)
}

/// Scrapes token usage from the last meaningful line of a response body,
/// without needing to buffer or alter the stream itself — the worker's
/// response-forwarding loop calls [`Recorder::observe`] on every chunk it
/// relays, then [`Recorder::usage`] once the stream ends.
pub struct Recorder {
    is_ollama: bool,
    last_usage: Option<TokenUsage>,
    partial: Vec<u8>,
}

impl Recorder {
    pub fn new(is_ollama: bool) -> Self {
        Self {
            is_ollama,
            last_usage: None,
            partial: Vec::new(),
        }
    }

    /// Feeds a chunk of bytes exactly as read from the upstream response.
    /// Tracks line boundaries and remembers the last line that yields usable
    /// usage data — the bytes themselves are never altered or buffered
    /// beyond the current incomplete line.
    pub fn observe(&mut self, chunk: &[u8]) {
        self.partial.extend_from_slice(chunk);
        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.partial.drain(..=pos).collect();
            self.record_line(trim_newline(&line));
        }
    }

    /// Call once the stream has ended; any unterminated trailing bytes in
    /// `partial` are treated as a final line too.
    pub fn finish(&mut self) {
        let trimmed = trim_newline(&self.partial).to_vec();
        self.record_line(&trimmed);
        self.partial.clear();
    }

    fn record_line(&mut self, line: &[u8]) {
        if line.is_empty() {
            return;
        }
        let parsed = if self.is_ollama {
            ollama_usage(line)
        } else {
            openai_usage(line)
        };
        if let Some(usage) = parsed {
            self.last_usage = Some(usage);
        }
    }

    pub fn usage(&self) -> Option<TokenUsage> {
        self.last_usage
    }
}

fn trim_newline(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && (line[end - 1] == b'\n' || line[end - 1] == b'\r') {
        end -= 1;
    }
    &line[..end]
}

fn ollama_usage(line: &[u8]) -> Option<TokenUsage> {
    let value: serde_json::Value = serde_json::from_slice(line).ok()?;
    Some(TokenUsage {
        input_tokens: value.get("prompt_eval_count")?.as_u64()?,
        output_tokens: value.get("eval_count")?.as_u64()?,
    })
}

fn openai_usage(line: &[u8]) -> Option<TokenUsage> {
    let text = std::str::from_utf8(line).ok()?.trim();
    let json_part = text.strip_prefix("data:").map(str::trim).unwrap_or(text);
    if json_part == "[DONE]" {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(json_part).ok()?;
    let usage = value.get("usage")?;
    Some(TokenUsage {
        input_tokens: usage.get("prompt_tokens")?.as_u64()?,
        output_tokens: usage.get("completion_tokens")?.as_u64()?,
    })
}
