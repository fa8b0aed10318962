//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! The `simulated` diagnostic responder: streams a random number of
//! pseudo-tokens at a randomised per-token delay, load-shaping a real LLM's
//! response timing without calling one.

use std::time::Duration;

use futures_util::stream;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};

use confsec_types::refund::{RefundRates, TokenUsage};

use super::{DiagnosticBody, DiagnosticResponse};

/// Average inter-token delay the simulator centers its per-token jitter on.
/// Not pinned by the source this was distilled from; chosen to resemble a
/// small local model's real token cadence.
const AVG_DELAY: Duration = Duration::from_millis(50);

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

fn pseudo_token(rng: &mut impl Rng) -> String {
    let len = rng.gen_range(3..=5);
    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

pub fn simulated(credit_amount: i64, rates: &RefundRates) -> DiagnosticResponse {
    let mut rng = StdRng::from_entropy();

    let max_tokens = ((credit_amount as f64 / rates.output_multiplier).floor() as i64).max(0) as u64;
    let token_count = if rng.gen_bool(0.10) {
        max_tokens
    } else if max_tokens == 0 {
        0
    } else {
        rng.gen_range(0..max_tokens)
    };

    let delay_distribution = Uniform::new(AVG_DELAY.as_secs_f64() / 2.0, AVG_DELAY.as_secs_f64() * 1.5);

    let lines = stream::unfold((0u64, rng), move |(emitted, mut rng)| async move {
        if emitted >= token_count {
            return None;
        }
        let delay = delay_distribution.sample(&mut rng);
        tokio::time::sleep(Duration::from_secs_f64(delay)).await;
        let token = pseudo_token(&mut rng);
        let mut line = serde_json::to_vec(&serde_json::json!({
            "response": token,
            "done": false,
        }))
        .unwrap_or_default();
        line.push(b'\n');
        Some((line, (emitted + 1, rng)))
    });

    let terminator = async move {
        let mut line = serde_json::to_vec(&serde_json::json!({
            "response": "",
            "done": true,
            "prompt_eval_count": 0,
            "eval_count": token_count,
        }))
        .unwrap_or_default();
        line.push(b'\n');
        line
    };

    let body = lines.chain(stream::once(terminator));

    DiagnosticResponse {
        status: 200,
        content_type: "application/x-ndjson",
        body: DiagnosticBody::Stream(Box::pin(body)),
        usage: Some(TokenUsage {
            input_tokens: 0,
            output_tokens: token_count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pseudo_token_length_is_always_three_to_five_chars() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let t = pseudo_token(&mut rng);
            assert!((3..=5).contains(&t.len()));
        }
    }

    #[test]
    fn max_token_count_is_credit_amount_over_output_multiplier() {
        let rates = RefundRates::default();
        let resp = simulated(200, &rates);
        let usage = resp.usage.unwrap();
        assert!(usage.output_tokens <= 100);
    }

    #[test]
    fn zero_credit_never_emits_tokens() {
        let rates = RefundRates::default();
        let resp = simulated(0, &rates);
        assert_eq!(resp.usage.unwrap().output_tokens, 0);
    }
}
