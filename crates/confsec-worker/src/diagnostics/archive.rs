//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! `diagnostic-<name>` responders: canned bodies baked into the binary at
//! build time. Each named entry is a directory holding a `response.json`
//! template; the two "extra-long" entries are synthesised at request time to
//! exactly 1 MiB rather than shipping a megabyte-sized asset.

use std::time::Duration;

use futures_util::stream;
use include_dir::{include_dir, Dir};

use super::{DiagnosticBody, DiagnosticResponse};

static DIAGNOSTICS: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/../../assets/diagnostics");

const ONE_MIB: usize = 1024 * 1024;

fn response_json(name: &str) -> Option<serde_json::Value> {
    let dir = DIAGNOSTICS.get_dir(name)?;
    let file = dir.get_file(format!("{name}/response.json"))?;
    serde_json::from_slice(file.contents()).ok()
}

pub fn diagnostic_named(name: &str) -> DiagnosticResponse {
    match name {
        "no-stream-extra-long" => no_stream_extra_long(),
        "stream-extra-long" => stream_extra_long(),
        other => match response_json(other) {
            Some(tpl) => canned(&tpl),
            None => DiagnosticResponse {
                status: 400,
                content_type: "application/json",
                body: DiagnosticBody::Buffered(Vec::new()),
                usage: None,
            },
        },
    }
}

fn canned(tpl: &serde_json::Value) -> DiagnosticResponse {
    let status = tpl.get("status").and_then(|v| v.as_u64()).unwrap_or(200) as u16;
    let body = tpl
        .get("body")
        .cloned()
        .unwrap_or_else(|| tpl.clone());
    DiagnosticResponse {
        status,
        content_type: "application/json",
        body: DiagnosticBody::Buffered(serde_json::to_vec(&body).unwrap_or_default()),
        usage: None,
    }
}

/// A single JSON body padded to exactly 1 MiB via a filler field.
fn no_stream_extra_long() -> DiagnosticResponse {
    let mut obj = serde_json::json!({
        "model": "diagnostic",
        "response": "",
        "done": true,
        "prompt_eval_count": 1,
        "eval_count": 4,
    });

    let overhead = serde_json::to_vec(&obj).unwrap_or_default().len();
    let pad_len = ONE_MIB.saturating_sub(overhead);
    obj["response"] = serde_json::Value::String("x".repeat(pad_len));

    let mut body = serde_json::to_vec(&obj).unwrap_or_default();
    // `to_vec` of the padded value may differ slightly in length from the
    // estimate above (escaping is a no-op for `x`, so this is exact padding
    // in practice, but never assume it without a final trim/pad pass).
    if body.len() < ONE_MIB {
        let short = ONE_MIB - body.len();
        body.extend(std::iter::repeat(b' ').take(short));
    } else {
        body.truncate(ONE_MIB);
    }

    DiagnosticResponse {
        status: 200,
        content_type: "application/json",
        body: DiagnosticBody::Buffered(body),
        usage: None,
    }
}

/// One 90-byte NDJSON line every 15ms until the running total reaches 1 MiB.
fn stream_extra_long() -> DiagnosticResponse {
    const LINE_BYTES: usize = 90;
    const LINE_DELAY: Duration = Duration::from_millis(15);
    let total_lines = ONE_MIB / LINE_BYTES;

    let lines = stream::unfold(0usize, move |emitted| async move {
        if emitted >= total_lines {
            return None;
        }
        tokio::time::sleep(LINE_DELAY).await;
        let mut line = pad_ndjson_line(emitted, LINE_BYTES);
        line.push(b'\n');
        Some((line, emitted + 1))
    });

    DiagnosticResponse {
        status: 200,
        content_type: "application/x-ndjson",
        body: DiagnosticBody::Stream(Box::pin(lines)),
        usage: None,
    }
}

/// Builds one NDJSON line of exactly `target_len` bytes (including the
/// trailing pad, excluding the newline the caller appends).
fn pad_ndjson_line(seq: usize, target_len: usize) -> Vec<u8> {
    let mut obj = serde_json::json!({ "response": "", "seq": seq, "done": false });
    let overhead = serde_json::to_vec(&obj).unwrap_or_default().len();
    let pad_len = target_len.saturating_sub(overhead);
    obj["response"] = serde_json::Value::String("t".repeat(pad_len));
    let mut bytes = serde_json::to_vec(&obj).unwrap_or_default();
    if bytes.len() < target_len {
        bytes.extend(std::iter::repeat(b' ').take(target_len - bytes.len()));
    } else {
        bytes.truncate(target_len);
    }
    bytes
}
