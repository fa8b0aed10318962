//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! Post-auth body validator: size cap, strict JSON decoding (no trailing
//! data, no unknown fields), and the per-schema `ValidateRequest` pass.

use confsec_types::schema::{
    OllamaChatRequest, OllamaGenerateRequest, OpenAiChatRequest, OpenAiCompletionsRequest,
    RequestPath, ValidateRequest, ValidationError,
};
use serde::Deserialize;

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Runs the post-auth body validator and returns the resolved model name plus
/// the (possibly re-marshaled) body bytes to forward downstream.
pub fn validate(
    path: RequestPath,
    body: &[u8],
    content_length: Option<&str>,
    permitted_models: &[String],
    badge_models: &[String],
) -> Result<(String, Vec<u8>), ValidationError> {
    if body.len() > MAX_BODY_BYTES {
        return Err(ValidationError::ErrBodyTooLarge);
    }

    if let Some(declared) = content_length {
        let declared: usize = declared
            .parse()
            .map_err(|_| ValidationError::ErrContentLengthMismatch)?;
        if declared != body.len() {
            return Err(ValidationError::ErrContentLengthMismatch);
        }
    }

    let value = single_json_value(body)?;

    match path {
        RequestPath::OllamaGenerate => {
            dispatch::<OllamaGenerateRequest>(value, permitted_models, badge_models)
        }
        RequestPath::OllamaChat => {
            dispatch::<OllamaChatRequest>(value, permitted_models, badge_models)
        }
        RequestPath::OpenAiCompletions => {
            dispatch::<OpenAiCompletionsRequest>(value, permitted_models, badge_models)
        }
        RequestPath::OpenAiChat => {
            dispatch::<OpenAiChatRequest>(value, permitted_models, badge_models)
        }
    }
}

fn dispatch<T>(
    value: serde_json::Value,
    permitted_models: &[String],
    badge_models: &[String],
) -> Result<(String, Vec<u8>), ValidationError>
where
    T: ValidateRequest + serde::Serialize + serde::de::DeserializeOwned,
{
    let mut req: T = serde_json::from_value(value).map_err(|_| ValidationError::ErrInvalidJson)?;
    let outcome = req.validate(permitted_models, badge_models)?;
    let body = serde_json::to_vec(&req).map_err(|_| ValidationError::ErrInvalidJson)?;
    Ok((outcome.model, body))
}

/// Parses exactly one JSON value from `body`, rejecting any non-whitespace
/// bytes left over afterwards.
fn single_json_value(body: &[u8]) -> Result<serde_json::Value, ValidationError> {
    let mut de = serde_json::Deserializer::from_slice(body);
    let value =
        serde_json::Value::deserialize(&mut de).map_err(|_| ValidationError::ErrInvalidJson)?;
    let offset = de.byte_offset();
    if body[offset..].iter().any(|b| !b.is_ascii_whitespace()) {
        return Err(ValidationError::ErrExtraJsonData);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_bodies() {
        let body = vec![b'a'; MAX_BODY_BYTES + 1];
        assert_eq!(
            validate(RequestPath::OllamaGenerate, &body, None, &[], &[]),
            Err(ValidationError::ErrBodyTooLarge)
        );
    }

    #[test]
    fn rejects_trailing_json_data() {
        let body = br#"{"model":"m","prompt":"hi"}garbage"#;
        assert_eq!(
            validate(RequestPath::OllamaGenerate, body, None, &[], &[]),
            Err(ValidationError::ErrExtraJsonData)
        );
    }

    #[test]
    fn rejects_unknown_fields() {
        let body = br#"{"model":"m","prompt":"hi","bogus":1}"#;
        assert_eq!(
            validate(RequestPath::OllamaGenerate, body, None, &[], &[]),
            Err(ValidationError::ErrInvalidJson)
        );
    }

    #[test]
    fn rejects_content_length_mismatch() {
        let body = br#"{"model":"m","prompt":"hi"}"#;
        assert_eq!(
            validate(RequestPath::OllamaGenerate, body, Some("999"), &[], &[]),
            Err(ValidationError::ErrContentLengthMismatch)
        );
    }

    #[test]
    fn accepts_matching_content_length() {
        let permitted = vec!["llama3.2:1b".to_string()];
        let body = br#"{"model":"llama3.2:1b","prompt":"hi"}"#;
        let declared = body.len().to_string();
        let (model, _) = validate(
            RequestPath::OllamaGenerate,
            body,
            Some(&declared),
            &permitted,
            &permitted,
        )
        .unwrap();
        assert_eq!(model, "llama3.2:1b");
    }

    #[test]
    fn happy_path_resolves_model_and_keeps_body_stable() {
        let permitted = vec!["llama3.2:1b".to_string()];
        let body = br#"{"model":"llama3.2:1b","prompt":"hi"}"#;
        let (model, out) =
            validate(RequestPath::OllamaGenerate, body, None, &permitted, &permitted).unwrap();
        assert_eq!(model, "llama3.2:1b");
        let round_tripped: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(round_tripped["model"], "llama3.2:1b");
    }

    #[test]
    fn streaming_openai_chat_is_remarshaled_with_include_usage() {
        let permitted = vec!["gpt-test".to_string()];
        let body = br#"{"model":"gpt-test","messages":[{"role":"user","content":"hi"}],"stream":true}"#;
        let (model, out) =
            validate(RequestPath::OpenAiChat, body, None, &permitted, &permitted).unwrap();
        assert_eq!(model, "gpt-test");
        let round_tripped: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(round_tripped["stream_options"]["include_usage"], true);
    }
}
