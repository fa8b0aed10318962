//
// Copyright (c) 2026 Confsec Contributors
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: confsec-node — confidential-compute inference node.
//

//! The four validated plaintext request schemas, selected by URL path, and
//! the stable validation-error taxonomy they share with the rest of the
//! worker's validation pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One validation-error code per row of the policy-failure taxonomy. The
/// variant name *is* the `code` field of the JSON error body returned to the
/// client inside the encrypted envelope — these strings are a stable contract
/// and must not be renamed casually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unsupported path")]
    ErrUnsupportedPath,
    #[error("method not allowed")]
    ErrInvalidMethod,
    #[error("query parameters not allowed")]
    ErrQueryParamsPresent,
    #[error("request URI does not match the cleaned path")]
    ErrPathMismatch,
    #[error("chunked transfer-encoding not allowed")]
    ErrTransferEncodingNotAllowed,
    #[error("blocked header present")]
    ErrBlockedHeaderPresent,
    #[error("header value too large")]
    ErrHeaderTooLarge,
    #[error("unexpected content-type")]
    ErrInvalidContentType,
    #[error("hostname does not match the fixed unroutable hostname")]
    ErrInvalidHostname,
    #[error("badge header missing")]
    ErrBadgeMissing,
    #[error("badge signature invalid")]
    ErrInvalidBadge,
    #[error("request body too large")]
    ErrBodyTooLarge,
    #[error("content-length does not match the bytes read")]
    ErrContentLengthMismatch,
    #[error("request body is not valid JSON")]
    ErrInvalidJson,
    #[error("request body has trailing data after the JSON value")]
    ErrExtraJsonData,
    #[error("required field missing")]
    ErrMissingField,
    #[error("model not permitted")]
    ErrUnsupportedModel,
}

impl ValidationError {
    /// Stable code string, identical to the variant name.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ErrUnsupportedPath => "ErrUnsupportedPath",
            Self::ErrInvalidMethod => "ErrInvalidMethod",
            Self::ErrQueryParamsPresent => "ErrQueryParamsPresent",
            Self::ErrPathMismatch => "ErrPathMismatch",
            Self::ErrTransferEncodingNotAllowed => "ErrTransferEncodingNotAllowed",
            Self::ErrBlockedHeaderPresent => "ErrBlockedHeaderPresent",
            Self::ErrHeaderTooLarge => "ErrHeaderTooLarge",
            Self::ErrInvalidContentType => "ErrInvalidContentType",
            Self::ErrInvalidHostname => "ErrInvalidHostname",
            Self::ErrBadgeMissing => "ErrBadgeMissing",
            Self::ErrInvalidBadge => "ErrInvalidBadge",
            Self::ErrBodyTooLarge => "ErrBodyTooLarge",
            Self::ErrContentLengthMismatch => "ErrContentLengthMismatch",
            Self::ErrInvalidJson => "ErrInvalidJson",
            Self::ErrExtraJsonData => "ErrExtraJsonData",
            Self::ErrMissingField => "ErrMissingField",
            Self::ErrUnsupportedModel => "ErrUnsupportedModel",
        }
    }

    /// `ErrUnsupportedPath` maps to 404; every other code maps to 400.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ErrUnsupportedPath => 404,
            _ => 400,
        }
    }
}

/// The JSON body returned to the client, inside the encrypted envelope, on a
/// validation failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub error: String,
    pub message: String,
}

impl From<ValidationError> for ErrorBody {
    fn from(e: ValidationError) -> Self {
        Self {
            code: e.code().to_string(),
            error: e.to_string(),
            message: e.to_string(),
        }
    }
}

/// Result of a successful validation pass: the resolved model name and
/// whether the validator rewrote the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOutcome {
    pub model: String,
    pub mutated: bool,
}

/// Implemented by every request schema. `validate` checks required fields and
/// model permission, and mutates `self` in place when the schema needs to
/// force a field (streaming OpenAI requests need `stream_options.include_usage`).
pub trait ValidateRequest {
    fn validate(
        &mut self,
        permitted_models: &[String],
        badge_models: &[String],
    ) -> Result<ValidatedOutcome, ValidationError>;
}

fn check_model(
    model: &str,
    permitted_models: &[String],
    badge_models: &[String],
) -> Result<(), ValidationError> {
    if model.is_empty() {
        return Err(ValidationError::ErrMissingField);
    }
    let in_config = permitted_models.iter().any(|m| m == model);
    let in_badge = badge_models.iter().any(|m| m == model);
    if in_config && in_badge {
        Ok(())
    } else {
        Err(ValidationError::ErrUnsupportedModel)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OllamaGenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

impl ValidateRequest for OllamaGenerateRequest {
    fn validate(
        &mut self,
        permitted_models: &[String],
        badge_models: &[String],
    ) -> Result<ValidatedOutcome, ValidationError> {
        if self.prompt.is_empty() {
            return Err(ValidationError::ErrMissingField);
        }
        check_model(&self.model, permitted_models, badge_models)?;
        Ok(ValidatedOutcome {
            model: self.model.clone(),
            mutated: false,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

impl ValidateRequest for OllamaChatRequest {
    fn validate(
        &mut self,
        permitted_models: &[String],
        badge_models: &[String],
    ) -> Result<ValidatedOutcome, ValidationError> {
        if self.messages.is_empty() {
            return Err(ValidationError::ErrMissingField);
        }
        check_model(&self.model, permitted_models, badge_models)?;
        Ok(ValidatedOutcome {
            model: self.model.clone(),
            mutated: false,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StreamOptions {
    #[serde(default)]
    pub include_usage: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiCompletionsRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

impl ValidateRequest for OpenAiCompletionsRequest {
    fn validate(
        &mut self,
        permitted_models: &[String],
        badge_models: &[String],
    ) -> Result<ValidatedOutcome, ValidationError> {
        if self.prompt.is_empty() {
            return Err(ValidationError::ErrMissingField);
        }
        check_model(&self.model, permitted_models, badge_models)?;
        let mutated = force_include_usage(self.stream, &mut self.stream_options);
        Ok(ValidatedOutcome {
            model: self.model.clone(),
            mutated,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

impl ValidateRequest for OpenAiChatRequest {
    fn validate(
        &mut self,
        permitted_models: &[String],
        badge_models: &[String],
    ) -> Result<ValidatedOutcome, ValidationError> {
        if self.messages.is_empty() {
            return Err(ValidationError::ErrMissingField);
        }
        check_model(&self.model, permitted_models, badge_models)?;
        let mutated = force_include_usage(self.stream, &mut self.stream_options);
        Ok(ValidatedOutcome {
            model: self.model.clone(),
            mutated,
        })
    }
}

/// Streaming OpenAI requests need `stream_options.include_usage = true` so the
/// refund recorder can read the trailing `usage` object; this forces it and
/// reports whether the body changed. Requests with no `stream_options` at all
/// and requests with `include_usage: false` both end up identical — both get
/// mutated to `true`.
fn force_include_usage(stream: Option<bool>, stream_options: &mut Option<StreamOptions>) -> bool {
    if stream != Some(true) {
        return false;
    }
    match stream_options {
        Some(opts) if opts.include_usage => false,
        Some(opts) => {
            opts.include_usage = true;
            true
        }
        None => {
            *stream_options = Some(StreamOptions { include_usage: true });
            true
        }
    }
}

/// The four request paths the worker accepts; anything else is
/// `ErrUnsupportedPath`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPath {
    OllamaGenerate,
    OllamaChat,
    OpenAiCompletions,
    OpenAiChat,
}

impl RequestPath {
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/api/generate" => Some(Self::OllamaGenerate),
            "/api/chat" => Some(Self::OllamaChat),
            "/v1/completions" => Some(Self::OpenAiCompletions),
            "/v1/chat/completions" => Some(Self::OpenAiChat),
            _ => None,
        }
    }

    pub fn is_ollama(&self) -> bool {
        matches!(self, Self::OllamaGenerate | Self::OllamaChat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_are_rejected() {
        let raw = r#"{"model":"llama3.2:1b","prompt":"hi","bogus":true}"#;
        let err = serde_json::from_str::<OllamaGenerateRequest>(raw).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn model_must_be_in_both_lists() {
        let permitted = vec!["llama3.2:1b".to_string()];
        let badge = vec!["phi3:mini".to_string()];
        let mut req = OllamaGenerateRequest {
            model: "llama3.2:1b".into(),
            prompt: "hi".into(),
            stream: None,
            raw: None,
            images: None,
            options: None,
        };
        assert_eq!(
            req.validate(&permitted, &badge),
            Err(ValidationError::ErrUnsupportedModel)
        );
    }

    #[test]
    fn happy_path_ollama_generate() {
        let permitted = vec!["llama3.2:1b".to_string()];
        let mut req = OllamaGenerateRequest {
            model: "llama3.2:1b".into(),
            prompt: "hi".into(),
            stream: None,
            raw: None,
            images: None,
            options: None,
        };
        let outcome = req.validate(&permitted, &permitted).unwrap();
        assert_eq!(outcome.model, "llama3.2:1b");
        assert!(!outcome.mutated);
    }

    #[test]
    fn streaming_openai_without_stream_options_is_mutated() {
        let permitted = vec!["gpt-test".to_string()];
        let mut a = OpenAiChatRequest {
            model: "gpt-test".into(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content: "hi".into(),
            }],
            max_tokens: None,
            temperature: None,
            stream: Some(true),
            stream_options: None,
        };
        let mut b = a.clone();
        b.stream_options = Some(StreamOptions {
            include_usage: false,
        });

        let outcome_a = a.validate(&permitted, &permitted).unwrap();
        let outcome_b = b.validate(&permitted, &permitted).unwrap();

        assert!(outcome_a.mutated);
        assert!(outcome_b.mutated);
        assert_eq!(a.stream_options, b.stream_options);
        assert!(a.stream_options.unwrap().include_usage);
    }

    #[test]
    fn non_streaming_openai_is_not_mutated() {
        let permitted = vec!["gpt-test".to_string()];
        let mut req = OpenAiCompletionsRequest {
            model: "gpt-test".into(),
            prompt: "hi".into(),
            max_tokens: None,
            temperature: None,
            stream: None,
            stream_options: None,
        };
        let outcome = req.validate(&permitted, &permitted).unwrap();
        assert!(!outcome.mutated);
    }

    #[test]
    fn error_code_http_status_mapping() {
        assert_eq!(ValidationError::ErrUnsupportedPath.http_status(), 404);
        assert_eq!(ValidationError::ErrUnsupportedModel.http_status(), 400);
        assert_eq!(ValidationError::ErrUnsupportedModel.code(), "ErrUnsupportedModel");
    }

    #[test]
    fn request_path_matches_permitted_set() {
        assert_eq!(
            RequestPath::from_path("/api/generate"),
            Some(RequestPath::OllamaGenerate)
        );
        assert_eq!(RequestPath::from_path("/nope"), None);
    }
}
