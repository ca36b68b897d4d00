//! Maps provider-specific payloads (or transport failures) onto a single
//! [`AssistantReply`]. The mapping is total: every input yields displayable
//! content.

use super::gateway::{CloudPayload, LocalPayload, RawPayload, RawResult};
use crate::errors::TransportError;
use crate::models::{AssistantReply, Mode};

pub const NO_MATCH_TEXT: &str = "No matching information found in the knowledge base.";
pub const CLOUD_FAILURE_TEXT: &str = "Sorry, failed to get a response from the Cloud API.";
pub const EMPTY_REPLY_TEXT: &str = "Unable to generate a response. Please try again.";
pub const CONNECTION_ERROR_PREFIX: &str = "Connection Error: ";

/// Resolve the reply for `mode` from the outcome of a gateway call.
///
/// `source` is always `mode`. Confidence and similarity are only carried for
/// local replies.
pub fn normalize(mode: Mode, raw: &RawResult) -> AssistantReply {
    let mut reply = match raw {
        Ok(RawPayload::Local(payload)) => from_local(payload),
        Ok(RawPayload::Cloud(payload)) => from_cloud(payload),
        Err(err) => from_transport(err),
    };
    reply.source = mode;
    if mode != Mode::Local {
        reply.confidence = None;
        reply.similarity_score = None;
    }
    if reply.content.trim().is_empty() {
        reply.content = EMPTY_REPLY_TEXT.to_string();
    }
    reply
}

fn from_local(payload: &LocalPayload) -> AssistantReply {
    let content = non_blank(payload.answer.as_deref())
        .or_else(|| non_blank(payload.retrieved_text.as_deref()))
        .map(str::to_string)
        .or_else(|| {
            present(payload.error.as_deref()).map(|error| format!("Error: {error}"))
        })
        .unwrap_or_else(|| NO_MATCH_TEXT.to_string());

    AssistantReply {
        content,
        source: Mode::Local,
        confidence: payload.confidence,
        similarity_score: payload.similarity_score,
    }
}

fn from_cloud(payload: &CloudPayload) -> AssistantReply {
    // `success` is informational only; a present response always wins.
    let content = present(payload.response.as_deref())
        .unwrap_or(CLOUD_FAILURE_TEXT)
        .to_string();
    AssistantReply {
        content,
        source: Mode::Cloud,
        confidence: None,
        similarity_score: None,
    }
}

fn from_transport(err: &TransportError) -> AssistantReply {
    AssistantReply {
        content: format!("{CONNECTION_ERROR_PREFIX}{}", err.detail()),
        source: Mode::Local,
        confidence: None,
        similarity_score: None,
    }
}

/// Trimmed value, if anything is left after trimming.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Untouched value, if it is not the empty string.
fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
