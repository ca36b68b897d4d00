//! Canonical records shared by the gateway, the normaliser and the
//! conversation store. Everything here serialises in the camelCase shape the
//! rendering layer consumes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// Active provider selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Retrieval-augmented answers from the local knowledge base.
    #[default]
    Local,
    /// Free-form answers from the cloud LLM proxy.
    Cloud,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
        }
    }

    /// Label shown next to assistant messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Local => "Local RAG",
            Self::Cloud => "GPT-4",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "cloud" => Ok(Self::Cloud),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Coarse quality label attached to some local replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parse a backend label. Labels outside the known set (the backend also
    /// emits `"none"`) read as absent.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    /// Lenient serde adapter for optional confidence labels.
    pub(crate) fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<Self>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
        Ok(raw
            .as_ref()
            .and_then(|v| v.as_str())
            .and_then(Self::from_label))
    }
}

/// One entry of the conversation log. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: u64,
    pub role: Role,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Mode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
}

impl Message {
    pub(crate) fn user(id: u64, content: String) -> Self {
        Self {
            id,
            role: Role::User,
            content,
            timestamp: OffsetDateTime::now_utc(),
            source: None,
            confidence: None,
            similarity_score: None,
        }
    }

    pub(crate) fn assistant(id: u64, reply: AssistantReply) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: reply.content,
            timestamp: OffsetDateTime::now_utc(),
            source: Some(reply.source),
            confidence: reply.confidence,
            similarity_score: reply.similarity_score,
        }
    }
}

/// Provider-independent reply produced by the normaliser.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantReply {
    pub content: String,
    pub source: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
}

/// Read-only view handed to the rendering layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSnapshot {
    pub messages: Vec<Message>,
    pub mode: Mode,
    pub is_loading: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Cloud".parse::<Mode>(), Ok(Mode::Cloud));
        assert_eq!(" local ".parse::<Mode>(), Ok(Mode::Local));
        assert!("remote".parse::<Mode>().is_err());
    }

    #[test]
    fn confidence_ignores_unknown_labels() {
        assert_eq!(Confidence::from_label("HIGH"), Some(Confidence::High));
        assert_eq!(Confidence::from_label("none"), None);
    }

    #[test]
    fn assistant_message_serialises_in_camel_case() {
        let reply = AssistantReply {
            content: "Paris".into(),
            source: Mode::Local,
            confidence: Some(Confidence::High),
            similarity_score: Some(0.75),
        };
        let value = serde_json::to_value(Message::assistant(7, reply)).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["source"], "local");
        assert_eq!(value["confidence"], "high");
        assert_eq!(value["similarityScore"], 0.75);
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn user_message_omits_provider_fields() {
        let value = serde_json::to_value(Message::user(1, "hi".into())).unwrap();
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("source"));
        assert!(!obj.contains_key("confidence"));
        assert!(!obj.contains_key("similarityScore"));
    }
}
