//! Shared types for the term suggester service and the glossary that consumes it.

use serde::{Deserialize, Serialize};

// =====================================================
// RPC Response Types
// =====================================================

/// Envelope the suggester wraps its candidate lists in
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> RpcResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

// =====================================================
// Domain Types
// =====================================================

/// A candidate glossary entry. Goes through the same validation as a
/// user-entered term; there are no extra fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TermCandidate {
    pub text: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TermCandidate {
    pub fn new(text: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            description: description.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_defaults_missing_fields() {
        let c: TermCandidate = serde_json::from_str(r#"{"text":"API"}"#).unwrap();
        assert_eq!(c.text, "API");
        assert_eq!(c.description, "");
        assert!(c.tags.is_empty());
    }

    #[test]
    fn test_candidate_rejects_extra_fields() {
        let result: Result<TermCandidate, _> =
            serde_json::from_str(r#"{"text":"API","reading":"えーぴーあい"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_rpc_response_ok_round_trips_candidates() {
        let resp = RpcResponse::ok(vec![TermCandidate::new("API", "").with_tags(["web"])]);
        let json = serde_json::to_string(&resp).unwrap();
        let back: RpcResponse<Vec<TermCandidate>> = serde_json::from_str(&json).unwrap();
        assert!(back.success);
        assert_eq!(back.data.unwrap()[0].tags, vec!["web"]);
        assert!(back.error.is_none());
    }

    #[test]
    fn test_rpc_response_err_omits_data() {
        let resp: RpcResponse<Vec<TermCandidate>> = RpcResponse::err("model unavailable");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("data").is_none());
        assert_eq!(json["error"], "model unavailable");
    }
}
