//! Wire types exchanged with the embedded web layer.
//!
//! Requests arrive as `{"resources": ["video-capture", ...]}`. Decisions go
//! back tagged by `decision`:
//!
//! ```json
//! {"decision": "grant", "resources": ["video-capture"]}
//! {"decision": "deny"}
//! {"decision": "rejected", "reason": "..."}
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::resource::{MediaResource, parse_web_resources};

/// Capability request as delivered by the web layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebCapabilityRequest {
    /// Raw resource identifiers, possibly including unsupported ones.
    #[serde(default)]
    pub resources: Vec<String>,
}

impl WebCapabilityRequest {
    pub fn new<I, S>(resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resources: resources.into_iter().map(Into::into).collect(),
        }
    }

    /// Supported resources named by this request.
    pub fn media_resources(&self) -> BTreeSet<MediaResource> {
        parse_web_resources(&self.resources)
    }

    /// Raw identifiers whose resource is in `granted`, in request order.
    ///
    /// Grants are echoed back in the caller's own spelling so aliases such as
    /// `android.webkit.resource.VIDEO_CAPTURE` survive the round trip.
    pub fn echo_granted(&self, granted: &BTreeSet<MediaResource>) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.resources
            .iter()
            .filter(|id| {
                MediaResource::from_web_id(id)
                    .is_some_and(|r| granted.contains(&r) && seen.insert(r))
            })
            .cloned()
            .collect()
    }
}

/// Decision delivered back to the web layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "lowercase")]
pub enum WebDecision {
    /// Enable exactly these resources.
    Grant { resources: Vec<String> },
    /// Enable nothing.
    Deny,
    /// Another authorization is in flight; the caller may retry later.
    Rejected { reason: String },
}

impl WebDecision {
    pub const fn is_grant(&self) -> bool {
        matches!(self, Self::Grant { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_request_json() {
        let req: WebCapabilityRequest =
            serde_json::from_str(r#"{"resources":["video-capture","midi-sysex"]}"#).unwrap();
        assert_eq!(req.resources.len(), 2);
        assert_eq!(
            req.media_resources(),
            BTreeSet::from([MediaResource::VideoCapture])
        );
    }

    #[test]
    fn missing_resources_field_is_empty() {
        let req: WebCapabilityRequest = serde_json::from_str("{}").unwrap();
        assert!(req.media_resources().is_empty());
    }

    #[test]
    fn echo_uses_caller_spelling() {
        let req = WebCapabilityRequest::new([
            "android.webkit.resource.VIDEO_CAPTURE",
            "audio-capture",
        ]);
        let echoed = req.echo_granted(&BTreeSet::from([MediaResource::VideoCapture]));
        assert_eq!(echoed, vec!["android.webkit.resource.VIDEO_CAPTURE".to_string()]);
    }

    #[test]
    fn echo_skips_duplicates() {
        let req = WebCapabilityRequest::new([
            "video-capture",
            "android.webkit.resource.VIDEO_CAPTURE",
        ]);
        let echoed = req.echo_granted(&BTreeSet::from([MediaResource::VideoCapture]));
        assert_eq!(echoed, vec!["video-capture".to_string()]);
    }

    #[test]
    fn decision_json_shape() {
        let grant = WebDecision::Grant {
            resources: vec!["audio-capture".to_string()],
        };
        assert_eq!(
            serde_json::to_string(&grant).unwrap(),
            r#"{"decision":"grant","resources":["audio-capture"]}"#
        );
        assert_eq!(
            serde_json::to_string(&WebDecision::Deny).unwrap(),
            r#"{"decision":"deny"}"#
        );
    }
}
