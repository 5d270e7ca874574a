//! Social state — the agent's running model of its relationship with a user.

use serde::{Deserialize, Serialize};

pub const MAX_SOCIAL_SCORE: i64 = 100;

/// `{intimacy, trust, stage, summary}` with both scores clamped to [0, 100].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialState {
    #[serde(default)]
    pub intimacy: i64,
    #[serde(default)]
    pub trust: i64,
    #[serde(default = "default_stage")]
    pub stage: String,
    #[serde(default)]
    pub summary: String,
}

fn default_stage() -> String {
    "stranger".into()
}

impl Default for SocialState {
    fn default() -> Self {
        Self {
            intimacy: 0,
            trust: 0,
            stage: default_stage(),
            summary: "We just met.".into(),
        }
    }
}

impl SocialState {
    pub fn clamped(mut self) -> Self {
        self.intimacy = self.intimacy.clamp(0, MAX_SOCIAL_SCORE);
        self.trust = self.trust.clamp(0, MAX_SOCIAL_SCORE);
        self
    }

    /// Merge a partial update produced by the reasoning step.
    ///
    /// Only recognised fields are applied; scores accept numbers or numeric
    /// strings and are clamped afterwards. Returns whether anything changed.
    pub fn merge(&mut self, patch: &serde_json::Value) -> bool {
        let Some(obj) = patch.as_object() else {
            return false;
        };
        let before = self.clone();

        if let Some(v) = obj.get("intimacy").and_then(as_score) {
            self.intimacy = v;
        }
        if let Some(v) = obj.get("trust").and_then(as_score) {
            self.trust = v;
        }
        if let Some(v) = obj.get("stage").and_then(|v| v.as_str()) {
            self.stage = v.to_string();
        }
        if let Some(v) = obj.get("summary").and_then(|v| v.as_str()) {
            self.summary = v.to_string();
        }

        *self = self.clone().clamped();
        *self != before
    }

    /// Apply relative score changes, clamping the result.
    pub fn adjust(&mut self, intimacy_delta: i64, trust_delta: i64) {
        self.intimacy = self.intimacy.saturating_add(intimacy_delta);
        self.trust = self.trust.saturating_add(trust_delta);
        *self = self.clone().clamped();
    }
}

fn as_score(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_is_a_stranger() {
        let state = SocialState::default();
        assert_eq!(state.stage, "stranger");
        assert_eq!(state.summary, "We just met.");
        assert_eq!(state.intimacy, 0);
    }

    #[test]
    fn merge_is_partial_and_clamped() {
        let mut state = SocialState::default();
        assert!(state.merge(&json!({"intimacy": 250, "stage": "friend"})));
        assert_eq!(state.intimacy, 100);
        assert_eq!(state.trust, 0);
        assert_eq!(state.stage, "friend");
        assert_eq!(state.summary, "We just met.");
    }

    #[test]
    fn merge_accepts_numeric_strings() {
        let mut state = SocialState::default();
        state.merge(&json!({"trust": "42"}));
        assert_eq!(state.trust, 42);
    }

    #[test]
    fn merge_ignores_non_objects() {
        let mut state = SocialState::default();
        assert!(!state.merge(&json!("closer")));
        assert_eq!(state, SocialState::default());
    }

    #[test]
    fn adjust_clamps_both_ends() {
        let mut state = SocialState::default();
        state.adjust(-10, 130);
        assert_eq!(state.intimacy, 0);
        assert_eq!(state.trust, 100);
    }
}
