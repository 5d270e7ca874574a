use async_trait::async_trait;
use mindloop_core::{ActionError, ActionOutcome, ParameterSpec};
use serde_json::json;
use std::time::Duration;

use crate::action::{Action, ActionContext, ActionParams};

/// Longest real pause `daze` will take, whatever duration was asked for.
const MAX_DAZE_SECS: u64 = 5;

/// Say something to the user. The Act stage turns the outcome into a chat
/// message and a streamed response.
pub struct Speak;

#[async_trait]
impl Action for Speak {
    fn name(&self) -> &str {
        "speak"
    }

    fn description(&self) -> &str {
        "Say something out loud to the person you are talking with."
    }

    fn category(&self) -> &str {
        "communication"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::new("content", "what to say")]
    }

    async fn execute(&self, _ctx: &ActionContext, params: ActionParams) -> Result<ActionOutcome, ActionError> {
        let content = params.require(self.name(), "content")?;
        Ok(ActionOutcome::message(content.clone())
            .with_event("speak")
            .with_data(json!(content)))
    }
}

/// Body language and facial expression.
pub struct Express;

#[async_trait]
impl Action for Express {
    fn name(&self) -> &str {
        "express"
    }

    fn description(&self) -> &str {
        "Show body language and a facial expression to make the interaction feel real."
    }

    fn category(&self) -> &str {
        "expression"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("body", "body motion, e.g. wave, nod, idle"),
            ParameterSpec::new("face", "facial expression, e.g. smile, frown, neutral"),
        ]
    }

    async fn execute(&self, ctx: &ActionContext, params: ActionParams) -> Result<ActionOutcome, ActionError> {
        let body = params.str_or("body", "idle");
        let face = params.str_or("face", "neutral");
        Ok(ActionOutcome::message(format!(
            "{} expresses: [body: {body}, face: {face}]",
            ctx.agent_name
        ))
        .with_event("express")
        .with_data(json!({"body": body, "face": face})))
    }
}

pub struct Daze;

#[async_trait]
impl Action for Daze {
    fn name(&self) -> &str {
        "daze"
    }

    fn description(&self) -> &str {
        "Zone out for a while. Use it when there is nothing to do or you want to relax."
    }

    fn category(&self) -> &str {
        "rest"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::new("duration", "seconds to zone out")]
    }

    async fn execute(&self, ctx: &ActionContext, params: ActionParams) -> Result<ActionOutcome, ActionError> {
        let duration = params.int("duration").unwrap_or(5).max(0);
        tokio::time::sleep(Duration::from_secs((duration as u64).min(MAX_DAZE_SECS))).await;
        Ok(
            ActionOutcome::message(format!("{} is zoning out ({duration}s)...", ctx.agent_name))
                .with_event("daze"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::context;

    #[tokio::test]
    async fn speak_echoes_content() {
        let outcome = Speak
            .execute(&context(), json!({"content": "Hello!"}).into())
            .await
            .unwrap();
        assert_eq!(outcome.message.as_deref(), Some("Hello!"));
        assert_eq!(outcome.event.as_deref(), Some("speak"));
        assert_eq!(outcome.data, Some(json!("Hello!")));
    }

    #[tokio::test]
    async fn speak_requires_content() {
        let err = Speak.execute(&context(), ActionParams::default()).await.unwrap_err();
        assert!(matches!(err, ActionError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn express_defaults() {
        let outcome = Express.execute(&context(), ActionParams::default()).await.unwrap();
        assert_eq!(
            outcome.message.as_deref(),
            Some("Alice expresses: [body: idle, face: neutral]")
        );
        assert_eq!(outcome.data, Some(json!({"body": "idle", "face": "neutral"})));
    }

    #[tokio::test(start_paused = true)]
    async fn daze_caps_real_pause() {
        let start = tokio::time::Instant::now();
        let outcome = Daze
            .execute(&context(), json!({"duration": 60}).into())
            .await
            .unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(MAX_DAZE_SECS));
        assert_eq!(outcome.message.as_deref(), Some("Alice is zoning out (60s)..."));
    }
}
