use async_trait::async_trait;
use mindloop_core::{ActionError, ActionOutcome, ParameterSpec, StateUpdate};
use serde_json::json;

use crate::action::{Action, ActionContext, ActionParams};

/// Apply relative changes to the relationship and record a new snapshot.
pub struct UpdateRelationship;

#[async_trait]
impl Action for UpdateRelationship {
    fn name(&self) -> &str {
        "update_relationship"
    }

    fn description(&self) -> &str {
        "Update how you see your relationship when something important changes between you."
    }

    fn category(&self) -> &str {
        "social"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::new("intimacy_change", "change in intimacy (+/- integer)"),
            ParameterSpec::new("trust_change", "change in trust (+/- integer)"),
            ParameterSpec::new("new_stage", "new relationship stage (optional)"),
            ParameterSpec::new("summary", "short summary of the relationship"),
        ]
    }

    async fn execute(&self, ctx: &ActionContext, params: ActionParams) -> Result<ActionOutcome, ActionError> {
        let failed = |e: mindloop_core::MemoryError| ActionError::failed("update_relationship", e.to_string());

        let mut state = ctx.memory.social_state(&ctx.user_id).await.map_err(failed)?;
        state.adjust(
            params.int("intimacy_change").unwrap_or(0),
            params.int("trust_change").unwrap_or(0),
        );
        if let Some(stage) = params.str("new_stage") {
            state.stage = stage;
        }
        if let Some(summary) = params.str("summary") {
            state.summary = summary;
        }
        ctx.memory
            .update_social_state(&ctx.user_id, &state)
            .await
            .map_err(failed)?;

        Ok(ActionOutcome::message(format!(
            "{} feels your relationship has changed ({})...",
            ctx.agent_name, state.stage
        ))
        .with_event("relationship_update")
        .with_data(json!(state))
        .with_state_update(StateUpdate {
            social_state: Some(state),
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::context;

    #[tokio::test]
    async fn deltas_accumulate_and_clamp() {
        let ctx = context();
        UpdateRelationship
            .execute(&ctx, json!({"intimacy_change": 10, "trust_change": "5"}).into())
            .await
            .unwrap();
        let outcome = UpdateRelationship
            .execute(
                &ctx,
                json!({"intimacy_change": 200, "trust_change": -50, "new_stage": "friend", "summary": "Close now."})
                    .into(),
            )
            .await
            .unwrap();

        let state = ctx.memory.social_state("u1").await.unwrap();
        assert_eq!(state.intimacy, 100);
        assert_eq!(state.trust, 0);
        assert_eq!(state.stage, "friend");
        assert_eq!(outcome.event.as_deref(), Some("relationship_update"));
        assert_eq!(outcome.state_update.unwrap().social_state.unwrap(), state);
    }

    #[tokio::test]
    async fn missing_stage_keeps_current() {
        let ctx = context();
        let outcome = UpdateRelationship
            .execute(&ctx, json!({"trust_change": 3}).into())
            .await
            .unwrap();
        assert_eq!(outcome.data.unwrap()["stage"], "stranger");
    }
}
