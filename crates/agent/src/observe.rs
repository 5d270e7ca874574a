//! Observe: turn raw input and sense buffers into instant memory.

use mindloop_actions::Action;
use mindloop_actions::builtin::{Associate, Recall};
use mindloop_core::{HistoryEntry, Message, Result, Role};
use mindloop_memory::Senses;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::cycle::{Cycle, CycleState};
use crate::prompts;

/// Placeholder channel used in continuous-thinking mode.
pub const IDLE_CHANNEL: &str = "environment";
pub const IDLE_PERCEPTION: &str = "Nothing in particular catches my attention.";

impl Cycle {
    pub async fn observe(&self, state: &mut CycleState) -> Result<()> {
        if let Some(text) = &state.input {
            self.working_memory.add_message(
                HistoryEntry::chat(Role::User, text.clone()).with_name(self.user.name.clone()),
            );
            self.working_memory
                .write_to_sense("hearing", format!("heard {} say: {text}", self.user.name));
        }

        let mut senses = self.working_memory.read_and_clear_senses();
        if senses.is_empty() && self.continuous_thinking {
            senses.push((IDLE_CHANNEL.into(), vec![IDLE_PERCEPTION.into()]));
        }

        if !senses.is_empty() {
            self.perceive(state, &senses).await?;
        }

        state.latest_perception = self
            .working_memory
            .latest()
            .unwrap_or_else(|| prompts::NO_NEW_PERCEPTION.to_string());
        Ok(())
    }

    /// Summarize senses through the perception model.
    ///
    /// Provider failures propagate. Bad model output only degrades: text
    /// that is not a JSON object becomes the summary, and a failing
    /// sub-lookup falls back to pushing the raw sense lines.
    async fn perceive(&self, state: &mut CycleState, senses: &Senses) -> Result<()> {
        let messages = vec![
            Message::system(prompts::perception_system_prompt(
                &self.persona_prompt(),
                &self.agent_name,
            )),
            Message::user(prompts::perception_user_prompt(senses)),
        ];
        let response = self
            .perception_llm
            .generate_json(
                messages.clone(),
                &self.perception_model.model,
                &self.perception_model.params,
            )
            .await?;
        self.recorder
            .log_perception(&self.user_id, &messages, &response)
            .await;

        let parsed = match serde_json::from_str::<Value>(response.trim()) {
            Ok(Value::Object(map)) => Value::Object(map),
            _ => {
                warn!(user_id = %self.user_id, "Perception output is not a JSON object, using raw text");
                let raw = response.trim();
                if !raw.is_empty() {
                    self.working_memory.add_instant_memory(raw);
                }
                return Ok(());
            }
        };

        if let Err(e) = self.absorb_perception(state, &parsed).await {
            warn!(user_id = %self.user_id, error = %e, "Perception lookups failed, keeping raw senses");
            for (channel, lines) in senses {
                for line in lines {
                    self.working_memory
                        .add_instant_memory(format!("[{channel}] {line}"));
                }
            }
        }
        Ok(())
    }

    async fn absorb_perception(&self, state: &mut CycleState, parsed: &Value) -> Result<()> {
        if let Some(summary) = parsed["summary"].as_str().map(str::trim)
            && !summary.is_empty()
        {
            self.working_memory.add_instant_memory(summary);
        }

        let ctx = self.action_context();

        if let Some(concept) = non_empty(&parsed["association_params"]["concept"]) {
            debug!(user_id = %self.user_id, concept = %concept, "Subconscious association");
            let outcome = Associate
                .execute(&ctx, json!({"concept": concept}).into())
                .await?;
            self.take_lookup(state, outcome, "association");
        }

        if let Some(query) = non_empty(&parsed["recall_params"]["query"]) {
            debug!(user_id = %self.user_id, query = %query, "Subconscious recall");
            let outcome = Recall.execute(&ctx, json!({"query": query}).into()).await?;
            self.take_lookup(state, outcome, "recollection");
        }
        Ok(())
    }

    fn take_lookup(&self, state: &mut CycleState, outcome: mindloop_core::ActionOutcome, tag: &str) {
        if let Some(update) = outcome.state_update {
            state.memories.extend(update.working_memory_append);
        }
        if let Some(message) = outcome.message {
            self.working_memory
                .add_instant_memory(format!("[{tag}] {message}"));
        }
    }
}

fn non_empty(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
