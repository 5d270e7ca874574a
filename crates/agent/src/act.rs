//! Act: run the decided queue and feed every result back into the agent.

use async_trait::async_trait;
use mindloop_actions::ExecutionHooks;
use mindloop_core::{
    ActionOutcome, ActionQueueItem, ActionStatus, AgentEvent, HistoryEntry, MemoryRecord,
    PersonaUpdate, Role,
};
use serde_json::Value;
use tracing::debug;

use crate::cycle::{Cycle, CycleState};

const MAX_LISTED_RECORDS: usize = 3;
const MAX_LINKS: usize = 5;
const MAX_CONTENT_CHARS: usize = 1000;

impl Cycle {
    pub async fn act(&self, state: &mut CycleState) {
        // Observers get the full persona every tick, queue or not.
        self.bus.publish(AgentEvent::state(&self.persona.get_state()));

        if state.action_queue.is_empty() {
            return;
        }
        self.bus.publish(AgentEvent::ActionQueueUpdate {
            data: state.action_queue.clone(),
        });

        let ctx = self.action_context();
        let mut hooks = ActHooks {
            cycle: self,
            memories: &mut state.memories,
        };
        state.results = self
            .executor
            .execute_queue(&mut state.action_queue, &ctx, &mut hooks)
            .await;
    }
}

/// Publishes queue progress and applies each outcome as soon as it lands,
/// so later items in the same queue see the effects of earlier ones.
struct ActHooks<'a> {
    cycle: &'a Cycle,
    memories: &'a mut Vec<MemoryRecord>,
}

#[async_trait]
impl ExecutionHooks for ActHooks<'_> {
    async fn before_execute(&mut self, queue: &[ActionQueueItem], _index: usize) {
        self.cycle.bus.publish(AgentEvent::ActionQueueUpdate {
            data: queue.to_vec(),
        });
    }

    async fn after_execute(&mut self, queue: &[ActionQueueItem], index: usize) {
        let item = &queue[index];
        let outcome = item.result.clone().unwrap_or_default();
        let wm = &self.cycle.working_memory;
        let bus = &self.cycle.bus;

        // Speech and thinking are already visible elsewhere; everything else
        // is fed back so the next Observe re-ingests it.
        if item.status == ActionStatus::Completed && !is_speak(&item.name) && !is_think(&item.name) {
            let summary = result_summary(&item.name, &outcome);
            wm.add_instant_memory(self_note(&item.name, &outcome, &summary));
            for channel in sense_channels(&item.name) {
                wm.write_to_sense(channel, format!("feedback from {}: {summary}", item.name));
            }
        }

        if is_speak(&item.name) {
            match (&outcome.error, &outcome.message) {
                (Some(error), _) => {
                    wm.add_event(
                        "action_error",
                        format!("Failed to speak: {error}"),
                        serde_json::to_value(&outcome).ok(),
                    );
                    bus.publish(AgentEvent::Action { data: outcome.clone() });
                }
                (None, Some(content)) => {
                    let mut entry = HistoryEntry::chat(Role::Assistant, content.clone());
                    if let Some(data) = &outcome.data {
                        entry = entry.with_data(data.clone());
                    }
                    wm.add_message(entry);
                    bus.publish(AgentEvent::ResponseStart);
                    bus.publish(AgentEvent::ResponseChunk {
                        chunk: content.clone(),
                    });
                    bus.publish(AgentEvent::ResponseEnd);
                }
                (None, None) => {}
            }
        } else if let Some(message) = &outcome.message {
            wm.add_event("action", message.clone(), serde_json::to_value(&outcome).ok());
            bus.publish(AgentEvent::Action { data: outcome.clone() });
        }

        bus.publish(AgentEvent::ActionQueueUpdate {
            data: queue.to_vec(),
        });

        let Some(update) = &outcome.state_update else {
            return;
        };

        if !update.working_memory_append.is_empty() {
            let recalled: Vec<&str> = update
                .working_memory_append
                .iter()
                .map(|r| r.content.as_str())
                .collect();
            wm.add_instant_memory(format!("[memory] [I recalled: {}]", recalled.join("; ")));
            self.memories.extend(update.working_memory_append.iter().cloned());
        }

        if update.emotions.is_some() || update.desires.is_some() {
            self.cycle.persona.update_state(&PersonaUpdate {
                emotions: update.emotions.clone(),
                desires: update.desires.clone(),
                intent: None,
            });
        }

        if update.intent.is_some() || update.emotions.is_some() || update.desires.is_some() {
            debug!(action = %item.name, "Broadcasting persona after action state update");
            bus.publish(AgentEvent::state(&self.cycle.persona.get_state()));
        }
    }
}

fn is_speak(name: &str) -> bool {
    name == "speak"
}

fn is_think(name: &str) -> bool {
    name.starts_with("think_")
}

fn is_memory_action(name: &str) -> bool {
    matches!(name, "recall" | "associate" | "memorize")
}

/// Which sense channels an action's feedback is written to.
pub fn sense_channels(name: &str) -> &'static [&'static str] {
    match name {
        "daze" => &["mind", "body"],
        "listen" => &["hearing"],
        n if is_memory_action(n) => &["mind"],
        _ => &["sight"],
    }
}

fn self_note(name: &str, outcome: &ActionOutcome, summary: &str) -> String {
    if is_memory_action(name) {
        return format!("[self] {summary}");
    }
    match &outcome.message {
        Some(message) => format!("[self] {message}"),
        None => format!("[self] I performed {name}"),
    }
}

/// Human-readable text for an outcome, used for notes and sense feedback.
pub fn result_summary(name: &str, outcome: &ActionOutcome) -> String {
    let mut summary = outcome.message.clone().unwrap_or_default();

    match &outcome.data {
        Some(Value::Array(records)) if !records.is_empty() => {
            let contents: Vec<String> = records
                .iter()
                .take(MAX_LISTED_RECORDS)
                .map(|r| match &r["content"] {
                    Value::String(s) => s.clone(),
                    Value::Null => r.to_string(),
                    other => other.to_string(),
                })
                .collect();
            let mut listed = contents.join("; ");
            if records.len() > MAX_LISTED_RECORDS {
                listed.push_str(&format!(" ... ({} more)", records.len() - MAX_LISTED_RECORDS));
            }
            summary.push_str(&format!("\nContent: {listed}"));
        }
        Some(Value::String(content)) if name == "memorize" => {
            summary.push_str(&format!("\nContent: {content}"));
        }
        Some(Value::Object(data)) => {
            if let Some(title) = data.get("title").and_then(Value::as_str) {
                summary.push_str(&format!("\nTitle: {title}"));
            }
            if let Some(links) = data.get("extracted_links").and_then(Value::as_array) {
                let links: Vec<String> = links
                    .iter()
                    .take(MAX_LINKS)
                    .map(|l| l.as_str().map(str::to_string).unwrap_or_else(|| l.to_string()))
                    .collect();
                if !links.is_empty() {
                    summary.push_str(&format!("\nLinks: {}", links.join(", ")));
                }
            }
            if let Some(content) = data.get("content").and_then(Value::as_str) {
                let clipped: String = content.chars().take(MAX_CONTENT_CHARS).collect();
                summary.push_str(&format!("\nContent: {clipped}"));
            }
            if let Some(output) = data.get("output").and_then(Value::as_str) {
                summary.push_str(&format!("\nOutput: {output}"));
            }
            if let Some(error) = data.get("error").and_then(Value::as_str) {
                summary.push_str(&format!("\nError: {error}"));
            }
        }
        _ => {}
    }

    if summary.is_empty() {
        summary = format!("{name} finished");
    }
    summary
}
