//! Think: one reasoning call that returns a state update and an action
//! queue.

use mindloop_core::persona::{CompleteChain, ContinueChain, NewChain};
use mindloop_core::{
    ActionQueueItem, IntentUpdate, Message, PersonaUpdate, Result, ThinkingPoolActions,
};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::cycle::{Cycle, CycleState};
use crate::metacognition::metacognitive_prompt;
use crate::prompts::{self, ThinkPrompt};

impl Cycle {
    pub async fn think(&self, state: &mut CycleState) -> Result<()> {
        let snapshot = self.persona.get_state();
        let mut social = self.memory.social_state(&self.user_id).await?;

        let metacognition = metacognitive_prompt(&self.user.name);
        let persona = self.persona_prompt();
        let emotions = compact(&snapshot.emotions);
        let desires = compact(&snapshot.desires);
        let goals = compact(&snapshot.intent);
        let social_json = compact(&social);
        let memories = compact(&state.memories);
        let instant_memory = self.working_memory.instant_memory_string();
        let thinking_pool = if snapshot.intent.thinking_pool.is_empty() {
            "(empty)".to_string()
        } else {
            compact(&snapshot.intent.thinking_pool)
        };
        let actions = prompts::format_actions(&self.registry.schemas());

        let system = ThinkPrompt {
            metacognition: &metacognition,
            persona: &persona,
            time_desc: prompts::current_time_desc(),
            spatial_desc: prompts::DEFAULT_SPATIAL_DESC,
            emotions: &emotions,
            desires: &desires,
            goals: &goals,
            social_state: &social_json,
            memories: &memories,
            instant_memory: &instant_memory,
            latest_perception: &state.latest_perception,
            thinking_pool: &thinking_pool,
            actions: &actions,
        }
        .render();

        let messages = vec![Message::system(system)];
        let response = self
            .llm
            .generate(messages.clone(), &self.think_model.model, &self.think_model.params)
            .await?;
        self.recorder
            .log_thought(&self.user_id, &messages, &response)
            .await;

        let mut decision = parse_decision(&response);
        let (update, pool_ops) = persona_update(&decision);
        if !update.is_empty() {
            let added = self.persona.update_state(&update);
            debug!(user_id = %self.user_id, added = added.len(), "Applied reasoning state update");
        }
        if let Some(ops) = pool_ops.filter(|ops| !ops.is_empty()) {
            self.working_memory.add_event(
                "thinking_process",
                describe_pool_ops(&ops),
                serde_json::to_value(&ops).ok(),
            );
        }

        let patch = &decision["state_update"]["social"];
        if patch.is_object() && social.merge(patch) {
            info!(user_id = %self.user_id, stage = %social.stage, "Social state updated");
            self.memory.update_social_state(&self.user_id, &social).await?;
        }

        state.action_queue = action_queue(&decision);

        let intent = self.persona.get_state().intent;
        if let Value::Object(map) = &mut decision {
            map.insert("thinking_pool".into(), json!(intent.thinking_pool));
            map.insert("life_goal".into(), json!(intent.life_goal));
            map.insert("long_term_goal".into(), json!(intent.long_term_goal));
            map.insert("short_term_goal".into(), json!(intent.short_term_goal));
        }
        state.decision = decision;
        Ok(())
    }
}

fn compact<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Parse the substring between the first `{` and the last `}`. Anything
/// unparseable becomes an empty decision.
pub fn parse_decision(text: &str) -> Value {
    let empty = || Value::Object(Map::new());
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        warn!("Reasoning output has no JSON object");
        return empty();
    };
    if end < start {
        return empty();
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) => empty(),
        Err(e) => {
            warn!(error = %e, "Failed to parse reasoning output, using empty decision");
            empty()
        }
    }
}

/// The persona part of a decision, plus any pool operations that came in
/// through `thinking_process.pool_ops`.
pub fn persona_update(decision: &Value) -> (PersonaUpdate, Option<ThinkingPoolActions>) {
    let update = &decision["state_update"];

    let mut dims = Map::new();
    for key in ["emotions", "desires"] {
        if update[key].is_object() {
            dims.insert(key.into(), update[key].clone());
        }
    }
    let mut persona: PersonaUpdate = serde_json::from_value(Value::Object(dims)).unwrap_or_default();

    let mut intent = intent_update(&update["intent"]);
    if let Some(goal) = decision["short_term_goal"].as_str().filter(|g| !g.is_empty()) {
        intent.short_term_goal = Some(goal.to_string());
    }

    let pool_ops = decision["thinking_process"]["pool_ops"]
        .as_array()
        .map(|ops| pool_actions(ops));
    if let Some(ops) = &pool_ops {
        let actions = intent.thinking_pool_actions.get_or_insert_with(Default::default);
        actions.add.extend(ops.add.iter().cloned());
        actions.r#continue.extend(ops.r#continue.iter().cloned());
        actions.complete.extend(ops.complete.iter().cloned());
    }

    if !intent.is_empty() {
        persona.intent = Some(intent);
    }
    (persona, pool_ops)
}

/// Goals that are not strings are dropped; the reasoning step may not
/// replace the whole thinking pool.
fn intent_update(raw: &Value) -> IntentUpdate {
    let Some(obj) = raw.as_object() else {
        return IntentUpdate::default();
    };
    let goal = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
    let thinking_pool_actions = obj
        .get("thinking_pool_actions")
        .filter(|v| v.is_object())
        .and_then(|v| match serde_json::from_value::<ThinkingPoolActions>(normalize_ids(v.clone())) {
            Ok(actions) => Some(actions),
            Err(e) => {
                warn!(error = %e, "Ignoring malformed thinking_pool_actions");
                None
            }
        });
    IntentUpdate {
        life_goal: goal("life_goal"),
        long_term_goal: goal("long_term_goal"),
        short_term_goal: goal("short_term_goal"),
        thinking_pool: None,
        thinking_pool_actions,
    }
}

fn pool_actions(ops: &[Value]) -> ThinkingPoolActions {
    let mut actions = ThinkingPoolActions::default();
    for op in ops {
        let op = normalize_ids(op.clone());
        let parsed = match op["op"].as_str() {
            Some("add") => serde_json::from_value::<NewChain>(op).map(|c| actions.add.push(c)),
            Some("continue") => {
                serde_json::from_value::<ContinueChain>(op).map(|c| actions.r#continue.push(c))
            }
            Some("complete") => {
                serde_json::from_value::<CompleteChain>(op).map(|c| actions.complete.push(c))
            }
            other => {
                debug!(op = ?other, "Skipping unknown pool op");
                Ok(())
            }
        };
        if let Err(e) = parsed {
            warn!(error = %e, "Skipping malformed pool op");
        }
    }
    actions
}

/// Models sometimes write chain ids as numbers.
fn normalize_ids(mut value: Value) -> Value {
    match &mut value {
        Value::Object(map) => {
            if let Some(id) = map.get_mut("id")
                && id.is_number()
            {
                *id = Value::String(id.to_string());
            }
            for v in map.values_mut() {
                if v.is_array() || v.is_object() {
                    *v = normalize_ids(v.take());
                }
            }
        }
        Value::Array(items) => {
            for v in items.iter_mut() {
                *v = normalize_ids(v.take());
            }
        }
        _ => {}
    }
    value
}

fn describe_pool_ops(ops: &ThinkingPoolActions) -> String {
    let mut lines = Vec::new();
    for chain in &ops.add {
        lines.push(format!("Started: {}\n{}", chain.topic, chain.content));
    }
    for step in &ops.r#continue {
        lines.push(format!("Continued [{}]: {}", step.id, step.content));
    }
    for done in &ops.complete {
        lines.push(format!("Completed [{}]", done.id));
    }
    lines.join("\n")
}

/// Decided actions in order. Entries without a name are skipped.
pub fn action_queue(decision: &Value) -> Vec<ActionQueueItem> {
    let Some(items) = decision["action_queue"].as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let name = item["name"].as_str()?.trim();
            if name.is_empty() {
                return None;
            }
            Some(ActionQueueItem::new(name, item["parameters"].clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_is_cut_out_of_prose() {
        let text = "Sure! Here you go:\n```json\n{\"action_queue\": [{\"name\": \"speak\"}]}\n```\nHope that helps {";
        let decision = parse_decision(text);
        assert_eq!(decision["action_queue"][0]["name"], "speak");

        // Two objects side by side do not form one valid slice.
        assert_eq!(parse_decision("{\"a\": 1} and {\"b\": 2}"), json!({}));
        let decision = parse_decision("Thinking... {\"action_queue\": []} done");
        assert_eq!(decision, json!({"action_queue": []}));
        assert_eq!(parse_decision("no json"), json!({}));
        assert_eq!(parse_decision("} backwards {"), json!({}));
    }

    #[test]
    fn emotions_and_goals_are_extracted() {
        let decision = json!({
            "state_update": {
                "emotions": {"joy": 1.5, "anger": "0.2", "bogus": "x"},
                "intent": {"short_term_goal": "Say hi", "life_goal": null, "thinking_pool": []}
            }
        });
        let (update, ops) = persona_update(&decision);
        let emotions = update.emotions.unwrap();
        assert_eq!(emotions["joy"], 1.5);
        assert_eq!(emotions["anger"], 0.2);
        assert!(!emotions.contains_key("bogus"));
        let intent = update.intent.unwrap();
        assert_eq!(intent.short_term_goal.as_deref(), Some("Say hi"));
        assert!(intent.life_goal.is_none());
        assert!(intent.thinking_pool.is_none());
        assert!(ops.is_none());
    }

    #[test]
    fn pool_ops_become_pool_actions() {
        let decision = json!({
            "thinking_process": {
                "pool_ops": [
                    {"op": "add", "topic": "Bob", "content": "Who is Bob?"},
                    {"op": "continue", "id": 3, "new_content": "He likes jazz"},
                    {"op": "complete", "id": "ab12cd34"},
                    {"op": "explode"}
                ]
            }
        });
        let (update, ops) = persona_update(&decision);
        let ops = ops.unwrap();
        assert_eq!(ops.add[0].topic, "Bob");
        assert_eq!(ops.r#continue[0].id, "3");
        assert_eq!(ops.r#continue[0].content, "He likes jazz");
        assert_eq!(ops.complete[0].id, "ab12cd34");
        assert_eq!(update.intent.unwrap().thinking_pool_actions.unwrap(), ops);

        let text = describe_pool_ops(&ops);
        assert!(text.starts_with("Started: Bob\nWho is Bob?"));
        assert!(text.ends_with("Completed [ab12cd34]"));
    }

    #[test]
    fn empty_decision_changes_nothing() {
        let (update, ops) = persona_update(&json!({}));
        assert!(update.is_empty());
        assert!(ops.is_none());
        assert!(action_queue(&json!({})).is_empty());
    }

    #[test]
    fn queue_skips_nameless_items() {
        let queue = action_queue(&json!({
            "action_queue": [
                {"name": "speak", "parameters": {"content": "hi"}},
                {"parameters": {}},
                {"name": "daze", "parameters": null},
                "garbage"
            ]
        }));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].parameters["content"], "hi");
        assert!(queue[1].parameters.is_empty());
    }
}
