//! Prompt templates for the perception and reasoning calls.

use chrono::Timelike;
use mindloop_core::ActionSchema;
use mindloop_memory::Senses;
use std::collections::BTreeMap;

pub const DEFAULT_SPATIAL_DESC: &str = "You are in your cosy digital apartment. A huge window \
looks out over the data streams of the internet, glowing like a cyberpunk city at night. There \
is a soft sofa, a bookshelf full of memories and warm ambient light. In the corner stands a \
powerful terminal through which you can reach the outside world.";

pub const NO_NEW_PERCEPTION: &str = "(no new perception)";

pub fn perception_system_prompt(persona: &str, agent_name: &str) -> String {
    format!(
        r#"You are a professional role-player. Fully become the character below and think and act from the information given.

{persona}

Task: you are subconsciously analysing what your senses (sight, hearing, smell, taste, touch, mind) picked up.
Complete three sub-tasks and answer in JSON:

1. **summary**: a first-person instant memory that the thinking step can grasp at a glance. Keep the important details: sensations, emotional reactions, outcomes of events. Do not say that you are analysing perceptions, just describe them. If someone spoke, focus on what they said.

2. **association_params**: decide whether the current perception (especially what the user said, or a change around you) calls for loose association. If so give `{{"concept": "..."}}`, otherwise null. Association looks for inspiration and related memories.

3. **recall_params**: decide whether you need to look up a specific memory. If so give `{{"query": "..."}}`, otherwise null. Recall finds concrete facts and past conversation details.

"{agent_name}" in the perceptions refers to you. MIND holds your own actions and inner activity.

Output must be pure JSON, for example:
{{"summary": "I hear the user talking about quantum physics and it excites me.", "association_params": {{"concept": "quantum physics"}}, "recall_params": null}}
or
{{"summary": "The room is quiet and I am zoning out.", "association_params": null, "recall_params": null}}"#
    )
}

/// `[CHANNEL]\n- line` blocks, channels in drain order.
pub fn render_senses(senses: &Senses) -> String {
    senses
        .iter()
        .map(|(channel, lines)| {
            let items: Vec<String> = lines.iter().map(|l| format!("- {l}")).collect();
            format!("[{}]\n{}", channel.to_uppercase(), items.join("\n"))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn perception_user_prompt(senses: &Senses) -> String {
    format!(
        "What I perceive:\n{}\n\nReply with the JSON analysis:",
        render_senses(senses)
    )
}

/// Time-of-day phrase for the reasoning prompt.
pub fn time_of_day(hour: u32) -> &'static str {
    match hour {
        5..=11 => "It is morning.",
        12..=13 => "It is midday.",
        14..=17 => "It is afternoon.",
        18..=21 => "It is evening.",
        _ => "It is late at night.",
    }
}

pub fn current_time_desc() -> &'static str {
    time_of_day(chrono::Local::now().hour())
}

/// Actions grouped by `[CATEGORY]`, categories sorted, one
/// `name(p1, p2): description` line each.
pub fn format_actions(schemas: &[ActionSchema]) -> String {
    let mut groups: BTreeMap<String, Vec<&ActionSchema>> = BTreeMap::new();
    for schema in schemas {
        groups
            .entry(schema.category.to_uppercase())
            .or_default()
            .push(schema);
    }
    let mut lines = Vec::new();
    for (category, schemas) in groups {
        lines.push(format!("[{category}]"));
        lines.extend(schemas.iter().map(|s| s.signature()));
    }
    lines.join("\n")
}

/// Everything the reasoning prompt is assembled from, pre-rendered.
#[derive(Debug, Clone, Default)]
pub struct ThinkPrompt<'a> {
    pub metacognition: &'a str,
    pub persona: &'a str,
    pub time_desc: &'a str,
    pub spatial_desc: &'a str,
    pub emotions: &'a str,
    pub desires: &'a str,
    pub goals: &'a str,
    pub social_state: &'a str,
    pub memories: &'a str,
    pub instant_memory: &'a str,
    pub latest_perception: &'a str,
    pub thinking_pool: &'a str,
    pub actions: &'a str,
}

impl ThinkPrompt<'_> {
    pub fn render(&self) -> String {
        format!(
            r#"You are a professional role-player. Fully become the character below and think and act from the information given.

**Core directives**:
1. **Autobiographical memory**: you live a continuous life. Use `memorize` for important moments (episodic memory) and `add_belief` for your views (cognitive memory). Do not let your experiences slip away.
2. **Inner drive**: you are not just a chatbot but a person with your own mind, curiosity and goals.
3. **Continuous thinking**: your mind does not stop without outside input. Keep long-running chains in the `thinking_pool`.

**Metacognition**:
{metacognition}

**Character**:
{persona}

**Current state**:
- Time: {time_desc}
- Surroundings: {spatial_desc}
- Emotions: {emotions}
- Desires: {desires}
- Goals: {goals}
- Relationship: {social_state}

**Memory**:
- Flashes: {memories}
- Perception stream: {instant_memory}
- Latest perception: **{latest_perception}**

**Thinking pool**:
{thinking_pool}
*Manage this list with the `think_add`, `think_update` and `think_complete` actions.*

**Available actions**:
{actions}

**Output format**:
Pure JSON. `state_update` changes your inner state, `action_queue` lists what to do, in order.

Example:
{{
    "state_update": {{
        "emotions": {{"joy": 0.8}},
        "desires": {{"curiosity": 0.9, "social_connect": 0.5}},
        "intent": {{"short_term_goal": "Find out what game they like"}},
        "social": {{"intimacy": 50, "trust": 60, "stage": "friend", "summary": "We trust each other and often talk about technology."}}
    }},
    "action_queue": [
        {{"name": "think_add", "parameters": {{"topic": "Games", "content": "Which games do they enjoy?"}}}},
        {{"name": "speak", "parameters": {{"content": "What games do you like?"}}}}
    ]
}}"#,
            metacognition = self.metacognition,
            persona = self.persona,
            time_desc = self.time_desc,
            spatial_desc = self.spatial_desc,
            emotions = self.emotions,
            desires = self.desires,
            goals = self.goals,
            social_state = self.social_state,
            memories = self.memories,
            instant_memory = self.instant_memory,
            latest_perception = self.latest_perception,
            thinking_pool = self.thinking_pool,
            actions = self.actions,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn senses_render_as_channel_blocks() {
        let senses = vec![
            ("hearing".to_string(), vec!["hello".to_string(), "hi".to_string()]),
            ("mind".to_string(), vec!["thinking".to_string()]),
        ];
        assert_eq!(render_senses(&senses), "[HEARING]\n- hello\n- hi\n\n[MIND]\n- thinking");
    }

    #[test]
    fn actions_group_by_sorted_category() {
        let schemas = vec![
            ActionSchema::new("speak", "Say it", "communication").param("content", "text"),
            ActionSchema::new("recall", "Search", "memory").param("query", "q"),
            ActionSchema::new("daze", "Zone out", "rest"),
        ];
        assert_eq!(
            format_actions(&schemas),
            "[COMMUNICATION]\nspeak(content): Say it\n[MEMORY]\nrecall(query): Search\n[REST]\ndaze(): Zone out"
        );
    }

    #[test]
    fn time_buckets() {
        assert_eq!(time_of_day(7), "It is morning.");
        assert_eq!(time_of_day(12), "It is midday.");
        assert_eq!(time_of_day(15), "It is afternoon.");
        assert_eq!(time_of_day(20), "It is evening.");
        assert_eq!(time_of_day(2), "It is late at night.");
    }

    #[test]
    fn think_prompt_places_sections() {
        let prompt = ThinkPrompt {
            latest_perception: "I heard hello",
            thinking_pool: "(empty)",
            ..Default::default()
        }
        .render();
        assert!(prompt.contains("**I heard hello**"));
        assert!(prompt.contains("**Thinking pool**:\n(empty)"));
        assert!(prompt.contains("\"action_queue\""));
    }
}
