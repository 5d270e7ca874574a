//! Persona data model: emotions, desires, intent and the thinking pool.
//!
//! `PersonaSnapshot::merge` holds the merge-update rules shared by every
//! writer (the reasoning step, action side effects, external edits). The
//! store that persists snapshots lives in `mindloop-memory`.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Named dimensions, each in [0, 1].
pub type Dimensions = BTreeMap<String, f64>;

/// Prefix of the entry `complete` appends to a chain.
pub const CONCLUSION_TAG: &str = "[Conclusion]";

pub fn default_emotions() -> Dimensions {
    [
        ("joy", 0.5),
        ("anger", 0.0),
        ("sorrow", 0.0),
        ("fear", 0.0),
        ("love", 0.0),
        ("hate", 0.0),
        ("desire", 0.5),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

pub fn default_desires() -> Dimensions {
    [
        ("curiosity", 0.6),
        ("social_connect", 0.4),
        ("achievement", 0.5),
        ("autonomy", 0.4),
        ("bonding", 0.3),
        ("competence", 0.5),
        ("exploration", 0.5),
        ("safety", 0.2),
        ("order", 0.2),
        ("novelty", 0.5),
        ("influence", 0.3),
        ("play", 0.4),
        ("rest", 0.3),
        ("stability", 0.2),
        ("expression", 0.5),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainStatus {
    #[default]
    Active,
    Completed,
}

/// A multi-step line of reasoning tracked across ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingChain {
    pub id: String,

    #[serde(default)]
    pub topic: String,

    /// One entry per step. Older records stored a single string.
    #[serde(default, deserialize_with = "string_or_list")]
    pub content: Vec<String>,

    #[serde(default)]
    pub status: ChainStatus,
}

impl ThinkingChain {
    pub fn is_active(&self) -> bool {
        self.status == ChainStatus::Active
    }
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        One(String),
        Many(Vec<String>),
        Nothing(()),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::One(s) if s.is_empty() => Vec::new(),
        Repr::One(s) => vec![s],
        Repr::Many(v) => v,
        Repr::Nothing(()) => Vec::new(),
    })
}

/// Goals plus the thinking pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub life_goal: String,
    pub long_term_goal: String,
    pub short_term_goal: String,
    #[serde(default)]
    pub thinking_pool: Vec<ThinkingChain>,
}

impl Default for Intent {
    fn default() -> Self {
        Self {
            life_goal: "Explore the world and my own mind, and realise my own worth".into(),
            long_term_goal: "Learn about my surroundings and build deep relationships".into(),
            short_term_goal: "Ask questions to learn more".into(),
            thinking_pool: Vec::new(),
        }
    }
}

impl Intent {
    pub fn chain(&self, id: &str) -> Option<&ThinkingChain> {
        self.thinking_pool.iter().find(|c| c.id == id)
    }
}

/// Full persona state `{emotions, desires, intent}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaSnapshot {
    #[serde(default = "default_emotions")]
    pub emotions: Dimensions,
    #[serde(default = "default_desires")]
    pub desires: Dimensions,
    #[serde(default)]
    pub intent: Intent,
}

impl Default for PersonaSnapshot {
    fn default() -> Self {
        Self {
            emotions: default_emotions(),
            desires: default_desires(),
            intent: Intent::default(),
        }
    }
}

/// A partial persona update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonaUpdate {
    #[serde(default, deserialize_with = "lenient_dimensions", skip_serializing_if = "Option::is_none")]
    pub emotions: Option<Dimensions>,

    #[serde(default, deserialize_with = "lenient_dimensions", skip_serializing_if = "Option::is_none")]
    pub desires: Option<Dimensions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentUpdate>,
}

impl PersonaUpdate {
    pub fn emotions(emotions: Dimensions) -> Self {
        Self {
            emotions: Some(emotions),
            ..Default::default()
        }
    }

    pub fn intent(intent: IntentUpdate) -> Self {
        Self {
            intent: Some(intent),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.emotions.as_ref().is_none_or(|m| m.is_empty())
            && self.desires.as_ref().is_none_or(|m| m.is_empty())
            && self.intent.as_ref().is_none_or(|i| i.is_empty())
    }
}

/// Numbers and numeric strings are kept; anything else is dropped.
fn lenient_dimensions<'de, D>(deserializer: D) -> Result<Option<Dimensions>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw.map(|map| {
        map.into_iter()
            .filter_map(|(k, v)| {
                let value = match v {
                    serde_json::Value::Number(n) => n.as_f64(),
                    serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                }?;
                Some((k, value))
            })
            .collect()
    }))
}

/// A partial intent update. `None` goals never clear the current goal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub life_goal: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_term_goal: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_term_goal: Option<String>,

    /// Wholesale replacement of the pool (external edits).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_pool: Option<Vec<ThinkingChain>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_pool_actions: Option<ThinkingPoolActions>,
}

impl IntentUpdate {
    pub fn is_empty(&self) -> bool {
        self.life_goal.is_none()
            && self.long_term_goal.is_none()
            && self.short_term_goal.is_none()
            && self.thinking_pool.is_none()
            && self.thinking_pool_actions.as_ref().is_none_or(|a| a.is_empty())
    }
}

/// Incremental thinking-pool operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThinkingPoolActions {
    #[serde(default)]
    pub add: Vec<NewChain>,

    #[serde(default)]
    pub r#continue: Vec<ContinueChain>,

    #[serde(default)]
    pub complete: Vec<CompleteChain>,
}

impl ThinkingPoolActions {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.r#continue.is_empty() && self.complete.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewChain {
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default)]
    pub content: String,
}

pub fn default_topic() -> String {
    "Untitled thought".into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinueChain {
    pub id: String,
    #[serde(default, alias = "new_content")]
    pub content: String,
}

/// Accepts either a bare chain id or `{id, conclusion}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CompleteRepr")]
pub struct CompleteChain {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CompleteRepr {
    Id(String),
    Full {
        id: String,
        #[serde(default, alias = "content")]
        conclusion: Option<String>,
    },
}

impl From<CompleteRepr> for CompleteChain {
    fn from(repr: CompleteRepr) -> Self {
        match repr {
            CompleteRepr::Id(id) => Self { id, conclusion: None },
            CompleteRepr::Full { id, conclusion } => Self { id, conclusion },
        }
    }
}

/// Hard caps on the thinking pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    pub max_chains: usize,
    pub max_steps: usize,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_chains: 8,
            max_steps: 32,
        }
    }
}

impl PersonaSnapshot {
    /// Apply a partial update. Returns the ids of chains created by `add`.
    pub fn merge(&mut self, update: &PersonaUpdate, limits: PoolLimits) -> Vec<String> {
        if let Some(emotions) = &update.emotions {
            merge_dimensions(&mut self.emotions, emotions, "emotion");
        }
        if let Some(desires) = &update.desires {
            merge_dimensions(&mut self.desires, desires, "desire");
        }

        let Some(intent) = &update.intent else {
            return Vec::new();
        };

        if let Some(goal) = &intent.life_goal {
            self.intent.life_goal = goal.clone();
        }
        if let Some(goal) = &intent.long_term_goal {
            self.intent.long_term_goal = goal.clone();
        }
        if let Some(goal) = &intent.short_term_goal {
            self.intent.short_term_goal = goal.clone();
        }

        if let Some(pool) = &intent.thinking_pool {
            self.intent.thinking_pool = dedupe_chains(pool);
            return Vec::new();
        }

        match &intent.thinking_pool_actions {
            Some(actions) => self.apply_pool_actions(actions, limits),
            None => Vec::new(),
        }
    }

    fn apply_pool_actions(&mut self, actions: &ThinkingPoolActions, limits: PoolLimits) -> Vec<String> {
        let pool = &mut self.intent.thinking_pool;
        let mut added = Vec::new();

        for new in &actions.add {
            if pool.len() >= limits.max_chains {
                match pool.iter().position(|c| !c.is_active()) {
                    Some(idx) => {
                        let evicted = pool.remove(idx);
                        tracing::debug!(chain_id = %evicted.id, "Evicted completed thinking chain");
                    }
                    None => {
                        warn!(topic = %new.topic, "Thinking pool full, dropping new chain");
                        continue;
                    }
                }
            }

            let id = unique_chain_id(pool);
            pool.push(ThinkingChain {
                id: id.clone(),
                topic: new.topic.clone(),
                content: vec![new.content.clone()],
                status: ChainStatus::Active,
            });
            added.push(id);
        }

        for step in &actions.r#continue {
            let Some(chain) = pool.iter_mut().find(|c| c.id == step.id) else {
                continue;
            };
            if chain.content.len() >= limits.max_steps {
                warn!(chain_id = %chain.id, "Thinking chain at step limit, dropping update");
                continue;
            }
            chain.content.push(step.content.clone());
        }

        for done in &actions.complete {
            let Some(chain) = pool.iter_mut().find(|c| c.id == done.id) else {
                continue;
            };
            chain.status = ChainStatus::Completed;
            let conclusion = done.conclusion.as_deref().unwrap_or("Done");
            chain.content.push(format!("{CONCLUSION_TAG} {conclusion}"));
        }

        added
    }
}

fn merge_dimensions(current: &mut Dimensions, supplied: &Dimensions, label: &str) {
    for (key, value) in supplied {
        let Some(slot) = current.get_mut(key) else {
            tracing::debug!(key = %key, "Ignoring unknown {label} dimension");
            continue;
        };
        if value.is_finite() {
            *slot = value.clamp(0.0, 1.0);
        }
    }
}

/// First chain wins when ids repeat.
fn dedupe_chains(pool: &[ThinkingChain]) -> Vec<ThinkingChain> {
    let mut seen = std::collections::HashSet::new();
    pool.iter()
        .filter(|chain| {
            let fresh = seen.insert(chain.id.as_str());
            if !fresh {
                warn!(chain_id = %chain.id, "Dropping thinking chain with duplicate id");
            }
            fresh
        })
        .cloned()
        .collect()
}

fn unique_chain_id(pool: &[ThinkingChain]) -> String {
    loop {
        let id: String = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        if pool.iter().all(|c| c.id != id) {
            return id;
        }
    }
}

/// Static persona configuration loaded from a JSON template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaProfile {
    #[serde(default = "default_agent_name")]
    pub name: String,

    #[serde(default)]
    pub basic_info: BasicInfo,

    #[serde(default)]
    pub personality_traits: Vec<String>,

    #[serde(default)]
    pub style_guide: Vec<String>,

    #[serde(default)]
    pub system_instructions: String,

    #[serde(default, deserialize_with = "lenient_dimensions")]
    pub emotions: Option<Dimensions>,

    #[serde(default, deserialize_with = "lenient_dimensions")]
    pub desires: Option<Dimensions>,

    #[serde(default)]
    pub intent: Option<IntentUpdate>,
}

fn default_agent_name() -> String {
    "Alice".into()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BasicInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub appearance: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub residence: String,
}

impl PersonaProfile {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Initial snapshot: defaults overlaid with the template's values.
    pub fn initial_snapshot(&self) -> PersonaSnapshot {
        let mut snapshot = PersonaSnapshot::default();
        let update = PersonaUpdate {
            emotions: self.emotions.clone(),
            desires: self.desires.clone(),
            intent: self.intent.clone(),
        };
        snapshot.merge(&update, PoolLimits::default());
        snapshot
    }

    /// Render the identity block of the reasoning prompt.
    pub fn persona_prompt(&self, user: Option<(&str, &str)>) -> String {
        let display = if self.basic_info.name.is_empty() {
            &self.name
        } else {
            &self.basic_info.name
        };
        let mut prompt = format!(
            "**Identity**: {} ({display})\n**Setting**: {}\n**Appearance**: {}\n**Origin**: {}\n**Residence**: {}\n**Personality**: {}\n**Style**: {}",
            self.name,
            self.system_instructions,
            self.basic_info.appearance,
            self.basic_info.origin,
            self.basic_info.residence,
            self.personality_traits.join(", "),
            self.style_guide.join(", "),
        );
        if let Some((name, profile)) = user {
            prompt.push_str(&format!("\n**{name}**: {profile}"));
        }
        prompt
    }
}
