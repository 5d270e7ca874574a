//! Persona state store.
//!
//! Holds one user's emotions, desires and intent. Every writer (the
//! reasoning step, action side effects, host API edits) goes through
//! `update_state`, which merges and persists under one lock.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use mindloop_core::persona::{IntentUpdate, PoolLimits};
use mindloop_core::{PersonaProfile, PersonaSnapshot, PersonaUpdate, PersistenceError};
use tracing::{info, warn};

use crate::persist::{StateDir, read_json, write_json};

/// Load a persona template, falling back to a default profile.
pub fn load_profile(path: Option<&Path>, fallback_name: &str) -> PersonaProfile {
    let Some(path) = path else {
        return PersonaProfile::named(fallback_name);
    };
    match read_json::<PersonaProfile>(path) {
        Ok(Some(profile)) => {
            info!(path = %path.display(), name = %profile.name, "Loaded persona template");
            profile
        }
        Ok(None) => {
            warn!(path = %path.display(), "Persona template not found, using defaults");
            PersonaProfile::named(fallback_name)
        }
        Err(e) => {
            warn!(error = %e, "Invalid persona template, using defaults");
            PersonaProfile::named(fallback_name)
        }
    }
}

pub struct PersonaStore {
    user_id: String,
    path: Option<PathBuf>,
    profile: PersonaProfile,
    limits: PoolLimits,
    state: Mutex<PersonaSnapshot>,
}

impl PersonaStore {
    /// A store that never touches disk.
    pub fn ephemeral(user_id: impl Into<String>, profile: PersonaProfile, limits: PoolLimits) -> Self {
        let state = profile.initial_snapshot();
        Self {
            user_id: user_id.into(),
            path: None,
            profile,
            limits,
            state: Mutex::new(state),
        }
    }

    /// Start from the template, then overlay the user's saved record (or a
    /// legacy global record, migrated once).
    pub fn open(
        user_id: impl Into<String>,
        dirs: &StateDir,
        profile: PersonaProfile,
        limits: PoolLimits,
    ) -> Self {
        let user_id = user_id.into();
        let path = dirs.persona_path(&user_id);
        let mut state = profile.initial_snapshot();

        let mut migrated = false;
        let saved = match read_json::<PersonaSnapshot>(&path) {
            Ok(Some(saved)) => Some(saved),
            Ok(None) => dirs.legacy_persona_path().and_then(|legacy| {
                match read_json::<PersonaSnapshot>(&legacy) {
                    Ok(Some(saved)) => {
                        info!(user_id = %user_id, from = %legacy.display(), "Migrating persona state");
                        migrated = true;
                        Some(saved)
                    }
                    Ok(None) => None,
                    Err(e) => {
                        warn!(error = %e, "Skipping unreadable legacy persona state");
                        None
                    }
                }
            }),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Unreadable persona state, using template");
                None
            }
        };

        if let Some(saved) = saved {
            // Saved values go through the same merge rules as live updates.
            state.merge(
                &PersonaUpdate {
                    emotions: Some(saved.emotions),
                    desires: Some(saved.desires),
                    intent: Some(IntentUpdate {
                        life_goal: Some(saved.intent.life_goal),
                        long_term_goal: Some(saved.intent.long_term_goal),
                        short_term_goal: Some(saved.intent.short_term_goal),
                        thinking_pool: Some(saved.intent.thinking_pool),
                        thinking_pool_actions: None,
                    }),
                },
                limits,
            );
        }

        let store = Self {
            user_id,
            path: Some(path),
            profile,
            limits,
            state: Mutex::new(state),
        };
        if migrated {
            let state = store.lock();
            store.persist(&state);
        }
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PersonaSnapshot> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, state: &PersonaSnapshot) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = write_json(path, state) {
            self.report(e);
        }
    }

    fn report(&self, e: PersistenceError) {
        warn!(user_id = %self.user_id, error = %e, "Failed to persist persona state");
    }

    pub fn profile(&self) -> &PersonaProfile {
        &self.profile
    }

    pub fn limits(&self) -> PoolLimits {
        self.limits
    }

    /// Detached copy of the current state.
    pub fn get_state(&self) -> PersonaSnapshot {
        self.lock().clone()
    }

    /// Merge a partial update and persist. Returns ids of chains it created.
    pub fn update_state(&self, update: &PersonaUpdate) -> Vec<String> {
        let mut state = self.lock();
        let added = state.merge(update, self.limits);
        self.persist(&state);
        added
    }

    /// Remove a thinking chain. Returns false when no chain has that id.
    pub fn remove_chain(&self, chain_id: &str) -> bool {
        let mut state = self.lock();
        let pool: Vec<_> = state
            .intent
            .thinking_pool
            .iter()
            .filter(|c| c.id != chain_id)
            .cloned()
            .collect();
        if pool.len() == state.intent.thinking_pool.len() {
            return false;
        }
        state.merge(
            &PersonaUpdate::intent(IntentUpdate {
                thinking_pool: Some(pool),
                ..Default::default()
            }),
            self.limits,
        );
        self.persist(&state);
        true
    }
}

impl std::fmt::Debug for PersonaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonaStore")
            .field("user_id", &self.user_id)
            .field("profile", &self.profile.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindloop_core::ChainStatus;
    use mindloop_core::persona::ThinkingPoolActions;
    use serde_json::json;

    fn store() -> PersonaStore {
        PersonaStore::ephemeral("u1", PersonaProfile::named("Alice"), PoolLimits::default())
    }

    #[test]
    fn snapshot_is_a_detached_copy() {
        let store = store();
        let mut snapshot = store.get_state();
        snapshot.emotions.insert("joy".into(), 0.0);
        snapshot.intent.life_goal.clear();
        assert_eq!(store.get_state().emotions["joy"], 0.5);
        assert!(!store.get_state().intent.life_goal.is_empty());
    }

    #[test]
    fn update_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = StateDir::new(dir.path());
        let store = PersonaStore::open("u1", &dirs, PersonaProfile::named("Alice"), PoolLimits::default());

        let update: PersonaUpdate = serde_json::from_value(json!({
            "emotions": {"joy": 0.9},
            "intent": {
                "short_term_goal": "Learn Bob's name",
                "thinking_pool_actions": {"add": [{"topic": "Bob", "content": "Who is Bob?"}]}
            }
        }))
        .unwrap();
        let ids = store.update_state(&update);
        let before = store.get_state();
        drop(store);

        let reloaded = PersonaStore::open("u1", &dirs, PersonaProfile::named("Alice"), PoolLimits::default());
        assert_eq!(reloaded.get_state(), before);
        assert!(reloaded.get_state().intent.chain(&ids[0]).is_some());
    }

    #[test]
    fn similar_user_ids_do_not_share_state() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = StateDir::new(dir.path());
        let open = |id: &str| PersonaStore::open(id, &dirs, PersonaProfile::named("Alice"), PoolLimits::default());

        let dotted = open("bob.smith");
        dotted.update_state(&PersonaUpdate::intent(IntentUpdate {
            life_goal: Some("Keep bob.smith's secret".into()),
            ..Default::default()
        }));
        drop(dotted);

        let underscored = open("bob_smith");
        assert_ne!(underscored.get_state().intent.life_goal, "Keep bob.smith's secret");
        assert_eq!(open("bob.smith").get_state().intent.life_goal, "Keep bob.smith's secret");
    }

    #[test]
    fn legacy_global_record_migrates() {
        let data = tempfile::tempdir().unwrap();
        let legacy = tempfile::tempdir().unwrap();
        std::fs::write(
            legacy.path().join("persona_state.json"),
            r#"{"emotions":{"joy":0.1},"desires":{},"intent":{"life_goal":"Old goal","long_term_goal":"x","short_term_goal":"y","thinking_pool":[{"id":"1","topic":"t","content":"legacy text","status":"active"}]}}"#,
        )
        .unwrap();

        let dirs = StateDir::new(data.path()).with_legacy(legacy.path());
        let store = PersonaStore::open("u1", &dirs, PersonaProfile::named("Alice"), PoolLimits::default());
        let state = store.get_state();
        assert_eq!(state.emotions["joy"], 0.1);
        assert_eq!(state.desires["curiosity"], 0.6);
        assert_eq!(state.intent.life_goal, "Old goal");
        assert_eq!(state.intent.thinking_pool[0].content, vec!["legacy text"]);
        assert!(dirs.persona_path("u1").exists());
    }

    #[test]
    fn remove_chain_reports_missing_ids() {
        let store = store();
        let ids = store.update_state(&PersonaUpdate::intent(IntentUpdate {
            thinking_pool_actions: Some(ThinkingPoolActions {
                add: vec![mindloop_core::persona::NewChain {
                    topic: "t".into(),
                    content: "c".into(),
                }],
                ..Default::default()
            }),
            ..Default::default()
        }));
        assert!(!store.remove_chain("missing"));
        assert!(store.remove_chain(&ids[0]));
        assert!(store.get_state().intent.thinking_pool.is_empty());
    }

    #[test]
    fn add_then_complete_leaves_one_completed_chain() {
        let store = store();
        let ids = store.update_state(
            &serde_json::from_value(json!({"intent": {"thinking_pool_actions": {"add": [{"topic": "t", "content": "start"}]}}})).unwrap(),
        );
        store.update_state(
            &serde_json::from_value(json!({"intent": {"thinking_pool_actions": {"complete": [{"id": ids[0], "conclusion": "end"}]}}})).unwrap(),
        );
        let pool = store.get_state().intent.thinking_pool;
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].status, ChainStatus::Completed);
        assert_eq!(pool[0].content.len(), 2);
    }

    #[test]
    fn missing_template_falls_back() {
        let profile = load_profile(Some(Path::new("/nonexistent/persona.json")), "Mira");
        assert_eq!(profile.name, "Mira");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persona.json");
        std::fs::write(&path, r#"{"name":"Alice","personality_traits":["curious"]}"#).unwrap();
        let profile = load_profile(Some(&path), "Mira");
        assert_eq!(profile.personality_traits, vec!["curious"]);
    }
}
