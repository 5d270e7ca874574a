//! The innate repertoire every agent starts with.

mod cognition;
mod communication;
mod learning;
mod memory;
mod social;

pub use cognition::{ThinkAdd, ThinkComplete, ThinkUpdate};
pub use communication::{Daze, Express, Speak};
pub use learning::{LearnSkill, LearnedSkill};
pub use memory::{AddBelief, Associate, Memorize, Recall};
pub use social::UpdateRelationship;

use crate::action::Action;
use std::sync::Arc;

pub fn innate_actions() -> Vec<Arc<dyn Action>> {
    vec![
        Arc::new(Speak),
        Arc::new(Express),
        Arc::new(Daze),
        Arc::new(Recall),
        Arc::new(Associate),
        Arc::new(Memorize),
        Arc::new(AddBelief),
        Arc::new(ThinkAdd),
        Arc::new(ThinkUpdate),
        Arc::new(ThinkComplete),
        Arc::new(UpdateRelationship),
        Arc::new(LearnSkill),
    ]
}

