//! Memory layers of a mindloop agent.
//!
//! - [`WorkingMemory`]: history, sense buffers and the instant-memory ring
//! - [`PersonaStore`]: emotions, desires, goals and the thinking pool
//! - [`InMemoryStore`] / [`FileStore`]: long-term memory behind `MemoryStore`
//!
//! The per-user records are plain JSON files under one data directory.

pub mod file_backend;
pub mod in_memory;
pub mod persist;
pub mod persona;
mod search;
pub mod working_memory;

pub use file_backend::FileStore;
pub use in_memory::InMemoryStore;
pub use persist::StateDir;
pub use persona::{PersonaStore, load_profile};
pub use working_memory::{Senses, WorkingMemory, WorkingMemoryConfig};
