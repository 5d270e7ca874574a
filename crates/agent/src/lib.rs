//! The mindloop cognitive runtime.
//!
//! Every connected user gets one [`AgentRuntime`] that runs a perpetual
//! cycle:
//!
//! 1. **Observe**: take at most one queued input, drain the sense buffers,
//!    summarize them into instant memory, run subconscious lookups
//! 2. **Think**: build one prompt from persona, memories and the action
//!    catalogue, ask the model for a JSON decision, merge its state update
//! 3. **Act**: run the decided action queue in order, feed results back
//!    into senses and instant memory, stream speech to the client
//!
//! then sleep and repeat. A failing tick is logged, reported on the event
//! stream and followed by a cooldown; the loop itself never exits on error.

pub mod act;
pub mod cycle;
pub mod metacognition;
pub mod observe;
pub mod prompts;
pub mod recorder;
pub mod registry;
pub mod runtime;
pub mod think;

pub use cycle::{Cycle, CycleState};
pub use recorder::Recorder;
pub use registry::AgentRegistry;
pub use runtime::{AgentRuntime, AgentServices, RuntimeError};
