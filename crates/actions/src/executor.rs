//! Sequential execution of a decided action queue.
//!
//! Items run strictly in order. A failing item is recorded as failed and
//! the rest of the queue still runs. Callers observe progress through
//! `ExecutionHooks`, which see the whole queue with statuses up to date.

use async_trait::async_trait;
use mindloop_core::{ActionOutcome, ActionQueueItem, ActionStatus};
use std::time::Duration;
use tracing::{debug, warn};

use crate::action::{ActionContext, ActionParams};

/// Observers invoked around each queue item.
#[async_trait]
pub trait ExecutionHooks: Send {
    /// Called after the item at `index` is marked executing.
    async fn before_execute(&mut self, _queue: &[ActionQueueItem], _index: usize) {}

    /// Called after the item at `index` has its final status and result.
    async fn after_execute(&mut self, _queue: &[ActionQueueItem], _index: usize) {}
}

/// Hooks that do nothing.
pub struct NoHooks;

impl ExecutionHooks for NoHooks {}

#[derive(Debug, Clone)]
pub struct ActionExecutor {
    step_delay: Duration,
}

impl ActionExecutor {
    /// `step_delay` is slept before each item so a UI can follow along.
    pub fn new(step_delay: Duration) -> Self {
        Self { step_delay }
    }

    pub async fn execute_queue(
        &self,
        queue: &mut [ActionQueueItem],
        ctx: &ActionContext,
        hooks: &mut dyn ExecutionHooks,
    ) -> Vec<ActionOutcome> {
        let mut outcomes = Vec::with_capacity(queue.len());

        for index in 0..queue.len() {
            queue[index].status = ActionStatus::Executing;
            hooks.before_execute(queue, index).await;

            if !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }

            let name = queue[index].name.clone();
            let params = ActionParams::new(queue[index].parameters.clone());
            let start = std::time::Instant::now();
            let outcome = match ctx.registry.execute(&name, ctx, params).await {
                Ok(outcome) => outcome,
                Err(e) => ActionOutcome::error(e.to_string()),
            };
            let duration_ms = start.elapsed().as_millis() as u64;

            let item = &mut queue[index];
            if let Some(error) = &outcome.error {
                warn!(action = %name, error = %error, "Action failed");
                item.status = ActionStatus::Failed;
            } else {
                debug!(action = %name, duration_ms, "Action completed");
                item.status = ActionStatus::Completed;
            }
            item.result = Some(outcome.clone());

            hooks.after_execute(queue, index).await;
            outcomes.push(outcome);
        }

        outcomes
    }
}

impl Default for ActionExecutor {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::default_registry;
    use crate::testing::context_with;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<(usize, Vec<ActionStatus>)>,
    }

    #[async_trait]
    impl ExecutionHooks for Recorder {
        async fn before_execute(&mut self, queue: &[ActionQueueItem], index: usize) {
            self.seen.push((index, queue.iter().map(|i| i.status).collect()));
        }

        async fn after_execute(&mut self, queue: &[ActionQueueItem], index: usize) {
            self.seen.push((index, queue.iter().map(|i| i.status).collect()));
        }
    }

    #[tokio::test]
    async fn failure_does_not_stop_the_queue() {
        let ctx = context_with(default_registry());
        let mut queue = vec![
            ActionQueueItem::new("speak", json!({"content": "hi"})),
            ActionQueueItem::new("fly", json!({})),
            ActionQueueItem::new("express", json!({"face": "smile"})),
        ];

        let outcomes = ActionExecutor::default()
            .execute_queue(&mut queue, &ctx, &mut NoHooks)
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(queue[0].status, ActionStatus::Completed);
        assert_eq!(queue[1].status, ActionStatus::Failed);
        assert!(outcomes[1].error.as_deref().unwrap().contains("fly"));
        assert_eq!(queue[2].status, ActionStatus::Completed);
        assert_eq!(queue[2].result.as_ref().unwrap().data.as_ref().unwrap()["face"], "smile");
    }

    #[tokio::test]
    async fn hooks_see_status_transitions() {
        let ctx = context_with(default_registry());
        let mut queue = vec![
            ActionQueueItem::new("speak", json!({"content": "a"})),
            ActionQueueItem::new("speak", json!({})),
        ];
        let mut recorder = Recorder::default();

        ActionExecutor::default()
            .execute_queue(&mut queue, &ctx, &mut recorder)
            .await;

        use ActionStatus::*;
        assert_eq!(
            recorder.seen,
            vec![
                (0, vec![Executing, Pending]),
                (0, vec![Completed, Pending]),
                (1, vec![Completed, Executing]),
                (1, vec![Completed, Failed]),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn step_delay_is_applied_per_item() {
        let ctx = context_with(default_registry());
        let mut queue = vec![
            ActionQueueItem::new("express", json!({})),
            ActionQueueItem::new("express", json!({})),
        ];
        let start = tokio::time::Instant::now();
        ActionExecutor::new(Duration::from_millis(500))
            .execute_queue(&mut queue, &ctx, &mut NoHooks)
            .await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn empty_queue_is_a_no_op() {
        let ctx = context_with(default_registry());
        let outcomes = ActionExecutor::default()
            .execute_queue(&mut [], &ctx, &mut NoHooks)
            .await;
        assert!(outcomes.is_empty());
    }
}
