//! M2: drives the typestate phase sequence to completion, wrapping the
//! whole run in a wall-clock deadline and emitting a status event per
//! step for the streaming layer (T3) to forward.

use std::sync::Arc;
use std::time::Duration;

use crate::gateway::{Conversation, InferenceProvider};
use crate::tools::ToolRegistry;
use crate::types::{AgentState, OrchestratorError, RequestId, StreamEvent};

use super::phases::{AgentLoop, LoopConfig, LoopContinuation, LoopResult, Reasoning, TerminationReason};

/// Runs a full reasoning session: THINK/ACT/OBSERVE cycles until the
/// Reasoner emits a final response, a step or token budget is exhausted,
/// or the overall deadline elapses.
pub struct ReasoningLoopRunner {
    provider: Arc<dyn InferenceProvider>,
    tool_registry: Arc<ToolRegistry>,
    config: LoopConfig,
    deadline: Duration,
}

impl ReasoningLoopRunner {
    pub fn new(provider: Arc<dyn InferenceProvider>, tool_registry: Arc<ToolRegistry>, config: LoopConfig, deadline: Duration) -> Self {
        Self { provider, tool_registry, config, deadline }
    }

    pub async fn run(
        &self,
        request_id: RequestId,
        intent: impl Into<String>,
        conversation: Conversation,
        mut on_event: impl FnMut(StreamEvent) + Send,
    ) -> Result<LoopResult, OrchestratorError> {
        let state = AgentState::new(request_id, intent);

        let run = self.run_inner(state, conversation, &mut on_event);

        match tokio::time::timeout(self.deadline, run).await {
            Ok(result) => Ok(result),
            Err(_) => Err(OrchestratorError::DeadlineExceeded { deadline_ms: self.deadline.as_millis() as u64 }),
        }
    }

    async fn run_inner(
        &self,
        state: AgentState,
        conversation: Conversation,
        on_event: &mut (impl FnMut(StreamEvent) + Send),
    ) -> LoopResult {
        let mut current = AgentLoop::<Reasoning>::new(state, conversation, self.config.clone());

        loop {
            on_event(StreamEvent::Status { request_id: current.state.request_id, stage: "reasoning".into() });

            let dispatching = match current.produce_output(self.provider.as_ref(), &self.tool_registry).await {
                Ok(next) => next,
                Err(termination) => return termination.into_result(),
            };

            on_event(StreamEvent::Status { request_id: dispatching.state.request_id, stage: "acting".into() });

            let observing = dispatching.dispatch_tools(&self.tool_registry).await;

            if let Some(record) = observing.state.history.last() {
                if let Some(obs) = &record.observation {
                    on_event(StreamEvent::Observation {
                        request_id: observing.state.request_id,
                        call_id: record.step.to_string(),
                        success: obs.success,
                        summary: obs.content.chars().take(280).collect(),
                    });
                }
            }

            match observing.observe_results() {
                LoopContinuation::Continue(next) => current = *next,
                LoopContinuation::Complete(result) => {
                    if matches!(result.termination_reason, TerminationReason::Error { .. }) {
                        tracing::warn!(?result.termination_reason, "reasoning loop terminated with error");
                    }
                    return result;
                }
            }
        }
    }
}
