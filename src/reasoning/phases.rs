//! Typestate-enforced phase transitions for the M2 reasoning loop.
//!
//! Zero-sized phase markers make invalid transitions a compile-time
//! error: the loop driver moves through Reasoning → ToolDispatching →
//! Observing, and each transition consumes `self` to produce the next
//! phase. It is structurally impossible to dispatch tools without
//! reasoning first, or to observe without dispatching.

use std::marker::PhantomData;
use std::time::Duration;

use crate::dedup::jaccard_similarity;
use crate::gateway::conversation::MessageRole;
use crate::gateway::{Conversation, ConversationMessage, InferenceOptions, InferenceProvider};
use crate::tools::ToolRegistry;
use crate::types::{AgentState, Observation, StepRecord, ToolCall};

/// An action the Reasoner proposed for this step.
#[derive(Debug, Clone)]
pub enum ProposedAction {
    ToolCall { call_id: String, name: String, arguments: serde_json::Value },
    Respond { content: String },
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub max_steps: u32,
    pub max_total_tokens: u64,
    pub step_deadline: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self { max_steps: 10, max_total_tokens: 50_000, step_deadline: Duration::from_secs(30) }
    }
}

pub trait AgentPhase {}
pub struct Reasoning;
pub struct ToolDispatching;
pub struct Observing;
impl AgentPhase for Reasoning {}
impl AgentPhase for ToolDispatching {}
impl AgentPhase for Observing {}

struct ReasoningOutput {
    proposed_actions: Vec<ProposedAction>,
}

struct DispatchOutput {
    observations: Vec<Observation>,
    should_terminate: bool,
    terminal_output: Option<String>,
}

enum PhaseData {
    Reasoning(ReasoningOutput),
    Dispatch(DispatchOutput),
}

pub struct AgentLoop<Phase: AgentPhase> {
    pub state: AgentState,
    pub conversation: Conversation,
    pub config: LoopConfig,
    phase_data: Option<PhaseData>,
    _phase: PhantomData<Phase>,
}

#[derive(Debug)]
pub enum TerminationReason {
    /// The loop produced a final answer before exhausting any budget.
    Completed,
    MaxSteps,
    MaxTokens,
    Error { message: String },
}

#[derive(Debug)]
pub struct LoopResult {
    pub output: String,
    pub state: AgentState,
    pub conversation: Conversation,
    pub termination_reason: TerminationReason,
}

#[derive(Debug)]
pub struct LoopTermination {
    pub reason: TerminationReason,
    pub state: AgentState,
    pub conversation: Conversation,
}

impl LoopTermination {
    pub fn into_result(self) -> LoopResult {
        LoopResult { output: String::new(), state: self.state, conversation: self.conversation, termination_reason: self.reason }
    }
}

impl AgentLoop<Reasoning> {
    pub fn new(state: AgentState, conversation: Conversation, config: LoopConfig) -> Self {
        Self { state, conversation, config, phase_data: None, _phase: PhantomData }
    }

    /// Runs one THINK step: calls the model gateway, parses the response
    /// into proposed actions, and records the assistant turn.
    pub async fn produce_output(
        mut self,
        provider: &dyn InferenceProvider,
        tool_registry: &ToolRegistry,
    ) -> Result<AgentLoop<ToolDispatching>, LoopTermination> {
        self.state.current_phase = "reasoning".into();

        if self.state.step >= self.config.max_steps {
            return Err(LoopTermination {
                reason: TerminationReason::MaxSteps,
                state: self.state,
                conversation: self.conversation,
            });
        }
        if self.state.total_usage.total_tokens >= self.config.max_total_tokens {
            return Err(LoopTermination {
                reason: TerminationReason::MaxTokens,
                state: self.state,
                conversation: self.conversation,
            });
        }

        let options = InferenceOptions {
            tools: tool_registry.definitions(),
            timeout: self.config.step_deadline,
            ..Default::default()
        };

        let response = match provider.complete(&self.conversation, &options).await {
            Ok(r) => r,
            Err(e) => {
                return Err(LoopTermination {
                    reason: TerminationReason::Error { message: format!("inference failed: {e}") },
                    state: self.state,
                    conversation: self.conversation,
                });
            }
        };

        self.state.total_usage += response.usage;
        self.state.cumulative_cost_usd += response.estimated_cost_usd;

        let proposed_actions = if !response.tool_calls.is_empty() {
            let calls: Vec<_> = response
                .tool_calls
                .iter()
                .map(|tc| crate::gateway::conversation::ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: tc.arguments.to_string(),
                })
                .collect();
            self.conversation.push(ConversationMessage::assistant_tool_calls(calls));

            response
                .tool_calls
                .into_iter()
                .map(|tc| ProposedAction::ToolCall { call_id: tc.id, name: tc.name, arguments: tc.arguments })
                .collect()
        } else {
            self.conversation.push(ConversationMessage::assistant(&response.content));
            vec![ProposedAction::Respond { content: response.content }]
        };

        self.state.step += 1;

        Ok(AgentLoop {
            state: self.state,
            conversation: self.conversation,
            config: self.config,
            phase_data: Some(PhaseData::Reasoning(ReasoningOutput { proposed_actions })),
            _phase: PhantomData,
        })
    }
}

impl AgentLoop<ToolDispatching> {
    /// Dispatches every proposed tool call through the registry. A
    /// `Respond` action short-circuits dispatch and marks the loop for
    /// termination at the next phase.
    pub async fn dispatch_tools(mut self, tool_registry: &ToolRegistry) -> AgentLoop<Observing> {
        self.state.current_phase = "acting".into();

        let reasoning_output = match self.phase_data {
            Some(PhaseData::Reasoning(output)) => output,
            _ => {
                return AgentLoop {
                    state: self.state,
                    conversation: self.conversation,
                    config: self.config,
                    phase_data: Some(PhaseData::Dispatch(DispatchOutput {
                        observations: Vec::new(),
                        should_terminate: true,
                        terminal_output: Some(String::new()),
                    })),
                    _phase: PhantomData,
                };
            }
        };

        let mut observations = Vec::new();
        let mut should_terminate = false;
        let mut terminal_output = None;

        for action in reasoning_output.proposed_actions {
            match action {
                ProposedAction::Respond { content } => {
                    should_terminate = true;
                    terminal_output = Some(content);
                }
                ProposedAction::ToolCall { call_id, name, arguments } => {
                    let started = std::time::Instant::now();
                    let result = tool_registry.invoke(&name, arguments.clone()).await;
                    let (success, content) = match &result {
                        Ok(value) => (true, value.to_string()),
                        Err(e) => (false, e.to_string()),
                    };
                    let duration = started.elapsed();

                    self.conversation.push(ConversationMessage::tool_result(&call_id, &name, &content));

                    self.state.history.push(StepRecord {
                        step: self.state.step,
                        thought: String::new(),
                        action: Some(ToolCall { tool_name: name.clone(), arguments }),
                        observation: Some(Observation { tool_name: name.clone(), success, content: content.clone(), duration }),
                    });

                    observations.push(Observation { tool_name: name, success, content, duration });
                }
            }
        }

        AgentLoop {
            state: self.state,
            conversation: self.conversation,
            config: self.config,
            phase_data: Some(PhaseData::Dispatch(DispatchOutput { observations, should_terminate, terminal_output })),
            _phase: PhantomData,
        }
    }
}

pub enum LoopContinuation {
    Continue(Box<AgentLoop<Reasoning>>),
    Complete(LoopResult),
}

impl AgentLoop<Observing> {
    /// Intents that may transition straight to FINISH after one
    /// sufficiently detailed `vector_search` observation, without ever
    /// calling `knowledge_graph_search`: a bare greeting, and a query too
    /// unspecific to match any of the three legal collections. The
    /// domain-legal intents (immigration, tax, corporate) are this
    /// system's "business_complex" equivalents and never early-exit after
    /// a single retrieval, so the engine can still combine vector search
    /// with a knowledge-graph lookup for them.
    const EARLY_EXIT_INTENTS: &'static [&'static str] = &["greeting", "general"];

    fn query_text(&self) -> &str {
        self.conversation
            .messages
            .iter()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    /// Context-quality heuristic: weighted mean of per-observation keyword
    /// overlap against the original query (×0.7) and how close the
    /// observation count is to saturating at five (×0.3).
    fn context_quality(&self) -> f32 {
        let observations: Vec<&Observation> = self.state.history.iter().filter_map(|r| r.observation.as_ref()).collect();
        if observations.is_empty() {
            return 0.0;
        }
        let query = self.query_text();
        let mean_overlap: f32 =
            observations.iter().map(|o| jaccard_similarity(query, &o.content)).sum::<f32>() / observations.len() as f32;
        let count_term = (observations.len() as f32 / 5.0).min(1.0);
        mean_overlap * 0.7 + count_term * 0.3
    }

    pub fn observe_results(self) -> LoopContinuation {
        let dispatch_output = match self.phase_data {
            Some(PhaseData::Dispatch(output)) => output,
            _ => {
                return LoopContinuation::Complete(LoopResult {
                    output: String::new(),
                    state: self.state,
                    conversation: self.conversation,
                    termination_reason: TerminationReason::Error { message: "missing dispatch output".into() },
                });
            }
        };

        if dispatch_output.should_terminate {
            return self.finish_at_gate(dispatch_output.terminal_output.unwrap_or_default(), false);
        }

        let last_observation_invites_early_exit = self
            .state
            .history
            .last()
            .and_then(|record| record.observation.as_ref())
            .map(|obs| obs.tool_name == "vector_search" && obs.content.len() > 500)
            .unwrap_or(false);

        if last_observation_invites_early_exit && Self::EARLY_EXIT_INTENTS.contains(&self.state.intent.as_str()) {
            return self.finish_at_gate(String::new(), true);
        }

        LoopContinuation::Continue(Box::new(AgentLoop {
            state: self.state,
            conversation: self.conversation,
            config: self.config,
            phase_data: None,
            _phase: PhantomData,
        }))
    }

    /// The context-quality gate guards every FINISH transition, whether
    /// reached via a normal `Respond` action or the early-exit rule: below
    /// the 0.3 threshold, with steps still available, the loop runs one
    /// more retrieval round instead of finishing.
    fn finish_at_gate(mut self, output: String, via_early_exit: bool) -> LoopContinuation {
        if self.context_quality() < 0.3 && self.state.step < self.config.max_steps {
            return LoopContinuation::Continue(Box::new(AgentLoop {
                state: self.state,
                conversation: self.conversation,
                config: self.config,
                phase_data: None,
                _phase: PhantomData,
            }));
        }

        if via_early_exit {
            self.state.early_exit = true;
        }

        LoopContinuation::Complete(LoopResult {
            output,
            state: self.state,
            conversation: self.conversation,
            termination_reason: TerminationReason::Completed,
        })
    }
}
