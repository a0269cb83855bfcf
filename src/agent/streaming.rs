//! Turn execution as a lazily driven event stream.
//!
//! The loop is a phase machine polled through [`stream::unfold`]: nothing runs
//! until the caller pulls the next event, and dropping the stream drops the
//! in-flight model stream or tool call with it. An assistant message is committed
//! to the store only once its model stream has ended.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{self, join_all};
use futures::{Stream, StreamExt, stream};
use tracing::{debug, info, warn};

use super::config::{ExecutionConfig, FragmentPolicy};
use super::events::{AgentEvent, TurnResult};
use super::executor::{Agent, TurnConfig};
use super::reasoning::{ReasoningStep, StepDraft};
use super::router::{Route, route};
use super::state::{AgentMetrics, LoopEvent, LoopState};
use crate::client::{ModelError, ModelStream};
use crate::session::{ConversationStore, ThreadId};
use crate::tools::ToolExecutor;
use crate::types::{Message, ToolCallRequest, ToolResult, Usage};

const ABANDONED_CALL_MESSAGE: &str = "Tool call abandoned before completion";

pub type EventStream = Pin<Box<dyn Stream<Item = crate::Result<AgentEvent>> + Send>>;

pub type FragmentStream = Pin<Box<dyn Stream<Item = crate::Result<String>> + Send>>;

impl Agent {
    /// Submits `text` to `thread` and returns the turn's answer fragments.
    ///
    /// Fragments arrive in generation order and concatenate to the committed answer.
    /// A fatal error ends the sequence with `Err`.
    pub fn submit_turn(&self, thread: &ThreadId, text: &str) -> FragmentStream {
        Box::pin(self.execute_stream(thread, text).filter_map(|event| {
            future::ready(match event {
                Ok(AgentEvent::Text(text)) => Some(Ok(text)),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            })
        }))
    }

    /// Full event stream for one turn using the agent's current model and tools.
    pub fn execute_stream(&self, thread: &ThreadId, text: &str) -> EventStream {
        self.execute_turn(self.turn_config(thread), text)
    }

    /// Event stream for one turn under an explicit turn configuration.
    pub fn execute_turn(&self, turn: TurnConfig, text: &str) -> EventStream {
        let reasoning = ReasoningStep::new(
            Arc::clone(&self.provider),
            turn.model,
            turn.tools.descriptors(),
            &self.config,
        );
        let mut executor = ToolExecutor::new(turn.tools);
        if let Some(timeout) = self.config.execution.tool_timeout {
            executor = executor.with_timeout(timeout);
        }

        let state = TurnState::new(
            TurnContext {
                store: Arc::clone(&self.store),
                reasoning,
                executor,
                execution: self.config.execution.clone(),
                thread: turn.thread,
            },
            text.to_string(),
        );

        Box::pin(stream::unfold(state, |mut state| async move {
            state.next_event().await.map(|event| (event, state))
        }))
    }
}

struct TurnContext {
    store: Arc<dyn ConversationStore>,
    reasoning: ReasoningStep,
    executor: ToolExecutor,
    execution: ExecutionConfig,
    thread: ThreadId,
}

enum Phase {
    Start,
    Request,
    Streaming(Box<StreamingPhase>),
    Dispatching { index: usize },
    Done,
}

struct StreamingPhase {
    stream: ModelStream,
    draft: StepDraft,
    /// Fragments held back under [`FragmentPolicy::Settled`]
    held: Vec<String>,
}

struct TurnState {
    ctx: TurnContext,
    phase: Phase,
    loop_state: LoopState,
    user_text: Option<String>,
    metrics: AgentMetrics,
    usage: Usage,
    start_time: Instant,
    pending_calls: Vec<ToolCallRequest>,
    appended: Vec<Message>,
    queued: VecDeque<AgentEvent>,
}

impl TurnState {
    fn new(ctx: TurnContext, text: String) -> Self {
        Self {
            ctx,
            phase: Phase::Start,
            loop_state: LoopState::Start,
            user_text: Some(text),
            metrics: AgentMetrics::default(),
            usage: Usage::default(),
            start_time: Instant::now(),
            pending_calls: Vec::new(),
            appended: Vec::new(),
            queued: VecDeque::new(),
        }
    }

    async fn next_event(&mut self) -> Option<crate::Result<AgentEvent>> {
        loop {
            if let Some(event) = self.queued.pop_front() {
                return Some(Ok(event));
            }

            let outcome = match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Start => self.do_start().await,
                Phase::Request => self.do_request().await,
                Phase::Streaming(streaming) => self.do_poll_stream(streaming).await,
                Phase::Dispatching { index } => self.do_dispatch(index).await,
                Phase::Done => return None,
            };

            match outcome {
                Ok(Some(event)) => return Some(Ok(event)),
                Ok(None) => {}
                Err(e) => {
                    self.phase = Phase::Done;
                    return Some(Err(self.fail(e)));
                }
            }
        }
    }

    fn fail(&self, source: crate::Error) -> crate::Error {
        warn!(
            thread = %self.ctx.thread,
            state = %self.loop_state,
            cycle = self.metrics.cycles,
            error = %source,
            "Turn failed"
        );
        crate::Error::Turn {
            thread: self.ctx.thread.clone(),
            state: self.loop_state,
            source: Box::new(source),
        }
    }

    fn advance(&mut self, event: LoopEvent) -> crate::Result<()> {
        let next = self.loop_state.next(event).ok_or_else(|| {
            crate::Error::Internal(format!(
                "no transition from {} on {:?}",
                self.loop_state, event
            ))
        })?;
        debug!(from = %self.loop_state, to = %next, "Loop transition");
        self.loop_state = next;
        Ok(())
    }

    async fn commit(&mut self, message: Message) -> crate::Result<()> {
        self.ctx
            .store
            .append(&self.ctx.thread, message.clone())
            .await?;
        self.appended.push(message);
        Ok(())
    }

    async fn do_start(&mut self) -> crate::Result<Option<AgentEvent>> {
        let text = self.user_text.take().unwrap_or_default();
        info!(thread = %self.ctx.thread, "Turn started");
        self.close_abandoned_calls().await?;
        self.commit(Message::user(text)).await?;
        self.advance(LoopEvent::UserAppended)?;
        self.phase = Phase::Request;
        Ok(None)
    }

    /// Answers calls left open by an earlier turn that was dropped mid-dispatch.
    async fn close_abandoned_calls(&mut self) -> crate::Result<()> {
        let abandoned = self.ctx.store.pending_calls(&self.ctx.thread).await?;
        if abandoned.is_empty() {
            return Ok(());
        }
        warn!(
            thread = %self.ctx.thread,
            calls = abandoned.len(),
            "Closing tool calls abandoned by an earlier turn"
        );
        for call_id in abandoned {
            self.commit(Message::Tool(ToolResult::error(call_id, ABANDONED_CALL_MESSAGE)))
                .await?;
        }
        Ok(())
    }

    async fn do_request(&mut self) -> crate::Result<Option<AgentEvent>> {
        if let Some(limit) = self.ctx.execution.max_cycles
            && self.metrics.cycles >= limit
        {
            return Err(crate::Error::CycleLimit { limit });
        }
        self.metrics.cycles += 1;

        let history = self.ctx.store.read(&self.ctx.thread).await?;
        debug!(
            cycle = self.metrics.cycles,
            messages = history.len(),
            "Reasoning step"
        );
        let stream = self.ctx.reasoning.stream(&history).await?;
        self.metrics.record_api_call();

        self.phase = Phase::Streaming(Box::new(StreamingPhase {
            stream,
            draft: StepDraft::default(),
            held: Vec::new(),
        }));
        Ok(None)
    }

    async fn do_poll_stream(
        &mut self,
        mut streaming: Box<StreamingPhase>,
    ) -> crate::Result<Option<AgentEvent>> {
        let chunk_timeout = self.ctx.execution.chunk_timeout;
        let item = match tokio::time::timeout(chunk_timeout, streaming.stream.next()).await {
            Ok(Some(item)) => item?,
            Ok(None) => return self.finish_step(*streaming).await,
            Err(_) => return Err(ModelError::Timeout(chunk_timeout).into()),
        };

        let had_calls = streaming.draft.has_calls();
        let event = match streaming.draft.push(item) {
            Some(text) if text.is_empty() => None,
            Some(text) => match self.ctx.execution.fragment_policy {
                FragmentPolicy::Live if !had_calls => Some(AgentEvent::Text(text)),
                FragmentPolicy::Live => None,
                FragmentPolicy::Settled => {
                    streaming.held.push(text);
                    None
                }
            },
            None => None,
        };

        self.phase = Phase::Streaming(streaming);
        Ok(event)
    }

    async fn finish_step(&mut self, streaming: StreamingPhase) -> crate::Result<Option<AgentEvent>> {
        let StreamingPhase { draft, held, .. } = streaming;
        self.metrics.add_usage(&draft.usage);
        self.usage.add(&draft.usage);

        let message = draft.into_message();
        let decision = route(&message);
        debug!(
            cycle = self.metrics.cycles,
            route = ?decision,
            calls = message.tool_calls().len(),
            "Routed reasoning output"
        );

        self.pending_calls = message.tool_calls().to_vec();
        let text = message.text();
        self.commit(message).await?;
        self.advance(LoopEvent::Routed(decision))?;

        match decision {
            Route::Terminate => {
                if self.ctx.execution.fragment_policy == FragmentPolicy::Settled {
                    self.queued.extend(held.into_iter().map(AgentEvent::Text));
                }
                self.metrics.execution_time_ms = self.start_time.elapsed().as_millis() as u64;
                info!(
                    thread = %self.ctx.thread,
                    cycles = self.metrics.cycles,
                    tool_calls = self.metrics.tool_calls,
                    duration_ms = self.metrics.execution_time_ms,
                    "Turn complete"
                );
                let result = TurnResult {
                    thread: self.ctx.thread.clone(),
                    text,
                    usage: self.usage,
                    metrics: self.metrics.clone(),
                    messages: std::mem::take(&mut self.appended),
                };
                self.queued.push_back(AgentEvent::Complete(Box::new(result)));
                self.phase = Phase::Done;
            }
            Route::Dispatch => {
                self.phase = Phase::Dispatching { index: 0 };
            }
        }
        Ok(None)
    }

    async fn do_dispatch(&mut self, index: usize) -> crate::Result<Option<AgentEvent>> {
        if index == 0 && self.ctx.execution.parallel_tool_calls && self.pending_calls.len() > 1 {
            return self.dispatch_batch().await;
        }

        let Some(call) = self.pending_calls.get(index).cloned() else {
            self.pending_calls.clear();
            self.advance(LoopEvent::ResultsAppended)?;
            self.phase = Phase::Request;
            return Ok(None);
        };

        debug!(tool = %call.name(), call_id = %call.id(), "Dispatching tool call");
        let start = Instant::now();
        let result = self.ctx.executor.execute(&call).await;
        let event = self.record_result(&call, result, start.elapsed()).await?;

        self.phase = Phase::Dispatching { index: index + 1 };
        Ok(Some(event))
    }

    /// Runs the whole batch concurrently; results are still appended in call order.
    async fn dispatch_batch(&mut self) -> crate::Result<Option<AgentEvent>> {
        let calls = self.pending_calls.clone();
        debug!(calls = calls.len(), "Dispatching tool calls concurrently");

        let executor = &self.ctx.executor;
        let outcomes = join_all(calls.iter().map(|call| async move {
            let start = Instant::now();
            let result = executor.execute(call).await;
            (result, start.elapsed())
        }))
        .await;

        for (call, (result, elapsed)) in calls.iter().zip(outcomes) {
            let event = self.record_result(call, result, elapsed).await?;
            self.queued.push_back(event);
        }

        self.phase = Phase::Dispatching { index: calls.len() };
        Ok(None)
    }

    async fn record_result(
        &mut self,
        call: &ToolCallRequest,
        result: ToolResult,
        elapsed: Duration,
    ) -> crate::Result<AgentEvent> {
        let duration_ms = elapsed.as_millis() as u64;
        let is_error = result.is_error();
        let output = result.text();

        self.metrics.record_tool(call.name(), duration_ms, is_error);
        self.commit(Message::Tool(result)).await?;

        Ok(AgentEvent::ToolComplete {
            id: call.id().to_string(),
            name: call.name().to_string(),
            output,
            is_error,
            duration_ms,
        })
    }
}
