//! Request controller: one cancellable answer request at a time.
//!
//! A [`Pipeline`] owns the conversation and spawns one task per request. The
//! task frames the response body, decodes payloads and folds them into the
//! target turn. Starting a request retires the previous one; mutations from a
//! retired request are discarded under the same lock that guards the turns.

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use quill_wire::{AnswerRequest, AnswerTransport, EventKind, Source, StreamEvent, frame_payloads};
use serde::{Deserialize, Serialize};
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
    dispatch::{Applied, apply_event},
    error::{Error, Result},
    events::{PipelineEvent, RequestOutcome},
    handle::PipelineHandle,
    resolve::{RetryPolicy, Submission, SubmissionMode, apply_submission, validate_submission},
    turn::{Conversation, Status, Target},
    variant::{ChatVariant, RequestContext, RequestOptions},
};

/// Text written onto a turn when a request fails without a producer message
pub const GENERIC_ERROR: &str = "Something went wrong. Please try again.";

/// How answers are fetched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    /// Incremental deltas over the streaming endpoint
    #[default]
    Streaming,
    /// One request/response round trip
    Blocking,
}

/// Pipeline configuration
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub options: RequestOptions,
    pub mode: AnswerMode,
    pub retry_policy: RetryPolicy,
}

struct Shared {
    state: Mutex<Conversation>,
    transport: Arc<dyn AnswerTransport>,
    variant: Arc<dyn ChatVariant>,
    config: Mutex<PipelineConfig>,
    handle: PipelineHandle,
    event_tx: broadcast::Sender<PipelineEvent>,
}

/// Everything a spawned request task needs
struct Launch {
    generation: u64,
    target: Target,
    request: AnswerRequest,
    cancel: CancellationToken,
}

/// Streaming answer pipeline for one conversation.
///
/// Cloning yields another reference to the same pipeline.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Shared>,
}

impl Pipeline {
    /// Create a pipeline with an empty conversation
    pub fn new(
        transport: Arc<dyn AnswerTransport>,
        variant: Arc<dyn ChatVariant>,
        config: PipelineConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Shared {
                state: Mutex::new(Conversation::default()),
                transport,
                variant,
                config: Mutex::new(config),
                handle: PipelineHandle::new(),
                event_tx,
            }),
        }
    }

    /// Subscribe to pipeline events
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Copy of the current conversation
    pub fn snapshot(&self) -> Conversation {
        self.inner.state.lock().clone()
    }

    pub fn status(&self) -> Status {
        self.inner.state.lock().status
    }

    /// Name of the call site this pipeline serves
    pub fn variant_name(&self) -> &'static str {
        self.inner.variant.name()
    }

    /// Get a cloneable handle for waiting on the pipeline from external code.
    pub fn handle(&self) -> PipelineHandle {
        self.inner.handle.clone()
    }

    pub fn config(&self) -> PipelineConfig {
        self.inner.config.lock().clone()
    }

    /// Replace the request options used by later requests
    pub fn set_options(&self, options: RequestOptions) {
        self.inner.config.lock().options = options;
    }

    pub fn set_mode(&self, mode: AnswerMode) {
        self.inner.config.lock().mode = mode;
    }

    pub fn set_retry_policy(&self, policy: RetryPolicy) {
        self.inner.config.lock().retry_policy = policy;
    }

    /// Submit a prompt from the input box.
    ///
    /// The retry policy may turn this into a retry or edit of a failed last turn.
    pub fn submit(&self, prompt: &str) -> Result<JoinHandle<()>> {
        let policy = self.inner.config.lock().retry_policy;
        let mut conv = self.inner.state.lock();
        let submission = policy.apply(&conv.turns, prompt, Submission::fresh());
        let launch = self.inner.launch(&mut conv, prompt, submission)?;
        drop(conv);
        Ok(self.spawn(launch))
    }

    /// Submit with an explicit index: a retry keeps the turn's prompt, an edit
    /// replaces the turn and drops every turn after it.
    pub fn submit_at(
        &self,
        prompt: &str,
        index: Option<usize>,
        is_retry: bool,
    ) -> Result<JoinHandle<()>> {
        self.start(prompt, Submission::explicit(index, is_retry))
    }

    /// Re-issue the request for the turn at `index`
    pub fn retry(&self, index: usize) -> Result<JoinHandle<()>> {
        self.start("", Submission::retry(index))
    }

    /// Start a request for a resolved submission, retiring any request in flight.
    ///
    /// `prompt` is ignored for retries; the turn keeps its own.
    pub fn start(&self, prompt: &str, submission: Submission) -> Result<JoinHandle<()>> {
        let mut conv = self.inner.state.lock();
        let launch = self.inner.launch(&mut conv, prompt, submission)?;
        drop(conv);
        Ok(self.spawn(launch))
    }

    /// Stop the request in flight, if any. No error is recorded.
    ///
    /// Returns `true` if a request was stopped.
    pub fn stop(&self) -> bool {
        let mut conv = self.inner.state.lock();
        let generation = self.inner.handle.generation();
        let stopped = self.inner.handle.retire();
        if conv.status == Status::Loading {
            conv.status = Status::Idle;
            self.inner.emit(PipelineEvent::StatusChanged {
                status: Status::Idle,
            });
        }
        if stopped {
            debug!("Stopped request {}", generation);
            self.inner.emit(PipelineEvent::RequestEnd {
                generation,
                outcome: RequestOutcome::Cancelled,
            });
        }
        stopped
    }

    /// Stop any request and start a new chat
    pub fn reset(&self) {
        self.stop();
        let mut conv = self.inner.state.lock();
        conv.reset();
        self.inner.emit(PipelineEvent::TurnsChanged { len: 0 });
    }

    /// Wait until no request is in flight.
    pub async fn wait_for_idle(&self) {
        self.inner.handle.wait_for_idle().await;
    }

    fn spawn(&self, launch: Launch) -> JoinHandle<()> {
        let shared = Arc::clone(&self.inner);
        tokio::spawn(async move { shared.run(launch).await })
    }
}

impl Shared {
    fn emit(&self, event: PipelineEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Apply a submission to the store and arm a new request, all under the
    /// conversation lock.
    fn launch(
        &self,
        conv: &mut Conversation,
        prompt: &str,
        submission: Submission,
    ) -> Result<Launch> {
        validate_submission(conv, &submission)?;

        let index = submission.turn_index(conv.turns.len());
        let question = match submission.mode {
            SubmissionMode::Retry => conv.turns[index].prompt.clone(),
            _ => prompt.to_string(),
        };
        let history = conv.history_before(index);
        let options = self.config.lock().options.clone();
        let request = self.variant.build_request(&RequestContext {
            question: &question,
            history: &history,
            conversation_id: conv.conversation_id.as_deref(),
            options: &options,
        })?;

        let previous = self.handle.generation();
        let was_running = self.handle.is_running();
        let index = apply_submission(conv, &submission, &question)?;
        let (generation, cancel) = self.handle.arm();
        conv.status = Status::Loading;
        if self.variant.tracks_execution() {
            conv.clear_execution();
        }

        if was_running {
            self.emit(PipelineEvent::RequestEnd {
                generation: previous,
                outcome: RequestOutcome::Cancelled,
            });
        }
        if submission.mode != SubmissionMode::Retry {
            self.emit(PipelineEvent::TurnsChanged {
                len: conv.turns.len(),
            });
        }
        self.emit(PipelineEvent::TurnUpdated { index });
        self.emit(PipelineEvent::StatusChanged {
            status: Status::Loading,
        });
        self.emit(PipelineEvent::RequestStart { generation, index });

        debug!(
            "Starting {} request {} ({:?}) for turn {}",
            self.variant.name(),
            generation,
            submission.mode,
            index
        );

        Ok(Launch {
            generation,
            target: submission.target(),
            request,
            cancel,
        })
    }

    async fn run(self: Arc<Self>, launch: Launch) {
        let mode = self.config.lock().mode;
        let result = match mode {
            AnswerMode::Streaming => self.run_stream(&launch).await,
            AnswerMode::Blocking => self.run_blocking(&launch).await,
        };
        self.finish(&launch, result);
    }

    async fn run_stream(&self, launch: &Launch) -> Result<()> {
        let chunks = self
            .transport
            .stream(&launch.request, launch.cancel.clone())
            .await?;
        let mut payloads = std::pin::pin!(frame_payloads(chunks));
        let recognized = self.variant.recognized();

        while let Some(payload) = payloads.next().await {
            let payload = payload?;
            let event = match StreamEvent::decode(&payload, recognized) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Dropping malformed payload: {} ({})", payload, e);
                    continue;
                }
            };
            if !self.dispatch(launch, event) {
                break;
            }
        }
        Ok(())
    }

    /// Fold one event into the store. Returns `false` once the request has been
    /// retired; `end` and `error` do not stop reading.
    fn dispatch(&self, launch: &Launch, event: StreamEvent) -> bool {
        let mut conv = self.state.lock();
        if !self.handle.is_current(launch.generation) {
            trace!("Request {} superseded, dropping event", launch.generation);
            return false;
        }

        let notice = match &event {
            StreamEvent::ConversationId { id } => {
                Some(PipelineEvent::ConversationId { id: id.clone() })
            }
            StreamEvent::WorkflowStep(update) => Some(PipelineEvent::StepUpdated {
                node_id: update.node_id.clone(),
            }),
            _ => None,
        };
        let index = conv.resolve_target(launch.target);

        match apply_event(&mut conv, event, launch.target, now_ms()) {
            Applied::Mutated => {
                if let Some(notice) = notice {
                    self.emit(notice);
                }
                if let Some(index) = index {
                    self.emit(PipelineEvent::TurnUpdated { index });
                }
                true
            }
            Applied::Terminal => {
                if let Some(index) = index {
                    self.emit(PipelineEvent::TurnUpdated { index });
                }
                self.emit(PipelineEvent::StatusChanged {
                    status: conv.status,
                });
                true
            }
            Applied::Dropped(reason) => {
                trace!("Dropped event: {:?}", reason);
                true
            }
        }
    }

    async fn run_blocking(&self, launch: &Launch) -> Result<()> {
        let response = self
            .transport
            .answer(&launch.request, launch.cancel.clone())
            .await?;

        let mut conv = self.state.lock();
        if !self.handle.is_current(launch.generation) || conv.status != Status::Loading {
            return Ok(());
        }

        if let Some(id) = response
            .conversation_id
            .filter(|_| self.variant.recognized().contains(&EventKind::Id))
        {
            conv.conversation_id = Some(id.clone());
            self.emit(PipelineEvent::ConversationId { id });
        }

        let Some(index) = conv.resolve_target(launch.target) else {
            return Err(Error::Other("Target turn no longer exists".to_string()));
        };
        let turn = &mut conv.turns[index];
        turn.response = response.answer;
        turn.thought = response.thought.unwrap_or_default();
        turn.sources = response.sources.map(shorten_titles);
        turn.tool_calls = response.tool_calls;
        conv.status = Status::Idle;

        self.emit(PipelineEvent::TurnUpdated { index });
        self.emit(PipelineEvent::StatusChanged {
            status: Status::Idle,
        });
        Ok(())
    }

    /// Settle status once a request stops, if it still owns the pipeline
    fn finish(&self, launch: &Launch, result: Result<()>) {
        let mut conv = self.state.lock();
        if !self.handle.is_current(launch.generation) {
            debug!("Request {} finished after being retired", launch.generation);
            return;
        }

        let before = conv.status;
        let outcome = match result {
            Ok(()) => {
                if conv.status == Status::Loading {
                    debug!("Stream ended without an end event");
                    conv.status = Status::Idle;
                }
                if conv.status == Status::Failed {
                    RequestOutcome::Failed
                } else {
                    RequestOutcome::Completed
                }
            }
            Err(e) if e.is_aborted() => {
                if conv.status == Status::Loading {
                    conv.status = Status::Idle;
                }
                RequestOutcome::Cancelled
            }
            Err(e) => {
                warn!("Request {} failed: {}", launch.generation, e);
                if conv.status == Status::Loading {
                    conv.set_error(launch.target, GENERIC_ERROR);
                    if let Some(index) = conv.resolve_target(launch.target) {
                        self.emit(PipelineEvent::TurnUpdated { index });
                    }
                    RequestOutcome::Failed
                } else {
                    RequestOutcome::Completed
                }
            }
        };

        if conv.status != before {
            self.emit(PipelineEvent::StatusChanged {
                status: conv.status,
            });
        }
        self.handle.finish(launch.generation);
        self.emit(PipelineEvent::RequestEnd {
            generation: launch.generation,
            outcome,
        });
    }
}

fn shorten_titles(sources: Vec<Source>) -> Vec<Source> {
    sources
        .into_iter()
        .map(|mut source| {
            if let Some(short) = source.short_title().map(str::to_string) {
                source.title = Some(short);
            }
            source
        })
        .collect()
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
