//! Drives one prompt/reply turn at a time.
//!
//! Phases run `Idle → Submitting → Streaming → Finalizing → Idle`, or end in
//! `Failed → Idle` when the transport breaks. `Streaming` starts with the
//! first text fragment, not when the request is accepted. Game state is
//! committed only in `Finalizing`, at most once per turn.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::engine::fragment_stream::{Delta, FragmentSource, FragmentStream, TransportError};
use crate::engine::marker_scanner::{MarkerScanner, MarkerState};
use crate::engine::prompt_builder::PromptBuilder;
use crate::engine::protocol::EngineResponse;
use crate::engine::state_store::GameStateStore;
use crate::engine::status_parser::parse_status;
use crate::model::game_state::GameState;
use crate::model::message::Message;
use crate::model::turn::{Turn, TurnPhase};

pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("a turn is already in progress")]
    Busy,
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("turn cancelled")]
    Cancelled,
    #[error("turn failed: {source}")]
    Transport {
        partial: String,
        #[source]
        source: TransportError,
    },
}

/// What happened to the status marker of a finished reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerOutcome {
    Absent,
    Applied,
    Unterminated,
    Unreadable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub display: String,
    pub state: GameState,
    pub committed: bool,
    pub marker: MarkerOutcome,
}

pub struct TurnController {
    source: Arc<dyn FragmentSource>,
    store: GameStateStore,
    phase: watch::Sender<TurnPhase>,
    history: Mutex<Vec<Message>>,
    history_limit: usize,
    events: mpsc::UnboundedSender<EngineResponse>,
}

impl TurnController {
    pub fn new(
        source: Arc<dyn FragmentSource>,
        store: GameStateStore,
        events: mpsc::UnboundedSender<EngineResponse>,
    ) -> Self {
        let (phase, _) = watch::channel(TurnPhase::Idle);
        Self {
            source,
            store,
            phase,
            history: Mutex::new(Vec::new()),
            history_limit: DEFAULT_HISTORY_LIMIT,
            events,
        }
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    /// True from submission until the turn is finalized or has failed.
    pub fn is_busy(&self) -> bool {
        !self.phase.borrow().is_idle()
    }

    pub fn phase(&self) -> TurnPhase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<TurnPhase> {
        self.phase.subscribe()
    }

    pub fn store(&self) -> &GameStateStore {
        &self.store
    }

    pub fn history(&self) -> Vec<Message> {
        self.lock_history().clone()
    }

    pub async fn check_connection(&self) -> Result<String, TransportError> {
        self.source.check_connection().await
    }

    /// Clears history and restores the initial game state. Refused while a
    /// turn is running.
    pub fn reset_session(&self) -> Result<GameState, TurnError> {
        if self.is_busy() {
            return Err(TurnError::Busy);
        }

        self.lock_history().clear();
        self.store.reset();

        let state = self.store.read();
        self.emit(EngineResponse::SessionReset {
            state: state.clone(),
        });
        Ok(state)
    }

    /// Runs one full turn for `prompt`.
    ///
    /// Dropping the returned future mid-stream leaves the game state as it
    /// was, reports `TurnFailed` with the narrative shown so far and puts the
    /// controller back to `Idle`.
    pub async fn submit(&self, prompt: &str) -> Result<TurnOutcome, TurnError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(TurnError::EmptyPrompt);
        }

        let Some(mut guard) = PhaseGuard::claim(&self.phase, &self.events) else {
            debug!("Rejecting submission while a turn is active");
            self.emit(EngineResponse::SubmissionRejected {
                reason: TurnError::Busy.to_string(),
            });
            return Err(TurnError::Busy);
        };

        self.emit(EngineResponse::TurnStarted {
            prompt: prompt.to_string(),
        });

        let mut turn = Turn::new(prompt);
        let messages = {
            let history = self.lock_history();
            PromptBuilder::build(&self.store.read(), &history, self.history_limit, prompt)
        };

        let mut fragments = match self.source.open(messages).await {
            Ok(stream) => FragmentStream::new(stream),
            Err(e) => return Err(self.fail(&mut guard, &turn, e)),
        };

        let mut scanner = MarkerScanner::new();
        let mut streaming = false;

        loop {
            match fragments.next_delta().await {
                Delta::Text(text) => {
                    if !streaming {
                        guard.set(TurnPhase::Streaming);
                        streaming = true;
                    }
                    turn.push_fragment(&text);
                    let scan = scanner.observe(&turn.accumulated_text);
                    if turn.update_display(scan.display) {
                        guard.shown(&turn.display_text);
                        self.emit(EngineResponse::DisplayUpdate {
                            text: turn.display_text.clone(),
                        });
                    }
                }
                Delta::End => break,
                Delta::Failed(e) => return Err(self.fail(&mut guard, &turn, e)),
            }
        }

        guard.set(TurnPhase::Finalizing);
        turn.is_complete = true;
        let outcome = self.finalize(&mut turn, &mut scanner);

        {
            let mut history = self.lock_history();
            history.push(Message::User(turn.prompt.clone()));
            history.push(Message::Narrator(turn.accumulated_text.trim().to_string()));
        }

        guard.settle();
        self.emit(EngineResponse::TurnCompleted {
            display: outcome.display.clone(),
            state: outcome.state.clone(),
            committed: outcome.committed,
        });

        Ok(outcome)
    }

    fn finalize(&self, turn: &mut Turn, scanner: &mut MarkerScanner) -> TurnOutcome {
        let scan = scanner.finish(&turn.accumulated_text);
        turn.update_display(scan.display);

        let marker = match scan.marker {
            MarkerState::Complete(raw) => match parse_status(&raw) {
                Ok(record) => match self.store.commit(&record) {
                    Some(_) => MarkerOutcome::Applied,
                    None => MarkerOutcome::Unreadable,
                },
                Err(e) => {
                    warn!(error = %e, "Status marker unreadable, game state unchanged");
                    MarkerOutcome::Unreadable
                }
            },
            MarkerState::Unterminated => {
                warn!("Reply ended inside an unterminated status marker, game state unchanged");
                MarkerOutcome::Unterminated
            }
            MarkerState::Absent | MarkerState::Pending => {
                debug!("Reply carried no status marker");
                MarkerOutcome::Absent
            }
        };

        TurnOutcome {
            display: turn.display_text.clone(),
            state: self.store.read(),
            committed: marker == MarkerOutcome::Applied,
            marker,
        }
    }

    fn fail(&self, guard: &mut PhaseGuard<'_>, turn: &Turn, error: TransportError) -> TurnError {
        guard.set(TurnPhase::Failed);
        guard.settle();
        warn!(error = %error, prompt = %turn.prompt, "Turn failed, keeping partial narrative");

        self.emit(EngineResponse::TurnFailed {
            partial: turn.display_text.clone(),
            error: error.to_string(),
        });

        TurnError::Transport {
            partial: turn.display_text.clone(),
            source: error,
        }
    }

    fn emit(&self, response: EngineResponse) {
        let _ = self.events.send(response);
    }

    fn lock_history(&self) -> MutexGuard<'_, Vec<Message>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds the non-idle phase for the lifetime of a turn and puts the
/// controller back to `Idle` on drop. A turn dropped before it settled was
/// cancelled, and front-ends still get a `TurnFailed` for it.
struct PhaseGuard<'a> {
    phase: &'a watch::Sender<TurnPhase>,
    events: &'a mpsc::UnboundedSender<EngineResponse>,
    partial: String,
    settled: bool,
}

impl<'a> PhaseGuard<'a> {
    fn claim(
        phase: &'a watch::Sender<TurnPhase>,
        events: &'a mpsc::UnboundedSender<EngineResponse>,
    ) -> Option<Self> {
        let claimed = phase.send_if_modified(|current| {
            if current.is_idle() {
                *current = TurnPhase::Submitting;
                true
            } else {
                false
            }
        });
        // Lazily, so a failed claim never runs Drop.
        claimed.then(|| Self {
            phase,
            events,
            partial: String::new(),
            settled: false,
        })
    }

    fn set(&self, next: TurnPhase) {
        debug!(phase = next.label(), "Turn phase");
        self.phase.send_replace(next);
    }

    fn shown(&mut self, display: &str) {
        self.partial.clear();
        self.partial.push_str(display);
    }

    /// The turn has reported its own end.
    fn settle(&mut self) {
        self.settled = true;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Turn cancelled before it finished, game state unchanged");
            let _ = self.events.send(EngineResponse::TurnFailed {
                partial: std::mem::take(&mut self.partial),
                error: TurnError::Cancelled.to_string(),
            });
        }
        self.phase.send_replace(TurnPhase::Idle);
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures_util::stream;

    use super::*;
    use crate::engine::fragment_stream::BoxFragmentStream;
    use crate::model::message::ChatMessage;

    /// Replies with a fixed list of fragments and records what it was sent.
    struct Scripted {
        items: Vec<Result<String, TransportError>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl Scripted {
        fn new(items: Vec<Result<String, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                items,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl FragmentSource for Scripted {
        async fn open(
            &self,
            messages: Vec<ChatMessage>,
        ) -> Result<BoxFragmentStream, TransportError> {
            self.seen.lock().unwrap().push(messages);
            Ok(Box::pin(stream::iter(self.items.clone())))
        }
    }

    struct Refusing;

    #[async_trait]
    impl FragmentSource for Refusing {
        async fn open(&self, _: Vec<ChatMessage>) -> Result<BoxFragmentStream, TransportError> {
            Err(TransportError::RequestFailed("connection refused".into()))
        }
    }

    fn controller(
        source: Arc<dyn FragmentSource>,
    ) -> (TurnController, mpsc::UnboundedReceiver<EngineResponse>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TurnController::new(source, GameStateStore::default(), tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<EngineResponse>) -> Vec<EngineResponse> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    fn ok(parts: &[&str]) -> Vec<Result<String, TransportError>> {
        parts.iter().map(|p| Ok(p.to_string())).collect()
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_without_a_turn() {
        let (controller, mut rx) = controller(Scripted::new(ok(&["hi"])));
        assert!(matches!(controller.submit("   ").await, Err(TurnError::EmptyPrompt)));
        assert!(drain(&mut rx).is_empty());
        assert!(!controller.is_busy());
    }

    #[tokio::test]
    async fn failing_open_reports_failure_and_returns_to_idle() {
        let (controller, mut rx) = controller(Arc::new(Refusing));

        let err = controller.submit("go north").await.unwrap_err();
        assert!(matches!(err, TurnError::Transport { ref partial, .. } if partial.is_empty()));
        assert_eq!(controller.phase(), TurnPhase::Idle);
        assert_eq!(controller.store().read(), GameState::default());

        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(EngineResponse::TurnFailed { .. })));
    }

    #[tokio::test]
    async fn completed_turn_is_recorded_in_history() {
        let source = Scripted::new(ok(&["Hello.", "\n[STATUS]HEALTH:9,INVENTORY:[/STATUS]"]));
        let (controller, _rx) = controller(source.clone());

        controller.submit("wave").await.unwrap();
        controller.submit("wave again").await.unwrap();

        assert_eq!(
            controller.history()[..2],
            [
                Message::User("wave".into()),
                Message::Narrator("Hello.\n[STATUS]HEALTH:9,INVENTORY:[/STATUS]".into()),
            ]
        );

        let seen = source.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        // system + two replayed messages + new prompt
        assert_eq!(seen[1].len(), 4);
        assert!(seen[1][0].content.contains("HEALTH:9,INVENTORY:"));
    }

    #[tokio::test]
    async fn display_updates_are_only_sent_on_change() {
        let (controller, mut rx) = controller(Scripted::new(ok(&[
            "Dark.",
            " [STA",
            "TUS]HEALTH:1",
            ",INVENTORY:[/STATUS]",
        ])));

        controller.submit("look").await.unwrap();

        let updates: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                EngineResponse::DisplayUpdate { text } => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(updates, vec!["Dark."]);
    }

    #[tokio::test]
    async fn reset_clears_history_and_state() {
        let (controller, mut rx) = controller(Scripted::new(ok(&[
            "Ouch.[STATUS]HEALTH:3,INVENTORY:stick[/STATUS]",
        ])));
        controller.submit("fall").await.unwrap();
        assert_eq!(controller.store().read().health, 3);

        let state = controller.reset_session().unwrap();
        assert_eq!(state, GameState::default());
        assert!(controller.history().is_empty());
        assert!(matches!(
            drain(&mut rx).last(),
            Some(EngineResponse::SessionReset { .. })
        ));
    }
}
