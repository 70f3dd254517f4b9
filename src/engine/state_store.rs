use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::model::game_state::GameState;
use crate::model::status_record::StatusRecord;

/// Single owner of the canonical [`GameState`].
///
/// Clones share the same state. Only [`GameStateStore::commit`] and
/// [`GameStateStore::reset`] write, and both swap the whole value at once, so
/// readers never see half of a commit.
#[derive(Clone)]
pub struct GameStateStore {
    state: Arc<watch::Sender<GameState>>,
    initial: GameState,
    commits: Arc<AtomicU64>,
}

impl GameStateStore {
    pub fn new(initial: GameState) -> Self {
        let (state, _) = watch::channel(initial.clone());
        Self {
            state: Arc::new(state),
            initial,
            commits: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Immutable snapshot of the current state.
    pub fn read(&self) -> GameState {
        self.state.borrow().clone()
    }

    /// Receiver that is notified after every commit.
    pub fn subscribe(&self) -> watch::Receiver<GameState> {
        self.state.subscribe()
    }

    /// Applies `record` and returns the new state, or `None` when the record
    /// carries nothing to apply.
    pub fn commit(&self, record: &StatusRecord) -> Option<GameState> {
        if record.is_empty() {
            return None;
        }

        let next = self.read().merged(record);
        self.state.send_replace(next.clone());
        let commits = self.commits.fetch_add(1, Ordering::SeqCst) + 1;

        info!(
            health = next.health,
            inventory = ?next.inventory,
            commits,
            "Committed game state"
        );
        Some(next)
    }

    pub fn reset(&self) {
        self.state.send_replace(self.initial.clone());
    }

    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }
}

impl Default for GameStateStore {
    fn default() -> Self {
        Self::new(GameState::default())
    }
}
