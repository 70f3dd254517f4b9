#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;
use tokio::sync::mpsc;

use story_sync::engine::fragment_stream::{BoxFragmentStream, FragmentSource, TransportError};
use story_sync::engine::protocol::EngineResponse;
use story_sync::engine::state_store::GameStateStore;
use story_sync::engine::turn_controller::TurnController;
use story_sync::model::message::ChatMessage;

pub type Item = Result<String, TransportError>;

/// Replays the same fragments for every turn.
pub struct ScriptedSource {
    items: Vec<Item>,
    pub opened: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(items: Vec<Item>) -> Arc<Self> {
        Arc::new(Self {
            items,
            opened: AtomicUsize::new(0),
        })
    }

    pub fn text(parts: &[&str]) -> Arc<Self> {
        Self::new(parts.iter().map(|p| Ok(p.to_string())).collect())
    }
}

#[async_trait]
impl FragmentSource for ScriptedSource {
    async fn open(&self, _: Vec<ChatMessage>) -> Result<BoxFragmentStream, TransportError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(stream::iter(self.items.clone())))
    }
}

/// Hands out one stream whose fragments the test pushes by hand. Dropping
/// the sender ends the stream.
pub struct GatedSource {
    rx: Mutex<Option<mpsc::UnboundedReceiver<Item>>>,
    pub opened: AtomicUsize,
}

impl GatedSource {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<Item>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Arc::new(Self {
            rx: Mutex::new(Some(rx)),
            opened: AtomicUsize::new(0),
        });
        (source, tx)
    }
}

#[async_trait]
impl FragmentSource for GatedSource {
    async fn open(&self, _: Vec<ChatMessage>) -> Result<BoxFragmentStream, TransportError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| TransportError::RequestFailed("stream already used".into()))?;

        Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }
}

pub fn controller(
    source: Arc<dyn FragmentSource>,
) -> (Arc<TurnController>, mpsc::UnboundedReceiver<EngineResponse>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let controller = TurnController::new(source, GameStateStore::default(), tx);
    (Arc::new(controller), rx)
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<EngineResponse>) -> Vec<EngineResponse> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

pub fn display_updates(events: &[EngineResponse]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineResponse::DisplayUpdate { text } => Some(text.clone()),
            _ => None,
        })
        .collect()
}
