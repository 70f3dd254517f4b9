//! Keeps a streamed narrator reply and the game state it reports in sync.
//!
//! Text arrives fragment by fragment; the `[STATUS]...[/STATUS]` marker at the
//! end of each reply is hidden from the player while it streams and committed
//! to the [`GameStateStore`](engine::state_store::GameStateStore) once the
//! reply is complete.

pub mod engine;
pub mod model;
pub mod settings;
