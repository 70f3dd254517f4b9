use serde::{Deserialize, Serialize};

use crate::model::status_record::StatusRecord;

pub const INITIAL_HEALTH: u32 = 100;

/// The structured game state reported by the narrator.
/// This is READ-ONLY outside the state store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub health: u32,

    /// Items in the order the narrator reported them. Duplicates are kept.
    pub inventory: Vec<String>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::with_health(INITIAL_HEALTH)
    }
}

impl GameState {
    pub fn with_health(health: u32) -> Self {
        Self {
            health,
            inventory: Vec::new(),
        }
    }

    /// Builds the state that results from applying `record` on top of `self`.
    ///
    /// Inventory is replaced in full, never merged. Subfields the parser could
    /// not read keep their current value.
    pub fn merged(&self, record: &StatusRecord) -> GameState {
        GameState {
            health: record.health.unwrap_or(self.health),
            inventory: record
                .inventory_items
                .clone()
                .unwrap_or_else(|| self.inventory.clone()),
        }
    }

    /// Renders the state in marker syntax, used when briefing the narrator.
    pub fn to_marker_fields(&self) -> String {
        format!("HEALTH:{},INVENTORY:{}", self.health, self.inventory.join(","))
    }
}
