use serde::{Deserialize, Serialize};

/// Output of the status parser for one marker.
/// This does NOT mutate state directly; the store commits it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    /// `None` when the health field was missing or unreadable.
    pub health: Option<u32>,

    /// `None` when the inventory field was missing. `Some(vec![])` means the
    /// narrator reported an empty inventory.
    pub inventory_items: Option<Vec<String>>,
}

impl StatusRecord {
    pub fn is_empty(&self) -> bool {
        self.health.is_none() && self.inventory_items.is_none()
    }
}
