use tracing::warn;

use crate::engine::marker_scanner::RawMarker;
use crate::model::status_record::StatusRecord;

const HEALTH_LABEL: &str = "HEALTH:";
const INVENTORY_LABEL: &str = "INVENTORY:";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusParseError {
    #[error("status marker has neither a readable HEALTH nor an INVENTORY field: {0:?}")]
    Unrecognized(String),
}

/// Parses the body of a complete marker.
///
/// Each subfield fails on its own: an unreadable health value leaves
/// `health` as `None` while the inventory is still read, and vice versa. Only
/// a marker with no usable subfield at all is an error.
pub fn parse_status(marker: &RawMarker) -> Result<StatusRecord, StatusParseError> {
    parse_body(&marker.body)
}

/// Reads the fields in grammar order: `HEALTH:` must open the body, the
/// health digits run to the first `,`, and `INVENTORY:` must follow that
/// separator. Labels are never searched for further in, so item text such as
/// `potion of HEALTH:50` cannot be mistaken for a field.
pub fn parse_body(body: &str) -> Result<StatusRecord, StatusParseError> {
    let body = body.trim_start();

    let (health_raw, rest) = match body.strip_prefix(HEALTH_LABEL) {
        Some(after) => match after.split_once(',') {
            Some((digits, rest)) => (Some(digits.trim()), rest),
            None => (Some(after.trim()), ""),
        },
        None => {
            warn!("Status marker does not open with a HEALTH field");
            (None, body.strip_prefix(',').unwrap_or(body))
        }
    };

    let health = health_raw.and_then(|raw| {
        let parsed = parse_health(raw);
        if parsed.is_none() {
            warn!(value = raw, "Ignoring unreadable HEALTH field");
        }
        parsed
    });

    let inventory_items = match rest.trim_start().strip_prefix(INVENTORY_LABEL) {
        Some(items) => Some(parse_inventory(items)),
        None => {
            warn!("Status marker has no INVENTORY field after HEALTH");
            None
        }
    };

    let record = StatusRecord {
        health,
        inventory_items,
    };

    if record.is_empty() {
        return Err(StatusParseError::Unrecognized(body.trim().to_string()));
    }

    Ok(record)
}

/// Digits only. Signs, decimals and values beyond `u32::MAX` are rejected
/// so the previous health is kept.
fn parse_health(raw: &str) -> Option<u32> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

fn parse_inventory(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
