use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Unique identifier for a history item.
///
/// Generated once when the item is created and never reused. Backed by a
/// time-ordered UUID so ids sort in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryItemId(Uuid);

impl HistoryItemId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_string(value: &str) -> Result<Self, HistoryItemIdParseError> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|_| HistoryItemIdParseError {
                value: value.to_string(),
            })
    }
}

impl Default for HistoryItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HistoryItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for HistoryItemId {
    type Err = HistoryItemIdParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_string(value)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid history item id: {value}")]
pub struct HistoryItemIdParseError {
    value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trips_through_display_and_from_str() {
        let id = HistoryItemId::new();
        let parsed: HistoryItemId = id.to_string().parse().expect("parse id");
        assert_eq!(parsed, id);
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(HistoryItemId::from_string("not-a-uuid").is_err());
    }

    #[test]
    fn ids_are_creation_ordered() {
        let first = HistoryItemId::new();
        let second = HistoryItemId::new();
        assert!(first <= second);
    }
}
