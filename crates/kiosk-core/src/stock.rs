//! # Stock Settlement Rules
//!
//! Pure rules applied to each line of an order when its payment settles.
//!
//! ## Per-Item Decision
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  snapshot entry                                                         │
//! │       │                                                                 │
//! │       ├── unreadable JSON element ─────────────► Skip(UnreadableEntry)  │
//! │       ├── quantity <= 0 ──────────────────────► Skip(InvalidQuantity)   │
//! │       ├── no stock row ───────────────────────► Skip(MissingStock)      │
//! │       ├── stored quantity not an integer ─────► Skip(InvalidStock)      │
//! │       ├── current - requested < 0 ────────────► Skip(Insufficient)      │
//! │       └── otherwise ──────────────────────────► Decrement               │
//! │                                                                         │
//! │  A skip never aborts sibling items of the same order.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;

use crate::types::OrderItem;

// =============================================================================
// Item Snapshot
// =============================================================================

/// One element of a stored item snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotEntry {
    Item(OrderItem),
    Unreadable { index: usize, reason: String },
}

/// Reads an item snapshot leniently.
///
/// A snapshot that is not a JSON array yields no entries. Each element that
/// does not decode as an [`OrderItem`] becomes [`SnapshotEntry::Unreadable`]
/// instead of failing the whole snapshot.
pub fn read_item_snapshot(json: &str) -> Vec<SnapshotEntry> {
    let elements = match serde_json::from_str::<serde_json::Value>(json) {
        Ok(serde_json::Value::Array(elements)) => elements,
        _ => return Vec::new(),
    };

    elements
        .into_iter()
        .enumerate()
        .map(|(index, element)| match serde_json::from_value::<OrderItem>(element) {
            Ok(item) => SnapshotEntry::Item(item),
            Err(e) => SnapshotEntry::Unreadable {
                index,
                reason: e.to_string(),
            },
        })
        .collect()
}

/// Readable items of a snapshot, in order.
pub fn readable_items(json: &str) -> Vec<OrderItem> {
    read_item_snapshot(json)
        .into_iter()
        .filter_map(|entry| match entry {
            SnapshotEntry::Item(item) => Some(item),
            SnapshotEntry::Unreadable { .. } => None,
        })
        .collect()
}

// =============================================================================
// Decision
// =============================================================================

/// Why an item was left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    UnreadableEntry { index: usize, reason: String },
    InvalidQuantity { quantity: i64 },
    MissingStock,
    InvalidStock { stored_type: String },
    Insufficient { available: i64, requested: i64 },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::UnreadableEntry { index, reason } => {
                write!(f, "snapshot entry {} unreadable: {}", index, reason)
            }
            SkipReason::InvalidQuantity { quantity } => {
                write!(f, "invalid quantity {}", quantity)
            }
            SkipReason::MissingStock => write!(f, "no stock record"),
            SkipReason::InvalidStock { stored_type } => {
                write!(f, "stock quantity stored as {}", stored_type)
            }
            SkipReason::Insufficient {
                available,
                requested,
            } => write!(f, "insufficient stock: available {}, requested {}", available, requested),
        }
    }
}

/// A product's stock record as read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockLevel {
    Missing,
    /// The row exists but its quantity is not an integer.
    Invalid { stored_type: String },
    Available(i64),
}

impl StockLevel {
    pub fn quantity(&self) -> Option<i64> {
        match self {
            StockLevel::Available(quantity) => Some(*quantity),
            StockLevel::Missing | StockLevel::Invalid { .. } => None,
        }
    }
}

/// What to do with one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockDecision {
    Decrement { new_quantity: i64 },
    Skip(SkipReason),
}

/// Decides whether `requested` units can be taken from `current`.
pub fn decide(current: &StockLevel, requested: i64) -> StockDecision {
    if requested <= 0 {
        return StockDecision::Skip(SkipReason::InvalidQuantity {
            quantity: requested,
        });
    }

    let available = match current {
        StockLevel::Available(available) => *available,
        StockLevel::Missing => return StockDecision::Skip(SkipReason::MissingStock),
        StockLevel::Invalid { stored_type } => {
            return StockDecision::Skip(SkipReason::InvalidStock {
                stored_type: stored_type.clone(),
            })
        }
    };

    match available.checked_sub(requested) {
        Some(new_quantity) if new_quantity >= 0 => StockDecision::Decrement { new_quantity },
        _ => StockDecision::Skip(SkipReason::Insufficient {
            available,
            requested,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_mixes_readable_and_unreadable() {
        let entries = read_item_snapshot(
            r#"[{"id":"p1","quantity":2},"junk",{"product_id":"p2"},{"product_id":"p3","quantity":1}]"#,
        );
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0], SnapshotEntry::Item(OrderItem::new("p1", 2)));
        assert!(matches!(entries[1], SnapshotEntry::Unreadable { index: 1, .. }));
        assert!(matches!(entries[2], SnapshotEntry::Unreadable { index: 2, .. }));
        assert_eq!(entries[3], SnapshotEntry::Item(OrderItem::new("p3", 1)));
    }

    #[test]
    fn test_non_array_snapshot_is_empty() {
        assert!(read_item_snapshot(r#"{"id":"p1"}"#).is_empty());
        assert!(read_item_snapshot("garbage").is_empty());
        assert!(readable_items("null").is_empty());
    }

    #[test]
    fn test_fractional_quantity_is_unreadable() {
        let entries = read_item_snapshot(r#"[{"id":"p1","quantity":1.5}]"#);
        assert!(matches!(entries[0], SnapshotEntry::Unreadable { .. }));
    }

    #[test]
    fn test_decide() {
        use StockLevel::Available;

        assert_eq!(decide(&Available(5), 2), StockDecision::Decrement { new_quantity: 3 });
        assert_eq!(decide(&Available(2), 2), StockDecision::Decrement { new_quantity: 0 });
        assert_eq!(
            decide(&Available(1), 2),
            StockDecision::Skip(SkipReason::Insufficient {
                available: 1,
                requested: 2
            })
        );
        assert_eq!(
            decide(&StockLevel::Missing, 1),
            StockDecision::Skip(SkipReason::MissingStock)
        );
        assert_eq!(
            decide(&Available(10), 0),
            StockDecision::Skip(SkipReason::InvalidQuantity { quantity: 0 })
        );
    }

    #[test]
    fn test_decide_never_goes_negative() {
        for available in 0..5 {
            for requested in 1..8 {
                if let StockDecision::Decrement { new_quantity } = decide(&StockLevel::Available(available), requested) {
                    assert!(new_quantity >= 0);
                }
            }
        }
    }

    #[test]
    fn test_non_integer_stock_is_skipped() {
        let level = StockLevel::Invalid {
            stored_type: "text".to_string(),
        };
        assert_eq!(level.quantity(), None);
        assert_eq!(
            decide(&level, 1),
            StockDecision::Skip(SkipReason::InvalidStock {
                stored_type: "text".to_string()
            })
        );
    }
}
