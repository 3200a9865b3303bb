//! Ledger movement models
//!
//! A ledger entry is immutable once written. Every movement type carries a
//! fixed direction convention (or none, for self transfers), and the breakdown
//! category of an entry is derived from that table rather than from ad hoc
//! conditionals at the call sites.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use super::parse_dispatch_reference;

/// Errors raised when a stored ledger row cannot be interpreted
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Unknown movement type: {0}")]
    UnknownMovementType(String),

    #[error("Unknown movement direction: {0}")]
    UnknownDirection(String),

    #[error("Ledger entry {id} has negative quantity {quantity}")]
    NegativeQuantity { id: i64, quantity: i64 },
}

/// Whether a movement adds to or removes from stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }

    /// Sign applied to a quantity during replay
    pub fn sign(&self) -> i64 {
        match self {
            Direction::In => 1,
            Direction::Out => -1,
        }
    }
}

impl FromStr for Direction {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" => Ok(Direction::In),
            "OUT" => Ok(Direction::Out),
            _ => Err(LedgerError::UnknownDirection(s.to_string())),
        }
    }
}

/// Direction convention attached to a movement type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionRule {
    /// The movement always flows this way
    Fixed(Direction),
    /// Either direction is legitimate and selects the breakdown bucket
    Significant,
}

/// Breakdown bucket an entry's quantity is summed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    BulkUpload,
    Dispatch,
    Damage,
    Recovery,
    Returns,
    SelfTransferIn,
    SelfTransferOut,
}

/// Kind of stock-affecting event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    BulkUpload,
    Opening,
    Dispatch,
    Damage,
    Recover,
    Return,
    SelfTransfer,
    Purchase,
}

impl MovementType {
    pub const ALL: [MovementType; 8] = [
        MovementType::BulkUpload,
        MovementType::Opening,
        MovementType::Dispatch,
        MovementType::Damage,
        MovementType::Recover,
        MovementType::Return,
        MovementType::SelfTransfer,
        MovementType::Purchase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::BulkUpload => "BULK_UPLOAD",
            MovementType::Opening => "OPENING",
            MovementType::Dispatch => "DISPATCH",
            MovementType::Damage => "DAMAGE",
            MovementType::Recover => "RECOVER",
            MovementType::Return => "RETURN",
            MovementType::SelfTransfer => "SELF_TRANSFER",
            MovementType::Purchase => "PURCHASE",
        }
    }

    /// Human readable label used in timeline descriptions
    pub fn label(&self) -> &'static str {
        match self {
            MovementType::BulkUpload => "Bulk upload",
            MovementType::Opening => "Opening stock",
            MovementType::Dispatch => "Dispatch",
            MovementType::Damage => "Damage",
            MovementType::Recover => "Recovery",
            MovementType::Return => "Return",
            MovementType::SelfTransfer => "Self transfer",
            MovementType::Purchase => "Purchase",
        }
    }

    pub fn direction_rule(&self) -> DirectionRule {
        match self {
            MovementType::BulkUpload
            | MovementType::Opening
            | MovementType::Purchase
            | MovementType::Recover
            | MovementType::Return => DirectionRule::Fixed(Direction::In),
            MovementType::Dispatch | MovementType::Damage => DirectionRule::Fixed(Direction::Out),
            MovementType::SelfTransfer => DirectionRule::Significant,
        }
    }

    /// Entries of these types form the reported opening stock
    pub fn is_opening_stock(&self) -> bool {
        matches!(self, MovementType::BulkUpload | MovementType::Opening)
    }

    /// Breakdown bucket for a movement of this type in the given direction.
    ///
    /// Only direction-significant types look at `direction`; the others sum
    /// into their fixed bucket whatever the recorded direction says.
    pub fn category(&self, direction: Direction) -> Category {
        match (self.direction_rule(), self) {
            (DirectionRule::Significant, _) => match direction {
                Direction::In => Category::SelfTransferIn,
                Direction::Out => Category::SelfTransferOut,
            },
            (_, MovementType::Dispatch) => Category::Dispatch,
            (_, MovementType::Damage) => Category::Damage,
            (_, MovementType::Recover) => Category::Recovery,
            (_, MovementType::Return) => Category::Returns,
            _ => Category::BulkUpload,
        }
    }

    /// Whether `direction` agrees with this type's convention
    pub fn conforms(&self, direction: Direction) -> bool {
        match self.direction_rule() {
            DirectionRule::Fixed(expected) => expected == direction,
            DirectionRule::Significant => true,
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        MovementType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| LedgerError::UnknownMovementType(s.to_string()))
    }
}

/// One immutable stock movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub event_time: NaiveDateTime,
    pub movement_type: MovementType,
    /// Product barcode
    pub product_code: String,
    pub product_name: Option<String>,
    /// Warehouse code
    pub location_code: String,
    pub quantity: i64,
    pub direction: Direction,
    pub reference: Option<String>,
    /// Write path that recorded the entry
    pub source: Option<String>,
    /// Explicit dispatch link, populated by newer write paths
    #[serde(default)]
    pub dispatch_id: Option<i64>,
}

impl LedgerEntry {
    /// Reject entries that break the non-negative quantity invariant
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.quantity < 0 {
            return Err(LedgerError::NegativeQuantity {
                id: self.id,
                quantity: self.quantity,
            });
        }
        Ok(())
    }

    pub fn signed_quantity(&self) -> i64 {
        self.direction.sign() * self.quantity
    }

    /// Chronological replay key; `id` breaks ties between equal timestamps
    pub fn replay_key(&self) -> (NaiveDateTime, i64) {
        (self.event_time, self.id)
    }

    pub fn category(&self) -> Category {
        self.movement_type.category(self.direction)
    }

    /// Dispatch this entry belongs to, if it is a dispatch.
    ///
    /// The explicit column wins; older rows fall back to the reference key.
    pub fn linked_dispatch_id(&self) -> Option<i64> {
        if self.movement_type != MovementType::Dispatch {
            return None;
        }
        self.dispatch_id
            .or_else(|| self.reference.as_deref().and_then(parse_dispatch_reference))
    }

    pub fn description(&self) -> String {
        let verb = match self.movement_type {
            MovementType::BulkUpload => "uploaded to",
            MovementType::Opening => "opened at",
            MovementType::Dispatch => "dispatched from",
            MovementType::Damage => "marked damaged at",
            MovementType::Recover => "recovered into",
            MovementType::Return => "returned to",
            MovementType::Purchase => "purchased into",
            MovementType::SelfTransfer => match self.direction {
                Direction::In => "transferred into",
                Direction::Out => "transferred out of",
            },
        };
        format!(
            "{}: {} unit(s) {} {}",
            self.movement_type.label(),
            self.quantity,
            verb,
            self.location_code
        )
    }
}
