use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Host handle for one live actor instance. Can be recycled after the actor is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub i64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferedItem {
    pub item_id: String,
    pub quantity: u32,
}

impl OfferedItem {
    pub fn new(item_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
        }
    }
}

/// Sentinel chance logged when no value is cached and none could be recomputed.
pub const UNKNOWN_CHANCE: f32 = -1.0;

/// The last negotiation-success estimate computed for an actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationChanceRecord {
    pub timestamp: DateTime<Local>,
    pub actor_label: String,
    pub offered_items: Vec<OfferedItem>,
    pub asking_price: f32,
    /// In [0, 1].
    pub chance: f32,
}

impl NegotiationChanceRecord {
    pub fn new(
        actor_label: impl Into<String>,
        offered_items: Vec<OfferedItem>,
        asking_price: f32,
        chance: f32,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            actor_label: actor_label.into(),
            offered_items,
            asking_price,
            chance: chance.clamp(0.0, 1.0),
        }
    }
}
