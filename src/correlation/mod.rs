//! Actor-keyed correlation between an offer-chance computation and the later
//! accept / reject / counter events of the same negotiation.
//!
//! The cache is an enrichment layer. It is never persisted and a fresh session
//! always starts empty.

pub mod cache;
pub mod types;

pub use cache::{CacheStats, CorrelationCache};
pub use types::{ActorId, NegotiationChanceRecord, OfferedItem, UNKNOWN_CHANCE};
