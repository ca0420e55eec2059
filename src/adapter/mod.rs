//! Interception glue between the host simulation and the telemetry core.
//!
//! The host calls one observer per intercepted method. Every observer returns
//! a [`Disposition`] and never panics or errors back into the host.
//!
//! ORDERING INVARIANT:
//! The offer-chance observer runs before accept/reject/counter for the same
//! actor, so those read the chance the host just computed from the cache.
//! A miss is recomputed through the [`NegotiationOracle`], never an error.

pub mod context;
pub mod host;
pub mod observers;

pub use context::{Collaborators, TelemetryContext};
pub use host::{
    ActorLabelProvider, Clock, ContractAcceptedEvent, ContractInfo, ContractRejectedEvent,
    CounterOfferEvent, DeliveryEvaluation, HandoverEvent, HandoverOutcome, NegotiationOracle,
    NoLabels, OfferChanceEvent, SystemClock,
};
pub use observers::{
    ChanceEcho, ContractAcceptedObserver, ContractRejectedObserver, CounterOfferObserver,
    DeliveryEcho, DeliveryObserver, Disposition, HandoverObserver, Observation,
    OfferChanceObserver, SkipReason,
};
