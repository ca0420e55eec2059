use super::host::{
    ContractAcceptedEvent, ContractRejectedEvent, CounterOfferEvent, DeliveryEvaluation,
    HandoverEvent, OfferChanceEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Handover ended in anything but `Finalize`.
    NotFinalized,
    /// Offer chance with no price or no quantity.
    NothingOffered,
    /// Missing actor or offer data.
    Malformed(&'static str),
    /// Session not ACTIVE.
    SessionClosed,
}

/// What happened to one observed host call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Number of lines appended.
    Logged(usize),
    Skipped(SkipReason),
    /// Failed internally; the event's telemetry is lost.
    Dropped,
}

impl Disposition {
    pub fn is_logged(&self) -> bool {
        matches!(self, Disposition::Logged(n) if *n > 0)
    }
}

/// Result for host calls whose out-values are echoed into the log.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation<T> {
    pub disposition: Disposition,
    /// Present only when a line was written.
    pub echo: Option<T>,
}

impl<T> Observation<T> {
    pub fn logged(echo: T) -> Self {
        Self {
            disposition: Disposition::Logged(1),
            echo: Some(echo),
        }
    }

    pub fn without_echo(disposition: Disposition) -> Self {
        Self {
            disposition,
            echo: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChanceEcho {
    pub chance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryEcho {
    pub highest_addiction: f32,
    pub main_drug_type: String,
    pub matched_product_count: i32,
    pub satisfaction: f32,
}

// One fixed interface per intercepted host method. Implementations must never
// panic or return errors into the host.

pub trait HandoverObserver {
    fn observe_handover(&self, event: &HandoverEvent) -> Disposition;
}

pub trait OfferChanceObserver {
    fn observe_offer_chance(&self, event: &OfferChanceEvent) -> Observation<ChanceEcho>;
}

pub trait ContractAcceptedObserver {
    fn observe_contract_accepted(&self, event: &ContractAcceptedEvent) -> Disposition;
}

pub trait ContractRejectedObserver {
    fn observe_contract_rejected(&self, event: &ContractRejectedEvent) -> Disposition;
}

pub trait CounterOfferObserver {
    fn observe_counter_offer(&self, event: &CounterOfferEvent) -> Disposition;
}

pub trait DeliveryObserver {
    fn observe_delivery(&self, event: &DeliveryEvaluation) -> Observation<DeliveryEcho>;
}
