use chrono::{DateTime, Local};

use crate::correlation::{ActorId, OfferedItem};

/// Label used when the host has no display name for an actor.
pub const UNKNOWN_ACTOR_LABEL: &str = "Unknown";

pub const WALL_CLOCK_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const SIM_TIME_FORMAT: &str = "%H:%M:%S";

/// Actor reference -> optional display label.
pub trait ActorLabelProvider: Send + Sync {
    fn label(&self, actor: ActorId) -> Option<String>;
}

/// Host-side negotiation model, used to recompute a chance on a cache miss.
/// `None` when the host cannot (or will not) answer.
pub trait NegotiationOracle: Send + Sync {
    fn offer_success_chance(
        &self,
        actor: ActorId,
        items: &[OfferedItem],
        asking_price: f32,
    ) -> Option<f32>;
}

/// Source of the two timestamps on every line.
pub trait Clock: Send + Sync {
    fn sim_time_label(&self) -> String;
    fn now(&self) -> DateTime<Local>;
}

/// Wall clock for both columns, for hosts that expose no simulation time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sim_time_label(&self) -> String {
        Local::now().format(SIM_TIME_FORMAT).to_string()
    }

    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Labels nothing: every actor is logged as `Unknown`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLabels;

impl ActorLabelProvider for NoLabels {
    fn label(&self, _actor: ActorId) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoverOutcome {
    Finalize,
    Cancelled,
}

/// The host's currently offered contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractInfo {
    pub products: Vec<OfferedItem>,
    pub payment: f32,
}

impl ContractInfo {
    pub fn first_entry(&self) -> Option<&OfferedItem> {
        self.products.first()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandoverEvent {
    pub actor: ActorId,
    pub outcome: HandoverOutcome,
    /// Items actually handed over.
    pub items: Option<Vec<OfferedItem>>,
    pub handover_by_player: bool,
    pub total_payment: f32,
    /// Items the customer asked for.
    pub product_list: Option<Vec<OfferedItem>>,
    pub satisfaction: f32,
    pub dealer_name: Option<String>,
    pub current_addiction: f32,
}

/// The host just computed a success chance. `computed_chance` is host-owned; read only.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferChanceEvent {
    pub actor: ActorId,
    pub items: Option<Vec<OfferedItem>>,
    pub asking_price: f32,
    pub computed_chance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractAcceptedEvent {
    pub actor: ActorId,
    pub contract: Option<ContractInfo>,
    /// Deal window name as the host renders it.
    pub window: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractRejectedEvent {
    pub actor: ActorId,
    pub contract: Option<ContractInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CounterOfferEvent {
    pub actor: ActorId,
    pub contract: Option<ContractInfo>,
    pub product_id: String,
    pub quantity: u32,
    pub price: f32,
}

/// Delivery evaluation. The `highest_addiction`, `main_drug_type` and
/// `matched_product_count` values are host-owned out-parameters, read only.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryEvaluation {
    pub actor: ActorId,
    pub current_addiction: f32,
    pub highest_addiction: f32,
    pub main_drug_type: String,
    pub matched_product_count: i32,
    pub satisfaction: f32,
}
