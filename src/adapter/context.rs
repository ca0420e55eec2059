use chrono::{DateTime, Local};
use parking_lot::{Mutex, RwLock};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::host::{
    ActorLabelProvider, Clock, ContractAcceptedEvent, ContractInfo, ContractRejectedEvent,
    CounterOfferEvent, DeliveryEvaluation, HandoverEvent, HandoverOutcome, NegotiationOracle,
    NoLabels, OfferChanceEvent, SystemClock, UNKNOWN_ACTOR_LABEL, WALL_CLOCK_FORMAT,
};
use super::observers::{
    ChanceEcho, ContractAcceptedObserver, ContractRejectedObserver, CounterOfferObserver,
    DeliveryEcho, DeliveryObserver, Disposition, HandoverObserver, Observation, OfferChanceObserver,
    SkipReason,
};
use crate::classify::{build_classifier, ItemCatalog, ProductClassifier};
use crate::config::TelemetryConfig;
use crate::correlation::{
    ActorId, CacheStats, CorrelationCache, NegotiationChanceRecord, OfferedItem, UNKNOWN_CHANCE,
};
use crate::error::{Result, TelemetryError};
use crate::session::exporter::write_batch;
use crate::session::{
    ConsolidationInput, ConsolidationReport, ExportBatch, PeriodicExporter, SessionConsolidator,
    SessionGraph, SessionPaths, SessionPhase, SessionRequest,
};
use crate::telemetry::recorder::RecorderSnapshot;
use crate::telemetry::{EventKind, EventLog, EventRecord, SessionRecorder};

/// Host-side services the handlers read from. Everything is optional except
/// the clock, which defaults to wall time.
#[derive(Clone)]
pub struct Collaborators {
    pub labels: Arc<dyn ActorLabelProvider>,
    pub oracle: Option<Arc<dyn NegotiationOracle>>,
    pub catalog: Option<Arc<dyn ItemCatalog>>,
    pub clock: Arc<dyn Clock>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            labels: Arc::new(NoLabels),
            oracle: None,
            catalog: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl Collaborators {
    pub fn with_labels(mut self, labels: Arc<dyn ActorLabelProvider>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn NegotiationOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn ItemCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// The one explicit context every observer runs against.
///
/// Created at host load, shared by reference (`Arc`) with every interception
/// point, and shut down once at host quit. Handlers hold the phase lock for
/// reading while they run, so shutdown waits for in-flight events and nothing
/// is logged after the session left ACTIVE.
pub struct TelemetryContext {
    session_id: String,
    started_at: DateTime<Local>,
    phase: RwLock<SessionPhase>,
    classifier: Box<dyn ProductClassifier>,
    cache: CorrelationCache,
    log: EventLog,
    recorder: Mutex<SessionRecorder>,
    exporter: Mutex<PeriodicExporter>,
    paths: SessionPaths,
    labels: Arc<dyn ActorLabelProvider>,
    oracle: Option<Arc<dyn NegotiationOracle>>,
    clock: Arc<dyn Clock>,
}

impl TelemetryContext {
    /// INIT -> ACTIVE. Only an invalid config fails; an unwritable log is
    /// reported and retried on the first event.
    pub fn start(config: TelemetryConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let log = match EventLog::open(&config) {
            Ok(log) => log,
            Err(e) => {
                warn!("Data log not ready, retrying on first event: {}", e);
                EventLog::new(&config)
            }
        };

        let paths = SessionPaths::new(config.data_dir.clone());
        let exporter =
            PeriodicExporter::spawn(paths.clone(), config.export.interval(), Instant::now());

        let context = Self {
            session_id: Uuid::new_v4().to_string(),
            started_at: collaborators.clock.now(),
            phase: RwLock::new(SessionPhase::Init),
            classifier: build_classifier(&config.classifier, collaborators.catalog),
            cache: CorrelationCache::from_config(&config.cache),
            log,
            recorder: Mutex::new(SessionRecorder::new(config.export.history_limit)),
            exporter: Mutex::new(exporter),
            paths,
            labels: collaborators.labels,
            oracle: collaborators.oracle,
            clock: collaborators.clock,
        };
        context.advance(SessionRequest::Start);

        info!(
            "Telemetry session {} started ({:?} layout, data dir {})",
            context.session_id,
            context.log.layout(),
            context.paths.data_dir().display()
        );
        Ok(context)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.read_recursive()
    }

    pub fn cache(&self) -> &CorrelationCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn paths(&self) -> &SessionPaths {
        &self.paths
    }

    pub fn snapshot(&self) -> RecorderSnapshot {
        self.recorder.lock().snapshot()
    }

    /// Host update cadence. Drains buffered rows to the export worker when an
    /// interval has elapsed; returns the number of batches handed off.
    pub fn tick(&self, now: Instant) -> usize {
        let phase = self.phase.read_recursive();
        if !SessionGraph::accepts_events(*phase) {
            return 0;
        }

        let mut exporter = self.exporter.lock();
        if !exporter.is_due(now) {
            return 0;
        }
        let pending = self.recorder.lock().take_pending();
        if pending.is_empty() {
            return 0;
        }
        let sent = exporter.enqueue(pending);
        debug!("Periodic export: {} batches queued", sent);
        sent
    }

    /// ACTIVE -> SHUTTING_DOWN -> TERMINATED. Returns the report the first
    /// time only.
    pub fn shutdown(&self) -> Option<ConsolidationReport> {
        match self.advance(SessionRequest::Shutdown)? {
            SessionPhase::ShuttingDown => {}
            // shut down before ever starting: nothing to consolidate
            _ => return None,
        }
        info!("Telemetry session {} shutting down", self.session_id);

        // === 1. FLUSH ===
        let export = {
            let mut exporter = self.exporter.lock();
            let pending = self.recorder.lock().take_pending();
            if exporter.is_running() {
                exporter.enqueue(pending);
            } else {
                for (category, rows) in pending {
                    let batch = ExportBatch { category, rows };
                    if let Err(e) = write_batch(&self.paths, &batch) {
                        error!("Final export of {} failed: {}", category, e);
                    }
                }
            }
            exporter.stop()
        };
        if export.failures > 0 {
            warn!("{} periodic export batches failed this session", export.failures);
        }

        // === 2. CONSOLIDATE ===
        let input = ConsolidationInput {
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            ended_at: self.clock.now(),
            snapshot: self.recorder.lock().snapshot(),
            cache: self.cache.stats(),
        };
        let consolidator = SessionConsolidator::new(self.paths.clone());
        let report = panic::catch_unwind(AssertUnwindSafe(|| consolidator.run(input)));

        self.advance(SessionRequest::ConsolidationFinished);

        match report {
            Ok(report) => {
                info!(
                    "Telemetry session {} terminated: {} events, revenue ${:.2}",
                    self.session_id,
                    report.summary.total_events(),
                    report.summary.revenue.total
                );
                Some(report)
            }
            Err(_) => {
                error!("Consolidation panicked, session {} left unarchived", self.session_id);
                None
            }
        }
    }

    fn advance(&self, request: SessionRequest) -> Option<SessionPhase> {
        let mut phase = self.phase.write();
        let next = SessionGraph::transition(*phase, request)?;
        debug!("Session phase {:?} -> {:?}", *phase, next);
        *phase = next;
        Some(next)
    }

    // === OBSERVER BOUNDARY ===

    fn guarded<T>(&self, handler: &'static str, body: impl FnOnce() -> Result<T>) -> Result<T> {
        // recursive: the oracle may re-enter the offer-chance observer on this thread
        let phase = self.phase.read_recursive();
        if !SessionGraph::accepts_events(*phase) {
            return Err(TelemetryError::SessionClosed);
        }
        panic::catch_unwind(AssertUnwindSafe(body))
            .unwrap_or_else(|_| Err(TelemetryError::HandlerPanicked(handler)))
    }

    fn settle(&self, handler: &'static str, outcome: Result<Disposition>) -> Disposition {
        match outcome {
            Ok(disposition) => disposition,
            Err(TelemetryError::SessionClosed) => Disposition::Skipped(SkipReason::SessionClosed),
            Err(TelemetryError::MalformedEvent(reason)) => {
                debug!("{} skipped: {}", handler, reason);
                Disposition::Skipped(SkipReason::Malformed(reason))
            }
            Err(e) => {
                error!("Error in {}: {}", handler, e);
                self.recorder.lock().note_dropped();
                Disposition::Dropped
            }
        }
    }

    fn settle_observation<T>(
        &self,
        handler: &'static str,
        outcome: Result<Observation<T>>,
    ) -> Observation<T> {
        match outcome {
            Ok(observation) => observation,
            Err(e) => Observation::without_echo(self.settle(handler, Err(e))),
        }
    }

    fn stamp(&self, kind: EventKind) -> EventRecord {
        EventRecord::new(
            kind,
            self.clock.sim_time_label(),
            self.clock.now().format(WALL_CLOCK_FORMAT).to_string(),
        )
    }

    fn emit(&self, record: EventRecord) -> Result<()> {
        self.log.append(&record)?;
        self.recorder.lock().record(&record);
        Ok(())
    }

    fn label(&self, actor: ActorId) -> String {
        self.labels
            .label(actor)
            .unwrap_or_else(|| UNKNOWN_ACTOR_LABEL.to_string())
    }

    fn product_type(&self, item_id: &str) -> &'static str {
        self.classifier.classify(item_id).as_str()
    }

    /// `id(q);id(q);` and `type;type;` lists.
    fn describe_items(&self, items: &[OfferedItem]) -> (String, String) {
        let mut ids = String::new();
        let mut types = String::new();
        for item in items {
            ids.push_str(&format!("{}({});", item.item_id, item.quantity));
            types.push_str(self.product_type(&item.item_id));
            types.push(';');
        }
        (ids, types)
    }

    fn recompute(&self, actor: ActorId, items: &[OfferedItem], asking_price: f32) -> Option<f32> {
        // no cache lock may be held here; the host recompute fires the offer-chance hook
        self.oracle
            .as_ref()
            .and_then(|oracle| oracle.offer_success_chance(actor, items, asking_price))
    }

    fn offered_contract<'a>(
        contract: Option<&'a ContractInfo>,
    ) -> Result<(&'a ContractInfo, &'a OfferedItem)> {
        let contract = contract.ok_or(TelemetryError::MalformedEvent("no offered contract"))?;
        let entry = contract
            .first_entry()
            .ok_or(TelemetryError::MalformedEvent("offered contract has no products"))?;
        Ok((contract, entry))
    }

    // === HANDLERS ===

    fn handle_handover(&self, event: &HandoverEvent) -> Result<Disposition> {
        if event.outcome != HandoverOutcome::Finalize {
            return Ok(Disposition::Skipped(SkipReason::NotFinalized));
        }

        // 1. Who sold to whom
        let customer = self.label(event.actor);
        let dealer = if event.handover_by_player {
            "Player".to_string()
        } else {
            event.dealer_name.clone().unwrap_or_else(|| "NPC".to_string())
        };

        let requested = event.product_list.as_deref().unwrap_or_default();
        let quantity_requested: u32 = requested.iter().map(|e| e.quantity).sum();
        let quantity_provided: u32 = event
            .items
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|i| i.quantity)
            .sum();
        let (item_ids, item_types) = self.describe_items(requested);

        // 2. SALE line
        let sale = self
            .stamp(EventKind::Sale)
            .field("customer", customer.as_str())
            .field("dealer", dealer.as_str())
            .field("handoverByPlayer", host_bool(event.handover_by_player))
            .field("payment", format!("{:.2}", event.total_payment))
            .field("satisfaction", format!("{:.4}", event.satisfaction))
            .field("quantityRequested", quantity_requested.to_string())
            .field("quantityProvided", quantity_provided.to_string())
            .field("itemIDs", item_ids)
            .field("itemTypes", item_types);
        self.emit(sale)?;
        info!(
            "Sale: {} - {} - Payment: ${:.2}, Satisfaction: {:.4}",
            customer, dealer, event.total_payment, event.satisfaction
        );

        // 3. Preference, only for customers with some addiction
        if !(event.current_addiction > 0.0) {
            return Ok(Disposition::Logged(1));
        }

        let main_drug_type = requested
            .first()
            .map(|entry| self.product_type(&entry.item_id))
            .unwrap_or("Unknown");
        let preference = self
            .stamp(EventKind::Preference)
            .field("customer", customer.as_str())
            .field("currentAddiction", format!("{:.4}", event.current_addiction))
            .field("highestAddiction", "0")
            .field("mainDrugType", main_drug_type)
            .field("source", "Sale");
        // the sale line is already out; a lost preference does not drop it
        if let Err(e) = self.emit(preference) {
            error!("Sale preference for {} not logged: {}", customer, e);
            return Ok(Disposition::Logged(1));
        }
        Ok(Disposition::Logged(2))
    }

    fn handle_offer_chance(&self, event: &OfferChanceEvent) -> Result<Observation<ChanceEcho>> {
        let customer = self.label(event.actor);
        let items = event.items.as_deref().unwrap_or_default();
        let total_quantity: u32 = items.iter().map(|i| i.quantity).sum();

        if !(event.asking_price > 0.0 && total_quantity > 0) {
            debug!("Offer Chance: {} - {:.1}%", customer, event.computed_chance * 100.0);
            return Ok(Observation::without_echo(Disposition::Skipped(
                SkipReason::NothingOffered,
            )));
        }

        self.cache.upsert(
            event.actor,
            NegotiationChanceRecord::new(
                customer.as_str(),
                items.to_vec(),
                event.asking_price,
                event.computed_chance,
            ),
        );

        let (item_ids, item_types) = self.describe_items(items);
        let record = self
            .stamp(EventKind::ChanceComputed)
            .field("customer", customer.as_str())
            .field("items", item_ids)
            .field("itemTypes", item_types)
            .field("askingPrice", format!("{:.2}", event.asking_price))
            .field("totalQuantity", total_quantity.to_string())
            .field("successChance", format!("{:.4}", event.computed_chance));
        self.emit(record)?;

        debug!(
            "Cached success chance: {:.4} for customer {} (ID: {})",
            event.computed_chance, customer, event.actor
        );
        Ok(Observation::logged(ChanceEcho {
            chance: event.computed_chance,
        }))
    }

    fn handle_contract_accepted(&self, event: &ContractAcceptedEvent) -> Result<Disposition> {
        let (contract, entry) = Self::offered_contract(event.contract.as_ref())?;
        let customer = self.label(event.actor);

        // Cache first; on a miss ask the host again and write back
        let chance = match self.cache.lookup(event.actor) {
            Some(cached) => {
                debug!(
                    "Retrieved cached success chance: {:.4} for customer {} (ID: {})",
                    cached.chance, customer, event.actor
                );
                cached.chance
            }
            None => {
                let offered = vec![entry.clone()];
                let since = Instant::now();
                match self.recompute(event.actor, &offered, contract.payment) {
                    Some(chance) => {
                        let stored = self.cache.upsert_unless_newer(
                            event.actor,
                            NegotiationChanceRecord::new(
                                customer.as_str(),
                                offered,
                                contract.payment,
                                chance,
                            ),
                            since,
                        );
                        if stored {
                            debug!(
                                "Cached new success chance: {:.4} for customer {} (ID: {})",
                                chance, customer, event.actor
                            );
                        }
                        chance
                    }
                    None => {
                        warn!(
                            "No success chance available for customer {} (ID: {})",
                            customer, event.actor
                        );
                        UNKNOWN_CHANCE
                    }
                }
            }
        };

        let record = self
            .stamp(EventKind::OfferAccepted)
            .field("customer", customer.as_str())
            .field("productID", entry.item_id.as_str())
            .field("productType", self.product_type(&entry.item_id))
            .field("quantity", entry.quantity.to_string())
            .field("price", format!("{:.2}", contract.payment))
            .field("window", event.window.as_str())
            .field("successChance", format!("{:.4}", chance));
        self.emit(record)?;

        info!(
            "Offer Accepted: {} - {} {} units at ${:.2}",
            customer, entry.item_id, entry.quantity, contract.payment
        );
        Ok(Disposition::Logged(1))
    }

    fn handle_contract_rejected(&self, event: &ContractRejectedEvent) -> Result<Disposition> {
        let (contract, entry) = Self::offered_contract(event.contract.as_ref())?;
        let customer = self.label(event.actor);

        // the negotiation is over: a recomputed value is logged but not cached
        let chance = match self.cache.lookup(event.actor) {
            Some(cached) => {
                debug!(
                    "Retrieved cached success chance: {:.4} for customer {} (ID: {})",
                    cached.chance, customer, event.actor
                );
                cached.chance
            }
            None => {
                warn!(
                    "No cached success chance found for customer {} (ID: {})",
                    customer, event.actor
                );
                self.recompute(event.actor, std::slice::from_ref(entry), contract.payment)
                    .unwrap_or(UNKNOWN_CHANCE)
            }
        };

        let record = self
            .stamp(EventKind::OfferRejected)
            .field("customer", customer.as_str())
            .field("productID", entry.item_id.as_str())
            .field("productType", self.product_type(&entry.item_id))
            .field("quantity", entry.quantity.to_string())
            .field("price", format!("{:.2}", contract.payment))
            .field("successChance", format!("{:.4}", chance));
        self.emit(record)?;

        info!(
            "Offer Rejected: {} - {} {} units at ${:.2}",
            customer, entry.item_id, entry.quantity, contract.payment
        );
        Ok(Disposition::Logged(1))
    }

    fn handle_counter_offer(&self, event: &CounterOfferEvent) -> Result<Disposition> {
        let (contract, original) = Self::offered_contract(event.contract.as_ref())?;
        let customer = self.label(event.actor);

        // The counter terms replace the offer the cached chance was for
        let countered = vec![OfferedItem::new(event.product_id.as_str(), event.quantity)];
        let since = Instant::now();
        match self.recompute(event.actor, &countered, event.price) {
            Some(chance) => {
                self.cache.upsert_unless_newer(
                    event.actor,
                    NegotiationChanceRecord::new(customer.as_str(), countered, event.price, chance),
                    since,
                );
            }
            None => debug!(
                "Counter offer by {} not re-estimated, cache left as is",
                customer
            ),
        }

        let record = self
            .stamp(EventKind::CounterOffer)
            .field("customer", customer.as_str())
            .field("originalProductID", original.item_id.as_str())
            .field("originalProductType", self.product_type(&original.item_id))
            .field("originalQuantity", original.quantity.to_string())
            .field("originalPrice", format!("{:.2}", contract.payment))
            .field("counterProductID", event.product_id.as_str())
            .field("counterProductType", self.product_type(&event.product_id))
            .field("counterQuantity", event.quantity.to_string())
            .field("counterPrice", format!("{:.2}", event.price))
            .field("accepted", host_bool(true));
        self.emit(record)?;

        info!(
            "Counter Offer by {} - Original: {} {} units at ${:.2}, Counter: {} {} units at ${:.2}",
            customer,
            original.item_id,
            original.quantity,
            contract.payment,
            event.product_id,
            event.quantity,
            event.price
        );
        Ok(Disposition::Logged(1))
    }

    fn handle_delivery(&self, event: &DeliveryEvaluation) -> Result<Observation<DeliveryEcho>> {
        let customer = self.label(event.actor);
        let echo = DeliveryEcho {
            highest_addiction: event.highest_addiction,
            main_drug_type: event.main_drug_type.clone(),
            matched_product_count: event.matched_product_count,
            satisfaction: event.satisfaction,
        };

        let record = self
            .stamp(EventKind::Preference)
            .field("customer", customer.as_str())
            .field("currentAddiction", format!("{:.4}", event.current_addiction))
            .field("highestAddiction", format!("{:.4}", echo.highest_addiction))
            .field("mainDrugType", echo.main_drug_type.as_str())
            .field("matchedProductCount", echo.matched_product_count.to_string())
            .field("satisfaction", format!("{:.4}", echo.satisfaction))
            .field("source", "Delivery");
        self.emit(record)?;

        info!(
            "Evaluate Delivery: {} - Current Addiction: {:.4}, Highest Addiction: {:.4}, Main Drug Type: {}, Matched Product Count: {}, Satisfaction: {:.4}",
            customer,
            event.current_addiction,
            echo.highest_addiction,
            echo.main_drug_type,
            echo.matched_product_count,
            echo.satisfaction
        );
        Ok(Observation::logged(echo))
    }
}

fn host_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

impl HandoverObserver for TelemetryContext {
    fn observe_handover(&self, event: &HandoverEvent) -> Disposition {
        let outcome = self.guarded("handover", || self.handle_handover(event));
        self.settle("handover", outcome)
    }
}

impl OfferChanceObserver for TelemetryContext {
    fn observe_offer_chance(&self, event: &OfferChanceEvent) -> Observation<ChanceEcho> {
        let outcome = self.guarded("offer chance", || self.handle_offer_chance(event));
        self.settle_observation("offer chance", outcome)
    }
}

impl ContractAcceptedObserver for TelemetryContext {
    fn observe_contract_accepted(&self, event: &ContractAcceptedEvent) -> Disposition {
        let outcome = self.guarded("contract accepted", || self.handle_contract_accepted(event));
        self.settle("contract accepted", outcome)
    }
}

impl ContractRejectedObserver for TelemetryContext {
    fn observe_contract_rejected(&self, event: &ContractRejectedEvent) -> Disposition {
        let outcome = self.guarded("contract rejected", || self.handle_contract_rejected(event));
        self.settle("contract rejected", outcome)
    }
}

impl CounterOfferObserver for TelemetryContext {
    fn observe_counter_offer(&self, event: &CounterOfferEvent) -> Disposition {
        let outcome = self.guarded("counter offer", || self.handle_counter_offer(event));
        self.settle("counter offer", outcome)
    }
}

impl DeliveryObserver for TelemetryContext {
    fn observe_delivery(&self, event: &DeliveryEvaluation) -> Observation<DeliveryEcho> {
        let outcome = self.guarded("delivery evaluation", || self.handle_delivery(event));
        self.settle_observation("delivery evaluation", outcome)
    }
}
