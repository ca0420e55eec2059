use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use trade_telemetry::adapter::{
    ActorLabelProvider, ContractAcceptedEvent, ContractAcceptedObserver, ContractInfo,
    ContractRejectedEvent, ContractRejectedObserver, CounterOfferEvent, CounterOfferObserver,
    DeliveryEvaluation, DeliveryObserver, HandoverEvent, HandoverObserver, HandoverOutcome,
    NegotiationOracle, OfferChanceEvent, OfferChanceObserver,
};
use trade_telemetry::classify::{InMemoryCatalog, ItemDefinition};
use trade_telemetry::config::LogLayout;
use trade_telemetry::correlation::{ActorId, OfferedItem};
use trade_telemetry::{Collaborators, TelemetryConfig, TelemetryContext};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LayoutArg {
    Unified,
    PerCategory,
}

/// Runs a synthetic trading session through the telemetry layer.
#[derive(Debug, Parser)]
#[command(name = "trade-telemetry", version)]
struct Args {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides `data_dir` from the config
    #[arg(long, env = "TRADE_TELEMETRY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[arg(long, value_enum)]
    layout: Option<LayoutArg>,

    /// Negotiation rounds per call path
    #[arg(long, default_value_t = 25)]
    events: u32,

    /// Host update cadence
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,
}

const CUSTOMERS: [&str; 4] = ["Kyle Cooley", "Jessi Waters", "Meg Cooley", "Beth Penn"];
const PRODUCTS: [(&str, &str); 4] = [
    ("ogkush", "OG Kush"),
    ("bluecrystal", "Blue Crystal"),
    ("cocaine", "Cocaine"),
    ("greencrack", "Green Crack"),
];

struct DemoLabels(HashMap<ActorId, String>);

impl ActorLabelProvider for DemoLabels {
    fn label(&self, actor: ActorId) -> Option<String> {
        self.0.get(&actor).cloned()
    }
}

/// Chance falls with the unit price.
struct DemoOracle;

impl NegotiationOracle for DemoOracle {
    fn offer_success_chance(
        &self,
        _actor: ActorId,
        items: &[OfferedItem],
        asking_price: f32,
    ) -> Option<f32> {
        let quantity: u32 = items.iter().map(|i| i.quantity).sum();
        if quantity == 0 {
            return None;
        }
        Some((1.0 - asking_price / (quantity as f32 * 60.0)).clamp(0.0, 1.0))
    }
}

fn load_config(args: &Args) -> Result<TelemetryConfig> {
    let mut config = match &args.config {
        Some(path) => TelemetryConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TelemetryConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(layout) = args.layout {
        config.layout = match layout {
            LayoutArg::Unified => LogLayout::Unified,
            LayoutArg::PerCategory => LogLayout::PerCategory,
        };
    }
    config.validate().context("validating config")?;
    Ok(config)
}

/// One host call path: offer, decision, handover, delivery evaluation.
async fn drive_path(
    context: Arc<TelemetryContext>,
    oracle: Arc<DemoOracle>,
    first_actor: i64,
    rounds: u32,
    cancel: CancellationToken,
) {
    for round in 0..rounds {
        if cancel.is_cancelled() {
            break;
        }
        let actor = ActorId(first_actor + i64::from(round % 2));
        let (product_id, _) = PRODUCTS[(round as usize + first_actor as usize) % PRODUCTS.len()];
        let quantity = 1 + round % 5;
        let price = 35.0 * quantity as f32 + (round % 7) as f32 * 5.0;
        let offered = vec![OfferedItem::new(product_id, quantity)];

        let chance = oracle
            .offer_success_chance(actor, &offered, price)
            .unwrap_or_default();
        context.observe_offer_chance(&OfferChanceEvent {
            actor,
            items: Some(offered.clone()),
            asking_price: price,
            computed_chance: chance,
        });

        let contract = Some(ContractInfo {
            products: offered.clone(),
            payment: price,
        });
        match round % 4 {
            0 => {
                context.observe_counter_offer(&CounterOfferEvent {
                    actor,
                    contract: contract.clone(),
                    product_id: product_id.to_string(),
                    quantity,
                    price: price * 0.85,
                });
            }
            3 => {
                context.observe_contract_rejected(&ContractRejectedEvent { actor, contract });
                tokio::time::sleep(Duration::from_millis(20)).await;
                continue;
            }
            _ => {}
        }

        context.observe_contract_accepted(&ContractAcceptedEvent {
            actor,
            contract: Some(ContractInfo {
                products: offered.clone(),
                payment: price,
            }),
            window: ["Morning", "Afternoon", "Night"][round as usize % 3].to_string(),
        });

        let satisfaction = chance.mul_add(0.5, 0.4).min(1.0);
        context.observe_handover(&HandoverEvent {
            actor,
            outcome: HandoverOutcome::Finalize,
            items: Some(offered.clone()),
            handover_by_player: round % 3 != 0,
            total_payment: price,
            product_list: Some(offered),
            satisfaction,
            dealer_name: (round % 3 == 0).then(|| "Benji Coleman".to_string()),
            current_addiction: (round % 4) as f32 * 0.15,
        });
        context.observe_delivery(&DeliveryEvaluation {
            actor,
            current_addiction: (round % 4) as f32 * 0.15,
            highest_addiction: 0.6,
            main_drug_type: "Marijuana".to_string(),
            matched_product_count: 1,
            satisfaction,
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let labels: HashMap<ActorId, String> = CUSTOMERS
        .iter()
        .enumerate()
        .map(|(i, name)| (ActorId(i as i64 + 1), name.to_string()))
        .collect();
    let catalog = InMemoryCatalog::from_definitions(PRODUCTS.iter().map(|(id, name)| {
        ItemDefinition {
            id: id.to_string(),
            name: name.to_string(),
            tags: Vec::new(),
        }
    }));
    let oracle = Arc::new(DemoOracle);

    let collaborators = Collaborators::default()
        .with_labels(Arc::new(DemoLabels(labels)))
        .with_oracle(oracle.clone())
        .with_catalog(Arc::new(catalog));
    let context = Arc::new(
        TelemetryContext::start(config, collaborators).context("starting telemetry session")?,
    );

    let cancel = CancellationToken::new();
    // Two independent host call paths, as with a player and an NPC dealer
    let paths = vec![
        tokio::spawn(drive_path(context.clone(), oracle.clone(), 1, args.events, cancel.clone())),
        tokio::spawn(drive_path(context.clone(), oracle, 3, args.events, cancel.clone())),
    ];
    let done = cancel.clone();
    tokio::spawn(async move {
        for path in paths {
            if let Err(e) = path.await {
                tracing::error!("Call path failed: {}", e);
            }
        }
        done.cancel();
    });

    let mut cadence = tokio::time::interval(Duration::from_millis(args.tick_ms.max(1)));
    cadence.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!("Session running. Press Ctrl+C to stop.");
    loop {
        tokio::select! {
            _ = cadence.tick() => {
                context.tick(Instant::now());
            }
            _ = cancel.cancelled() => break,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                cancel.cancel();
                break;
            }
        }
    }

    let report = context
        .shutdown()
        .context("session was already shut down")?;
    for failure in &report.failures {
        tracing::warn!("Consolidation: {}", failure);
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&report.summary).context("serializing summary")?
    );
    Ok(())
}
