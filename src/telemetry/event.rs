use serde::{Deserialize, Serialize};
use std::fmt;

use super::encoder::{csv_field, encode_payload_for_line};

/// Event variants observed from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    Sale,
    OfferAccepted,
    OfferRejected,
    CounterOffer,
    Preference,
    ChanceComputed,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Sale,
        EventKind::OfferAccepted,
        EventKind::OfferRejected,
        EventKind::CounterOffer,
        EventKind::Preference,
        EventKind::ChanceComputed,
    ];

    /// Category tag written in the `EventType` column.
    pub fn tag(&self) -> &'static str {
        match self {
            EventKind::Sale => "SALE",
            EventKind::OfferAccepted => "OFFER_ACCEPTED",
            EventKind::OfferRejected => "OFFER_REJECTED",
            EventKind::CounterOffer => "COUNTER_OFFER",
            EventKind::Preference => "CUSTOMER_PREFERENCE",
            EventKind::ChanceComputed => "OFFER_CHANCE",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    pub fn category(&self) -> LogCategory {
        match self {
            EventKind::Sale => LogCategory::Sales,
            EventKind::OfferAccepted | EventKind::OfferRejected | EventKind::ChanceComputed => {
                LogCategory::Negotiations
            }
            EventKind::CounterOffer => LogCategory::CounterOffers,
            EventKind::Preference => LogCategory::Preferences,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

pub const UNIFIED_HEADER: &str = "GameTime,RealTime,EventType,Payload";

/// Sale row column holding the payment, counted from 0.
pub const SALE_PAYMENT_COLUMN: usize = 6;

const SALES_COLUMNS: &[&str] = &[
    "customer",
    "dealer",
    "handoverByPlayer",
    "payment",
    "satisfaction",
    "quantityRequested",
    "quantityProvided",
    "itemIDs",
    "itemTypes",
];
const NEGOTIATION_COLUMNS: &[&str] = &[
    "customer",
    "productID",
    "productType",
    "quantity",
    "price",
    "window",
    "successChance",
];
const COUNTER_OFFER_COLUMNS: &[&str] = &[
    "customer",
    "originalProductID",
    "originalProductType",
    "originalQuantity",
    "originalPrice",
    "counterProductID",
    "counterProductType",
    "counterQuantity",
    "counterPrice",
    "accepted",
];
const PREFERENCE_COLUMNS: &[&str] = &[
    "customer",
    "currentAddiction",
    "highestAddiction",
    "mainDrugType",
    "matchedProductCount",
    "satisfaction",
    "source",
];

/// The four per-category groups used by the compatibility layout, the
/// in-memory buffers, periodic export and the archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    Sales,
    Negotiations,
    CounterOffers,
    Preferences,
}

impl LogCategory {
    pub const ALL: [LogCategory; 4] = [
        LogCategory::Sales,
        LogCategory::Negotiations,
        LogCategory::CounterOffers,
        LogCategory::Preferences,
    ];

    pub fn file_stem(&self) -> &'static str {
        match self {
            LogCategory::Sales => "sales",
            LogCategory::Negotiations => "negotiations",
            LogCategory::CounterOffers => "counter_offers",
            LogCategory::Preferences => "customer_preferences",
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            LogCategory::Sales => SALES_COLUMNS,
            LogCategory::Negotiations => NEGOTIATION_COLUMNS,
            LogCategory::CounterOffers => COUNTER_OFFER_COLUMNS,
            LogCategory::Preferences => PREFERENCE_COLUMNS,
        }
    }

    /// `GameTime,RealTime,EventType,<Columns...>,Extra`
    pub fn header(&self) -> String {
        let mut header = String::from("GameTime,RealTime,EventType");
        for column in self.columns() {
            header.push(',');
            header.push_str(&pascal_case(column));
        }
        header.push_str(",Extra");
        header
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

fn pascal_case(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// One observed event, already stamped and flattened to ordered string fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub kind: EventKind,
    pub sim_time: String,
    pub wall_time: String,
    /// Insertion order is preserved on disk.
    pub fields: Vec<(String, String)>,
}

impl EventRecord {
    pub fn new(kind: EventKind, sim_time: impl Into<String>, wall_time: impl Into<String>) -> Self {
        Self {
            kind,
            sim_time: sim_time.into(),
            wall_time: wall_time.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn category(&self) -> LogCategory {
        self.kind.category()
    }

    /// Unified layout line, without the trailing newline.
    pub fn to_unified_line(&self) -> String {
        format!(
            "{},{},{},{}",
            csv_field(&self.sim_time),
            csv_field(&self.wall_time),
            self.kind.tag(),
            encode_payload_for_line(&self.fields)
        )
    }

    /// Per-category row: schema columns by name, blanks for missing ones,
    /// leftovers encoded into the trailing `Extra` column.
    pub fn to_category_row(&self) -> String {
        let category = self.category();
        let columns = category.columns();

        let mut row = format!(
            "{},{},{}",
            csv_field(&self.sim_time),
            csv_field(&self.wall_time),
            self.kind.tag()
        );
        for column in columns {
            row.push(',');
            if let Some(value) = self.get(column) {
                row.push_str(&csv_field(value));
            }
        }

        let extra: Vec<(String, String)> = self
            .fields
            .iter()
            .filter(|(k, _)| !columns.contains(&k.as_str()))
            .cloned()
            .collect();
        row.push(',');
        if !extra.is_empty() {
            row.push_str(&encode_payload_for_line(&extra));
        }
        row
    }
}
