use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

use super::encoder::split_csv_record;
use super::event::SALE_PAYMENT_COLUMN;
use super::recorder::RecorderSnapshot;
use crate::correlation::CacheStats;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RevenueStats {
    pub total: f64,
    pub sales_parsed: u64,
    pub sales_unparsed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: DateTime<Local>,
    pub ended_at: DateTime<Local>,
    pub events_by_tag: BTreeMap<String, u64>,
    pub rows_by_category: BTreeMap<String, u64>,
    pub revenue: RevenueStats,
    /// Rows no longer held in memory; every count above still includes them.
    pub history_overflowed: u64,
    pub dropped_events: u64,
    pub cache: CacheStats,
}

impl RevenueStats {
    /// Adds one raw sale row. A payment that does not parse is counted, not fatal.
    pub fn add_sale_row(&mut self, row: &str) {
        let payment = split_csv_record(row)
            .ok()
            .and_then(|columns| columns.get(SALE_PAYMENT_COLUMN).cloned())
            .and_then(|raw| raw.trim().parse::<f64>().ok());

        match payment {
            Some(value) if value.is_finite() => {
                self.total += value;
                self.sales_parsed += 1;
            }
            _ => self.sales_unparsed += 1,
        }
    }
}

/// Sums the payment column of raw sale rows.
pub fn compute_revenue<'a>(sale_rows: impl IntoIterator<Item = &'a String>) -> RevenueStats {
    let mut stats = RevenueStats::default();
    for row in sale_rows {
        stats.add_sale_row(row);
    }
    stats
}

pub fn compute_summary(
    session_id: &str,
    started_at: DateTime<Local>,
    ended_at: DateTime<Local>,
    snapshot: &RecorderSnapshot,
    cache: CacheStats,
) -> SessionSummary {
    let events_by_tag = snapshot
        .events_by_kind
        .iter()
        .map(|(kind, count)| (kind.tag().to_string(), *count))
        .collect();

    let rows_by_category = snapshot
        .rows_by_category
        .iter()
        .map(|(category, count)| (category.file_stem().to_string(), *count))
        .collect();

    // running totals: history is bounded and may have dropped early sales
    let history_overflowed = snapshot.history.values().map(|rows| rows.overflowed).sum();

    SessionSummary {
        session_id: session_id.to_string(),
        started_at,
        ended_at,
        events_by_tag,
        rows_by_category,
        revenue: snapshot.revenue.clone(),
        history_overflowed,
        dropped_events: snapshot.dropped_events,
        cache,
    }
}

impl SessionSummary {
    pub fn total_events(&self) -> u64 {
        self.events_by_tag.values().sum()
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let duration = self.ended_at.signed_duration_since(self.started_at);

        // write! into a String cannot fail
        let _ = writeln!(out, "Session Summary");
        let _ = writeln!(out, "===============");
        let _ = writeln!(out, "Session:  {}", self.session_id);
        let _ = writeln!(out, "Started:  {}", self.started_at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "Ended:    {}", self.ended_at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "Duration: {}s", duration.num_seconds().max(0));
        let _ = writeln!(out);

        let _ = writeln!(out, "Events ({} total)", self.total_events());
        for (tag, count) in &self.events_by_tag {
            let _ = writeln!(out, "  {:<22}{}", tag, count);
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "Rows by category");
        for (category, count) in &self.rows_by_category {
            let _ = writeln!(out, "  {:<22}{}", category, count);
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "Revenue");
        let _ = writeln!(out, "  Total:    ${:.2}", self.revenue.total);
        let _ = writeln!(out, "  Sales:    {}", self.revenue.sales_parsed);
        if self.revenue.sales_unparsed > 0 {
            let _ = writeln!(out, "  Unparsed: {}", self.revenue.sales_unparsed);
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "Offer chance cache");
        let _ = writeln!(
            out,
            "  Hits: {}  Misses: {}  Expired: {}  Evicted: {}  Live: {}",
            self.cache.hits, self.cache.misses, self.cache.expired, self.cache.evicted, self.cache.len
        );
        let _ = writeln!(out, "Dropped events: {}", self.dropped_events);
        if self.history_overflowed > 0 {
            let _ = writeln!(out, "History overflow: {} rows", self.history_overflowed);
        }
        out
    }
}
