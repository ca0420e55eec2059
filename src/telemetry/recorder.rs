use std::collections::{BTreeMap, HashMap, VecDeque};

use super::encoder::single_line;
use super::event::{EventKind, EventRecord, LogCategory};
use super::metrics::RevenueStats;

/// Buffered rows for one category, in per-category row form.
#[derive(Debug, Clone, Default)]
pub struct CategoryRows {
    pub rows: VecDeque<String>,
    /// Rows pushed out of the bounded history.
    pub overflowed: u64,
}

/// Everything the summary needs, copied out of the recorder.
#[derive(Debug, Clone, Default)]
pub struct RecorderSnapshot {
    pub events_by_kind: BTreeMap<EventKind, u64>,
    pub rows_by_category: BTreeMap<LogCategory, u64>,
    pub history: HashMap<LogCategory, CategoryRows>,
    pub revenue: RevenueStats,
    pub dropped_events: u64,
}

/// In-memory session buffers.
///
/// `pending` feeds the periodic export and is drained by it. `history` is the
/// bounded copy kept for inspection. Counters and revenue are running totals
/// over every recorded row.
#[derive(Debug)]
pub struct SessionRecorder {
    history_limit: usize,
    pending: HashMap<LogCategory, Vec<String>>,
    history: HashMap<LogCategory, CategoryRows>,
    events_by_kind: BTreeMap<EventKind, u64>,
    rows_by_category: BTreeMap<LogCategory, u64>,
    revenue: RevenueStats,
    dropped_events: u64,
}

impl SessionRecorder {
    pub fn new(history_limit: usize) -> Self {
        Self {
            history_limit: history_limit.max(1),
            pending: HashMap::new(),
            history: HashMap::new(),
            events_by_kind: BTreeMap::new(),
            rows_by_category: BTreeMap::new(),
            revenue: RevenueStats::default(),
            dropped_events: 0,
        }
    }

    pub fn record(&mut self, event: &EventRecord) {
        let category = event.category();
        let row = single_line(event.to_category_row());

        if category == LogCategory::Sales {
            self.revenue.add_sale_row(&row);
        }
        self.pending.entry(category).or_default().push(row.clone());

        let history = self.history.entry(category).or_default();
        if history.rows.len() >= self.history_limit {
            history.rows.pop_front();
            history.overflowed += 1;
        }
        history.rows.push_back(row);

        *self.events_by_kind.entry(event.kind).or_default() += 1;
        *self.rows_by_category.entry(category).or_default() += 1;
    }

    pub fn note_dropped(&mut self) {
        self.dropped_events += 1;
    }

    /// Drains rows not yet exported, in category order.
    pub fn take_pending(&mut self) -> Vec<(LogCategory, Vec<String>)> {
        LogCategory::ALL
            .iter()
            .filter_map(|category| {
                self.pending
                    .remove(category)
                    .filter(|rows| !rows.is_empty())
                    .map(|rows| (*category, rows))
            })
            .collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    pub fn count(&self, kind: EventKind) -> u64 {
        self.events_by_kind.get(&kind).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> RecorderSnapshot {
        RecorderSnapshot {
            events_by_kind: self.events_by_kind.clone(),
            rows_by_category: self.rows_by_category.clone(),
            history: self.history.clone(),
            revenue: self.revenue.clone(),
            dropped_events: self.dropped_events,
        }
    }
}
