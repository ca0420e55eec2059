use chrono::{Local, TimeZone};
use std::fs;
use tempfile::TempDir;

use trade_telemetry::correlation::CacheStats;
use trade_telemetry::session::{ConsolidationInput, SessionConsolidator, SessionPaths};
use trade_telemetry::telemetry::log::read_lines;
use trade_telemetry::telemetry::metrics::compute_revenue;
use trade_telemetry::telemetry::recorder::RecorderSnapshot;
use trade_telemetry::telemetry::{EventKind, EventRecord, LogCategory, SessionRecorder};

fn sale_row(payment: &str) -> String {
    EventRecord::new(EventKind::Sale, "09:00:00", "2024-05-01 09:00:00")
        .field("customer", "Kyle")
        .field("payment", payment)
        .to_category_row()
}

fn input(snapshot: RecorderSnapshot) -> ConsolidationInput {
    ConsolidationInput {
        session_id: "test-session".to_string(),
        started_at: Local.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
        ended_at: Local.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap(),
        snapshot,
        cache: CacheStats::default(),
    }
}

fn write_rotating(paths: &SessionPaths, category: LogCategory, lines: &[String]) {
    fs::create_dir_all(paths.periodic_dir()).unwrap();
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(paths.rotating_file(category), content).unwrap();
}

#[test]
fn test_rotating_file_is_archived_then_removed() {
    let dir = TempDir::new().unwrap();
    let paths = SessionPaths::new(dir.path());
    let header = LogCategory::Sales.header();

    // 1. Header + 3 rows
    let rows = vec![header.clone(), sale_row("10.00"), sale_row("20.00"), sale_row("30.00")];
    write_rotating(&paths, LogCategory::Sales, &rows);

    // 2. Consolidate
    let report = SessionConsolidator::new(paths.clone()).run(input(RecorderSnapshot::default()));
    assert!(report.is_clean(), "failures: {:?}", report.failures);

    // 3. Archive = header + 3 rows, rotating file gone
    let archive = paths.archive_file(LogCategory::Sales, input(RecorderSnapshot::default()).ended_at);
    assert!(archive.ends_with("sales_20240501_103000_final.csv"));
    assert_eq!(read_lines(&archive).unwrap(), rows);
    assert!(!paths.rotating_file(LogCategory::Sales).exists());
    assert!(report.removed.contains(&paths.rotating_file(LogCategory::Sales)));
}

#[test]
fn test_missing_rotating_file_gives_header_only_archive() {
    let dir = TempDir::new().unwrap();
    let paths = SessionPaths::new(dir.path());

    let report = SessionConsolidator::new(paths.clone()).run(input(RecorderSnapshot::default()));

    assert_eq!(report.archives.len(), 4);
    for archived in &report.archives {
        assert_eq!(archived.rows, 0);
        assert_eq!(read_lines(&archived.path).unwrap(), vec![archived.category.header()]);
    }
    assert!(report.removed.is_empty());
}

#[test]
fn test_headers_embedded_by_periodic_exports_are_skipped() {
    let dir = TempDir::new().unwrap();
    let paths = SessionPaths::new(dir.path());
    let header = LogCategory::Sales.header();

    // two exports, each wrote its own header
    let lines = vec![header.clone(), sale_row("1.00"), header.clone(), sale_row("2.00")];
    write_rotating(&paths, LogCategory::Sales, &lines);

    let report = SessionConsolidator::new(paths.clone()).run(input(RecorderSnapshot::default()));
    let sales = report
        .archives
        .iter()
        .find(|a| a.category == LogCategory::Sales)
        .unwrap();

    assert_eq!(sales.rows, 2);
    assert_eq!(
        read_lines(&sales.path).unwrap(),
        vec![header, sale_row("1.00"), sale_row("2.00")]
    );
}

#[test]
fn test_summary_is_written_with_revenue() {
    let dir = TempDir::new().unwrap();
    let paths = SessionPaths::new(dir.path());

    let mut recorder = SessionRecorder::new(100);
    for payment in ["12.50", "7.25"] {
        recorder.record(
            &EventRecord::new(EventKind::Sale, "09:00:00", "2024-05-01 09:00:00")
                .field("customer", "Kyle")
                .field("payment", payment),
        );
    }

    let report = SessionConsolidator::new(paths.clone()).run(input(recorder.snapshot()));

    assert_eq!(report.summary.revenue.total, 19.75);
    assert_eq!(report.summary.revenue.sales_parsed, 2);
    assert_eq!(report.summary.events_by_tag.get("SALE"), Some(&2));
    assert_eq!(report.summary.rows_by_category.get("sales"), Some(&2));

    let summary_path = report.summary_path.expect("summary written");
    assert!(summary_path.ends_with("session_summary_20240501_103000.txt"));
    let text = fs::read_to_string(summary_path).unwrap();
    assert!(text.starts_with("Session Summary"));
    assert!(text.contains("test-session"));
    assert!(text.contains("$19.75"));
    assert!(text.contains("Duration: 5400s"));
}

#[test]
fn test_revenue_counts_sales_beyond_history_limit() {
    let dir = TempDir::new().unwrap();
    let paths = SessionPaths::new(dir.path());

    // 1. History keeps 2 rows, 3 sales recorded
    let mut recorder = SessionRecorder::new(2);
    for payment in ["10.00", "20.00", "30.00"] {
        recorder.record(
            &EventRecord::new(EventKind::Sale, "09:00:00", "2024-05-01 09:00:00")
                .field("customer", "Kyle")
                .field("payment", payment),
        );
    }
    let snapshot = recorder.snapshot();
    assert_eq!(snapshot.history[&LogCategory::Sales].rows.len(), 2);

    // 2. Summary still covers every sale
    let report = SessionConsolidator::new(paths).run(input(snapshot));
    assert_eq!(report.summary.rows_by_category.get("sales"), Some(&3));
    assert_eq!(report.summary.revenue.total, 60.0);
    assert_eq!(report.summary.revenue.sales_parsed, 3);
    assert_eq!(report.summary.revenue.sales_unparsed, 0);
    assert_eq!(report.summary.history_overflowed, 1);

    let text = fs::read_to_string(report.summary_path.unwrap()).unwrap();
    assert!(text.contains("$60.00"));
    assert!(text.contains("History overflow: 1 rows"));
}

#[test]
fn test_recorded_rows_stay_on_one_line() {
    let dir = TempDir::new().unwrap();
    let paths = SessionPaths::new(dir.path());

    let mut recorder = SessionRecorder::new(10);
    recorder.record(
        &EventRecord::new(EventKind::Sale, "09:00:00", "2024-05-01 09:00:00")
            .field("customer", "Kyle\n\nCooley")
            .field("payment", "5.00"),
    );
    let pending = recorder.take_pending();
    assert_eq!(pending.len(), 1);
    let (category, rows) = &pending[0];
    assert!(!rows[0].contains('\n'));

    // exported, then archived: the row survives intact
    write_rotating(&paths, *category, &[category.header(), rows[0].clone()]);
    let report = SessionConsolidator::new(paths).run(input(recorder.snapshot()));
    let sales = report
        .archives
        .iter()
        .find(|a| a.category == LogCategory::Sales)
        .unwrap();
    assert_eq!(sales.rows, 1);
    assert_eq!(read_lines(&sales.path).unwrap()[1], rows[0]);
    assert_eq!(report.summary.revenue.total, 5.0);
}

#[test]
fn test_unparseable_payments_are_counted() {
    let rows = vec![sale_row("10.00"), sale_row("n/a"), "garbage".to_string()];
    let revenue = compute_revenue(rows.iter());

    assert_eq!(revenue.total, 10.0);
    assert_eq!(revenue.sales_parsed, 1);
    assert_eq!(revenue.sales_unparsed, 2);
}
