use std::fs;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

use trade_telemetry::config::{LogLayout, TelemetryConfig};
use trade_telemetry::telemetry::log::read_lines;
use trade_telemetry::telemetry::{
    encode_payload, EventKind, EventLog, EventRecord, LogCategory, LogLine, UNIFIED_HEADER,
};

fn sale(n: usize) -> EventRecord {
    EventRecord::new(EventKind::Sale, "09:00:00", "2024-05-01 09:00:00")
        .field("customer", format!("Customer {n}"))
        .field("payment", format!("{}.00", n))
}

#[test]
fn test_header_then_lines_in_append_order() {
    let dir = TempDir::new().unwrap();
    let config = TelemetryConfig::with_data_dir(dir.path());
    let log = EventLog::open(&config).unwrap();

    for n in 0..5 {
        log.append(&sale(n)).unwrap();
    }

    let lines = read_lines(&dir.path().join("session_events.csv")).unwrap();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], UNIFIED_HEADER);
    for (n, line) in lines[1..].iter().enumerate() {
        let parsed = LogLine::parse(line).unwrap();
        assert_eq!(parsed.payload[0].1, format!("Customer {n}"));
    }
}

#[test]
fn test_reopen_appends_without_second_header() {
    let dir = TempDir::new().unwrap();
    let config = TelemetryConfig::with_data_dir(dir.path());

    EventLog::open(&config).unwrap().append(&sale(1)).unwrap();
    EventLog::open(&config).unwrap().append(&sale(2)).unwrap();

    let lines = read_lines(&dir.path().join("session_events.csv")).unwrap();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines.iter().filter(|l| *l == UNIFIED_HEADER).count(), 1);
}

#[test]
fn test_concurrent_appends_never_interleave() {
    let dir = TempDir::new().unwrap();
    let config = TelemetryConfig::with_data_dir(dir.path());
    let log = Arc::new(EventLog::open(&config).unwrap());

    // 1. Two writers, 1000 lines each
    let handles: Vec<_> = (0..2)
        .map(|writer| {
            let log = log.clone();
            thread::spawn(move || {
                for n in 0..1000 {
                    log.append(&sale(writer * 1000 + n)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // 2. Header + 2000 whole lines
    let lines = read_lines(&dir.path().join("session_events.csv")).unwrap();
    assert_eq!(lines.len(), 2001);
    for line in &lines[1..] {
        let parsed = LogLine::parse(line).expect("every line must parse");
        assert_eq!(parsed.tag, "SALE");
        assert_eq!(parsed.payload.len(), 2);
    }
}

#[test]
fn test_embedded_newlines_stay_on_one_line() {
    let dir = TempDir::new().unwrap();
    let config = TelemetryConfig::with_data_dir(dir.path());
    let log = EventLog::open(&config).unwrap();

    log.append(
        &EventRecord::new(EventKind::Sale, "09:00:00", "2024-05-01 09:00:00")
            .field("customer", "line one\nline two"),
    )
    .unwrap();

    let lines = read_lines(&dir.path().join("session_events.csv")).unwrap();
    assert_eq!(lines.len(), 2);
    assert!(LogLine::parse(&lines[1]).is_ok());
}

#[test]
fn test_per_category_layout_creates_every_file() {
    let dir = TempDir::new().unwrap();
    let mut config = TelemetryConfig::with_data_dir(dir.path());
    config.layout = LogLayout::PerCategory;
    let log = EventLog::open(&config).unwrap();

    for category in LogCategory::ALL {
        let path = log.path_for(category);
        let lines = read_lines(&path).unwrap();
        assert_eq!(lines, vec![category.header()]);
    }
    assert_eq!(
        LogCategory::Negotiations.header(),
        "GameTime,RealTime,EventType,Customer,ProductID,ProductType,Quantity,Price,Window,SuccessChance,Extra"
    );
}

#[test]
fn test_category_row_puts_leftovers_in_extra() {
    let record = EventRecord::new(EventKind::ChanceComputed, "09:00:00", "2024-05-01 09:00:00")
        .field("customer", "Kyle")
        .field("items", "ogkush(2);")
        .field("successChance", "0.5000");

    let row = record.to_category_row();
    assert!(row.starts_with("09:00:00,2024-05-01 09:00:00,OFFER_CHANCE,Kyle,,,,,,0.5000,"));
    assert!(row.ends_with(r#""{""items"":""ogkush(2);""}""#));
}

#[test]
fn test_append_encoded_routes_by_tag() {
    let dir = TempDir::new().unwrap();
    let mut config = TelemetryConfig::with_data_dir(dir.path());
    config.layout = LogLayout::PerCategory;
    let log = EventLog::open(&config).unwrap();

    let payload = encode_payload(&[("customer", "Meg"), ("originalProductID", "ogkush")]);
    log.append_encoded("COUNTER_OFFER", "09:00:00", "2024-05-01 09:00:00", &payload)
        .unwrap();
    assert!(log
        .append_encoded("NOT_A_TAG", "09:00:00", "2024-05-01 09:00:00", &payload)
        .is_err());

    let raw = fs::read_to_string(log.path_for(LogCategory::CounterOffers)).unwrap();
    assert!(raw.lines().nth(1).unwrap().contains("COUNTER_OFFER,Meg,ogkush"));
}
