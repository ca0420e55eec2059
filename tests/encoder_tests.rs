use trade_telemetry::error::EncodingError;
use trade_telemetry::telemetry::encoder::{split_csv_record, quote_for_line};
use trade_telemetry::telemetry::{
    decode_payload, encode_payload, encode_payload_for_line, EventKind, EventRecord, LogLine,
};

#[test]
fn test_payload_keeps_insertion_order() {
    let fields = [("zeta", "1"), ("alpha", "2"), ("mid", "3")];
    let blob = encode_payload(&fields);

    assert_eq!(blob, r#"{"zeta":"1","alpha":"2","mid":"3"}"#);
    let decoded = decode_payload(&blob).unwrap();
    let keys: Vec<&str> = decoded.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
}

#[test]
fn test_inner_quotes_are_backslash_escaped() {
    let blob = encode_payload(&[("customer", r#"Dr. "Doc" Smith"#)]);
    assert_eq!(blob, r#"{"customer":"Dr. \"Doc\" Smith"}"#);

    // outer layer doubles every quote, the inner escape survives
    let line_field = encode_payload_for_line(&[("customer", r#"Dr. "Doc" Smith"#)]);
    assert_eq!(line_field, r#""{""customer"":""Dr. \""Doc\"" Smith""}""#);
}

#[test]
fn test_tricky_values_survive_both_layers() {
    let values = [
        "",
        "plain",
        "comma, inside",
        r#"quote " inside"#,
        r#""leading and trailing""#,
        r#"ends in backslash \"#,
        r#"looks like, "next":"field"#,
        "ünïcödé ✓",
        "{braces}",
    ];

    for value in values {
        let fields = vec![("v".to_string(), value.to_string()), ("after".to_string(), "x".to_string())];
        let record = EventRecord {
            kind: EventKind::Sale,
            sim_time: "10:00:00".to_string(),
            wall_time: "2024-05-01 10:00:00".to_string(),
            fields: fields.clone(),
        };

        let parsed = LogLine::parse(&record.to_unified_line())
            .unwrap_or_else(|e| panic!("value {value:?} broke the line: {e}"));
        assert_eq!(parsed.payload, fields, "value {value:?} did not round-trip");
        assert_eq!(parsed.tag, "SALE");
    }
}

#[test]
fn test_line_has_exactly_four_columns() {
    let record = EventRecord::new(EventKind::ChanceComputed, "10:00:00", "2024-05-01 10:00:00")
        .field("customer", "A, B")
        .field("items", "x(1);y(2);");

    let columns = split_csv_record(&record.to_unified_line()).unwrap();
    assert_eq!(columns.len(), 4);
    assert_eq!(columns[2], "OFFER_CHANCE");
    assert!(columns[3].starts_with('{') && columns[3].ends_with('}'));
}

#[test]
fn test_empty_payload() {
    assert_eq!(encode_payload::<&str, &str>(&[]), "{}");
    assert!(decode_payload("{}").unwrap().is_empty());
}

#[test]
fn test_malformed_input_is_an_error() {
    assert!(matches!(
        decode_payload(r#""k":"v""#),
        Err(EncodingError::Malformed { .. })
    ));
    assert!(matches!(
        decode_payload(r#"{"k":"v"#),
        Err(EncodingError::Malformed { .. })
    ));
    assert_eq!(
        split_csv_record(r#"a,"unterminated"#),
        Err(EncodingError::UnterminatedQuote)
    );
    assert!(LogLine::parse("only,three,columns").is_err());
}

#[test]
fn test_quote_for_line_doubles_quotes() {
    assert_eq!(quote_for_line(r#"a"b"#), r#""a""b""#);
    assert_eq!(split_csv_record(&quote_for_line(r#"a"b"#)).unwrap(), vec![r#"a"b"#]);
}
