use bridge_normalize::{EnvelopeParser, ParseError};
use domain::{ReadingKind, TopicRoute, default_routes};

fn parser() -> EnvelopeParser {
    EnvelopeParser::new(default_routes(), vec!["location".to_string()])
}

#[test]
fn parse_temperature_reading() {
    let reading = parser()
        .parse(
            "data/temperature",
            br#"{"temperature": 23.5, "timestamp": "2024-06-01T10:00:00Z", "location": "A"}"#,
        )
        .expect("reading");
    assert_eq!(reading.kind, ReadingKind::Temperature);
    assert_eq!(reading.value, 23.5);
    assert_eq!(
        reading.declared_timestamp.as_deref(),
        Some("2024-06-01T10:00:00Z")
    );
    assert_eq!(reading.tags.get("location").map(String::as_str), Some("A"));
}

#[test]
fn parse_preserves_numeric_value_exactly() {
    for (payload, expected) in [
        (r#"{"humidity": 55}"#, 55.0),
        (r#"{"humidity": 0.1}"#, 0.1),
        (r#"{"humidity": -12.345678901234}"#, -12.345678901234),
        (r#"{"humidity": 1e3}"#, 1000.0),
    ] {
        let reading = parser()
            .parse("data/humidity", payload.as_bytes())
            .expect("reading");
        assert_eq!(reading.value, expected, "payload {payload}");
    }
}

#[test]
fn parse_accepts_numeric_strings() {
    let reading = parser()
        .parse("data/humidity", br#"{"humidity": "61.5"}"#)
        .expect("reading");
    assert_eq!(reading.value, 61.5);
}

#[test]
fn parse_rejects_non_json_as_malformed() {
    let err = parser()
        .parse("data/temperature", b"not json at all")
        .expect_err("malformed");
    assert!(matches!(err, ParseError::Malformed(_)));

    let err = parser()
        .parse("data/temperature", &[0xff, 0xfe, 0x00])
        .expect_err("malformed");
    assert!(matches!(err, ParseError::Malformed(_)));
}

#[test]
fn parse_rejects_non_object_documents() {
    let err = parser()
        .parse("data/temperature", b"[23.5]")
        .expect_err("malformed");
    assert_eq!(
        err,
        ParseError::Malformed("expected JSON object, got array".to_string())
    );
}

#[test]
fn parse_rejects_unknown_topic_before_decoding() {
    let err = parser()
        .parse("data/pressure", b"not json")
        .expect_err("unknown topic");
    assert_eq!(err, ParseError::UnknownTopic("data/pressure".to_string()));
}

#[test]
fn parse_missing_required_key() {
    let err = parser()
        .parse("data/temperature", br#"{"humidity": 50, "location": "A"}"#)
        .expect_err("missing");
    assert_eq!(err, ParseError::MissingValue("temperature".to_string()));

    let err = parser()
        .parse("data/temperature", br#"{"temperature": null}"#)
        .expect_err("missing");
    assert_eq!(err, ParseError::MissingValue("temperature".to_string()));
}

#[test]
fn parse_invalid_value() {
    for payload in [
        r#"{"temperature": "warm"}"#,
        r#"{"temperature": true}"#,
        r#"{"temperature": [1, 2]}"#,
        r#"{"temperature": {"c": 1}}"#,
        r#"{"temperature": "NaN"}"#,
    ] {
        let err = parser()
            .parse("data/temperature", payload.as_bytes())
            .expect_err("invalid");
        assert!(
            matches!(err, ParseError::InvalidValue { ref key, .. } if key == "temperature"),
            "payload {payload}"
        );
    }
}

#[test]
fn parse_ignores_unknown_keys_and_null_tags() {
    let reading = parser()
        .parse(
            "data/temperature",
            br#"{"temperature": 20, "pressure": 1011.2, "wind_speed": 3, "location": null}"#,
        )
        .expect("reading");
    assert!(reading.tags.is_empty());
    assert!(reading.declared_timestamp.is_none());
}

#[test]
fn parse_copies_numeric_timestamp_as_text() {
    let reading = parser()
        .parse(
            "data/temperature",
            br#"{"temperature": 20, "timestamp": 1717236000}"#,
        )
        .expect("reading");
    assert_eq!(reading.declared_timestamp.as_deref(), Some("1717236000"));
}

#[test]
fn parse_uses_configured_tag_keys() {
    let parser = EnvelopeParser::new(
        default_routes(),
        vec!["location".to_string(), "sensor".to_string()],
    );
    let reading = parser
        .parse(
            "data/humidity",
            br#"{"humidity": 40, "location": "Weather Station 1", "sensor": 7, "owner": "x"}"#,
        )
        .expect("reading");
    assert_eq!(reading.tags.len(), 2);
    assert_eq!(reading.tags["location"], "Weather Station 1");
    assert_eq!(reading.tags["sensor"], "7");
}

#[test]
fn parse_resolves_wildcard_routes() {
    let parser = EnvelopeParser::new(
        vec![
            TopicRoute::new("sensors/lobby/temperature", ReadingKind::Humidity),
            TopicRoute::new("sensors/+/temperature", ReadingKind::Temperature),
            TopicRoute::new("station/#", ReadingKind::Pressure),
        ],
        Vec::new(),
    );
    assert_eq!(
        parser.kind_for("sensors/room1/temperature"),
        Some(ReadingKind::Temperature)
    );
    // 精确路由优先于通配路由
    assert_eq!(
        parser.kind_for("sensors/lobby/temperature"),
        Some(ReadingKind::Humidity)
    );
    assert_eq!(parser.kind_for("station/7/barometer"), Some(ReadingKind::Pressure));

    let reading = parser
        .parse("sensors/room1/temperature", br#"{"temperature": 20.0}"#)
        .expect("reading");
    assert_eq!(reading.kind, ReadingKind::Temperature);
    assert_eq!(reading.value, 20.0);
    assert_eq!(
        parser.parse("sensors/room1/humidity", br#"{"humidity": 50}"#),
        Err(ParseError::UnknownTopic("sensors/room1/humidity".to_string()))
    );
}
