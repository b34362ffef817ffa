use bridge_config::{ConfigError, PublisherConfig};
use domain::ReadingKind;
use std::collections::HashMap;

fn load(pairs: &[(&str, &str)]) -> Result<PublisherConfig, ConfigError> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    PublisherConfig::from_lookup(|key| map.get(key).cloned())
}

#[test]
fn publisher_defaults() {
    let config = load(&[]).expect("config");
    assert_eq!(config.mqtt_broker.to_string(), "127.0.0.1:1883");
    assert_eq!(config.interval_ms, 1000);
    assert_eq!(config.location, "Weather Station 1");
    assert_eq!(config.topics.len(), 2);
    assert!(config.mqtt_client_id.starts_with("telemetry-publisher-"));
}

#[test]
fn publisher_falls_back_to_bridge_broker() {
    let config = load(&[("BRIDGE_MQTT_BROKER", "broker.local")]).expect("config");
    assert_eq!(config.mqtt_broker.to_string(), "broker.local:1883");

    let config = load(&[
        ("BRIDGE_MQTT_BROKER", "broker.local"),
        ("PUBLISHER_MQTT_BROKER", "other:1999"),
    ])
    .expect("config");
    assert_eq!(config.mqtt_broker.to_string(), "other:1999");
}

#[test]
fn publisher_topics_and_interval() {
    let config = load(&[
        ("PUBLISHER_TOPICS", "data/pressure, station/7/wind=wind_speed"),
        ("PUBLISHER_INTERVAL_MS", "250"),
        ("PUBLISHER_LOCATION", "Roof"),
    ])
    .expect("config");
    assert_eq!(config.interval_ms, 250);
    assert_eq!(config.location, "Roof");
    assert_eq!(config.topics[0].kind, ReadingKind::Pressure);
    assert_eq!(config.topics[1].topic, "station/7/wind");
    assert_eq!(config.topics[1].kind, ReadingKind::WindSpeed);
}

#[test]
fn publisher_rejects_zero_interval() {
    let err = load(&[("PUBLISHER_INTERVAL_MS", "0")]).expect_err("invalid");
    assert!(matches!(err, ConfigError::Invalid(key, _) if key == "PUBLISHER_INTERVAL_MS"));
}
