// tests/config.rs

use switchyard::channel::Channel;
use switchyard::config::{ChannelConfig, StoreConfig};
use switchyard::error::ChannelError;
use switchyard::store::StoreState;

#[test]
fn channel_config_from_json() {
  let json = r#"{ "name": "decoded-rows", "store": { "kind": "buffered", "capacity": 2 } }"#;
  let config: ChannelConfig = serde_json::from_str(json).unwrap();
  assert_eq!(config.name.as_deref(), Some("decoded-rows"));
  assert_eq!(config.store, StoreConfig::Buffered { capacity: 2 });

  let channel = Channel::<u32>::with_config(&config).unwrap();
  assert_eq!(channel.name(), Some("decoded-rows"));
  channel.write(1).unwrap();
  assert_eq!(channel.store_state(), StoreState::Partial);
}

#[test]
fn missing_fields_fall_back_to_defaults() {
  let config: ChannelConfig = serde_json::from_str("{}").unwrap();
  assert_eq!(config, ChannelConfig::default());
  assert_eq!(config.store, StoreConfig::Zero);
}

#[test]
fn every_store_kind_parses() {
  let cases = [
    (r#"{ "kind": "zero" }"#, StoreConfig::Zero),
    (r#"{ "kind": "unbounded" }"#, StoreConfig::Unbounded),
    (
      r#"{ "kind": "overwrite_oldest", "capacity": 4 }"#,
      StoreConfig::OverwriteOldest { capacity: 4 },
    ),
  ];
  for (json, expected) in cases {
    let parsed: StoreConfig = serde_json::from_str(json).unwrap();
    assert_eq!(parsed, expected);
  }
}

#[test]
fn unknown_kind_is_rejected() {
  assert!(serde_json::from_str::<StoreConfig>(r#"{ "kind": "ring" }"#).is_err());
}

#[test]
fn zero_capacity_config_fails_to_build() {
  let config = ChannelConfig::named("bad").with_store(StoreConfig::Buffered { capacity: 0 });
  let err = Channel::<u8>::with_config(&config).unwrap_err();
  assert!(matches!(err, ChannelError::InvalidConfig(_)));
}

#[test]
fn config_serializes_with_kind_tag() {
  let config = ChannelConfig::named("edge").with_store(StoreConfig::Unbounded);
  let value = serde_json::to_value(&config).unwrap();
  assert_eq!(value["store"]["kind"], "unbounded");
  assert_eq!(value["name"], "edge");
}
