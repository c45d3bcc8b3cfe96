use asyncurl::config::{
    Config, ConfigError, EngineConfig, IO_WAIT_ENV, QUEUE_CAPACITY_ENV, TICK_ENV,
};
use asyncurl::engine::queue::QueueOrder;
use std::collections::HashMap;
use std::time::Duration;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn test_config_defaults() {
    let cfg = Config::default();

    assert_eq!(cfg.engine.queue_capacity, 64);
    assert_eq!(cfg.engine.queue_order, QueueOrder::Fifo);
    assert_eq!(cfg.engine.io_wait(), Duration::from_millis(50));
    assert_eq!(cfg.engine.tick(), Duration::from_millis(10));
    assert_eq!(cfg.transfer.low_speed_limit, 10);
    assert_eq!(cfg.transfer.low_speed_time_secs, 3);
    assert!(!cfg.transfer.verbose);
}

#[test]
fn test_config_from_yaml() {
    let yaml = r#"
engine:
  queue_capacity: 16
  queue_order: lifo
  tick_ms: 25
transfer:
  low_speed_limit: 100
  user_agent: "asyncurl/test"
"#;
    let cfg = Config::from_yaml_str(yaml).unwrap();

    assert_eq!(cfg.engine.queue_capacity, 16);
    assert_eq!(cfg.engine.queue_order, QueueOrder::Lifo);
    assert_eq!(cfg.engine.tick_ms, 25);
    // unspecified fields keep their defaults
    assert_eq!(cfg.engine.io_wait_ms, 50);
    assert_eq!(cfg.transfer.low_speed_limit, 100);
    assert_eq!(cfg.transfer.low_speed_time_secs, 3);
    assert_eq!(cfg.transfer.user_agent.as_deref(), Some("asyncurl/test"));
}

#[test]
fn test_config_empty_yaml_is_default() {
    let cfg = Config::from_yaml_str("{}").unwrap();
    assert_eq!(cfg, Config::default());
}

#[test]
fn test_config_rejects_zero_capacity() {
    let result = Config::from_yaml_str("engine:\n  queue_capacity: 0\n");
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_config_rejects_malformed_yaml() {
    let result = Config::from_yaml_str("engine: [not, a, map]");
    assert!(matches!(result, Err(ConfigError::Yaml(_))));
}

#[test]
fn test_config_env_overrides() {
    let mut cfg = Config::default();
    cfg.apply_overrides(lookup(&[
        (QUEUE_CAPACITY_ENV, "128"),
        (IO_WAIT_ENV, "20"),
        (TICK_ENV, " 5 "),
    ]))
    .unwrap();

    assert_eq!(cfg.engine.queue_capacity, 128);
    assert_eq!(cfg.engine.io_wait_ms, 20);
    assert_eq!(cfg.engine.tick_ms, 5);
}

#[test]
fn test_config_invalid_env_override() {
    let mut cfg = Config::default();
    let result = cfg.apply_overrides(lookup(&[(TICK_ENV, "soon")]));

    match result {
        Err(ConfigError::InvalidEnv { key, value }) => {
            assert_eq!(key, TICK_ENV);
            assert_eq!(value, "soon");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_config_missing_file() {
    let result = Config::from_file("/nonexistent/asyncurl.yaml");
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}

#[test]
fn test_engine_config_validation() {
    assert!(EngineConfig::default().validate().is_ok());

    let no_wait = EngineConfig {
        io_wait_ms: 0,
        ..EngineConfig::default()
    };
    assert!(no_wait.validate().is_err());

    let no_tick = EngineConfig {
        tick_ms: 0,
        ..EngineConfig::default()
    };
    assert!(no_tick.validate().is_err());
}

#[test]
fn test_config_clone() {
    let cfg1 = Config::default();
    let cfg2 = cfg1.clone();
    assert_eq!(cfg1, cfg2);
}
