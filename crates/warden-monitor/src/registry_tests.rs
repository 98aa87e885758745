use super::*;

fn http(name: &str) -> EndpointConfig {
    EndpointConfig::new(name, format!("http://{}.internal/health", name))
}

#[test]
fn test_registry_orders_by_name() {
    let registry =
        EndpointRegistry::from_config(&[http("web"), http("api"), http("db-proxy")], None).unwrap();
    let names: Vec<&str> = registry.names().collect();
    assert_eq!(names, vec!["api", "db-proxy", "web"]);
    assert_eq!(registry.len(), 3);
}

#[test]
fn test_registry_lookup() {
    let registry = EndpointRegistry::from_config(&[http("api")], None).unwrap();
    let endpoint = registry.get("api").unwrap();
    assert_eq!(endpoint.target, "http://api.internal/health");
    assert_eq!(endpoint.interval, Duration::from_secs(30));
    assert_eq!(endpoint.timeout, Duration::from_secs(10));
    assert!(registry.get("missing").is_none());
}

#[test]
fn test_registry_rejects_duplicates() {
    let err = EndpointRegistry::from_config(&[http("api"), http("api")], None).unwrap_err();
    assert!(matches!(err, MonitorError::Config(msg) if msg.contains("duplicate")));
}

#[test]
fn test_registry_rejects_empty_name_and_target() {
    assert!(EndpointRegistry::from_config(&[EndpointConfig::new("  ", "http://a/")], None).is_err());
    assert!(EndpointRegistry::from_config(&[EndpointConfig::new("api", "")], None).is_err());
}

#[test]
fn test_registry_rejects_non_positive_durations() {
    let mut zero_interval = http("api");
    zero_interval.interval_secs = 0;
    assert!(EndpointRegistry::from_config(&[zero_interval], None).is_err());

    let mut zero_timeout = http("api");
    zero_timeout.timeout_secs = 0;
    assert!(EndpointRegistry::from_config(&[zero_timeout], None).is_err());
}

#[test]
fn test_registry_validates_targets_by_kind() {
    assert!(EndpointRegistry::from_config(&[EndpointConfig::new("a", "not a url")], None).is_err());
    assert!(EndpointRegistry::from_config(&[EndpointConfig::new("a", "ftp://host/file")], None).is_err());

    let tcp_ok = EndpointConfig::new("db", "db.internal:5432").with_kind(EndpointKind::Tcp);
    assert!(EndpointRegistry::from_config(&[tcp_ok], None).is_ok());

    let tcp_bad = EndpointConfig::new("db", "db.internal").with_kind(EndpointKind::Tcp);
    assert!(EndpointRegistry::from_config(&[tcp_bad], None).is_err());

    let tcp_port = EndpointConfig::new("db", "db.internal:99999").with_kind(EndpointKind::Tcp);
    assert!(EndpointRegistry::from_config(&[tcp_port], None).is_err());
}

#[test]
fn test_registry_degraded_threshold_fallback() {
    let mut own = http("own");
    own.degraded_threshold_ms = Some(250);
    let registry = EndpointRegistry::from_config(&[own, http("global")], Some(1000)).unwrap();

    assert_eq!(
        registry.get("own").unwrap().degraded_after,
        Some(Duration::from_millis(250))
    );
    assert_eq!(
        registry.get("global").unwrap().degraded_after,
        Some(Duration::from_secs(1))
    );
}

#[test]
fn test_registry_keeps_labels() {
    let config = http("api").with_label("service", "api").with_label("category", "public");
    let registry = EndpointRegistry::from_config(&[config], None).unwrap();
    let labels = &registry.get("api").unwrap().labels;
    assert_eq!(labels["service"], "api");
    assert_eq!(labels["category"], "public");
}

#[test]
fn test_empty_registry() {
    let registry = EndpointRegistry::from_config(&[], None).unwrap();
    assert!(registry.is_empty());
}
