use super::*;

fn server(id: &str, kind: ProviderKind, enabled: bool) -> ServerConfig {
    ServerConfig {
        id: id.to_string(),
        kind,
        name: String::new(),
        api_url: "http://localhost:3000".to_string(),
        api_key: "k".to_string(),
        user_id: None,
        enabled,
    }
}

#[test]
fn test_from_config_skips_disabled_servers() {
    let config = ProvidersConfig {
        servers: vec![
            server("a", ProviderKind::Session, true),
            server("b", ProviderKind::Instance, false),
            server("c", ProviderKind::Instance, true),
        ],
    };
    let registry = ProviderRegistry::from_config(&config);
    assert_eq!(registry.len(), 2);
    assert!(registry.get("b").is_none());
    assert_eq!(
        registry.provider("a").unwrap().kind(),
        ProviderKind::Session
    );
    assert_eq!(
        registry.provider("c").unwrap().kind(),
        ProviderKind::Instance
    );
}

#[test]
fn test_iter_preserves_order() {
    let mut registry = ProviderRegistry::new();
    for id in ["z", "a", "m"] {
        let s = server(id, ProviderKind::Session, true);
        let p = create_provider(&s);
        registry.insert(s, p);
    }
    let ids: Vec<&str> = registry.iter().map(|s| s.config.id.as_str()).collect();
    assert_eq!(ids, vec!["z", "a", "m"]);
}

#[test]
fn test_insert_replaces_without_duplicating_order() {
    let mut registry = ProviderRegistry::new();
    let s = server("a", ProviderKind::Session, true);
    registry.insert(s.clone(), create_provider(&s));
    let replacement = server("a", ProviderKind::Instance, true);
    registry.insert(replacement.clone(), create_provider(&replacement));
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.iter().count(), 1);
    assert_eq!(
        registry.provider("a").unwrap().kind(),
        ProviderKind::Instance
    );
}

#[test]
fn test_empty_registry() {
    let registry = ProviderRegistry::new();
    assert!(registry.is_empty());
    assert!(registry.provider("missing").is_none());
}
