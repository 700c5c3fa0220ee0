use serde_json::json;
use std::sync::Arc;
use superbox::models::{Pricing, Repository, ServerMetadata, ServerRecord, UpdateServerRequest};
use superbox::repositories::{InMemoryServerRepository, ServerRepository};
use superbox::services::{RegistryError, RegistryService};
use superbox::test_utils::test_helpers::{
    create_request, sample_record, FlakyServerRepository, ManualClock, StubSecurityScanner,
};

struct Registry {
    service: RegistryService,
    store: Arc<FlakyServerRepository>,
    scanner: Arc<StubSecurityScanner>,
    clock: Arc<ManualClock>,
}

fn registry_with(scanner: StubSecurityScanner) -> Registry {
    let store = Arc::new(FlakyServerRepository::new(InMemoryServerRepository::new(
        "registry",
    )));
    let scanner = Arc::new(scanner);
    let clock = Arc::new(ManualClock::at("2026-01-01T00:00:00Z"));
    let service = RegistryService::new(store.clone(), scanner.clone()).with_clock(clock.clone());

    Registry {
        service,
        store,
        scanner,
        clock,
    }
}

fn registry() -> Registry {
    registry_with(StubSecurityScanner::passing(
        Some(json!(["t1"])),
        Some(json!({"findings": []})),
    ))
}

#[tokio::test]
async fn test_create_update_delete_lifecycle() {
    let registry = registry();

    let created = registry
        .service
        .create_server(create_request("svc1", "https://x/y"))
        .await
        .unwrap();
    assert_eq!(created.tools, Some(json!(["t1"])));
    assert_eq!(created.meta.created_at, created.meta.updated_at);
    assert_eq!(
        registry.scanner.calls(),
        vec![("https://x/y".to_string(), "svc1".to_string())]
    );

    registry.clock.advance(60);
    let updated = registry
        .service
        .update_server(
            "svc1",
            UpdateServerRequest {
                version: Some("2.0".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.version, "2.0");
    assert_eq!(updated.tools, Some(json!(["t1"])));
    assert_eq!(updated.meta.created_at.as_deref(), Some("2026-01-01T00:00:00Z"));
    assert_eq!(updated.meta.updated_at.as_deref(), Some("2026-01-01T00:01:00Z"));

    let stored = registry.service.get_server("svc1").await.unwrap();
    assert_eq!(stored, updated);

    registry.service.delete_server("svc1").await.unwrap();
    assert!(matches!(
        registry.service.get_server("svc1").await,
        Err(RegistryError::NotFound(name)) if name == "svc1"
    ));
}

#[tokio::test]
async fn test_second_create_with_same_name_is_rejected() {
    let registry = registry();

    registry
        .service
        .create_server(create_request("weather", "https://github.com/a/weather"))
        .await
        .unwrap();

    let result = registry
        .service
        .create_server(create_request("weather", "https://github.com/b/weather"))
        .await;

    assert!(matches!(result, Err(RegistryError::Conflict(name)) if name == "weather"));
    assert_eq!(registry.scanner.calls().len(), 1);
    assert_eq!(registry.store.put_count(), 1);

    let stored = registry.service.get_server("weather").await.unwrap();
    assert_eq!(stored.repository.url, "https://github.com/a/weather");
}

#[tokio::test]
async fn test_rejected_scan_leaves_store_untouched() {
    let registry = registry_with(StubSecurityScanner::rejecting("secrets found in repo"));

    let result = registry
        .service
        .create_server(create_request("leaky", "https://github.com/a/leaky"))
        .await;

    match result {
        Err(RegistryError::ScanFailed(detail)) => assert!(detail.contains("secrets found")),
        other => panic!("expected ScanFailed, got {:?}", other),
    }
    assert_eq!(registry.store.put_count(), 0);
    assert!(registry.store.inner.is_empty());
}

#[tokio::test]
async fn test_unreachable_scanner_leaves_store_untouched() {
    let registry = registry_with(StubSecurityScanner::unreachable());

    let result = registry
        .service
        .create_server(create_request("offline", "https://github.com/a/offline"))
        .await;

    assert!(matches!(result, Err(RegistryError::ScanFailed(_))));
    assert_eq!(registry.store.put_count(), 0);
}

#[tokio::test]
async fn test_update_only_touches_supplied_fields() {
    let registry = registry();
    registry
        .store
        .put("weather", &sample_record("weather"))
        .await
        .unwrap();

    registry.clock.advance(3600);
    let updated = registry
        .service
        .update_server(
            "weather",
            UpdateServerRequest {
                description: Some("Forecasts".to_string()),
                metadata: Some(ServerMetadata {
                    homepage: Some("https://weather.example/docs".to_string()),
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let mut expected = sample_record("weather");
    expected.description = "Forecasts".to_string();
    expected.homepage = Some("https://weather.example/docs".to_string());
    expected.meta.updated_at = Some("2026-01-01T01:00:00Z".to_string());

    assert_eq!(updated, expected);
    // No rescan on update
    assert!(registry.scanner.calls().is_empty());
}

type SingleFieldCase = (
    &'static str,
    fn() -> UpdateServerRequest,
    fn(&mut ServerRecord),
);

fn single_field_cases() -> [SingleFieldCase; 11] {
    [
        (
            "version",
            || UpdateServerRequest {
                version: Some("2.0.0".to_string()),
                ..Default::default()
            },
            |r| r.version = "2.0.0".to_string(),
        ),
        (
            "description",
            || UpdateServerRequest {
                description: Some("Forecasts".to_string()),
                ..Default::default()
            },
            |r| r.description = "Forecasts".to_string(),
        ),
        (
            "author",
            || UpdateServerRequest {
                author: Some("bob".to_string()),
                ..Default::default()
            },
            |r| r.author = "bob".to_string(),
        ),
        (
            "lang",
            || UpdateServerRequest {
                lang: Some("rust".to_string()),
                ..Default::default()
            },
            |r| r.lang = "rust".to_string(),
        ),
        (
            "license",
            || UpdateServerRequest {
                license: Some("Apache-2.0".to_string()),
                ..Default::default()
            },
            |r| r.license = "Apache-2.0".to_string(),
        ),
        (
            "entrypoint",
            || UpdateServerRequest {
                entrypoint: Some("server.py".to_string()),
                ..Default::default()
            },
            |r| r.entrypoint = "server.py".to_string(),
        ),
        (
            "repository",
            || UpdateServerRequest {
                repository: Some(Repository {
                    kind: "git".to_string(),
                    url: "https://gitlab.com/bob/svc".to_string(),
                }),
                ..Default::default()
            },
            |r| r.repository.url = "https://gitlab.com/bob/svc".to_string(),
        ),
        (
            "pricing",
            || UpdateServerRequest {
                pricing: Some(Pricing {
                    currency: "EUR".to_string(),
                    amount: 9.5,
                }),
                ..Default::default()
            },
            |r| {
                r.pricing = Some(Pricing {
                    currency: "EUR".to_string(),
                    amount: 9.5,
                })
            },
        ),
        (
            "tools",
            || UpdateServerRequest {
                tools: Some(json!({"names": ["a", "b"], "count": 2})),
                ..Default::default()
            },
            |r| r.tools = Some(json!({"names": ["a", "b"], "count": 2})),
        ),
        (
            "security_report",
            || UpdateServerRequest {
                security_report: Some(json!({"summary": {"critical": 3}})),
                ..Default::default()
            },
            |r| r.security_report = Some(json!({"summary": {"critical": 3}})),
        ),
        (
            "homepage",
            || UpdateServerRequest {
                metadata: Some(ServerMetadata {
                    homepage: Some("https://svc.example/docs".to_string()),
                }),
                ..Default::default()
            },
            |r| r.homepage = Some("https://svc.example/docs".to_string()),
        ),
    ]
}

#[tokio::test]
async fn test_single_field_update_leaves_every_other_field_alone() {
    for (field, overlay, change) in single_field_cases() {
        let registry = registry();
        registry.store.put("svc", &sample_record("svc")).await.unwrap();
        registry.clock.advance(60);

        let updated = registry
            .service
            .update_server("svc", overlay())
            .await
            .unwrap();

        let mut untouched = sample_record("svc");
        untouched.meta.updated_at = Some("2026-01-01T00:01:00Z".to_string());
        let mut expected = untouched.clone();
        change(&mut expected);
        assert_ne!(expected, untouched, "case '{}' changes nothing", field);

        assert_eq!(updated, expected, "update of '{}'", field);
        assert_eq!(
            registry.service.get_server("svc").await.unwrap(),
            expected,
            "stored record after update of '{}'",
            field
        );
    }
}

#[tokio::test]
async fn test_created_at_survives_repeated_updates() {
    let registry = registry();
    let created = registry
        .service
        .create_server(create_request("svc", "https://x/svc"))
        .await
        .unwrap();

    for i in 0..5 {
        registry.clock.advance(10);
        let updated = registry
            .service
            .update_server(
                "svc",
                UpdateServerRequest {
                    version: Some(format!("1.0.{}", i)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.meta.created_at, created.meta.created_at);
    }

    let stored = registry.service.get_server("svc").await.unwrap();
    assert_eq!(stored.meta.created_at.as_deref(), Some("2026-01-01T00:00:00Z"));
    assert_eq!(stored.meta.updated_at.as_deref(), Some("2026-01-01T00:00:50Z"));
}

#[tokio::test]
async fn test_rename_moves_the_record() {
    let registry = registry();
    registry.store.put("old", &sample_record("old")).await.unwrap();

    let renamed = registry
        .service
        .update_server(
            "old",
            UpdateServerRequest {
                name: Some("new".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(renamed.name, "new");
    assert!(matches!(
        registry.service.get_server("old").await,
        Err(RegistryError::NotFound(_))
    ));

    let stored = registry.service.get_server("new").await.unwrap();
    assert_eq!(stored.name, "new");
    assert_eq!(stored.author, "alice");
    assert_eq!(stored.meta.created_at.as_deref(), Some("2026-01-01T00:00:00Z"));
}

#[tokio::test]
async fn test_rename_onto_existing_name_changes_nothing() {
    let registry = registry();
    registry.store.put("a", &sample_record("a")).await.unwrap();
    registry.store.put("b", &sample_record("b")).await.unwrap();

    let result = registry
        .service
        .update_server(
            "a",
            UpdateServerRequest {
                name: Some("b".to_string()),
                version: Some("9.9.9".to_string()),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(result, Err(RegistryError::Conflict(name)) if name == "b"));
    assert_eq!(registry.service.get_server("a").await.unwrap(), sample_record("a"));
    assert_eq!(registry.service.get_server("b").await.unwrap(), sample_record("b"));
}

#[tokio::test]
async fn test_rename_to_same_name_is_plain_update() {
    let registry = registry();
    registry.store.put("same", &sample_record("same")).await.unwrap();

    let updated = registry
        .service
        .update_server(
            "same",
            UpdateServerRequest {
                name: Some("same".to_string()),
                license: Some("Apache-2.0".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "same");
    assert_eq!(updated.license, "Apache-2.0");
    assert_eq!(registry.store.inner.len(), 1);
}

#[tokio::test]
async fn test_rename_with_failing_write_loses_the_record() {
    let registry = registry();
    registry.store.put("old", &sample_record("old")).await.unwrap();
    registry.store.fail_puts(true);

    let result = registry
        .service
        .update_server(
            "old",
            UpdateServerRequest {
                name: Some("new".to_string()),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(result, Err(RegistryError::StoreFailed { .. })));
    // Old key is already gone when the write fails
    assert!(registry.store.inner.is_empty());
}

#[tokio::test]
async fn test_rename_with_failing_cleanup_keeps_both_records() {
    let registry = registry();
    registry.store.put("old", &sample_record("old")).await.unwrap();
    registry.store.fail_deletes(true);

    let renamed = registry
        .service
        .update_server(
            "old",
            UpdateServerRequest {
                name: Some("new".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(renamed.name, "new");
    assert_eq!(registry.store.inner.len(), 2);
}

#[tokio::test]
async fn test_update_missing_server_is_not_found() {
    let registry = registry();

    let result = registry
        .service
        .update_server("ghost", UpdateServerRequest::default())
        .await;

    assert!(matches!(result, Err(RegistryError::NotFound(name)) if name == "ghost"));
    assert_eq!(registry.store.put_count(), 0);
}

#[tokio::test]
async fn test_delete_missing_server_is_not_found() {
    let registry = registry();

    let result = registry.service.delete_server("ghost").await;
    assert!(matches!(result, Err(RegistryError::NotFound(_))));
}

#[tokio::test]
async fn test_failed_delete_is_reported() {
    let registry = registry();
    registry.store.put("sticky", &sample_record("sticky")).await.unwrap();
    registry.store.fail_deletes(true);

    let result = registry.service.delete_server("sticky").await;

    assert!(matches!(result, Err(RegistryError::DeleteFailed { name, .. }) if name == "sticky"));
    assert!(registry.service.get_server("sticky").await.is_ok());
}

#[tokio::test]
async fn test_list_filters_and_sorts() {
    let registry = registry();
    for (name, author) in [("zeta", "alice"), ("alpha", "bob"), ("mid", "alice")] {
        let mut record = sample_record(name);
        record.author = author.to_string();
        registry.store.put(name, &record).await.unwrap();
    }

    let all = registry.service.list_servers(None).await.unwrap();
    let names: Vec<_> = all.servers.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    assert_eq!(all.total, 3);

    let by_alice = registry.service.list_servers(Some("alice")).await.unwrap();
    let names: Vec<_> = by_alice.servers.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["mid", "zeta"]);
    assert_eq!(by_alice.total, 2);

    let unfiltered = registry.service.list_servers(Some("")).await.unwrap();
    assert_eq!(unfiltered.total, 3);

    let nobody = registry.service.list_servers(Some("Alice")).await.unwrap();
    assert_eq!(nobody.total, 0);
}

#[tokio::test]
async fn test_unconfigured_bucket_surfaces_as_store_failure() {
    let service = RegistryService::new(
        Arc::new(InMemoryServerRepository::new("")),
        Arc::new(StubSecurityScanner::passing(None, None)),
    );

    assert!(matches!(
        service.list_servers(None).await,
        Err(RegistryError::StoreFailed { .. })
    ));
    assert!(matches!(
        service.get_server("any").await,
        Err(RegistryError::StoreFailed { .. })
    ));
}
