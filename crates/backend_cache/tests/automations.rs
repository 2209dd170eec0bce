// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for automations caching.

use std::sync::Arc;

use backend_cache::{
    CachingConfiguration, Error,
    model::{AutomationDefinition, AutomationType, AutomationsLoadOptions},
    spi::{AnalyticalBackend, AutomationsServiceExt},
    testing::{BackendCall, MockBackend, automation},
    with_caching,
};
use pretty_assertions::assert_eq;
use serde_json::json;

type TestResult = Result<(), Error>;

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

fn mock() -> MockBackend {
    MockBackend::new().with_automations((1..=5).map(|n| automation(&format!("a{n}"), &format!("Weekly export {n}"))))
}

fn caching(mock: &MockBackend, config: CachingConfiguration) -> Arc<dyn AnalyticalBackend> {
    with_caching(Arc::new(mock.clone()), config)
}

fn listings(mock: &MockBackend) -> usize {
    mock.call_count(|call| matches!(call, BackendCall::GetAutomations { .. }))
}

fn pages(mock: &MockBackend) -> usize {
    mock.call_count(|call| matches!(call, BackendCall::QueryAutomations { .. }))
}

fn definition(title: &str) -> AutomationDefinition {
    AutomationDefinition {
        id: None,
        title: title.to_string(),
        automation_type: AutomationType::Schedule,
        dashboard: Some("dashboard".to_string()),
        recipients: vec!["user".to_string()],
        details: json!({ "cron": "0 0 8 * * MON" }),
    }
}

#[test]
fn listings_are_cached_per_options() -> TestResult {
    block_on(async {
        let mock = mock();
        let automations = caching(&mock, CachingConfiguration::recommended()).workspace("ws").automations();

        let all = automations.get_automations(&AutomationsLoadOptions::default()).await?;
        automations.get_automations(&AutomationsLoadOptions::default()).await?;
        let alerts = automations
            .get_automations(&AutomationsLoadOptions {
                automation_type: Some(AutomationType::Alert),
                ..AutomationsLoadOptions::default()
            })
            .await?;

        assert_eq!(all.len(), 5);
        assert!(alerts.is_empty());
        assert_eq!(listings(&mock), 2);
        Ok(())
    })
}

#[test]
fn query_pages_are_cached_per_settings() -> TestResult {
    block_on(async {
        let mock = mock();
        let automations = caching(&mock, CachingConfiguration::recommended()).workspace("ws").automations();
        let query = automations.get_automations_query().with_size(2);

        let first = query.query().await?;
        query.query().await?;
        query.clone().with_page(1).query().await?;

        assert_eq!(first.items.len(), 2);
        assert_eq!(first.total_count, 5);
        assert_eq!(pages(&mock), 2);
        Ok(())
    })
}

#[test]
fn query_all_collects_every_page() -> TestResult {
    block_on(async {
        let mock = mock();
        let automations = caching(&mock, CachingConfiguration::recommended()).workspace("ws").automations();

        let everything = automations.get_automations_query().with_size(2).query_all().await?;
        let ids: Vec<_> = everything.iter().map(|automation| automation.id.as_str()).collect();

        assert_eq!(ids, ["a1", "a2", "a3", "a4", "a5"]);
        assert_eq!(pages(&mock), 3);
        Ok(())
    })
}

#[test]
fn query_all_stops_at_last_page_number() -> TestResult {
    block_on(async {
        let mock = mock();
        let automations = caching(&mock, CachingConfiguration::recommended()).workspace("ws").automations();

        let everything = automations
            .get_automations_query()
            .with_size(2)
            .with_page(u32::MAX)
            .query_all()
            .await?;

        assert!(everything.is_empty());
        assert_eq!(pages(&mock), 1);
        Ok(())
    })
}

#[test]
fn single_automation_passes_through() -> TestResult {
    block_on(async {
        let mock = mock();
        let automations = caching(&mock, CachingConfiguration::recommended()).workspace("ws").automations();

        automations.get_automation("a1").await?;
        automations.get_automation("a1").await?;

        assert_eq!(mock.call_count(|call| matches!(call, BackendCall::GetAutomation { .. })), 2);
        Ok(())
    })
}

#[test]
fn mutations_invalidate_listings_and_queries() -> TestResult {
    block_on(async {
        let mock = mock();
        let automations = caching(&mock, CachingConfiguration::recommended()).workspace("ws").automations();
        let query = automations.get_automations_query().with_size(10);

        automations.get_automations(&AutomationsLoadOptions::default()).await?;
        query.query().await?;

        let created = automations.create_automation(&definition("Daily export")).await?;
        let listed = automations.get_automations(&AutomationsLoadOptions::default()).await?;
        let page = query.query().await?;

        assert!(listed.iter().any(|automation| automation.id == created.id));
        assert_eq!(page.total_count, 6);
        assert_eq!(listings(&mock), 2);
        assert_eq!(pages(&mock), 2);

        automations.delete_automation(&created.id).await?;
        automations.unsubscribe_automations(&["a1".to_string()]).await?;
        automations.get_automations(&AutomationsLoadOptions::default()).await?;
        assert_eq!(listings(&mock), 3);
        Ok(())
    })
}

#[test]
fn failed_mutation_still_invalidates() -> TestResult {
    block_on(async {
        let mock = mock();
        let automations = caching(&mock, CachingConfiguration::recommended()).workspace("ws").automations();

        automations.get_automations(&AutomationsLoadOptions::default()).await?;

        mock.fail_when(|call| matches!(call, BackendCall::DeleteAutomations { .. }));
        assert!(automations.delete_automations(&["a1".to_string(), "a2".to_string()]).await.is_err());

        mock.clear_failures();
        let listed = automations.get_automations(&AutomationsLoadOptions::default()).await?;

        assert_eq!(listed.len(), 5);
        assert_eq!(listings(&mock), 2);
        Ok(())
    })
}

#[test]
fn update_of_unknown_automation_fails() {
    block_on(async {
        let mock = mock();
        let automations = caching(&mock, CachingConfiguration::recommended()).workspace("ws").automations();

        let unknown = AutomationDefinition {
            id: Some("missing".to_string()),
            ..definition("Missing")
        };
        let updated = automations.update_automation(&unknown).await;

        assert!(matches!(updated, Err(Error::NotFound { .. })));
    });
}

#[test]
fn workspaces_are_invalidated_separately() -> TestResult {
    block_on(async {
        let mock = mock();
        let backend = caching(&mock, CachingConfiguration::recommended().with_max_automations_workspaces(2));
        let first = backend.workspace("ws1").automations();
        let second = backend.workspace("ws2").automations();

        first.get_automations(&AutomationsLoadOptions::default()).await?;
        second.get_automations(&AutomationsLoadOptions::default()).await?;

        first.create_automation(&definition("Daily export")).await?;
        first.get_automations(&AutomationsLoadOptions::default()).await?;
        second.get_automations(&AutomationsLoadOptions::default()).await?;

        assert_eq!(listings(&mock), 3);
        Ok(())
    })
}

#[test]
fn disabled_automations_pass_through() -> TestResult {
    block_on(async {
        let mock = mock();
        let config = CachingConfiguration::recommended().with_max_automations_workspaces(0);
        let automations = caching(&mock, config).workspace("ws").automations();

        automations.get_automations(&AutomationsLoadOptions::default()).await?;
        automations.get_automations(&AutomationsLoadOptions::default()).await?;

        assert_eq!(listings(&mock), 2);
        Ok(())
    })
}
