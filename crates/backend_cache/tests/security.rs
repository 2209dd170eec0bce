// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for URL validation caching.

use std::{sync::Arc, time::Duration};

use backend_cache::{
    CachingConfiguration, Error,
    model::UrlValidationContext,
    spi::AnalyticalBackend,
    testing::{BackendCall, MockBackend},
    with_caching,
};

type TestResult = Result<(), Error>;

const URL: &str = "https://example.com/embed";

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

fn caching(mock: &MockBackend, config: CachingConfiguration) -> Arc<dyn AnalyticalBackend> {
    with_caching(Arc::new(mock.clone()), config)
}

fn validations(mock: &MockBackend) -> usize {
    mock.call_count(|call| matches!(call, BackendCall::IsUrlValid { .. }))
}

#[test]
fn validations_are_cached_per_context() -> TestResult {
    block_on(async {
        let mock = MockBackend::new().with_allowed_urls([URL]);
        let security = caching(&mock, CachingConfiguration::recommended())
            .organization("org")
            .security_settings();

        assert!(security.is_url_valid(URL, UrlValidationContext::Cors).await?);
        assert!(security.is_url_valid(URL, UrlValidationContext::Cors).await?);
        assert_eq!(validations(&mock), 1);

        assert!(security.is_url_valid(URL, UrlValidationContext::UiLink).await?);
        assert!(!security.is_url_valid("https://other.com", UrlValidationContext::Cors).await?);
        assert_eq!(validations(&mock), 3);
        Ok(())
    })
}

#[test]
fn organizations_are_cached_separately() -> TestResult {
    block_on(async {
        let mock = MockBackend::new().with_allowed_urls([URL]);
        let backend = caching(&mock, CachingConfiguration::recommended());

        backend.organization("a").security_settings().is_url_valid(URL, UrlValidationContext::Cors).await?;
        backend.organization("b").security_settings().is_url_valid(URL, UrlValidationContext::Cors).await?;
        backend.organization("a").security_settings().is_url_valid(URL, UrlValidationContext::Cors).await?;

        assert_eq!(validations(&mock), 2);
        Ok(())
    })
}

#[test]
fn plugin_urls_are_cached_per_workspace() -> TestResult {
    block_on(async {
        let mock = MockBackend::new().with_allowed_urls([URL]);
        let security = caching(&mock, CachingConfiguration::recommended())
            .organization("org")
            .security_settings();

        assert!(security.is_dashboard_plugin_url_valid(URL, "ws1").await?);
        assert!(security.is_dashboard_plugin_url_valid(URL, "ws1").await?);
        assert!(security.is_dashboard_plugin_url_valid(URL, "ws2").await?);

        assert_eq!(mock.call_count(|call| matches!(call, BackendCall::IsPluginUrlValid { .. })), 2);
        assert_eq!(validations(&mock), 0);
        Ok(())
    })
}

#[test]
fn failed_validation_is_not_cached() -> TestResult {
    block_on(async {
        let mock = MockBackend::new().with_allowed_urls([URL]);
        let security = caching(&mock, CachingConfiguration::recommended())
            .organization("org")
            .security_settings();

        mock.fail_when(|call| matches!(call, BackendCall::IsUrlValid { .. }));
        assert!(security.is_url_valid(URL, UrlValidationContext::Cors).await.is_err());

        mock.clear_failures();
        assert!(security.is_url_valid(URL, UrlValidationContext::Cors).await?);
        assert_eq!(validations(&mock), 2);
        Ok(())
    })
}

#[tokio::test(start_paused = true)]
async fn validations_expire_after_max_age() -> TestResult {
    let mock = MockBackend::new().with_allowed_urls([URL]);
    let config = CachingConfiguration::recommended().with_max_security_settings_org_urls_age(Duration::from_secs(60));
    let security = caching(&mock, config).organization("org").security_settings();

    security.is_url_valid(URL, UrlValidationContext::Cors).await?;
    tokio::time::advance(Duration::from_secs(30)).await;
    security.is_url_valid(URL, UrlValidationContext::Cors).await?;
    assert_eq!(validations(&mock), 1);

    tokio::time::advance(Duration::from_secs(31)).await;
    security.is_url_valid(URL, UrlValidationContext::Cors).await?;
    assert_eq!(validations(&mock), 2);
    Ok(())
}

#[test]
fn disabled_security_settings_pass_through() -> TestResult {
    block_on(async {
        let mock = MockBackend::new().with_allowed_urls([URL]);
        let config = CachingConfiguration::recommended().with_max_security_settings_orgs(0);
        let security = caching(&mock, config).organization("org").security_settings();

        security.is_url_valid(URL, UrlValidationContext::Cors).await?;
        security.is_url_valid(URL, UrlValidationContext::Cors).await?;

        assert_eq!(validations(&mock), 2);
        Ok(())
    })
}
