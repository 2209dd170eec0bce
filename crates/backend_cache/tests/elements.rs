// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for attribute elements caching.

use std::sync::Arc;

use backend_cache::{
    CachingConfiguration, Error,
    model::{ElementsQueryOptions, ObjRef, ObjectType},
    spi::{AbortSignal, AttributesService, AttributesServiceExt},
    testing::{BackendCall, MockBackend, element},
    with_caching,
};
use pretty_assertions::assert_eq;

type TestResult = Result<(), Error>;

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

fn mock() -> MockBackend {
    MockBackend::new().with_elements(["Austin", "Boston", "Chicago", "Denver"].map(element))
}

fn attributes(mock: &MockBackend, config: CachingConfiguration) -> Arc<dyn AttributesService> {
    with_caching(Arc::new(mock.clone()), config).workspace("ws").attributes()
}

fn label() -> ObjRef {
    ObjRef::identifier("city.name", ObjectType::DisplayForm)
}

fn queries(mock: &MockBackend) -> usize {
    mock.call_count(|call| matches!(call, BackendCall::QueryElements { .. }))
}

fn search(text: &str) -> ElementsQueryOptions {
    ElementsQueryOptions {
        filter: Some(text.to_string()),
        ..ElementsQueryOptions::default()
    }
}

#[test]
fn pages_are_cached_per_settings() -> TestResult {
    block_on(async {
        let mock = mock();
        let query = attributes(&mock, CachingConfiguration::recommended())
            .elements()
            .for_display_form(label())
            .with_limit(2);

        let first = query.query().await?;
        query.query().await?;
        let second = query.clone().with_offset(2).query().await?;

        assert_eq!(first.items, ["Austin", "Boston"].map(element));
        assert_eq!(second.items, ["Chicago", "Denver"].map(element));
        assert_eq!(first.total_count, 4);
        assert_eq!(queries(&mock), 2);
        Ok(())
    })
}

#[test]
fn concurrent_queries_share_backend_call() -> TestResult {
    block_on(async {
        let mock = mock();
        let query = attributes(&mock, CachingConfiguration::recommended())
            .elements()
            .for_display_form(label());

        let (first, second) = futures::join!(query.query(), query.query());

        assert_eq!(first?, second?);
        assert_eq!(queries(&mock), 1);
        Ok(())
    })
}

#[test]
fn text_search_is_never_cached() -> TestResult {
    block_on(async {
        let mock = mock();
        let query = attributes(&mock, CachingConfiguration::recommended())
            .elements()
            .for_display_form(label())
            .with_options(search("bo"));

        let found = query.query().await?;
        query.query().await?;

        assert_eq!(found.items, [element("Boston")]);
        assert_eq!(queries(&mock), 2);
        Ok(())
    })
}

#[test]
fn live_signal_reuses_cached_page() -> TestResult {
    block_on(async {
        let mock = mock();
        let query = attributes(&mock, CachingConfiguration::recommended())
            .elements()
            .for_display_form(label());

        let signal = AbortSignal::new();
        query.clone().with_signal(signal.clone()).query().await?;
        query.clone().with_signal(signal.clone()).query().await?;
        query.query().await?;
        assert_eq!(queries(&mock), 1);

        signal.cancel();
        query.clone().with_signal(AbortSignal::new()).query().await?;
        assert_eq!(queries(&mock), 2);
        Ok(())
    })
}

#[test]
fn failed_query_under_signal_is_not_cached() -> TestResult {
    block_on(async {
        let mock = mock();
        let query = attributes(&mock, CachingConfiguration::recommended())
            .elements()
            .for_display_form(label())
            .with_signal(AbortSignal::new());

        mock.fail_when(|call| matches!(call, BackendCall::QueryElements { .. }));
        assert!(query.query().await.is_err());

        mock.clear_failures();
        query.query().await?;
        query.query().await?;
        assert_eq!(queries(&mock), 2);
        Ok(())
    })
}

#[test]
fn cancelled_query_is_not_cached() -> TestResult {
    block_on(async {
        let mock = mock();
        let query = attributes(&mock, CachingConfiguration::recommended())
            .elements()
            .for_display_form(label());

        let signal = AbortSignal::new();
        signal.cancel();
        let cancelled = query.clone().with_signal(signal).query().await;
        assert!(cancelled.is_err_and(|error| error.is_cancelled()));

        query.query().await?;
        assert_eq!(queries(&mock), 2);
        Ok(())
    })
}

#[test]
fn elements_cache_can_be_disabled_alone() -> TestResult {
    block_on(async {
        let mock = mock();
        let config = CachingConfiguration::recommended().with_max_attribute_element_results_per_workspace(0);
        let query = attributes(&mock, config).elements().for_display_form(label());

        query.query().await?;
        query.query().await?;

        assert_eq!(queries(&mock), 2);
        Ok(())
    })
}
