// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for workspace settings caching.

use std::sync::{Arc, OnceLock};

use backend_cache::{
    CacheControl, CachingConfiguration, Error,
    model::WeekStart,
    spi::AnalyticalBackend,
    testing::{BackendCall, MockBackend},
    with_caching,
};

type TestResult = Result<(), Error>;

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

fn caching(mock: &MockBackend, config: CachingConfiguration) -> (Arc<dyn AnalyticalBackend>, CacheControl) {
    let control = Arc::new(OnceLock::new());
    let ready = Arc::clone(&control);
    let backend = with_caching(
        Arc::new(mock.clone()),
        config.on_cache_ready(move |cache_control| {
            let _ = ready.set(cache_control);
        }),
    );
    let control = control.get().cloned().expect("cache control is handed out during setup");
    (backend, control)
}

#[test]
fn settings_are_cached_per_workspace() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let (backend, _) = caching(&mock, CachingConfiguration::recommended().with_max_workspace_settings(2));

        let first = backend.workspace("ws1").settings().get_settings().await?;
        backend.workspace("ws1").settings().get_settings().await?;
        let second = backend.workspace("ws2").settings().get_settings().await?;

        assert_eq!(first.workspace, "ws1");
        assert_eq!(second.workspace, "ws2");
        assert_eq!(mock.call_count(|call| matches!(call, BackendCall::GetSettings { .. })), 2);
        Ok(())
    })
}

#[test]
fn user_settings_are_cached_separately() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let (backend, _) = caching(&mock, CachingConfiguration::recommended());
        let settings = backend.workspace("ws").settings();

        settings.get_settings().await?;
        settings.get_settings_for_current_user().await?;
        settings.get_settings_for_current_user().await?;

        assert_eq!(mock.call_count(|call| matches!(call, BackendCall::GetSettings { .. })), 1);
        assert_eq!(mock.call_count(|call| matches!(call, BackendCall::GetUserSettings { .. })), 1);
        Ok(())
    })
}

#[test]
fn writes_pass_through_without_invalidating() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let (backend, control) = caching(&mock, CachingConfiguration::recommended());
        let settings = backend.workspace("ws").settings();

        let before = settings.get_settings_for_current_user().await?;
        settings.set_locale("de-DE").await?;
        settings.set_week_start(WeekStart::Monday).await?;
        let cached = settings.get_settings_for_current_user().await?;

        assert_eq!(mock.call_count(|call| matches!(call, BackendCall::UpdateSetting { .. })), 2);
        assert_eq!(cached, before);

        control.reset_workspace_settings();
        let fresh = settings.get_settings_for_current_user().await?;
        assert_eq!(fresh.locale.as_deref(), Some("de-DE"));
        assert_eq!(mock.call_count(|call| matches!(call, BackendCall::GetUserSettings { .. })), 2);
        Ok(())
    })
}

#[test]
fn failed_read_is_not_cached() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let (backend, _) = caching(&mock, CachingConfiguration::recommended());
        let settings = backend.workspace("ws").settings();

        mock.fail_when(|call| matches!(call, BackendCall::GetSettings { .. }));
        assert!(settings.get_settings().await.is_err());

        mock.clear_failures();
        settings.get_settings().await?;
        assert_eq!(mock.call_count(|call| matches!(call, BackendCall::GetSettings { .. })), 2);
        Ok(())
    })
}

#[test]
fn disabled_settings_pass_through() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let (backend, _) = caching(&mock, CachingConfiguration::recommended().with_max_workspace_settings(0));
        let settings = backend.workspace("ws").settings();

        settings.get_settings().await?;
        settings.get_settings().await?;

        assert_eq!(mock.call_count(|call| matches!(call, BackendCall::GetSettings { .. })), 2);
        Ok(())
    })
}
