// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for execution and execution result caching.

use std::sync::Arc;

use backend_cache::{
    CachingConfiguration, Error,
    model::{ExecutionDefinition, ForecastConfig, Measure, ObjRef, ObjectType},
    spi::{AbortSignal, AnalyticalBackend},
    testing::{BackendCall, MockBackend},
    with_caching,
};

type TestResult = Result<(), Error>;

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

fn definition(title: &str) -> ExecutionDefinition {
    ExecutionDefinition::new("ws").with_measure(Measure::new("m1", ObjRef::identifier("revenue", ObjectType::Measure)).with_title(title))
}

fn other_definition() -> ExecutionDefinition {
    ExecutionDefinition::new("ws").with_measure(Measure::new("m1", ObjRef::identifier("cost", ObjectType::Measure)))
}

fn caching(mock: &MockBackend, config: CachingConfiguration) -> Arc<dyn AnalyticalBackend> {
    with_caching(Arc::new(mock.clone()), config)
}

fn executions(mock: &MockBackend) -> usize {
    mock.call_count(|call| matches!(call, BackendCall::Execute { .. }))
}

#[test]
fn concurrent_executions_share_backend_call() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let factory = caching(&mock, CachingConfiguration::recommended()).workspace("ws").execution();

        let first = factory.for_definition(definition("Revenue"));
        let second = factory.for_definition(definition("Revenue"));
        let (first, second) = futures::join!(first.execute(), second.execute());
        first?;
        second?;

        assert_eq!(executions(&mock), 1);
        Ok(())
    })
}

#[test]
fn distinct_definitions_execute_separately() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let factory = caching(&mock, CachingConfiguration::recommended()).workspace("ws").execution();

        factory.for_definition(definition("Revenue")).execute().await?;
        factory.for_definition(other_definition()).execute().await?;
        factory.for_definition(definition("Revenue")).execute().await?;

        assert_eq!(executions(&mock), 2);
        Ok(())
    })
}

#[test]
fn failed_execution_is_not_cached() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let factory = caching(&mock, CachingConfiguration::recommended()).workspace("ws").execution();

        mock.fail_when(|call| matches!(call, BackendCall::Execute { .. }));
        let failed = factory.for_definition(definition("Revenue")).execute().await;
        assert!(failed.is_err());

        mock.clear_failures();
        factory.for_definition(definition("Revenue")).execute().await?;

        assert_eq!(executions(&mock), 2);
        Ok(())
    })
}

#[test]
fn shared_execution_keeps_requested_definition() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let factory = caching(&mock, CachingConfiguration::recommended()).workspace("ws").execution();

        let revenue = definition("Revenue");
        let sales = definition("Sales");
        assert_eq!(revenue.fingerprint(), sales.fingerprint());

        let first = factory.for_definition(revenue.clone()).execute().await?;
        let second = factory.for_definition(sales.clone()).execute().await?;

        assert_eq!(executions(&mock), 1);
        assert_eq!(first.definition(), &revenue);
        assert_eq!(second.definition(), &sales);
        assert_eq!(first.fingerprint(), second.fingerprint());
        Ok(())
    })
}

#[test]
fn custom_fingerprints_collide_without_mixing_definitions() -> TestResult {
    block_on(async {
        let mock = MockBackend::new().with_fingerprint(|_| "constant".to_string());
        let factory = caching(&mock, CachingConfiguration::recommended()).workspace("ws").execution();

        let result = factory.for_definition(definition("Revenue")).execute().await?;
        let other = factory.for_definition(other_definition()).execute().await?;

        assert_eq!(executions(&mock), 1);
        assert_eq!(result.definition(), &definition("Revenue"));
        assert_eq!(other.definition(), &other_definition());
        Ok(())
    })
}

#[test]
fn disabled_executions_pass_through() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let config = CachingConfiguration::recommended().with_max_executions(0);
        let factory = caching(&mock, config).workspace("ws").execution();

        factory.for_definition(definition("Revenue")).execute().await?;
        factory.for_definition(definition("Revenue")).execute().await?;

        assert_eq!(executions(&mock), 2);
        Ok(())
    })
}

#[test]
fn evicted_execution_runs_again() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let config = CachingConfiguration::recommended().with_max_executions(1);
        let factory = caching(&mock, config).workspace("ws").execution();

        factory.for_definition(definition("Revenue")).execute().await?;
        factory.for_definition(other_definition()).execute().await?;
        factory.for_definition(definition("Revenue")).execute().await?;

        assert_eq!(executions(&mock), 3);
        Ok(())
    })
}

#[test]
fn signal_reuses_live_execution() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let factory = caching(&mock, CachingConfiguration::recommended()).workspace("ws").execution();

        factory.for_definition(definition("Revenue")).execute().await?;

        let signal = AbortSignal::new();
        let result = factory
            .for_definition(definition("Revenue"))
            .with_signal(signal.clone())
            .execute()
            .await?;

        assert_eq!(executions(&mock), 1);
        assert!(result.signal().is_some());
        Ok(())
    })
}

#[test]
fn aborted_signal_forces_fresh_execution() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let factory = caching(&mock, CachingConfiguration::recommended()).workspace("ws").execution();

        let first = AbortSignal::new();
        factory
            .for_definition(definition("Revenue"))
            .with_signal(first.clone())
            .execute()
            .await?;
        first.cancel();

        factory
            .for_definition(definition("Revenue"))
            .with_signal(AbortSignal::new())
            .execute()
            .await?;

        assert_eq!(executions(&mock), 2);
        Ok(())
    })
}

#[test]
fn execution_under_aborted_signal_is_not_cached() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let factory = caching(&mock, CachingConfiguration::recommended()).workspace("ws").execution();

        let signal = AbortSignal::new();
        signal.cancel();
        let cancelled = factory
            .for_definition(definition("Revenue"))
            .with_signal(signal)
            .execute()
            .await;
        assert!(cancelled.is_err_and(|error| error.is_cancelled()));

        factory.for_definition(definition("Revenue")).execute().await?;
        assert_eq!(executions(&mock), 2);
        Ok(())
    })
}

#[test]
fn reads_are_cached_per_result() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let factory = caching(&mock, CachingConfiguration::recommended()).workspace("ws").execution();

        let result = factory.for_definition(definition("Revenue")).execute().await?;
        let all = result.read_all().await?;
        let again = factory.for_definition(definition("Revenue")).execute().await?.read_all().await?;

        assert_eq!(all, again);
        assert_eq!(mock.call_count(|call| matches!(call, BackendCall::ReadAll { .. })), 1);
        Ok(())
    })
}

#[test]
fn windows_are_cached_per_offset_and_size() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let factory = caching(&mock, CachingConfiguration::recommended()).workspace("ws").execution();
        let result = factory.for_definition(definition("Revenue")).execute().await?;

        result.read_window(&[0, 0], &[10, 10]).await?;
        result.read_window(&[0, 0], &[10, 10]).await?;
        result.read_window(&[10, 0], &[10, 10]).await?;

        assert_eq!(mock.call_count(|call| matches!(call, BackendCall::ReadWindow { .. })), 2);
        Ok(())
    })
}

#[test]
fn windows_pass_through_without_window_cache() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let config = CachingConfiguration::recommended().with_max_result_windows(0);
        let factory = caching(&mock, config).workspace("ws").execution();
        let result = factory.for_definition(definition("Revenue")).execute().await?;

        result.read_window(&[0, 0], &[10, 10]).await?;
        result.read_window(&[0, 0], &[10, 10]).await?;

        assert_eq!(mock.call_count(|call| matches!(call, BackendCall::ReadWindow { .. })), 2);
        Ok(())
    })
}

#[test]
fn forecast_is_cached_per_config() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let factory = caching(&mock, CachingConfiguration::recommended()).workspace("ws").execution();
        let result = factory.for_definition(definition("Revenue")).execute().await?;

        let config = ForecastConfig {
            forecast_period: 3,
            confidence_level: 0.95,
            seasonal: false,
        };
        let forecast = result.read_forecast_all(&config).await?;
        result.read_forecast_all(&config).await?;
        assert_eq!(forecast.headers, ["+1", "+2", "+3"]);

        let longer = ForecastConfig {
            forecast_period: 5,
            ..config
        };
        result.read_forecast_all(&longer).await?;

        assert_eq!(mock.call_count(|call| matches!(call, BackendCall::ReadForecast { .. })), 2);
        Ok(())
    })
}

#[test]
fn aborted_read_drops_execution() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let factory = caching(&mock, CachingConfiguration::recommended()).workspace("ws").execution();
        let result = factory.for_definition(definition("Revenue")).execute().await?;

        mock.fail_with(Error::Cancelled, |call| matches!(call, BackendCall::ReadAll { .. }));
        let read = result.read_all().await;
        assert!(read.is_err_and(|error| error.is_cancelled()));

        mock.clear_failures();
        factory.for_definition(definition("Revenue")).execute().await?.read_all().await?;

        assert_eq!(executions(&mock), 2);
        assert_eq!(mock.call_count(|call| matches!(call, BackendCall::ReadAll { .. })), 2);
        Ok(())
    })
}

#[test]
fn failed_read_keeps_execution() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let factory = caching(&mock, CachingConfiguration::recommended()).workspace("ws").execution();
        let result = factory.for_definition(definition("Revenue")).execute().await?;

        mock.fail_when(|call| matches!(call, BackendCall::ReadAll { .. }));
        assert!(result.read_all().await.is_err());

        mock.clear_failures();
        factory.for_definition(definition("Revenue")).execute().await?.read_all().await?;

        assert_eq!(executions(&mock), 1);
        assert_eq!(mock.call_count(|call| matches!(call, BackendCall::ReadAll { .. })), 2);
        Ok(())
    })
}

#[test]
fn transformed_execution_is_cached() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let factory = caching(&mock, CachingConfiguration::recommended()).workspace("ws").execution();

        let result = factory.for_definition(definition("Revenue")).execute().await?;
        result.transform().execute().await?;

        assert_eq!(executions(&mock), 1);
        Ok(())
    })
}

#[test]
fn dropping_backend_releases_cached_executions() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let baseline = mock.handle_count();
        let backend = caching(&mock, CachingConfiguration::recommended());

        let result = backend.workspace("ws").execution().for_definition(definition("Revenue")).execute().await?;
        result.read_all().await?;
        let transformed = result.transform();
        assert!(mock.handle_count() > baseline);

        drop((result, transformed, backend));
        assert_eq!(mock.handle_count(), baseline);
        Ok(())
    })
}

#[test]
fn dropping_backend_releases_unfinished_executions() {
    block_on(async {
        let mock = MockBackend::new();
        let baseline = mock.handle_count();
        let backend = caching(&mock, CachingConfiguration::recommended());
        let prepared = backend.workspace("ws").execution().for_definition(definition("Revenue"));

        let mut execution = prepared.execute();
        assert!(futures::poll!(execution.as_mut()).is_pending());
        assert_eq!(executions(&mock), 1);

        drop(execution);
        drop((prepared, backend));
        assert_eq!(mock.handle_count(), baseline);
    });
}

#[test]
fn transform_passes_through_once_backend_is_dropped() -> TestResult {
    block_on(async {
        let mock = MockBackend::new();
        let backend = caching(&mock, CachingConfiguration::recommended());
        let result = backend.workspace("ws").execution().for_definition(definition("Revenue")).execute().await?;
        drop(backend);

        let transformed = result.transform();
        transformed.execute().await?;
        transformed.execute().await?;

        assert_eq!(executions(&mock), 3);
        Ok(())
    })
}
