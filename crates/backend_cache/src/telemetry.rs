// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured logging of cache activity.
//!
//! Every cache event is a single `cache.event` tracing event carrying the cache name, the
//! operation and the activity as structured fields, so log pipelines can aggregate hit rates
//! per cache without parsing messages.

use crate::config::CachingConfiguration;

#[derive(Debug, Clone, Copy)]
pub(crate) enum CacheOperation {
    Get,
    Insert,
    Invalidate,
    Clear,
}

impl CacheOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "cache.get",
            Self::Insert => "cache.insert",
            Self::Invalidate => "cache.invalidate",
            Self::Clear => "cache.clear",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    Hit,
    Miss,
    Expired,
    Inserted,
    Evicted,
    Invalidated,
    Cleared,
    Error,
}

impl CacheActivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Miss => "cache.miss",
            Self::Expired => "cache.expired",
            Self::Inserted => "cache.inserted",
            Self::Evicted => "cache.evicted",
            Self::Invalidated => "cache.invalidated",
            Self::Cleared => "cache.cleared",
            Self::Error => "cache.error",
        }
    }

    fn is_warning(self) -> bool {
        matches!(self, Self::Error)
    }
}

/// Records a cache event for the cache called `name`.
pub(crate) fn record(name: &str, operation: CacheOperation, activity: CacheActivity, key: Option<&str>) {
    let op = operation.as_str();
    let ev = activity.as_str();

    // Tracing level must be constant, so we use a macro to select the appropriate level.
    macro_rules! emit_event {
        ($level:ident) => {
            tracing::$level!(
                cache.name = name,
                cache.operation = op,
                cache.activity = ev,
                cache.key = key,
                "cache.event"
            )
        };
    }

    if activity.is_warning() {
        emit_event!(warn);
    } else {
        emit_event!(debug);
    }
}

/// Logs which facilities a caching backend was set up with.
pub(crate) fn record_setup(config: &CachingConfiguration) {
    tracing::info!(
        cache.executions = config.max_executions.filter(|max| *max > 0),
        cache.result_windows = config.max_result_windows.filter(|max| *max > 0),
        cache.catalogs = config.max_catalogs.filter(|max| *max > 0),
        cache.security_settings = config.max_security_settings_orgs.filter(|max| *max > 0),
        cache.attributes = config.max_attribute_workspaces.filter(|max| *max > 0),
        cache.attribute_elements = config.max_attribute_element_results_per_workspace.filter(|max| *max > 0),
        cache.workspace_settings = config.max_workspace_settings.filter(|max| *max > 0),
        cache.automations = config.max_automations_workspaces.filter(|max| *max > 0),
        "cache.setup"
    );
}

/// Logs an explicit reset of a cache family.
pub(crate) fn record_reset(family: &'static str) {
    tracing::info!(cache.name = family, "cache.reset");
}


#[cfg(test)]
mod tests {
    use super::*;
    use testing::LogCapture;

    #[test]
    fn operation_as_str() {
        assert_eq!(CacheOperation::Get.as_str(), "cache.get");
        assert_eq!(CacheOperation::Insert.as_str(), "cache.insert");
        assert_eq!(CacheOperation::Invalidate.as_str(), "cache.invalidate");
        assert_eq!(CacheOperation::Clear.as_str(), "cache.clear");
    }

    #[test]
    fn activity_as_str() {
        assert_eq!(CacheActivity::Hit.as_str(), "cache.hit");
        assert_eq!(CacheActivity::Miss.as_str(), "cache.miss");
        assert_eq!(CacheActivity::Expired.as_str(), "cache.expired");
        assert_eq!(CacheActivity::Inserted.as_str(), "cache.inserted");
        assert_eq!(CacheActivity::Evicted.as_str(), "cache.evicted");
        assert_eq!(CacheActivity::Invalidated.as_str(), "cache.invalidated");
        assert_eq!(CacheActivity::Cleared.as_str(), "cache.cleared");
        assert_eq!(CacheActivity::Error.as_str(), "cache.error");
    }

    #[test]
    fn only_errors_are_warnings() {
        assert!(CacheActivity::Error.is_warning());
        assert!(!CacheActivity::Hit.is_warning());
        assert!(!CacheActivity::Evicted.is_warning());
    }

    #[test]
    fn record_emits_structured_fields() {
        let capture = LogCapture::new();
        tracing::subscriber::with_default(capture.subscriber(), || {
            record("catalogs", CacheOperation::Get, CacheActivity::Miss, Some("ws-1"));
        });

        capture.assert_contains("DEBUG");
        capture.assert_contains("cache.event");
        capture.assert_contains("catalogs");
        capture.assert_contains(CacheOperation::Get.as_str());
        capture.assert_contains(CacheActivity::Miss.as_str());
        capture.assert_contains("ws-1");
    }

    #[test]
    fn record_error_is_a_warning() {
        let capture = LogCapture::new();
        tracing::subscriber::with_default(capture.subscriber(), || {
            record("executions", CacheOperation::Invalidate, CacheActivity::Error, None);
        });

        capture.assert_contains("WARN");
        capture.assert_contains(CacheActivity::Error.as_str());
    }

    #[test]
    fn record_setup_lists_enabled_facilities() {
        let capture = LogCapture::new();
        let config = CachingConfiguration::default().with_max_executions(10).with_max_catalogs(0);
        tracing::subscriber::with_default(capture.subscriber(), || record_setup(&config));

        capture.assert_contains("INFO");
        capture.assert_contains("cache.setup");
        capture.assert_contains("cache.executions=10");
        assert!(!capture.output().contains("cache.catalogs"));
    }
}
