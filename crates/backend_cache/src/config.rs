// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Configuration of the caching backend.

use std::{fmt, sync::Arc, time::Duration};

use crate::control::CacheControl;

/// Callback invoked with the cache control surface once the caching backend is set up.
pub type CacheReadyCallback = Arc<dyn Fn(CacheControl) + Send + Sync>;

/// Recommended caching configuration.
///
/// Sized for a single interactive application working with one workspace at a time.
pub const RECOMMENDED_CACHING_CONFIGURATION: CachingConfiguration = CachingConfiguration {
    max_executions: Some(10),
    max_result_windows: Some(5),
    max_catalogs: Some(1),
    max_catalog_options: Some(50),
    max_security_settings_orgs: Some(3),
    max_security_settings_org_urls: Some(100),
    max_security_settings_org_urls_age: Some(Duration::from_secs(5 * 60)),
    max_attribute_workspaces: Some(1),
    max_attribute_display_forms_per_workspace: Some(100),
    max_attributes_per_workspace: Some(100),
    max_attribute_element_results_per_workspace: Some(100),
    max_workspace_settings: Some(1),
    max_automations_workspaces: Some(1),
    on_cache_ready: None,
};

/// Sizes of the caches layered onto a backend.
///
/// Each facility is switched on by its primary limit: a positive value enables caching for that
/// facility, while `None` or zero lets its calls pass straight through to the wrapped backend.
/// The primary limits are:
///
/// | Facility | Primary limit |
/// |---|---|
/// | executions | [`max_executions`](Self::max_executions) |
/// | execution result windows | [`max_result_windows`](Self::max_result_windows) |
/// | catalogs | [`max_catalogs`](Self::max_catalogs) |
/// | security settings | [`max_security_settings_orgs`](Self::max_security_settings_orgs) |
/// | attributes and display forms | [`max_attribute_workspaces`](Self::max_attribute_workspaces) |
/// | attribute elements | [`max_attribute_element_results_per_workspace`](Self::max_attribute_element_results_per_workspace) |
/// | workspace settings | [`max_workspace_settings`](Self::max_workspace_settings) |
/// | automations | [`max_automations_workspaces`](Self::max_automations_workspaces) |
///
/// The remaining limits size the caches within an enabled facility. They must be positive
/// when set; when unset, the value of [`RECOMMENDED_CACHING_CONFIGURATION`] applies.
///
/// The default configuration disables every facility.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use backend_cache::CachingConfiguration;
///
/// let config = CachingConfiguration::recommended()
///     .with_max_executions(50)
///     .with_max_security_settings_org_urls_age(Duration::from_secs(60))
///     .on_cache_ready(|control| control.reset_all());
///
/// assert_eq!(config.max_executions, Some(50));
/// ```
#[derive(Clone, Default)]
pub struct CachingConfiguration {
    /// Maximum number of executions (distinct fingerprints) to keep.
    pub max_executions: Option<usize>,
    /// Maximum number of data windows to keep per execution result.
    pub max_result_windows: Option<usize>,
    /// Maximum number of workspaces to keep catalogs for.
    pub max_catalogs: Option<usize>,
    /// Maximum number of catalogs (distinct load options) to keep per workspace.
    pub max_catalog_options: Option<usize>,
    /// Maximum number of organizations (and plugin scopes) to keep URL validations for.
    pub max_security_settings_orgs: Option<usize>,
    /// Maximum number of URL validations to keep per organization.
    pub max_security_settings_org_urls: Option<usize>,
    /// Maximum age of a URL validation.
    pub max_security_settings_org_urls_age: Option<Duration>,
    /// Maximum number of workspaces to keep attribute metadata for.
    pub max_attribute_workspaces: Option<usize>,
    /// Maximum number of display forms to keep per workspace.
    pub max_attribute_display_forms_per_workspace: Option<usize>,
    /// Maximum number of attributes to keep per workspace.
    pub max_attributes_per_workspace: Option<usize>,
    /// Maximum number of attribute element pages to keep per workspace.
    pub max_attribute_element_results_per_workspace: Option<usize>,
    /// Maximum number of workspaces to keep settings for.
    pub max_workspace_settings: Option<usize>,
    /// Maximum number of workspaces to keep automations for.
    pub max_automations_workspaces: Option<usize>,
    /// Invoked with the cache control surface once setup completes.
    pub on_cache_ready: Option<CacheReadyCallback>,
}

impl fmt::Debug for CachingConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingConfiguration")
            .field("max_executions", &self.max_executions)
            .field("max_result_windows", &self.max_result_windows)
            .field("max_catalogs", &self.max_catalogs)
            .field("max_catalog_options", &self.max_catalog_options)
            .field("max_security_settings_orgs", &self.max_security_settings_orgs)
            .field("max_security_settings_org_urls", &self.max_security_settings_org_urls)
            .field("max_security_settings_org_urls_age", &self.max_security_settings_org_urls_age)
            .field("max_attribute_workspaces", &self.max_attribute_workspaces)
            .field("max_attribute_display_forms_per_workspace", &self.max_attribute_display_forms_per_workspace)
            .field("max_attributes_per_workspace", &self.max_attributes_per_workspace)
            .field(
                "max_attribute_element_results_per_workspace",
                &self.max_attribute_element_results_per_workspace,
            )
            .field("max_workspace_settings", &self.max_workspace_settings)
            .field("max_automations_workspaces", &self.max_automations_workspaces)
            .field("on_cache_ready", &self.on_cache_ready.as_ref().map(|_| "Fn(CacheControl)"))
            .finish()
    }
}

macro_rules! with_limit {
    ($($(#[$doc:meta])* $method:ident => $field:ident: $ty:ty;)+) => {
        $(
            $(#[$doc])*
            #[must_use]
            pub fn $method(mut self, value: $ty) -> Self {
                self.$field = Some(value);
                self
            }
        )+
    };
}

impl CachingConfiguration {
    /// Returns the recommended configuration.
    #[must_use]
    pub fn recommended() -> Self {
        RECOMMENDED_CACHING_CONFIGURATION
    }

    with_limit! {
        /// Sets [`max_executions`](Self::max_executions).
        with_max_executions => max_executions: usize;
        /// Sets [`max_result_windows`](Self::max_result_windows).
        with_max_result_windows => max_result_windows: usize;
        /// Sets [`max_catalogs`](Self::max_catalogs).
        with_max_catalogs => max_catalogs: usize;
        /// Sets [`max_catalog_options`](Self::max_catalog_options).
        with_max_catalog_options => max_catalog_options: usize;
        /// Sets [`max_security_settings_orgs`](Self::max_security_settings_orgs).
        with_max_security_settings_orgs => max_security_settings_orgs: usize;
        /// Sets [`max_security_settings_org_urls`](Self::max_security_settings_org_urls).
        with_max_security_settings_org_urls => max_security_settings_org_urls: usize;
        /// Sets [`max_security_settings_org_urls_age`](Self::max_security_settings_org_urls_age).
        with_max_security_settings_org_urls_age => max_security_settings_org_urls_age: Duration;
        /// Sets [`max_attribute_workspaces`](Self::max_attribute_workspaces).
        with_max_attribute_workspaces => max_attribute_workspaces: usize;
        /// Sets [`max_attribute_display_forms_per_workspace`](Self::max_attribute_display_forms_per_workspace).
        with_max_attribute_display_forms_per_workspace => max_attribute_display_forms_per_workspace: usize;
        /// Sets [`max_attributes_per_workspace`](Self::max_attributes_per_workspace).
        with_max_attributes_per_workspace => max_attributes_per_workspace: usize;
        /// Sets [`max_attribute_element_results_per_workspace`](Self::max_attribute_element_results_per_workspace).
        with_max_attribute_element_results_per_workspace => max_attribute_element_results_per_workspace: usize;
        /// Sets [`max_workspace_settings`](Self::max_workspace_settings).
        with_max_workspace_settings => max_workspace_settings: usize;
        /// Sets [`max_automations_workspaces`](Self::max_automations_workspaces).
        with_max_automations_workspaces => max_automations_workspaces: usize;
    }

    /// Sets the callback invoked with the cache control surface once setup completes.
    #[must_use]
    pub fn on_cache_ready(mut self, callback: impl Fn(CacheControl) + Send + Sync + 'static) -> Self {
        self.on_cache_ready = Some(Arc::new(callback));
        self
    }

    /// Checks the per-item limits of every enabled facility.
    ///
    /// # Panics
    ///
    /// Panics if an enabled facility has a per-item limit of zero.
    pub fn validate(&self) {
        if enabled(self.max_catalogs).is_some() {
            assert_positive("max_catalog_options", self.max_catalog_options);
        }

        if enabled(self.max_security_settings_orgs).is_some() {
            assert_positive("max_security_settings_org_urls", self.max_security_settings_org_urls);
            assert!(
                self.max_security_settings_org_urls_age.is_none_or(|age| !age.is_zero()),
                "invalid caching configuration: max_security_settings_org_urls_age must be positive"
            );
        }

        if enabled(self.max_attribute_workspaces).is_some() {
            assert_positive(
                "max_attribute_display_forms_per_workspace",
                self.max_attribute_display_forms_per_workspace,
            );
            assert_positive("max_attributes_per_workspace", self.max_attributes_per_workspace);
        }
    }

    pub(crate) fn executions(&self) -> Option<usize> {
        enabled(self.max_executions)
    }

    pub(crate) fn result_windows(&self) -> Option<usize> {
        enabled(self.max_result_windows)
    }

    pub(crate) fn catalogs(&self) -> Option<usize> {
        enabled(self.max_catalogs)
    }

    pub(crate) fn catalog_options(&self) -> usize {
        self.max_catalog_options
            .or(RECOMMENDED_CACHING_CONFIGURATION.max_catalog_options)
            .unwrap_or(1)
    }

    pub(crate) fn security_settings_orgs(&self) -> Option<usize> {
        enabled(self.max_security_settings_orgs)
    }

    pub(crate) fn security_settings_org_urls(&self) -> usize {
        self.max_security_settings_org_urls
            .or(RECOMMENDED_CACHING_CONFIGURATION.max_security_settings_org_urls)
            .unwrap_or(1)
    }

    pub(crate) fn attribute_workspaces(&self) -> Option<usize> {
        enabled(self.max_attribute_workspaces)
    }

    pub(crate) fn attribute_display_forms(&self) -> usize {
        self.max_attribute_display_forms_per_workspace
            .or(RECOMMENDED_CACHING_CONFIGURATION.max_attribute_display_forms_per_workspace)
            .unwrap_or(1)
    }

    pub(crate) fn attributes(&self) -> usize {
        self.max_attributes_per_workspace
            .or(RECOMMENDED_CACHING_CONFIGURATION.max_attributes_per_workspace)
            .unwrap_or(1)
    }

    pub(crate) fn attribute_elements(&self) -> Option<usize> {
        enabled(self.max_attribute_element_results_per_workspace)
    }

    pub(crate) fn workspace_settings(&self) -> Option<usize> {
        enabled(self.max_workspace_settings)
    }

    pub(crate) fn automations_workspaces(&self) -> Option<usize> {
        enabled(self.max_automations_workspaces)
    }
}

fn enabled(limit: Option<usize>) -> Option<usize> {
    limit.filter(|max| *max > 0)
}

fn assert_positive(name: &str, limit: Option<usize>) {
    assert!(
        limit.is_none_or(|max| max > 0),
        "invalid caching configuration: {name} must be positive"
    );
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[test]
    fn default_disables_everything() {
        let config = CachingConfiguration::default();
        assert_eq!(config.executions(), None);
        assert_eq!(config.result_windows(), None);
        assert_eq!(config.catalogs(), None);
        assert_eq!(config.security_settings_orgs(), None);
        assert_eq!(config.attribute_workspaces(), None);
        assert_eq!(config.attribute_elements(), None);
        assert_eq!(config.workspace_settings(), None);
        assert_eq!(config.automations_workspaces(), None);
        config.validate();
    }

    #[test]
    fn recommended_values() {
        let config = CachingConfiguration::recommended();
        assert_eq!(config.max_executions, Some(10));
        assert_eq!(config.max_result_windows, Some(5));
        assert_eq!(config.max_catalogs, Some(1));
        assert_eq!(config.max_catalog_options, Some(50));
        assert_eq!(config.max_security_settings_orgs, Some(3));
        assert_eq!(config.max_security_settings_org_urls, Some(100));
        assert_eq!(config.max_security_settings_org_urls_age, Some(Duration::from_secs(300)));
        assert_eq!(config.max_attribute_workspaces, Some(1));
        assert_eq!(config.max_attribute_display_forms_per_workspace, Some(100));
        assert_eq!(config.max_attributes_per_workspace, Some(100));
        assert_eq!(config.max_attribute_element_results_per_workspace, Some(100));
        assert_eq!(config.max_workspace_settings, Some(1));
        assert_eq!(config.max_automations_workspaces, Some(1));
        config.validate();
    }

    #[test]
    fn zero_primary_limit_disables_facility() {
        let config = CachingConfiguration::recommended().with_max_executions(0);
        assert_eq!(config.executions(), None);
        assert_eq!(config.catalogs(), Some(1));
        config.validate();
    }

    #[test]
    fn absent_item_limits_fall_back_to_recommended() {
        let config = CachingConfiguration::default()
            .with_max_catalogs(2)
            .with_max_security_settings_orgs(1)
            .with_max_attribute_workspaces(1);
        config.validate();

        assert_eq!(config.catalog_options(), 50);
        assert_eq!(config.security_settings_org_urls(), 100);
        assert_eq!(config.attribute_display_forms(), 100);
        assert_eq!(config.attributes(), 100);
    }

    #[test]
    #[should_panic(expected = "max_catalog_options")]
    fn zero_catalog_options_fails_fast() {
        CachingConfiguration::recommended().with_max_catalog_options(0).validate();
    }

    #[test]
    #[should_panic(expected = "max_security_settings_org_urls_age")]
    fn zero_url_age_fails_fast() {
        CachingConfiguration::recommended()
            .with_max_security_settings_org_urls_age(Duration::ZERO)
            .validate();
    }

    #[test]
    #[should_panic(expected = "max_attributes_per_workspace")]
    fn zero_attributes_fails_fast() {
        CachingConfiguration::recommended().with_max_attributes_per_workspace(0).validate();
    }

    #[test]
    fn item_limits_of_disabled_facilities_are_not_checked() {
        CachingConfiguration::default().with_max_catalog_options(0).validate();
    }

    #[test]
    fn debug_hides_callback() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);
        let config = CachingConfiguration::default().on_cache_ready(move |_| flag.store(true, Ordering::SeqCst));

        let debug = format!("{config:?}");
        assert!(debug.contains("Fn(CacheControl)"));
        assert!(!called.load(Ordering::SeqCst));
    }
}
