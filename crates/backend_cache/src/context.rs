// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! State shared by every decorator created from one [`with_caching`](crate::with_caching) call.
//!
//! Top-level caches are keyed by scope (workspace, organization or execution fingerprint) and
//! hold per-scope entries. Entries are created lazily the first time a scope is seen; the
//! helpers here are the only place that knows how to size them.

use std::{sync::Arc, time::Duration};

use crate::{
    bounded::BoundedCache,
    config::CachingConfiguration,
    model::{
        AttributeMetadata, AttributeWithReferences, Automation, AutomationsQueryResult, Catalog, DatasetMetadata,
        DisplayFormMetadata, ElementsQueryResult, UserWorkspaceSettings, WorkspaceSettings,
    },
    pending::{AsyncValue, Signalled},
    spi::{BackendCapabilities, ExecutionResult},
};

/// Listings and query pages kept per workspace by the automations caches.
const AUTOMATION_RESULTS_PER_WORKSPACE: usize = 50;

/// A cached execution: the decorated result and the signal it was started or rebased under.
pub(crate) type ExecutionEntry = Signalled<Arc<dyn ExecutionResult>>;

#[derive(Debug, Clone)]
pub(crate) struct CatalogEntry {
    pub catalogs: BoundedCache<AsyncValue<Arc<Catalog>>>,
}

#[derive(Debug, Clone)]
pub(crate) struct SecuritySettingsEntry {
    pub valid: BoundedCache<AsyncValue<bool>>,
}

#[derive(Debug, Clone)]
pub(crate) struct WorkspaceSettingsEntry {
    pub settings: BoundedCache<AsyncValue<WorkspaceSettings>>,
    pub user_settings: BoundedCache<AsyncValue<UserWorkspaceSettings>>,
}

#[derive(Debug, Clone)]
pub(crate) struct AttributeEntry {
    pub display_forms: BoundedCache<AsyncValue<DisplayFormMetadata>>,
    pub attributes_by_display_form: BoundedCache<AsyncValue<AttributeMetadata>>,
    pub dataset_by_attribute: BoundedCache<AsyncValue<DatasetMetadata>>,
    pub attributes_with_references: BoundedCache<AsyncValue<AttributeWithReferences>>,
    pub elements: Option<BoundedCache<Signalled<ElementsQueryResult>>>,
}

#[derive(Debug, Clone)]
pub(crate) struct AutomationsEntry {
    pub listings: BoundedCache<AsyncValue<Vec<Automation>>>,
    pub queries: BoundedCache<AsyncValue<AutomationsQueryResult>>,
}

/// Every cache of one caching backend.
///
/// A facility whose cache is `None` is disabled; its decorator is never constructed.
#[derive(Debug)]
pub(crate) struct CacheContext {
    pub capabilities: BackendCapabilities,
    pub executions: Option<BoundedCache<ExecutionEntry>>,
    pub max_result_windows: Option<usize>,
    pub catalogs: Option<BoundedCache<CatalogEntry>>,
    pub security_settings: Option<BoundedCache<SecuritySettingsEntry>>,
    pub workspace_settings: Option<BoundedCache<WorkspaceSettingsEntry>>,
    pub attributes: Option<BoundedCache<AttributeEntry>>,
    pub automations: Option<BoundedCache<AutomationsEntry>>,
    limits: ItemLimits,
}

#[derive(Debug, Clone, Copy)]
struct ItemLimits {
    catalog_options: usize,
    security_settings_org_urls: usize,
    security_settings_org_urls_age: Option<Duration>,
    attribute_display_forms: usize,
    attributes: usize,
    attribute_elements: Option<usize>,
}

impl CacheContext {
    pub fn new(config: &CachingConfiguration, capabilities: BackendCapabilities) -> Self {
        Self {
            capabilities,
            executions: config.executions().map(|max| BoundedCache::new("executions", max)),
            max_result_windows: config.result_windows(),
            catalogs: config.catalogs().map(|max| BoundedCache::new("catalogs", max)),
            security_settings: config
                .security_settings_orgs()
                .map(|max| BoundedCache::new("security_settings", max)),
            workspace_settings: config
                .workspace_settings()
                .map(|max| BoundedCache::new("workspace_settings", max)),
            attributes: config.attribute_workspaces().map(|max| BoundedCache::new("attributes", max)),
            automations: config
                .automations_workspaces()
                .map(|max| BoundedCache::new("automations", max)),
            limits: ItemLimits {
                catalog_options: config.catalog_options(),
                security_settings_org_urls: config.security_settings_org_urls(),
                security_settings_org_urls_age: config.max_security_settings_org_urls_age,
                attribute_display_forms: config.attribute_display_forms(),
                attributes: config.attributes(),
                attribute_elements: config.attribute_elements(),
            },
        }
    }

    pub fn catalog_entry(&self, workspace: &str) -> Option<CatalogEntry> {
        let max = self.limits.catalog_options;
        self.catalogs.as_ref().map(|catalogs| {
            catalogs.get_or_insert_with(workspace, |_| CatalogEntry {
                catalogs: BoundedCache::new("catalogs.options", max),
            })
        })
    }

    pub fn security_entry(&self, scope: &str) -> Option<SecuritySettingsEntry> {
        let max = self.limits.security_settings_org_urls;
        let ttl = self.limits.security_settings_org_urls_age;
        self.security_settings.as_ref().map(|orgs| {
            orgs.get_or_insert_with(scope, |_| SecuritySettingsEntry {
                valid: match ttl {
                    Some(ttl) => BoundedCache::with_ttl("security_settings.urls", max, ttl),
                    None => BoundedCache::new("security_settings.urls", max),
                },
            })
        })
    }

    pub fn settings_entry(&self, workspace: &str) -> Option<WorkspaceSettingsEntry> {
        self.workspace_settings.as_ref().map(|workspaces| {
            workspaces.get_or_insert_with(workspace, |_| WorkspaceSettingsEntry {
                settings: BoundedCache::new("workspace_settings.settings", 1),
                user_settings: BoundedCache::new("workspace_settings.user_settings", 1),
            })
        })
    }

    pub fn attribute_entry(&self, workspace: &str) -> Option<AttributeEntry> {
        let limits = self.limits;
        self.attributes.as_ref().map(|workspaces| {
            workspaces.get_or_insert_with(workspace, |_| AttributeEntry {
                display_forms: BoundedCache::new("attributes.display_forms", limits.attribute_display_forms),
                attributes_by_display_form: BoundedCache::new("attributes.by_display_form", limits.attribute_display_forms),
                dataset_by_attribute: BoundedCache::new("attributes.datasets", limits.attributes),
                attributes_with_references: BoundedCache::new("attributes.with_references", limits.attributes),
                elements: limits
                    .attribute_elements
                    .map(|max| BoundedCache::new("attributes.elements", max)),
            })
        })
    }

    pub fn automations_entry(&self, workspace: &str) -> Option<AutomationsEntry> {
        self.automations.as_ref().map(|workspaces| {
            workspaces.get_or_insert_with(workspace, |_| AutomationsEntry {
                listings: BoundedCache::new("automations.listings", AUTOMATION_RESULTS_PER_WORKSPACE),
                queries: BoundedCache::new("automations.queries", AUTOMATION_RESULTS_PER_WORKSPACE),
            })
        })
    }
}
