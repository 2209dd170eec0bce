// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use super::{
    attributes::CachingAttributes, automations::CachingAutomations, catalog::CachingCatalog, execution::CachingExecutionFactory,
    security::CachingSecuritySettings, settings::CachingWorkspaceSettings,
};
use crate::{
    context::CacheContext,
    spi::{
        AnalyticalBackend, AnalyticalWorkspace, AttributesService, AutomationsService, BackendCapabilities, CatalogService,
        ExecutionFactory, Organization, SecuritySettingsService, WorkspaceSettingsService,
    },
};

#[derive(Debug)]
pub(crate) struct CachingBackend {
    inner: Arc<dyn AnalyticalBackend>,
    context: Arc<CacheContext>,
}

impl CachingBackend {
    pub fn new(inner: Arc<dyn AnalyticalBackend>, context: Arc<CacheContext>) -> Self {
        Self { inner, context }
    }
}

impl AnalyticalBackend for CachingBackend {
    fn capabilities(&self) -> BackendCapabilities {
        self.inner.capabilities()
    }

    fn workspace(&self, id: &str) -> Arc<dyn AnalyticalWorkspace> {
        Arc::new(CachingWorkspace {
            inner: self.inner.workspace(id),
            context: Arc::clone(&self.context),
        })
    }

    fn organization(&self, id: &str) -> Arc<dyn Organization> {
        Arc::new(CachingOrganization {
            inner: self.inner.organization(id),
            context: Arc::clone(&self.context),
        })
    }
}

#[derive(Debug)]
struct CachingWorkspace {
    inner: Arc<dyn AnalyticalWorkspace>,
    context: Arc<CacheContext>,
}

impl CachingWorkspace {
    fn workspace(&self) -> String {
        self.inner.workspace_id().to_string()
    }
}

impl AnalyticalWorkspace for CachingWorkspace {
    fn workspace_id(&self) -> &str {
        self.inner.workspace_id()
    }

    fn execution(&self) -> Arc<dyn ExecutionFactory> {
        match &self.context.executions {
            Some(executions) => Arc::new(CachingExecutionFactory::new(
                self.inner.execution(),
                executions.clone(),
                self.context.max_result_windows,
            )),
            None => self.inner.execution(),
        }
    }

    fn catalog(&self) -> Arc<dyn CatalogService> {
        if self.context.catalogs.is_some() {
            Arc::new(CachingCatalog::new(self.inner.catalog(), self.workspace(), Arc::clone(&self.context)))
        } else {
            self.inner.catalog()
        }
    }

    fn attributes(&self) -> Arc<dyn AttributesService> {
        if self.context.attributes.is_some() {
            Arc::new(CachingAttributes::new(self.inner.attributes(), self.workspace(), Arc::clone(&self.context)))
        } else {
            self.inner.attributes()
        }
    }

    fn settings(&self) -> Arc<dyn WorkspaceSettingsService> {
        if self.context.workspace_settings.is_some() {
            Arc::new(CachingWorkspaceSettings::new(self.inner.settings(), self.workspace(), Arc::clone(&self.context)))
        } else {
            self.inner.settings()
        }
    }

    fn automations(&self) -> Arc<dyn AutomationsService> {
        if self.context.automations.is_some() {
            Arc::new(CachingAutomations::new(self.inner.automations(), self.workspace(), Arc::clone(&self.context)))
        } else {
            self.inner.automations()
        }
    }
}

#[derive(Debug)]
struct CachingOrganization {
    inner: Arc<dyn Organization>,
    context: Arc<CacheContext>,
}

impl Organization for CachingOrganization {
    fn organization_id(&self) -> &str {
        self.inner.organization_id()
    }

    fn security_settings(&self) -> Arc<dyn SecuritySettingsService> {
        if self.context.security_settings.is_some() {
            Arc::new(CachingSecuritySettings::new(self.inner.security_settings(), Arc::clone(&self.context)))
        } else {
            self.inner.security_settings()
        }
    }
}
