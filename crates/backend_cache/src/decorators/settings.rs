// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    Result,
    context::CacheContext,
    model::{ObjRef, Separators, UserWorkspaceSettings, WeekStart, WorkspaceSettings},
    pending::settle,
    spi::WorkspaceSettingsService,
};

/// Caches workspace settings reads.
///
/// Writes go straight to the wrapped service and leave the cached reads in place; a cached
/// read reflects a write only after the cache entry is evicted or reset.
#[derive(Debug)]
pub(crate) struct CachingWorkspaceSettings {
    inner: Arc<dyn WorkspaceSettingsService>,
    workspace: String,
    context: Arc<CacheContext>,
}

impl CachingWorkspaceSettings {
    pub fn new(inner: Arc<dyn WorkspaceSettingsService>, workspace: String, context: Arc<CacheContext>) -> Self {
        Self { inner, workspace, context }
    }
}

#[async_trait]
impl WorkspaceSettingsService for CachingWorkspaceSettings {
    async fn get_settings(&self) -> Result<WorkspaceSettings> {
        let Some(entry) = self.context.settings_entry(&self.workspace) else {
            return self.inner.get_settings().await;
        };

        let value = entry.settings.get_or_insert_with(&self.workspace, |id| {
            let inner = Arc::clone(&self.inner);
            settle(&entry.settings, self.workspace.as_str(), id, None, async move { inner.get_settings().await })
        });

        value.await
    }

    async fn get_settings_for_current_user(&self) -> Result<UserWorkspaceSettings> {
        let Some(entry) = self.context.settings_entry(&self.workspace) else {
            return self.inner.get_settings_for_current_user().await;
        };

        let value = entry.user_settings.get_or_insert_with(&self.workspace, |id| {
            let inner = Arc::clone(&self.inner);
            settle(&entry.user_settings, self.workspace.as_str(), id, None, async move {
                inner.get_settings_for_current_user().await
            })
        });

        value.await
    }

    async fn set_locale(&self, locale: &str) -> Result<()> {
        self.inner.set_locale(locale).await
    }

    async fn set_timezone(&self, timezone: &str) -> Result<()> {
        self.inner.set_timezone(timezone).await
    }

    async fn set_date_format(&self, date_format: &str) -> Result<()> {
        self.inner.set_date_format(date_format).await
    }

    async fn set_week_start(&self, week_start: WeekStart) -> Result<()> {
        self.inner.set_week_start(week_start).await
    }

    async fn set_theme(&self, theme: &ObjRef) -> Result<()> {
        self.inner.set_theme(theme).await
    }

    async fn delete_theme(&self) -> Result<()> {
        self.inner.delete_theme().await
    }

    async fn set_color_palette(&self, color_palette: &ObjRef) -> Result<()> {
        self.inner.set_color_palette(color_palette).await
    }

    async fn delete_color_palette(&self) -> Result<()> {
        self.inner.delete_color_palette().await
    }

    async fn set_separators(&self, separators: &Separators) -> Result<()> {
        self.inner.set_separators(separators).await
    }
}
