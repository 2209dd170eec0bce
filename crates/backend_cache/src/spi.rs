// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Capability traits of the analytical backend.
//!
//! A backend is a tree of services: the [`AnalyticalBackend`] hands out [`AnalyticalWorkspace`]
//! and [`Organization`] handles, which in turn hand out one service per facility. The caching
//! layer implements every trait in this module by wrapping another implementation of the same
//! trait, so callers cannot tell a cached backend from a plain one.
//!
//! All traits are object safe and are passed around as `Arc<dyn Trait>`.

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{
    Result,
    model::{
        AttributeMetadata, AttributeWithReferences, Automation, AutomationDefinition, AutomationStatus, AutomationType,
        AutomationsLoadOptions, AutomationsQueryResult, AutomationsQuerySettings, AutomationsSort, Catalog, CatalogLoadOptions,
        DataView, DatasetMetadata, DisplayFormMetadata, ElementsQueryOptions, ElementsQueryResult, ElementsQuerySettings,
        ExecutionDefinition, ForecastConfig, ForecastResult, ObjRef, Separators, UrlValidationContext, UserWorkspaceSettings,
        WeekStart, WorkspaceSettings,
    },
};

/// Caller-supplied cancellation signal attached to an individual call.
///
/// A signal is "aborted" once [`CancellationToken::cancel`] has been called on it or on any of
/// its parents. Backends surface an aborted operation as [`Error::Cancelled`](crate::Error::Cancelled).
pub type AbortSignal = CancellationToken;

/// Static capability flags advertised by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct BackendCapabilities {
    /// The backend may return fewer metadata objects than requested by a bulk lookup.
    pub allows_inconsistent_relations: bool,
}

impl BackendCapabilities {
    /// Sets whether the backend may return fewer objects than requested.
    #[must_use]
    pub fn with_inconsistent_relations(mut self, allowed: bool) -> Self {
        self.allows_inconsistent_relations = allowed;
        self
    }
}

/// Entry point of an analytical backend.
pub trait AnalyticalBackend: Debug + Send + Sync {
    /// Static capability flags of the backend.
    fn capabilities(&self) -> BackendCapabilities;

    /// Returns a handle to the given workspace.
    fn workspace(&self, id: &str) -> Arc<dyn AnalyticalWorkspace>;

    /// Returns a handle to the given organization.
    fn organization(&self, id: &str) -> Arc<dyn Organization>;
}

/// Services available within a single workspace.
pub trait AnalyticalWorkspace: Debug + Send + Sync {
    /// Identifier of the workspace.
    fn workspace_id(&self) -> &str;

    /// Query execution.
    fn execution(&self) -> Arc<dyn ExecutionFactory>;

    /// Logical data model catalog.
    fn catalog(&self) -> Arc<dyn CatalogService>;

    /// Attribute, display form and dataset metadata.
    fn attributes(&self) -> Arc<dyn AttributesService>;

    /// Workspace settings.
    fn settings(&self) -> Arc<dyn WorkspaceSettingsService>;

    /// Scheduled automations.
    fn automations(&self) -> Arc<dyn AutomationsService>;
}

/// Services available within an organization.
pub trait Organization: Debug + Send + Sync {
    /// Identifier of the organization.
    fn organization_id(&self) -> &str;

    /// Security settings of the organization.
    fn security_settings(&self) -> Arc<dyn SecuritySettingsService>;
}

/// Prepares executions of execution definitions.
pub trait ExecutionFactory: Debug + Send + Sync {
    /// Prepares the execution of `definition`.
    fn for_definition(&self, definition: ExecutionDefinition) -> Arc<dyn PreparedExecution>;
}

/// An execution that is ready to run.
#[async_trait]
pub trait PreparedExecution: Debug + Send + Sync {
    /// The definition that will be executed.
    fn definition(&self) -> &ExecutionDefinition;

    /// Content-derived identity of the definition.
    ///
    /// Two prepared executions with the same fingerprint compute the same data.
    fn fingerprint(&self) -> String;

    /// The cancellation signal attached to this execution, if any.
    fn signal(&self) -> Option<AbortSignal>;

    /// Returns a copy of this execution bound to `signal`.
    fn with_signal(&self, signal: AbortSignal) -> Arc<dyn PreparedExecution>;

    /// Starts the execution.
    async fn execute(&self) -> Result<Arc<dyn ExecutionResult>>;
}

/// The result of a started execution.
///
/// Reading data from a result may be slow; the result itself is cheap to hold.
#[async_trait]
pub trait ExecutionResult: Debug + Send + Sync {
    /// The definition that produced this result.
    fn definition(&self) -> &ExecutionDefinition;

    /// Fingerprint of the result.
    fn fingerprint(&self) -> String;

    /// The cancellation signal reads of this result observe, if any.
    fn signal(&self) -> Option<AbortSignal>;

    /// Returns a view of the same result whose reads observe `signal`.
    fn with_signal(&self, signal: Option<AbortSignal>) -> Arc<dyn ExecutionResult>;

    /// Reads all computed data.
    async fn read_all(&self) -> Result<DataView>;

    /// Reads a window of computed data, one offset and size per dimension.
    async fn read_window(&self, offset: &[u32], size: &[u32]) -> Result<DataView>;

    /// Computes a forecast over all computed data.
    async fn read_forecast_all(&self, config: &ForecastConfig) -> Result<ForecastResult>;

    /// Returns a prepared execution of the same definition, for further transformation.
    fn transform(&self) -> Arc<dyn PreparedExecution>;
}

/// Loads the logical data model catalog of a workspace.
#[async_trait]
pub trait CatalogService: Debug + Send + Sync {
    /// Loads the catalog.
    async fn load(&self, options: &CatalogLoadOptions) -> Result<Arc<Catalog>>;
}

/// URL validation rules of an organization.
#[async_trait]
pub trait SecuritySettingsService: Debug + Send + Sync {
    /// The scope (organization) the rules belong to.
    fn scope(&self) -> &str;

    /// Checks whether `url` may be used in `context`.
    async fn is_url_valid(&self, url: &str, context: UrlValidationContext) -> Result<bool>;

    /// Checks whether `url` may host a dashboard plugin used by `workspace`.
    async fn is_dashboard_plugin_url_valid(&self, url: &str, workspace: &str) -> Result<bool>;
}

/// Attribute, display form and dataset metadata of a workspace.
#[async_trait]
pub trait AttributesService: Debug + Send + Sync {
    /// Loads an attribute.
    async fn get_attribute(&self, attribute: &ObjRef) -> Result<AttributeMetadata>;

    /// Loads a display form.
    async fn get_attribute_display_form(&self, display_form: &ObjRef) -> Result<DisplayFormMetadata>;

    /// Loads several display forms in one call.
    async fn get_attribute_display_forms(&self, display_forms: &[ObjRef]) -> Result<Vec<DisplayFormMetadata>>;

    /// Loads the attribute a display form belongs to.
    async fn get_attribute_by_display_form(&self, display_form: &ObjRef) -> Result<AttributeMetadata>;

    /// Loads several attributes together with the objects they reference.
    async fn get_attributes_with_references(&self, attributes: &[ObjRef]) -> Result<Vec<AttributeWithReferences>>;

    /// Loads the dataset an attribute belongs to.
    async fn get_attribute_dataset_meta(&self, attribute: &ObjRef) -> Result<DatasetMetadata>;

    /// Returns the attributes shared by all the given attributes.
    async fn get_common_attributes(&self, attributes: &[ObjRef]) -> Result<Vec<ObjRef>>;

    /// Queries a page of elements of an attribute, rendered by `display_form`.
    ///
    /// Most callers build queries through [`AttributesServiceExt::elements`] instead.
    async fn query_elements(
        &self,
        display_form: &ObjRef,
        settings: &ElementsQuerySettings,
        signal: Option<AbortSignal>,
    ) -> Result<ElementsQueryResult>;
}

/// Fluent element queries on top of an [`AttributesService`].
pub trait AttributesServiceExt {
    /// Starts building an attribute elements query.
    fn elements(&self) -> ElementsQueryFactory;
}

impl AttributesServiceExt for Arc<dyn AttributesService> {
    fn elements(&self) -> ElementsQueryFactory {
        ElementsQueryFactory {
            service: Arc::clone(self),
        }
    }
}

/// Creates [`ElementsQuery`] values for a display form.
#[derive(Debug, Clone)]
pub struct ElementsQueryFactory {
    service: Arc<dyn AttributesService>,
}

impl ElementsQueryFactory {
    /// Creates a query over the elements rendered by `display_form`.
    #[must_use]
    pub fn for_display_form(&self, display_form: ObjRef) -> ElementsQuery {
        ElementsQuery {
            service: Arc::clone(&self.service),
            display_form,
            settings: ElementsQuerySettings::default(),
            signal: None,
        }
    }
}

/// An immutable attribute elements query.
///
/// Every `with_*` method returns an updated copy, so a partially configured query can be
/// reused as a template for several queries.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use backend_cache::{model::{ObjRef, ObjectType}, spi::{AttributesService, AttributesServiceExt}};
///
/// # async fn example(attributes: Arc<dyn AttributesService>) -> backend_cache::Result<()> {
/// let template = attributes.elements().for_display_form(ObjRef::identifier("label.region", ObjectType::DisplayForm));
///
/// let first_page = template.clone().with_limit(50).query().await?;
/// let second_page = template.with_limit(50).with_offset(50).query().await?;
/// # let _ = (first_page, second_page);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ElementsQuery {
    service: Arc<dyn AttributesService>,
    display_form: ObjRef,
    settings: ElementsQuerySettings,
    signal: Option<AbortSignal>,
}

impl ElementsQuery {
    /// The queried display form.
    #[must_use]
    pub fn display_form(&self) -> &ObjRef {
        &self.display_form
    }

    /// The settings accumulated so far.
    #[must_use]
    pub fn settings(&self) -> &ElementsQuerySettings {
        &self.settings
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.settings.limit = Some(limit);
        self
    }

    /// Sets the page offset.
    #[must_use]
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.settings.offset = Some(offset);
        self
    }

    /// Sets the query options.
    #[must_use]
    pub fn with_options(mut self, options: ElementsQueryOptions) -> Self {
        self.settings.options = Some(options);
        self
    }

    /// Limits the elements by attribute filters.
    #[must_use]
    pub fn with_attribute_filters(mut self, filters: Vec<Value>) -> Self {
        self.settings.attribute_filters = filters;
        self
    }

    /// Limits the elements by date filters.
    #[must_use]
    pub fn with_date_filters(mut self, filters: Vec<Value>) -> Self {
        self.settings.date_filters = filters;
        self
    }

    /// Limits the elements to those with data for the given measures.
    #[must_use]
    pub fn with_measures(mut self, measures: Vec<ObjRef>) -> Self {
        self.settings.measures = measures;
        self
    }

    /// Validates the elements against the given objects.
    #[must_use]
    pub fn with_validate_by(mut self, validate_by: Vec<ObjRef>) -> Self {
        self.settings.validate_by = validate_by;
        self
    }

    /// Attaches a cancellation signal.
    #[must_use]
    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Runs the query.
    ///
    /// # Errors
    ///
    /// Returns the error reported by the backend.
    pub async fn query(&self) -> Result<ElementsQueryResult> {
        self.service
            .query_elements(&self.display_form, &self.settings, self.signal.clone())
            .await
    }
}

/// Workspace-level and user-level settings of a workspace.
#[async_trait]
pub trait WorkspaceSettingsService: Debug + Send + Sync {
    /// Loads the settings stored on the workspace.
    async fn get_settings(&self) -> Result<WorkspaceSettings>;

    /// Loads the workspace settings merged with the current user's settings.
    async fn get_settings_for_current_user(&self) -> Result<UserWorkspaceSettings>;

    /// Sets the workspace locale.
    async fn set_locale(&self, locale: &str) -> Result<()>;

    /// Sets the workspace timezone.
    async fn set_timezone(&self, timezone: &str) -> Result<()>;

    /// Sets the workspace date format.
    async fn set_date_format(&self, date_format: &str) -> Result<()>;

    /// Sets the first day of the week.
    async fn set_week_start(&self, week_start: WeekStart) -> Result<()>;

    /// Sets the active theme.
    async fn set_theme(&self, theme: &ObjRef) -> Result<()>;

    /// Removes the active theme.
    async fn delete_theme(&self) -> Result<()>;

    /// Sets the active color palette.
    async fn set_color_palette(&self, color_palette: &ObjRef) -> Result<()>;

    /// Removes the active color palette.
    async fn delete_color_palette(&self) -> Result<()>;

    /// Sets the number separators.
    async fn set_separators(&self, separators: &Separators) -> Result<()>;
}

/// Scheduled automations of a workspace.
#[async_trait]
pub trait AutomationsService: Debug + Send + Sync {
    /// Loads a single automation.
    async fn get_automation(&self, id: &str) -> Result<Automation>;

    /// Lists automations.
    async fn get_automations(&self, options: &AutomationsLoadOptions) -> Result<Vec<Automation>>;

    /// Runs a paginated automations query.
    ///
    /// Most callers build queries through [`AutomationsServiceExt::get_automations_query`] instead.
    async fn query_automations(&self, settings: &AutomationsQuerySettings) -> Result<AutomationsQueryResult>;

    /// Creates an automation.
    async fn create_automation(&self, definition: &AutomationDefinition) -> Result<Automation>;

    /// Updates an existing automation.
    async fn update_automation(&self, definition: &AutomationDefinition) -> Result<Automation>;

    /// Deletes an automation.
    async fn delete_automation(&self, id: &str) -> Result<()>;

    /// Deletes several automations.
    async fn delete_automations(&self, ids: &[String]) -> Result<()>;

    /// Unsubscribes the current user from an automation.
    async fn unsubscribe_automation(&self, id: &str) -> Result<()>;

    /// Unsubscribes the current user from several automations.
    async fn unsubscribe_automations(&self, ids: &[String]) -> Result<()>;
}

/// Fluent automation queries on top of an [`AutomationsService`].
pub trait AutomationsServiceExt {
    /// Starts building an automations query.
    fn get_automations_query(&self) -> AutomationsQuery;
}

impl AutomationsServiceExt for Arc<dyn AutomationsService> {
    fn get_automations_query(&self) -> AutomationsQuery {
        AutomationsQuery {
            service: Arc::clone(self),
            settings: AutomationsQuerySettings::default(),
        }
    }
}

/// An immutable paginated automations query.
#[derive(Debug, Clone)]
pub struct AutomationsQuery {
    service: Arc<dyn AutomationsService>,
    settings: AutomationsQuerySettings,
}

impl AutomationsQuery {
    /// The settings accumulated so far.
    #[must_use]
    pub fn settings(&self) -> &AutomationsQuerySettings {
        &self.settings
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_size(mut self, size: u32) -> Self {
        self.settings.size = Some(size);
        self
    }

    /// Sets the zero-based page number.
    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.settings.page = Some(page);
        self
    }

    /// Filters automations by title.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.settings.filter = Some(filter.into());
        self
    }

    /// Sorts the automations.
    #[must_use]
    pub fn with_sorting(mut self, property: impl Into<String>, descending: bool) -> Self {
        self.settings.sort = Some(AutomationsSort {
            property: property.into(),
            descending,
        });
        self
    }

    /// Only returns automations of the given kind.
    #[must_use]
    pub fn with_type(mut self, automation_type: AutomationType) -> Self {
        self.settings.automation_type = Some(automation_type);
        self
    }

    /// Only returns automations created by `author`.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.settings.author = Some(author.into());
        self
    }

    /// Only returns automations delivered to `recipient`.
    #[must_use]
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.settings.recipient = Some(recipient.into());
        self
    }

    /// Only returns automations delivered to the external address `recipient`.
    #[must_use]
    pub fn with_external_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.settings.external_recipient = Some(recipient.into());
        self
    }

    /// Only returns automations `user` created or receives.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.settings.user = Some(user.into());
        self
    }

    /// Only returns automations of `dashboard`.
    #[must_use]
    pub fn with_dashboard(mut self, dashboard: impl Into<String>) -> Self {
        self.settings.dashboard = Some(dashboard.into());
        self
    }

    /// Only returns automations in the given state.
    #[must_use]
    pub fn with_status(mut self, status: AutomationStatus) -> Self {
        self.settings.status = Some(status);
        self
    }

    /// Includes the result of the last run of each automation.
    #[must_use]
    pub fn with_include_automation_result(mut self, include: bool) -> Self {
        self.settings.include_automation_result = include;
        self
    }

    /// Runs the query and returns one page.
    ///
    /// # Errors
    ///
    /// Returns the error reported by the backend.
    pub async fn query(&self) -> Result<AutomationsQueryResult> {
        self.service.query_automations(&self.settings).await
    }

    /// Runs the query and collects every page, starting at the configured page.
    ///
    /// Pages are requested until `total_count` automations were collected, a page comes back
    /// empty, or the page number cannot advance any further.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by the backend.
    pub async fn query_all(&self) -> Result<Vec<Automation>> {
        let first = self.query().await?;
        let total = usize::try_from(first.total_count).unwrap_or(usize::MAX);
        let mut page = self.settings.page.unwrap_or_default();
        let mut items = first.items;

        while items.len() < total {
            let Some(next_page) = page.checked_add(1) else {
                break;
            };
            page = next_page;
            let next = self.clone().with_page(page).query().await?;
            if next.items.is_empty() {
                break;
            }
            items.extend(next.items);
        }

        Ok(items)
    }
}
