// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! An in-memory backend for testing.
//!
//! [`MockBackend`] implements every backend capability trait over fixture data. It records
//! every call it receives and supports failure injection, which makes it suitable for
//! verifying what a caching backend forwards and what it serves from memory.

use std::{collections::BTreeMap, fmt, pin::Pin, sync::Arc, task};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::{
    Error, Result,
    model::{
        AttributeElement, AttributeMetadata, AttributeWithReferences, Automation, AutomationDefinition, AutomationStatus, AutomationType,
        AutomationsLoadOptions, AutomationsQueryResult, AutomationsQuerySettings, Catalog, CatalogAttribute, CatalogLoadOptions, DataView,
        DatasetMetadata, DisplayFormMetadata, ElementsQueryResult, ElementsQuerySettings, ExecutionDefinition, ForecastConfig,
        ForecastResult, ObjRef, ObjectType, ReferencedObjects, Separators, UrlValidationContext, UserWorkspaceSettings, WeekStart,
        WorkspaceSettings, ref_matches,
    },
    spi::{
        AbortSignal, AnalyticalBackend, AnalyticalWorkspace, AttributesService, AutomationsService, BackendCapabilities, CatalogService,
        ExecutionFactory, ExecutionResult, Organization, PreparedExecution, SecuritySettingsService, WorkspaceSettingsService,
    },
};

const DEFAULT_PAGE_SIZE: u32 = 100;

/// A call received by a [`MockBackend`].
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum BackendCall {
    /// An execution was started.
    Execute {
        /// Fingerprint of the executed definition.
        fingerprint: String,
    },
    /// All data of a result was read.
    ReadAll {
        /// Fingerprint of the result.
        fingerprint: String,
    },
    /// A window of a result was read.
    ReadWindow {
        /// Fingerprint of the result.
        fingerprint: String,
        /// Requested offset.
        offset: Vec<u32>,
        /// Requested size.
        size: Vec<u32>,
    },
    /// A forecast of a result was read.
    ReadForecast {
        /// Fingerprint of the result.
        fingerprint: String,
    },
    /// A catalog was loaded.
    LoadCatalog {
        /// Workspace of the catalog.
        workspace: String,
        /// Load options.
        options: CatalogLoadOptions,
    },
    /// A URL was validated.
    IsUrlValid {
        /// Organization scope of the validation.
        scope: String,
        /// The URL.
        url: String,
        /// Validation context.
        context: UrlValidationContext,
    },
    /// A dashboard plugin URL was validated.
    IsPluginUrlValid {
        /// Workspace of the plugin.
        workspace: String,
        /// The URL.
        url: String,
    },
    /// An attribute was loaded.
    GetAttribute {
        /// Workspace of the attribute.
        workspace: String,
        /// Requested reference.
        attribute: ObjRef,
    },
    /// A display form was loaded.
    GetDisplayForm {
        /// Workspace of the display form.
        workspace: String,
        /// Requested reference.
        display_form: ObjRef,
    },
    /// Display forms were bulk loaded.
    GetDisplayForms {
        /// Workspace of the display forms.
        workspace: String,
        /// Requested references.
        display_forms: Vec<ObjRef>,
    },
    /// The attribute of a display form was loaded.
    GetAttributeByDisplayForm {
        /// Workspace of the attribute.
        workspace: String,
        /// Requested display form.
        display_form: ObjRef,
    },
    /// Attributes with their references were bulk loaded.
    GetAttributesWithReferences {
        /// Workspace of the attributes.
        workspace: String,
        /// Requested references.
        attributes: Vec<ObjRef>,
    },
    /// The dataset of an attribute was loaded.
    GetDatasetMeta {
        /// Workspace of the attribute.
        workspace: String,
        /// Requested attribute.
        attribute: ObjRef,
    },
    /// Attributes common to a set of attributes were loaded.
    GetCommonAttributes {
        /// Workspace of the attributes.
        workspace: String,
        /// Requested references.
        attributes: Vec<ObjRef>,
    },
    /// Attribute elements were queried.
    QueryElements {
        /// Workspace of the display form.
        workspace: String,
        /// Queried display form.
        display_form: ObjRef,
        /// Query settings.
        settings: ElementsQuerySettings,
    },
    /// Workspace settings were loaded.
    GetSettings {
        /// The workspace.
        workspace: String,
    },
    /// Workspace settings of the current user were loaded.
    GetUserSettings {
        /// The workspace.
        workspace: String,
    },
    /// A workspace setting was written or deleted.
    UpdateSetting {
        /// The workspace.
        workspace: String,
        /// Name of the setting.
        setting: String,
    },
    /// A single automation was loaded.
    GetAutomation {
        /// The workspace.
        workspace: String,
        /// Automation identifier.
        id: String,
    },
    /// Automations were listed.
    GetAutomations {
        /// The workspace.
        workspace: String,
        /// Load options.
        options: AutomationsLoadOptions,
    },
    /// Automations were queried.
    QueryAutomations {
        /// The workspace.
        workspace: String,
        /// Query settings.
        settings: AutomationsQuerySettings,
    },
    /// An automation was created.
    CreateAutomation {
        /// The workspace.
        workspace: String,
        /// Title of the new automation.
        title: String,
    },
    /// An automation was updated.
    UpdateAutomation {
        /// The workspace.
        workspace: String,
        /// Automation identifier.
        id: String,
    },
    /// Automations were deleted.
    DeleteAutomations {
        /// The workspace.
        workspace: String,
        /// Automation identifiers.
        ids: Vec<String>,
    },
    /// The current user was unsubscribed from automations.
    UnsubscribeAutomations {
        /// The workspace.
        workspace: String,
        /// Automation identifiers.
        ids: Vec<String>,
    },
}

type FailPredicate = Box<dyn Fn(&BackendCall) -> bool + Send + Sync>;
type Fingerprinter = Arc<dyn Fn(&ExecutionDefinition) -> String + Send + Sync>;

#[derive(Default)]
struct Fixtures {
    capabilities: BackendCapabilities,
    fingerprint: Option<Fingerprinter>,
    catalog: Catalog,
    attributes: Vec<AttributeMetadata>,
    datasets: Vec<(String, DatasetMetadata)>,
    elements: Vec<AttributeElement>,
    allowed_urls: Vec<String>,
    settings: BTreeMap<String, Value>,
    automations: Vec<Automation>,
    created_automations: u32,
}

impl Fixtures {
    fn attribute(&self, obj_ref: &ObjRef) -> Option<AttributeMetadata> {
        self.attributes.iter().find(|attribute| ref_matches(obj_ref, *attribute)).cloned()
    }

    fn display_form(&self, obj_ref: &ObjRef) -> Option<DisplayFormMetadata> {
        self.attributes
            .iter()
            .flat_map(|attribute| &attribute.display_forms)
            .find(|display_form| ref_matches(obj_ref, *display_form))
            .cloned()
    }

    fn dataset_of(&self, attribute_id: &str) -> Option<DatasetMetadata> {
        self.datasets
            .iter()
            .find(|(id, _)| id == attribute_id)
            .map(|(_, dataset)| dataset.clone())
    }
}

#[derive(Default)]
struct State {
    fixtures: Mutex<Fixtures>,
    calls: Mutex<Vec<BackendCall>>,
    fail_when: Mutex<Option<(FailPredicate, Error)>>,
}

impl State {
    /// Records `call`, lets other tasks run once, then reports cancellation or an injected failure.
    async fn enter(&self, call: BackendCall, signal: Option<&AbortSignal>) -> Result<()> {
        let failure = self.failure_for(&call);
        self.calls.lock().push(call);

        YieldOnce::default().await;

        if signal.is_some_and(AbortSignal::is_cancelled) {
            return Err(Error::Cancelled);
        }
        failure.map_or(Ok(()), Err)
    }

    fn failure_for(&self, call: &BackendCall) -> Option<Error> {
        self.fail_when
            .lock()
            .as_ref()
            .filter(|(predicate, _)| predicate(call))
            .map(|(_, error)| error.clone())
    }

    fn fingerprint(&self, definition: &ExecutionDefinition) -> String {
        let fingerprinter = self.fixtures.lock().fingerprint.clone();
        fingerprinter.map_or_else(|| definition.fingerprint(), |fingerprint| fingerprint(definition))
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("calls", &self.calls.lock().len())
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish_non_exhaustive()
    }
}

/// An in-memory analytical backend that records every call.
///
/// Clones share fixtures, recorded calls and failure injection, so a test can hand one clone
/// to the code under test and inspect another.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use backend_cache::{
///     CachingConfiguration, with_caching,
///     model::CatalogLoadOptions,
///     testing::{BackendCall, MockBackend},
/// };
///
/// # futures::executor::block_on(async {
/// let mock = MockBackend::new();
/// let backend = with_caching(Arc::new(mock.clone()), CachingConfiguration::recommended());
///
/// let catalog = backend.workspace("ws").catalog();
/// catalog.load(&CatalogLoadOptions::default()).await.unwrap();
/// catalog.load(&CatalogLoadOptions::default()).await.unwrap();
///
/// assert_eq!(mock.call_count(|call| matches!(call, BackendCall::LoadCatalog { .. })), 1);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<State>,
}

impl MockBackend {
    /// Creates a backend without fixtures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the capabilities reported by the backend.
    #[must_use]
    pub fn with_capabilities(self, capabilities: BackendCapabilities) -> Self {
        self.state.fixtures.lock().capabilities = capabilities;
        self
    }

    /// Replaces the fingerprinting of execution definitions.
    #[must_use]
    pub fn with_fingerprint(self, fingerprint: impl Fn(&ExecutionDefinition) -> String + Send + Sync + 'static) -> Self {
        self.state.fixtures.lock().fingerprint = Some(Arc::new(fingerprint));
        self
    }

    /// Sets the catalog returned by every catalog load.
    #[must_use]
    pub fn with_catalog(self, catalog: Catalog) -> Self {
        self.state.fixtures.lock().catalog = catalog;
        self
    }

    /// Sets the attributes, together with their display forms.
    #[must_use]
    pub fn with_attributes(self, attributes: impl IntoIterator<Item = AttributeMetadata>) -> Self {
        self.state.fixtures.lock().attributes = attributes.into_iter().collect();
        self
    }

    /// Assigns a dataset to the attribute with the given identifier.
    #[must_use]
    pub fn with_dataset(self, attribute_id: impl Into<String>, dataset: DatasetMetadata) -> Self {
        self.state.fixtures.lock().datasets.push((attribute_id.into(), dataset));
        self
    }

    /// Sets the elements returned by every elements query.
    #[must_use]
    pub fn with_elements(self, elements: impl IntoIterator<Item = AttributeElement>) -> Self {
        self.state.fixtures.lock().elements = elements.into_iter().collect();
        self
    }

    /// Sets the URLs that pass validation.
    #[must_use]
    pub fn with_allowed_urls(self, urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.state.fixtures.lock().allowed_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the automations of every workspace.
    #[must_use]
    pub fn with_automations(self, automations: impl IntoIterator<Item = Automation>) -> Self {
        self.state.fixtures.lock().automations = automations.into_iter().collect();
        self
    }

    /// Makes every call matching `predicate` fail with a backend error.
    ///
    /// The call is still recorded.
    pub fn fail_when(&self, predicate: impl Fn(&BackendCall) -> bool + Send + Sync + 'static) {
        self.fail_with(Error::backend("mock: injected failure"), predicate);
    }

    /// Makes every call matching `predicate` fail with `error`.
    pub fn fail_with(&self, error: Error, predicate: impl Fn(&BackendCall) -> bool + Send + Sync + 'static) {
        *self.state.fail_when.lock() = Some((Box::new(predicate), error));
    }

    /// Removes injected failures.
    pub fn clear_failures(&self) {
        *self.state.fail_when.lock() = None;
    }

    /// Returns every recorded call, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.calls.lock().clone()
    }

    /// Returns the number of recorded calls matching `predicate`.
    #[must_use]
    pub fn call_count(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        self.state.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    /// Forgets every recorded call.
    pub fn clear_calls(&self) {
        self.state.calls.lock().clear();
    }

    /// Number of handles sharing this backend's state, including every service object and
    /// pending call handed out by it.
    ///
    /// Returns to its previous value once everything created from the backend is dropped.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.state)
    }
}

impl AnalyticalBackend for MockBackend {
    fn capabilities(&self) -> BackendCapabilities {
        self.state.fixtures.lock().capabilities
    }

    fn workspace(&self, id: &str) -> Arc<dyn AnalyticalWorkspace> {
        Arc::new(MockWorkspace {
            state: Arc::clone(&self.state),
            workspace: id.to_string(),
        })
    }

    fn organization(&self, id: &str) -> Arc<dyn Organization> {
        Arc::new(MockOrganization {
            state: Arc::clone(&self.state),
            organization: id.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
struct MockOrganization {
    state: Arc<State>,
    organization: String,
}

impl Organization for MockOrganization {
    fn organization_id(&self) -> &str {
        &self.organization
    }

    fn security_settings(&self) -> Arc<dyn SecuritySettingsService> {
        Arc::new(self.clone())
    }
}

#[async_trait]
impl SecuritySettingsService for MockOrganization {
    fn scope(&self) -> &str {
        &self.organization
    }

    async fn is_url_valid(&self, url: &str, context: UrlValidationContext) -> Result<bool> {
        let call = BackendCall::IsUrlValid {
            scope: self.organization.clone(),
            url: url.to_string(),
            context,
        };
        self.state.enter(call, None).await?;
        Ok(self.state.fixtures.lock().allowed_urls.iter().any(|allowed| allowed == url))
    }

    async fn is_dashboard_plugin_url_valid(&self, url: &str, workspace: &str) -> Result<bool> {
        let call = BackendCall::IsPluginUrlValid {
            workspace: workspace.to_string(),
            url: url.to_string(),
        };
        self.state.enter(call, None).await?;
        Ok(self.state.fixtures.lock().allowed_urls.iter().any(|allowed| allowed == url))
    }
}

#[derive(Debug, Clone)]
struct MockWorkspace {
    state: Arc<State>,
    workspace: String,
}

impl MockWorkspace {
    fn not_found(what: &str, obj_ref: &ObjRef) -> Error {
        Error::not_found(format!("{what} {obj_ref}"))
    }
}

impl AnalyticalWorkspace for MockWorkspace {
    fn workspace_id(&self) -> &str {
        &self.workspace
    }

    fn execution(&self) -> Arc<dyn ExecutionFactory> {
        Arc::new(self.clone())
    }

    fn catalog(&self) -> Arc<dyn CatalogService> {
        Arc::new(self.clone())
    }

    fn attributes(&self) -> Arc<dyn AttributesService> {
        Arc::new(self.clone())
    }

    fn settings(&self) -> Arc<dyn WorkspaceSettingsService> {
        Arc::new(self.clone())
    }

    fn automations(&self) -> Arc<dyn AutomationsService> {
        Arc::new(self.clone())
    }
}

impl ExecutionFactory for MockWorkspace {
    fn for_definition(&self, definition: ExecutionDefinition) -> Arc<dyn PreparedExecution> {
        Arc::new(MockPreparedExecution {
            state: Arc::clone(&self.state),
            definition,
            signal: None,
        })
    }
}

#[derive(Debug, Clone)]
struct MockPreparedExecution {
    state: Arc<State>,
    definition: ExecutionDefinition,
    signal: Option<AbortSignal>,
}

#[async_trait]
impl PreparedExecution for MockPreparedExecution {
    fn definition(&self) -> &ExecutionDefinition {
        &self.definition
    }

    fn fingerprint(&self) -> String {
        self.state.fingerprint(&self.definition)
    }

    fn signal(&self) -> Option<AbortSignal> {
        self.signal.clone()
    }

    fn with_signal(&self, signal: AbortSignal) -> Arc<dyn PreparedExecution> {
        Arc::new(Self {
            signal: Some(signal),
            ..self.clone()
        })
    }

    async fn execute(&self) -> Result<Arc<dyn ExecutionResult>> {
        let fingerprint = self.fingerprint();
        let call = BackendCall::Execute {
            fingerprint: fingerprint.clone(),
        };
        self.state.enter(call, self.signal.as_ref()).await?;

        Ok(Arc::new(MockExecutionResult {
            state: Arc::clone(&self.state),
            definition: self.definition.clone(),
            fingerprint,
            signal: self.signal.clone(),
        }))
    }
}

#[derive(Debug, Clone)]
struct MockExecutionResult {
    state: Arc<State>,
    definition: ExecutionDefinition,
    fingerprint: String,
    signal: Option<AbortSignal>,
}

impl MockExecutionResult {
    fn view(&self, offset: Vec<u32>, count: Vec<u32>) -> DataView {
        DataView {
            fingerprint: format!("{}/{offset:?}/{count:?}", self.fingerprint),
            offset,
            count,
            total_count: vec![2, 2],
            data: json!([[1, 2], [3, 4]]),
        }
    }
}

#[async_trait]
impl ExecutionResult for MockExecutionResult {
    fn definition(&self) -> &ExecutionDefinition {
        &self.definition
    }

    fn fingerprint(&self) -> String {
        self.fingerprint.clone()
    }

    fn signal(&self) -> Option<AbortSignal> {
        self.signal.clone()
    }

    fn with_signal(&self, signal: Option<AbortSignal>) -> Arc<dyn ExecutionResult> {
        Arc::new(Self { signal, ..self.clone() })
    }

    async fn read_all(&self) -> Result<DataView> {
        let call = BackendCall::ReadAll {
            fingerprint: self.fingerprint.clone(),
        };
        self.state.enter(call, self.signal.as_ref()).await?;
        Ok(self.view(vec![0, 0], vec![2, 2]))
    }

    async fn read_window(&self, offset: &[u32], size: &[u32]) -> Result<DataView> {
        let call = BackendCall::ReadWindow {
            fingerprint: self.fingerprint.clone(),
            offset: offset.to_vec(),
            size: size.to_vec(),
        };
        self.state.enter(call, self.signal.as_ref()).await?;
        Ok(self.view(offset.to_vec(), size.to_vec()))
    }

    async fn read_forecast_all(&self, config: &ForecastConfig) -> Result<ForecastResult> {
        let call = BackendCall::ReadForecast {
            fingerprint: self.fingerprint.clone(),
        };
        self.state.enter(call, self.signal.as_ref()).await?;

        let periods = (1..=config.forecast_period).map(|period| format!("+{period}")).collect();
        Ok(ForecastResult {
            headers: periods,
            ..ForecastResult::default()
        })
    }

    fn transform(&self) -> Arc<dyn PreparedExecution> {
        Arc::new(MockPreparedExecution {
            state: Arc::clone(&self.state),
            definition: self.definition.clone(),
            signal: None,
        })
    }
}

#[async_trait]
impl CatalogService for MockWorkspace {
    async fn load(&self, options: &CatalogLoadOptions) -> Result<Arc<Catalog>> {
        let call = BackendCall::LoadCatalog {
            workspace: self.workspace.clone(),
            options: options.clone(),
        };
        self.state.enter(call, None).await?;
        Ok(Arc::new(self.state.fixtures.lock().catalog.clone()))
    }
}

#[async_trait]
impl AttributesService for MockWorkspace {
    async fn get_attribute(&self, attribute: &ObjRef) -> Result<AttributeMetadata> {
        let call = BackendCall::GetAttribute {
            workspace: self.workspace.clone(),
            attribute: attribute.clone(),
        };
        self.state.enter(call, None).await?;
        let found = self.state.fixtures.lock().attribute(attribute);
        found.ok_or_else(|| Self::not_found("attribute", attribute))
    }

    async fn get_attribute_display_form(&self, display_form: &ObjRef) -> Result<DisplayFormMetadata> {
        let call = BackendCall::GetDisplayForm {
            workspace: self.workspace.clone(),
            display_form: display_form.clone(),
        };
        self.state.enter(call, None).await?;
        let found = self.state.fixtures.lock().display_form(display_form);
        found.ok_or_else(|| Self::not_found("display form", display_form))
    }

    async fn get_attribute_display_forms(&self, display_forms: &[ObjRef]) -> Result<Vec<DisplayFormMetadata>> {
        let call = BackendCall::GetDisplayForms {
            workspace: self.workspace.clone(),
            display_forms: display_forms.to_vec(),
        };
        self.state.enter(call, None).await?;
        let fixtures = self.state.fixtures.lock();
        Ok(display_forms.iter().filter_map(|obj_ref| fixtures.display_form(obj_ref)).collect())
    }

    async fn get_attribute_by_display_form(&self, display_form: &ObjRef) -> Result<AttributeMetadata> {
        let call = BackendCall::GetAttributeByDisplayForm {
            workspace: self.workspace.clone(),
            display_form: display_form.clone(),
        };
        self.state.enter(call, None).await?;
        let found = self
            .state
            .fixtures
            .lock()
            .attributes
            .iter()
            .find(|attribute| attribute.display_forms.iter().any(|form| ref_matches(display_form, form)))
            .cloned();
        found.ok_or_else(|| Self::not_found("attribute of display form", display_form))
    }

    async fn get_attributes_with_references(&self, attributes: &[ObjRef]) -> Result<Vec<AttributeWithReferences>> {
        let call = BackendCall::GetAttributesWithReferences {
            workspace: self.workspace.clone(),
            attributes: attributes.to_vec(),
        };
        self.state.enter(call, None).await?;
        let fixtures = self.state.fixtures.lock();
        Ok(attributes
            .iter()
            .filter_map(|obj_ref| fixtures.attribute(obj_ref))
            .map(|attribute| AttributeWithReferences {
                referenced_objects: ReferencedObjects {
                    datasets: fixtures.dataset_of(&attribute.id).into_iter().collect(),
                },
                attribute,
            })
            .collect())
    }

    async fn get_attribute_dataset_meta(&self, attribute: &ObjRef) -> Result<DatasetMetadata> {
        let call = BackendCall::GetDatasetMeta {
            workspace: self.workspace.clone(),
            attribute: attribute.clone(),
        };
        self.state.enter(call, None).await?;
        let fixtures = self.state.fixtures.lock();
        fixtures
            .attribute(attribute)
            .and_then(|found| fixtures.dataset_of(&found.id))
            .ok_or_else(|| Self::not_found("dataset of attribute", attribute))
    }

    async fn get_common_attributes(&self, attributes: &[ObjRef]) -> Result<Vec<ObjRef>> {
        let call = BackendCall::GetCommonAttributes {
            workspace: self.workspace.clone(),
            attributes: attributes.to_vec(),
        };
        self.state.enter(call, None).await?;
        let fixtures = self.state.fixtures.lock();
        Ok(attributes
            .iter()
            .filter(|obj_ref| fixtures.attribute(obj_ref).is_some())
            .cloned()
            .collect())
    }

    async fn query_elements(
        &self,
        display_form: &ObjRef,
        settings: &ElementsQuerySettings,
        signal: Option<AbortSignal>,
    ) -> Result<ElementsQueryResult> {
        let call = BackendCall::QueryElements {
            workspace: self.workspace.clone(),
            display_form: display_form.clone(),
            settings: settings.clone(),
        };
        self.state.enter(call, signal.as_ref()).await?;

        let search = settings.text_filter().map(str::to_lowercase);
        let matching: Vec<_> = self
            .state
            .fixtures
            .lock()
            .elements
            .iter()
            .filter(|element| match (&search, &element.title) {
                (Some(search), Some(title)) => title.to_lowercase().contains(search),
                (Some(_), None) => false,
                (None, _) => true,
            })
            .cloned()
            .collect();

        let limit = settings.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        let offset = settings.offset.unwrap_or(0);
        Ok(ElementsQueryResult {
            total_count: u32::try_from(matching.len()).unwrap_or(u32::MAX),
            items: matching.into_iter().skip(offset as usize).take(limit as usize).collect(),
            limit,
            offset,
            total_count_without_filters: None,
        })
    }
}

impl MockWorkspace {
    async fn update_setting(&self, setting: &str, value: Option<Value>) -> Result<()> {
        let call = BackendCall::UpdateSetting {
            workspace: self.workspace.clone(),
            setting: setting.to_string(),
        };
        self.state.enter(call, None).await?;

        let mut fixtures = self.state.fixtures.lock();
        match value {
            Some(value) => fixtures.settings.insert(setting.to_string(), value),
            None => fixtures.settings.remove(setting),
        };
        Ok(())
    }
}

#[async_trait]
impl WorkspaceSettingsService for MockWorkspace {
    async fn get_settings(&self) -> Result<WorkspaceSettings> {
        let call = BackendCall::GetSettings {
            workspace: self.workspace.clone(),
        };
        self.state.enter(call, None).await?;
        Ok(WorkspaceSettings {
            workspace: self.workspace.clone(),
            settings: self.state.fixtures.lock().settings.clone(),
        })
    }

    async fn get_settings_for_current_user(&self) -> Result<UserWorkspaceSettings> {
        let call = BackendCall::GetUserSettings {
            workspace: self.workspace.clone(),
        };
        self.state.enter(call, None).await?;

        let settings = self.state.fixtures.lock().settings.clone();
        Ok(UserWorkspaceSettings {
            workspace: self.workspace.clone(),
            user_id: "mock-user".to_string(),
            locale: settings.get("locale").and_then(Value::as_str).map(str::to_string),
            settings,
        })
    }

    async fn set_locale(&self, locale: &str) -> Result<()> {
        self.update_setting("locale", Some(json!(locale))).await
    }

    async fn set_timezone(&self, timezone: &str) -> Result<()> {
        self.update_setting("timezone", Some(json!(timezone))).await
    }

    async fn set_date_format(&self, date_format: &str) -> Result<()> {
        self.update_setting("formatLocale", Some(json!(date_format))).await
    }

    async fn set_week_start(&self, week_start: WeekStart) -> Result<()> {
        self.update_setting("weekStart", Some(json!(week_start))).await
    }

    async fn set_theme(&self, theme: &ObjRef) -> Result<()> {
        self.update_setting("activeTheme", Some(json!(theme))).await
    }

    async fn delete_theme(&self) -> Result<()> {
        self.update_setting("activeTheme", None).await
    }

    async fn set_color_palette(&self, color_palette: &ObjRef) -> Result<()> {
        self.update_setting("activeColorPalette", Some(json!(color_palette))).await
    }

    async fn delete_color_palette(&self) -> Result<()> {
        self.update_setting("activeColorPalette", None).await
    }

    async fn set_separators(&self, separators: &Separators) -> Result<()> {
        self.update_setting("separators", Some(json!(separators))).await
    }
}

#[async_trait]
impl AutomationsService for MockWorkspace {
    async fn get_automation(&self, id: &str) -> Result<Automation> {
        let call = BackendCall::GetAutomation {
            workspace: self.workspace.clone(),
            id: id.to_string(),
        };
        self.state.enter(call, None).await?;
        let found = self
            .state
            .fixtures
            .lock()
            .automations
            .iter()
            .find(|automation| automation.id == id)
            .cloned();
        found.ok_or_else(|| Error::not_found(format!("automation {id}")))
    }

    async fn get_automations(&self, options: &AutomationsLoadOptions) -> Result<Vec<Automation>> {
        let call = BackendCall::GetAutomations {
            workspace: self.workspace.clone(),
            options: options.clone(),
        };
        self.state.enter(call, None).await?;
        Ok(self
            .state
            .fixtures
            .lock()
            .automations
            .iter()
            .filter(|automation| options.automation_type.is_none_or(|kind| automation.automation_type == kind))
            .filter(|automation| options.author.is_none() || automation.created_by == options.author)
            .cloned()
            .collect())
    }

    async fn query_automations(&self, settings: &AutomationsQuerySettings) -> Result<AutomationsQueryResult> {
        let call = BackendCall::QueryAutomations {
            workspace: self.workspace.clone(),
            settings: settings.clone(),
        };
        self.state.enter(call, None).await?;

        let matching: Vec<_> = self
            .state
            .fixtures
            .lock()
            .automations
            .iter()
            .filter(|automation| settings.automation_type.is_none_or(|kind| automation.automation_type == kind))
            .filter(|automation| settings.status.is_none_or(|status| automation.status == status))
            .filter(|automation| settings.author.is_none() || automation.created_by == settings.author)
            .filter(|automation| settings.dashboard.is_none() || automation.dashboard == settings.dashboard)
            .filter(|automation| {
                settings
                    .filter
                    .as_ref()
                    .is_none_or(|filter| automation.title.to_lowercase().contains(&filter.to_lowercase()))
            })
            .cloned()
            .collect();

        let limit = settings.size.unwrap_or(DEFAULT_PAGE_SIZE);
        let offset = settings.page.unwrap_or(0).saturating_mul(limit);
        Ok(AutomationsQueryResult {
            total_count: u32::try_from(matching.len()).unwrap_or(u32::MAX),
            items: matching.into_iter().skip(offset as usize).take(limit as usize).collect(),
            limit,
            offset,
        })
    }

    async fn create_automation(&self, definition: &AutomationDefinition) -> Result<Automation> {
        let call = BackendCall::CreateAutomation {
            workspace: self.workspace.clone(),
            title: definition.title.clone(),
        };
        self.state.enter(call, None).await?;

        let mut fixtures = self.state.fixtures.lock();
        fixtures.created_automations += 1;
        let id = definition
            .id
            .clone()
            .unwrap_or_else(|| format!("automation-{}", fixtures.created_automations));
        let created = Automation {
            id,
            title: definition.title.clone(),
            automation_type: definition.automation_type,
            status: AutomationStatus::Active,
            dashboard: definition.dashboard.clone(),
            created_by: Some("mock-user".to_string()),
            recipients: definition.recipients.clone(),
            details: definition.details.clone(),
        };
        fixtures.automations.push(created.clone());
        Ok(created)
    }

    async fn update_automation(&self, definition: &AutomationDefinition) -> Result<Automation> {
        let id = definition.id.clone().unwrap_or_default();
        let call = BackendCall::UpdateAutomation {
            workspace: self.workspace.clone(),
            id: id.clone(),
        };
        self.state.enter(call, None).await?;

        let mut fixtures = self.state.fixtures.lock();
        let existing = fixtures
            .automations
            .iter_mut()
            .find(|automation| automation.id == id)
            .ok_or_else(|| Error::not_found(format!("automation {id}")))?;
        existing.title.clone_from(&definition.title);
        existing.automation_type = definition.automation_type;
        existing.dashboard.clone_from(&definition.dashboard);
        existing.recipients.clone_from(&definition.recipients);
        existing.details.clone_from(&definition.details);
        Ok(existing.clone())
    }

    async fn delete_automation(&self, id: &str) -> Result<()> {
        self.delete_automations(&[id.to_string()]).await
    }

    async fn delete_automations(&self, ids: &[String]) -> Result<()> {
        let call = BackendCall::DeleteAutomations {
            workspace: self.workspace.clone(),
            ids: ids.to_vec(),
        };
        self.state.enter(call, None).await?;
        self.state.fixtures.lock().automations.retain(|automation| !ids.contains(&automation.id));
        Ok(())
    }

    async fn unsubscribe_automation(&self, id: &str) -> Result<()> {
        self.unsubscribe_automations(&[id.to_string()]).await
    }

    async fn unsubscribe_automations(&self, ids: &[String]) -> Result<()> {
        let call = BackendCall::UnsubscribeAutomations {
            workspace: self.workspace.clone(),
            ids: ids.to_vec(),
        };
        self.state.enter(call, None).await?;
        for automation in &mut self.state.fixtures.lock().automations {
            if ids.contains(&automation.id) {
                automation.recipients.clear();
            }
        }
        Ok(())
    }
}

/// Creates a display form of the attribute `attribute_id`.
#[must_use]
pub fn display_form(id: &str, uri: &str, attribute_id: &str) -> DisplayFormMetadata {
    DisplayFormMetadata {
        obj_ref: ObjRef::identifier(id, ObjectType::DisplayForm),
        id: id.to_string(),
        uri: uri.to_string(),
        title: id.to_string(),
        attribute: ObjRef::identifier(attribute_id, ObjectType::Attribute),
        display_form_type: None,
        is_default: false,
    }
}

/// Creates an attribute with the given display forms.
#[must_use]
pub fn attribute(id: &str, uri: &str, display_forms: Vec<DisplayFormMetadata>) -> AttributeMetadata {
    AttributeMetadata {
        obj_ref: ObjRef::identifier(id, ObjectType::Attribute),
        id: id.to_string(),
        uri: uri.to_string(),
        title: id.to_string(),
        display_forms,
    }
}

/// Creates a dataset.
#[must_use]
pub fn dataset(id: &str, uri: &str) -> DatasetMetadata {
    DatasetMetadata {
        obj_ref: ObjRef::identifier(id, ObjectType::Dataset),
        id: id.to_string(),
        uri: uri.to_string(),
        title: id.to_string(),
        data_loaded_at: None,
    }
}

/// Creates a catalog item of `attribute`, with its first display form as the default one.
#[must_use]
pub fn catalog_attribute(attribute: AttributeMetadata, dataset: Option<DatasetMetadata>) -> CatalogAttribute {
    let default_display_form = attribute
        .display_forms
        .first()
        .cloned()
        .unwrap_or_else(|| display_form(&format!("{}.label", attribute.id), &format!("{}/label", attribute.uri), &attribute.id));

    CatalogAttribute {
        display_forms: attribute.display_forms.clone(),
        attribute,
        default_display_form,
        geo_pin_display_forms: Vec::new(),
        dataset,
        groups: Vec::new(),
    }
}

/// Creates an attribute element.
#[must_use]
pub fn element(title: &str) -> AttributeElement {
    AttributeElement {
        title: Some(title.to_string()),
        uri: Some(format!("/elements?id={title}")),
        formatted_title: None,
    }
}

/// Creates an active scheduled export.
#[must_use]
pub fn automation(id: &str, title: &str) -> Automation {
    Automation {
        id: id.to_string(),
        title: title.to_string(),
        automation_type: AutomationType::Schedule,
        status: AutomationStatus::Active,
        dashboard: None,
        created_by: None,
        recipients: Vec::new(),
        details: json!({}),
    }
}

/// Lets other tasks run once before completing.
#[derive(Debug, Default)]
struct YieldOnce {
    polled: bool,
}

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> task::Poll<Self::Output> {
        if self.polled {
            task::Poll::Ready(())
        } else {
            self.polled = true;
            cx.waker().wake_by_ref();
            task::Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    #[test]
    fn records_calls_and_injects_failures() {
        let mock = MockBackend::new().with_allowed_urls(["https://example.com"]);
        let security = mock.organization("org").security_settings();

        assert!(block_on(security.is_url_valid("https://example.com", UrlValidationContext::Cors)).unwrap());

        mock.fail_when(|call| matches!(call, BackendCall::IsUrlValid { .. }));
        assert!(block_on(security.is_url_valid("https://example.com", UrlValidationContext::Cors)).is_err());

        mock.clear_failures();
        assert!(!block_on(security.is_url_valid("https://other.com", UrlValidationContext::UiLink)).unwrap());
        assert_eq!(mock.call_count(|call| matches!(call, BackendCall::IsUrlValid { .. })), 3);
    }

    #[test]
    fn resolves_attributes_by_either_reference() {
        let mock = MockBackend::new().with_attributes([attribute("attr", "/obj/1", vec![display_form("label", "/obj/2", "attr")])]);
        let attributes = mock.workspace("ws").attributes();

        let by_uri = block_on(attributes.get_attribute_display_form(&ObjRef::uri("/obj/2"))).unwrap();
        assert_eq!(by_uri.id, "label");

        let owner = block_on(attributes.get_attribute_by_display_form(&ObjRef::untyped("label"))).unwrap();
        assert_eq!(owner.id, "attr");

        let missing = block_on(attributes.get_attribute(&ObjRef::untyped("missing")));
        assert!(matches!(missing, Err(Error::NotFound { .. })));
    }

    #[test]
    fn cancelled_signal_fails_execution() {
        let mock = MockBackend::new();
        let signal = AbortSignal::new();
        signal.cancel();

        let prepared = mock
            .workspace("ws")
            .execution()
            .for_definition(ExecutionDefinition::new("ws"))
            .with_signal(signal);

        let error = block_on(prepared.execute()).unwrap_err();
        assert!(error.is_cancelled());
    }

    #[test]
    fn pages_automation_queries() {
        let mock = MockBackend::new().with_automations((1..=5).map(|n| automation(&format!("a{n}"), &format!("Export {n}"))));
        let settings = AutomationsQuerySettings {
            size: Some(2),
            page: Some(2),
            ..AutomationsQuerySettings::default()
        };

        let page = block_on(mock.workspace("ws").automations().query_automations(&settings)).unwrap();
        assert_eq!(page.total_count, 5);
        assert_eq!(page.offset, 4);
        assert_eq!(page.items.len(), 1);
    }
}
