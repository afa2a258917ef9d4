//! Async driver around the transition function.

use std::sync::Arc;

use prtgwatch_client::{ApiClient, ClientError, Named};
use prtgwatch_types::{DisplayOption, Level, MetricListEntry, QueryTarget, QueryType};
use tracing::{debug, warn};

use super::state::{transition, Effect, EditorState, Event, ListScope, SelectionLists};
use super::validate::validate_target;
use crate::template::TemplateService;

/// Host refresh callback.
pub type Notifier = Box<dyn Fn() + Send + Sync>;

/// Owns one query target and its selection lists.
///
/// Events go through [`SelectionController::dispatch`], which applies the
/// pure transition and then runs its effects: host notifications fire
/// immediately, list fetches call the API client and feed the result back as
/// [`Event::ListLoaded`] or [`Event::ListFailed`]. Suggest failures stop here.
pub struct SelectionController {
    state: EditorState,
    client: Arc<ApiClient>,
    templates: Arc<dyn TemplateService>,
    notifier: Notifier,
}

impl SelectionController {
    pub fn new(
        target: QueryTarget,
        client: Arc<ApiClient>,
        templates: Arc<dyn TemplateService>,
        notifier: Notifier,
    ) -> Self {
        Self {
            state: EditorState::new(target),
            client,
            templates,
            notifier,
        }
    }

    pub fn target(&self) -> &QueryTarget {
        &self.state.target
    }

    pub fn lists(&self) -> &SelectionLists {
        &self.state.lists
    }

    pub fn list(&self, level: Level) -> &[MetricListEntry] {
        self.state.lists.get(level)
    }

    /// Problems with the current target.
    pub fn validate(&self) -> Vec<String> {
        validate_target(&self.state.target)
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Apply an event and run everything it schedules.
    pub async fn dispatch(&mut self, event: Event) {
        let mut pending = vec![event];
        while let Some(event) = pending.pop() {
            for effect in self.apply(event) {
                match effect {
                    Effect::Notify => (self.notifier)(),
                    Effect::FetchList { level, scope } => {
                        pending.push(self.fetch_list(level, &scope).await);
                    }
                }
            }
        }
    }

    /// Select `name` at `level`.
    pub async fn select(&mut self, level: Level, name: impl Into<String>) {
        self.dispatch(Event::Select(level, name.into())).await;
    }

    /// Clear `level`, the selections below it down to the value level, and
    /// every list below it.
    pub async fn clear(&mut self, level: Level) {
        self.dispatch(Event::Clear(level)).await;
    }

    pub async fn set_query_type(&mut self, query_type: QueryType) {
        self.dispatch(Event::SetQueryType(query_type)).await;
    }

    pub async fn set_display_option(&mut self, option: DisplayOption, enabled: bool) {
        self.dispatch(Event::SetDisplayOption(option, enabled)).await;
    }

    /// The host reports that template variable values changed.
    pub async fn template_variables_changed(&mut self) {
        self.dispatch(Event::TemplateVariablesChanged).await;
    }

    /// Start over with a default target.
    pub async fn reset_target(&mut self) {
        self.dispatch(Event::Reset).await;
    }

    /// Drop list state on teardown. The target itself belongs to the host.
    pub fn dispose(&mut self) {
        self.hydrate(Event::Dispose);
    }

    /// Rebuild every list from the group down, one level at a time, stopping
    /// at the first level without a selection. Used when a saved query is
    /// loaded.
    pub async fn refresh_selection_lists(&mut self) {
        let scope = ListScope {
            group: self.state.target.group_selection.name.clone(),
            device: self.state.target.device_selection.name.clone(),
            sensor: self.state.target.sensor_selection.name.clone(),
            channel: self.state.target.channel_selection.name.clone(),
        };

        let loaded = self.fetch_list(Level::Group, &scope).await;
        self.hydrate(loaded);

        for level in [Level::Group, Level::Device, Level::Sensor, Level::Channel] {
            if self.state.target.selection(level).is_empty() {
                debug!(%level, "cascade refresh stopped at empty selection");
                return;
            }
            let Some(next) = level.next() else {
                return;
            };
            let loaded = self.fetch_list(next, &scope).await;
            self.hydrate(loaded);
        }

        if !self.state.target.value_selection.is_empty() {
            let name = self.state.target.value_selection.name.clone();
            self.hydrate(Event::Select(Level::Value, name));
            if !self.state.target.property_selection.is_empty() {
                let name = self.state.target.property_selection.name.clone();
                self.hydrate(Event::Select(Level::Property, name));
            }
        }
    }

    /// Apply an event outside of `dispatch`. The caller walks the cascade
    /// itself and the host already holds the target, so host notifications
    /// are the only effects allowed to be dropped here.
    fn hydrate(&mut self, event: Event) {
        for effect in self.apply(event) {
            debug_assert!(
                effect == Effect::Notify,
                "effect dropped outside dispatch: {effect:?}"
            );
        }
    }

    fn apply(&mut self, event: Event) -> Vec<Effect> {
        let variables = self.templates.variables();
        let state = std::mem::replace(&mut self.state, EditorState::new(QueryTarget::default()));
        let (state, effects) = transition(state, event, &variables);
        self.state = state;
        effects
    }

    fn resolve(&self, name: &str) -> Option<String> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(self.templates.replace(name, None))
    }

    async fn fetch_list(&self, level: Level, scope: &ListScope) -> Event {
        match self.load_entries(level, scope).await {
            Ok(entries) => Event::ListLoaded(level, entries),
            Err(e) => {
                warn!(%level, error = %e, "could not load selection list");
                Event::ListFailed(level, e.to_string())
            }
        }
    }

    async fn load_entries(
        &self,
        level: Level,
        scope: &ListScope,
    ) -> Result<Vec<MetricListEntry>, ClientError> {
        let group = self.resolve(&scope.group);
        let device = self.resolve(&scope.device);
        let sensor = self.resolve(&scope.sensor);
        let channel = self.resolve(&scope.channel);

        match level {
            Level::Group => Ok(list_entries(&self.client.group_suggest().await?)),
            Level::Device => Ok(list_entries(&self.client.device_suggest(group.as_deref()).await?)),
            Level::Sensor => Ok(list_entries(&self.client.sensor_suggest(device.as_deref()).await?)),
            Level::Channel => Ok(list_entries(
                &self
                    .client
                    .channel_suggest(group.as_deref(), device.as_deref(), sensor.as_deref())
                    .await?,
            )),
            Level::Value => {
                let rows = self
                    .client
                    .value_suggest(
                        group.as_deref(),
                        device.as_deref(),
                        sensor.as_deref(),
                        channel.as_deref(),
                    )
                    .await;
                let mut names: Vec<String> = Vec::new();
                for row in &rows {
                    for key in row.keys() {
                        if !prtgwatch_client::models::is_datetime_column(key)
                            && !names.contains(key)
                        {
                            names.push(key.clone());
                        }
                    }
                }
                Ok(names.into_iter().map(MetricListEntry::new).collect())
            }
            Level::Property | Level::FilterProperty => Ok(Vec::new()),
        }
    }
}

impl std::fmt::Debug for SelectionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionController")
            .field("target", &self.state.target)
            .finish()
    }
}

/// List entries named after `records`, duplicates dropped.
pub(crate) fn list_entries<T: Named>(records: &[T]) -> Vec<MetricListEntry> {
    let mut out: Vec<MetricListEntry> = Vec::with_capacity(records.len());
    for record in records {
        if !out.iter().any(|e| e.name == record.name()) {
            out.push(MetricListEntry::new(record.name()));
        }
    }
    out
}
