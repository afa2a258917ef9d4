//! Editor state and the transition function that drives it.
//!
//! `transition(state, event, variables)` is pure: it returns the next state
//! plus the side effects the caller must run (notify the host, fetch a list).
//! Nothing here touches the network.

use prtgwatch_types::{DisplayOption, Level, MetricListEntry, QueryTarget, QueryType, WILDCARD};

use crate::template::TemplateVariable;

/// Properties selectable in text mode.
pub const TEXT_PROPERTIES: [&str; 6] = ["active", "message", "priority", "status", "tags", "lastvalue"];

/// Properties selectable in raw mode.
pub const RAW_PROPERTIES: [&str; 5] = [
    "active_raw",
    "message_raw",
    "priority_raw",
    "status_raw",
    "lastvalue_raw",
];

/// Info record kinds a text/raw query can read from.
pub const INFO_KINDS: [&str; 3] = ["group", "device", "sensor"];

/// Candidate lists for every cascade level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionLists {
    pub group: Vec<MetricListEntry>,
    pub device: Vec<MetricListEntry>,
    pub sensor: Vec<MetricListEntry>,
    pub channel: Vec<MetricListEntry>,
    pub value: Vec<MetricListEntry>,
    pub property: Vec<MetricListEntry>,
    pub filter_property: Vec<MetricListEntry>,
}

impl SelectionLists {
    pub fn get(&self, level: Level) -> &Vec<MetricListEntry> {
        match level {
            Level::Group => &self.group,
            Level::Device => &self.device,
            Level::Sensor => &self.sensor,
            Level::Channel => &self.channel,
            Level::Value => &self.value,
            Level::Property => &self.property,
            Level::FilterProperty => &self.filter_property,
        }
    }

    pub fn get_mut(&mut self, level: Level) -> &mut Vec<MetricListEntry> {
        match level {
            Level::Group => &mut self.group,
            Level::Device => &mut self.device,
            Level::Sensor => &mut self.sensor,
            Level::Channel => &mut self.channel,
            Level::Value => &mut self.value,
            Level::Property => &mut self.property,
            Level::FilterProperty => &mut self.filter_property,
        }
    }

    /// Empty every list strictly below `level`.
    pub fn clear_below(&mut self, level: Level) {
        for l in level.descendants() {
            self.get_mut(l).clear();
        }
    }

    pub fn is_empty(&self) -> bool {
        Level::ALL.iter().all(|l| self.get(*l).is_empty())
    }
}

/// State owned by one query-editor instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorState {
    pub target: QueryTarget,
    pub lists: SelectionLists,
    /// The target as of the last host notification.
    pub last_notified: Option<QueryTarget>,
}

impl EditorState {
    /// Wrap a (possibly saved) target with empty lists.
    pub fn new(target: QueryTarget) -> Self {
        Self {
            target,
            lists: SelectionLists::default(),
            last_notified: None,
        }
    }
}

/// Selections a list fetch is scoped by. Names are unresolved; the driver
/// substitutes template variables before calling the API.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListScope {
    pub group: String,
    pub device: String,
    pub sensor: String,
    pub channel: String,
}

impl ListScope {
    fn of(target: &QueryTarget) -> Self {
        Self {
            group: target.group_selection.name.clone(),
            device: target.device_selection.name.clone(),
            sensor: target.sensor_selection.name.clone(),
            channel: target.channel_selection.name.clone(),
        }
    }
}

/// Something that happened in the editor.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The user picked `name` at a level.
    Select(Level, String),
    /// The user cleared a level.
    Clear(Level),
    SetQueryType(QueryType),
    SetDisplayOption(DisplayOption, bool),
    /// A requested list arrived (server entries only, unseeded).
    ListLoaded(Level, Vec<MetricListEntry>),
    /// A requested list could not be fetched.
    ListFailed(Level, String),
    /// The host's template variable values changed.
    TemplateVariablesChanged,
    /// Start over with a default target.
    Reset,
    /// Release derived list state on teardown.
    Dispose,
}

/// Work the caller must perform after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Invoke the host's refresh callback.
    Notify,
    /// Fetch the candidate list for `level`.
    FetchList { level: Level, scope: ListScope },
}

/// Apply `event` to `state`.
pub fn transition(
    mut state: EditorState,
    event: Event,
    variables: &[TemplateVariable],
) -> (EditorState, Vec<Effect>) {
    let mut effects = Vec::new();

    match event {
        Event::Select(level, name) => {
            state.target.selection_mut(level).name = name;
            state.lists.clear_below(level);
            notify_if_changed(&mut state, &mut effects);

            if let Some(next) = level.next() {
                match next {
                    Level::Property | Level::FilterProperty => {
                        let entries = static_entries(next, &state.target);
                        *state.lists.get_mut(next) = seeded(entries, variables);
                    }
                    _ => effects.push(Effect::FetchList {
                        level: next,
                        scope: ListScope::of(&state.target),
                    }),
                }
            }
        }

        Event::Clear(level) => {
            state.target.selection_mut(level).clear();
            for descendant in level.descendants().filter(|l| *l <= Level::Value) {
                state.target.selection_mut(descendant).clear();
            }
            state.lists.clear_below(level);
            notify_if_changed(&mut state, &mut effects);
        }

        Event::SetQueryType(query_type) => {
            state.target.set_query_type(query_type);
            if !state.target.property_selection.is_empty() {
                let entries = static_entries(Level::FilterProperty, &state.target);
                state.lists.filter_property = seeded(entries, variables);
            }
            notify_if_changed(&mut state, &mut effects);
        }

        Event::SetDisplayOption(option, enabled) => {
            state.target.options.set(option, enabled);
            notify_if_changed(&mut state, &mut effects);
        }

        Event::ListLoaded(level, entries) => {
            *state.lists.get_mut(level) = seeded(entries, variables);
        }

        Event::ListFailed(level, _) => {
            *state.lists.get_mut(level) = seeded(Vec::new(), variables);
        }

        Event::TemplateVariablesChanged => {
            for level in Level::ALL {
                let list = state.lists.get_mut(level);
                if !list.is_empty() {
                    let entries = unseeded(std::mem::take(list));
                    *list = seeded(entries, variables);
                }
            }
            state.last_notified = Some(state.target.clone());
            effects.push(Effect::Notify);
        }

        Event::Reset => {
            let ref_id = std::mem::take(&mut state.target.ref_id);
            state.target = QueryTarget::new(ref_id);
            state.lists = SelectionLists::default();
            notify_if_changed(&mut state, &mut effects);
        }

        Event::Dispose => {
            state.lists = SelectionLists::default();
        }
    }

    (state, effects)
}

/// Wildcard first, then one `$var` per template variable, then `entries`.
pub fn seeded(entries: Vec<MetricListEntry>, variables: &[TemplateVariable]) -> Vec<MetricListEntry> {
    let mut list = Vec::with_capacity(entries.len() + variables.len() + 1);
    list.push(MetricListEntry::wildcard());
    list.extend(variables.iter().map(|v| MetricListEntry::template(&v.name)));
    list.extend(entries);
    list
}

/// Drop the wildcard and `$var` entries `seeded` added.
fn unseeded(list: Vec<MetricListEntry>) -> Vec<MetricListEntry> {
    list.into_iter()
        .filter(|e| e.name != WILDCARD && !e.is_templated())
        .collect()
}

/// Entries for the lists that need no server round trip.
fn static_entries(level: Level, target: &QueryTarget) -> Vec<MetricListEntry> {
    let names: &[&str] = match level {
        Level::Property => &INFO_KINDS,
        Level::FilterProperty => match target.query_type {
            QueryType::Raw => &RAW_PROPERTIES,
            _ => &TEXT_PROPERTIES,
        },
        _ => &[],
    };
    names.iter().map(|n| MetricListEntry::new(*n)).collect()
}

fn notify_if_changed(state: &mut EditorState, effects: &mut Vec<Effect>) {
    if state.last_notified.as_ref() != Some(&state.target) {
        state.last_notified = Some(state.target.clone());
        effects.push(Effect::Notify);
    }
}
