//! Target validation. Reporting only: nothing here blocks a mutation.

use prtgwatch_types::{Level, QueryTarget};

/// Levels that must carry a selection.
const REQUIRED: [Level; 6] = [
    Level::Group,
    Level::Device,
    Level::Sensor,
    Level::Channel,
    Level::Value,
    Level::Property,
];

/// Human-readable problems with `target`; empty when valid.
pub fn validate_target(target: &QueryTarget) -> Vec<String> {
    REQUIRED
        .iter()
        .filter(|level| target.selection(**level).is_empty())
        .map(|level| format!("{level} selection is required"))
        .collect()
}

pub fn is_valid(target: &QueryTarget) -> bool {
    validate_target(target).is_empty()
}
