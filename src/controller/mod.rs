//! Selection cascade for the query editor.
//!
//! A query target walks group → device → sensor → channel → value → property,
//! with an optional filter property at the end. Picking an item at one level
//! drops every list below it and refills the next one; clearing a level
//! also blanks the selections below it down to the value level.
//!
//! The logic is split in two:
//!
//! - `state`: a pure [`transition`] from `(state, event)` to
//!   `(state, effects)`, testable without a server
//! - `driver`: [`SelectionController`], which runs the effects against an
//!   [`ApiClient`](prtgwatch_client::ApiClient)

mod driver;
mod state;
mod validate;

pub(crate) use driver::list_entries;
pub use driver::{Notifier, SelectionController};
pub use state::{
    seeded, transition, Effect, EditorState, Event, ListScope, SelectionLists, INFO_KINDS,
    RAW_PROPERTIES, TEXT_PROPERTIES,
};
pub use validate::{is_valid, validate_target};
