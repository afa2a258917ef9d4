//! # prtgwatch-types
//!
//! Core types shared by the PRTG API client and the query layer: the
//! mutable [`QueryTarget`] a dashboard panel edits, the [`MetricListEntry`]
//! candidates that fill its dropdowns, and the [`DataFrame`] series handed
//! back to the host.
//!
//! ## Features
//!
//! - `serde`: JSON (de)serialization using the host's camelCase field names
//!
//! ## Example
//!
//! ```rust
//! use prtgwatch_types::{Field, DataFrame, Level, MetricListEntry, QueryTarget};
//!
//! let mut target = QueryTarget::new("A");
//! target.selection_mut(Level::Group).name = "*".to_string();
//! assert!(target.group_selection.is_wildcard());
//!
//! let entries = vec![MetricListEntry::wildcard(), MetricListEntry::template("site")];
//! assert_eq!(entries[1].name, "$site");
//!
//! let mut frame = DataFrame::new("A", "Ping");
//! frame.push(Field::time(vec![1_700_000_000_000]));
//! assert_eq!(frame.row_count(), 1);
//! ```

mod frame;
mod list;
mod target;

pub use frame::*;
pub use list::*;
pub use target::*;
