//! # prtgwatch
//!
//! Query editing and query resolution for a PRTG dashboard datasource.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                           Host                                │
//! │   editor events                      panel refresh            │
//! │        │                                  │                   │
//! │        ▼                                  ▼                   │
//! │  ┌────────────┐                    ┌──────────────┐           │
//! │  │ controller │                    │  datasource  │           │
//! │  │ (cascade)  │                    │  (resolver)  │           │
//! │  └─────┬──────┘                    └──────┬───────┘           │
//! │        │   suggest            info/history│                   │
//! │        └───────────────┬──────────────────┘                   │
//! │                        ▼                                      │
//! │              ┌──────────────────┐      ┌──────────┐           │
//! │              │    ApiClient     │─────▶│  Cache   │           │
//! │              │ (prtgwatch-client)      └──────────┘           │
//! │              └────────┬─────────┘                             │
//! │                       ▼                                       │
//! │                  PRTG server                                  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`controller`]**: the selection cascade (group → device → sensor →
//!   channel → value → property) as a pure transition function plus an
//!   async driver
//! - **[`datasource`]**: [`PrtgDataSource`], which resolves query targets
//!   into frames and serves annotations, connection tests and variable
//!   queries
//! - **[`template`]**: the host's template-variable seam
//! - **[`config`]**: [`PluginConfig`] loading (file + `PRTG_*` environment)
//!
//! The wire client lives in `prtgwatch-client` and the shared data model in
//! `prtgwatch-types`; both are re-exported here.

pub mod config;
pub mod controller;
pub mod datasource;
pub mod range;
pub mod telemetry;
pub mod template;

pub use config::PluginConfig;
pub use controller::{Effect, EditorState, Event, SelectionController};
pub use datasource::{DatasourceStatus, PrtgDataSource, QueryRequest, TimeRange};
pub use template::{ScopedVars, StaticTemplateService, TemplateService, TemplateVariable};

pub use prtgwatch_client as client;
pub use prtgwatch_types as types;
