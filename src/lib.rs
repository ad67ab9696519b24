//! Config-driven admin dashboard core: generic record→row projection,
//! schema validation, column generation, card metrics, an authenticated
//! API client, an action dispatcher with optimistic patching, and a
//! session-gating layer. Each view is described entirely by a small
//! [`config::DashboardConfig`]; nothing here knows the record shape at
//! compile time.

pub mod actions;
pub mod api;
pub mod columns;
pub mod config;
pub mod launcher;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod rows;
pub mod schema;
pub mod session;
pub mod view;
