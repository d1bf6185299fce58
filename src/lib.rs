//! Diabetes analytics dashboard.
//!
//! [`data`] holds the UI-independent pipeline: typed records, loaders,
//! filtering and group-wise aggregation. The remaining modules are the egui
//! front end that drives it.

pub mod app;
pub mod color;
pub mod config;
pub mod data;
pub mod state;
pub mod ui;
