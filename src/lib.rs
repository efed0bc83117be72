//! Schema-driven terminal forms, a rename dialog built on them, and a
//! dual-pane settings editor with dirty tracking.

pub(crate) mod app;
pub mod config;
pub mod dialog;
pub mod docmanager;
pub mod engine;
pub mod form;
pub mod json;
pub mod logging;
pub mod path;
pub mod rename;
pub mod settings;
pub mod signal;
pub mod theme;
pub mod ui;
pub mod widgets;
