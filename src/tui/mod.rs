//! Interactive run dashboard (ratatui).

pub mod app_state;
pub mod event;
pub mod input;
pub mod runner;
pub mod ui;
pub mod widgets;

pub use runner::run_dashboard;
