pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod run;
pub mod terminal;
pub mod tui;
