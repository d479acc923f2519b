pub mod status_bar;
pub mod terminal_pane;
pub mod trace_list;
