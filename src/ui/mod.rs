pub mod app;
pub mod center_panel;
pub mod right_panel;
