mod panel;
mod status_bar;

pub use panel::panel_block;
pub use status_bar::{StatusBar, dashboard_hints};
