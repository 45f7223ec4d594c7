//! Application actions and UI state

mod action;
mod state;

pub use action::Action;
pub use state::UiState;
