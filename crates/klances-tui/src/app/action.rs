/// All possible actions in the dashboard (command pattern)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    // Selection
    ToggleNamespace,
    ClearSelection,

    // Namespace list navigation
    CursorUp,
    CursorDown,

    // Poll right away instead of waiting for the interval
    Refresh,

    Quit,
}
