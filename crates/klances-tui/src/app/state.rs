/// UI-only state owned by the main loop
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UiState {
    /// Index of the focused namespace in the namespace list
    pub cursor: usize,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// Move down, staying within a list of `len` items
    pub fn cursor_down(&mut self, len: usize) {
        if self.cursor + 1 < len {
            self.cursor += 1;
        }
    }

    /// Pull the cursor back inside a list that shrank
    pub fn clamp(&mut self, len: usize) {
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }
}
