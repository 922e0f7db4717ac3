//! Service lifecycle states.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// Constructed, not yet started.
    Starting,
    /// Serving.
    Running,
    /// Stop requested, background tasks winding down.
    ShuttingDown,
    Stopped,
}

impl AppState {
    pub fn is_running(&self) -> bool {
        matches!(self, AppState::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AppState::Stopped)
    }
}
