//! Questions and messages for the user

/// User facing collaborator of the editing engine
///
/// The engine never shows dialogs itself; whoever embeds it decides how a
/// question is asked. Implementations are called from worker threads.
pub trait UserInteraction: Send + Sync {
    /// Undo memory is exhausted: go on without recording undo data?
    fn confirm_continue_without_undo(&self) -> bool;

    /// A running operation is about to be canceled: really cancel?
    fn confirm_cancel(&self) -> bool;

    /// Show an error message (device failure, invalid parameters, ...)
    fn show_error(&self, message: &str);
}

/// Fixed answers for batch processing and tests
#[derive(Debug, Clone, Copy)]
pub struct NonInteractive {
    pub continue_without_undo: bool,
    pub confirm_cancel: bool,
}

impl Default for NonInteractive {
    fn default() -> Self {
        Self {
            continue_without_undo: true,
            confirm_cancel: true,
        }
    }
}

impl UserInteraction for NonInteractive {
    fn confirm_continue_without_undo(&self) -> bool {
        log::warn!(
            "Not enough memory for undo, {}",
            if self.continue_without_undo { "continuing without undo" } else { "aborting" }
        );
        self.continue_without_undo
    }

    fn confirm_cancel(&self) -> bool {
        self.confirm_cancel
    }

    fn show_error(&self, message: &str) {
        log::error!("{message}");
    }
}
