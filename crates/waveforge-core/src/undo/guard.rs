//! Scoped undo transaction

use super::action::UndoAction;
use crate::signal::{lock_manager, SharedSignalManager};

/// Opens an undo transaction on creation and closes it when dropped
///
/// Readers and writers working inside the transaction must be dropped
/// before the guard, so their data is flushed before the commit. Declaring
/// them after the guard does that.
pub struct UndoTransactionGuard {
    manager: SharedSignalManager,
    aborted: bool,
}

impl UndoTransactionGuard {
    pub fn new(manager: SharedSignalManager, description: &str) -> Self {
        lock_manager(&manager).start_undo_transaction(description);
        Self {
            manager,
            aborted: false,
        }
    }

    /// Roll the transaction back instead of committing it on drop
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Register an action inside this transaction
    pub fn register_undo_action(&self, action: Box<dyn UndoAction>) -> bool {
        lock_manager(&self.manager).register_undo_action(action)
    }
}

impl Drop for UndoTransactionGuard {
    fn drop(&mut self) {
        let mut manager = lock_manager(&self.manager);
        if self.aborted {
            manager.abort_undo_transaction();
        } else {
            manager.close_undo_transaction();
        }
    }
}
