//! A group of undo actions that is undone as one step

use std::fmt;

use super::action::{struct_bytes, UndoAction};
use crate::signal::SignalState;

/// Ordered list of actions with a common description
pub struct UndoTransaction {
    description: String,
    actions: Vec<Box<dyn UndoAction>>,
}

impl fmt::Debug for UndoTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoTransaction")
            .field("description", &self.description)
            .field("actions", &self.actions.len())
            .finish()
    }
}

impl UndoTransaction {
    pub fn new(description: &str) -> Self {
        Self {
            description: description.to_string(),
            actions: Vec::new(),
        }
    }

    /// Description of the transaction, or of its first action if unnamed
    pub fn description(&self) -> &str {
        if self.description.is_empty() {
            self.actions.first().map_or("", |a| a.description())
        } else {
            &self.description
        }
    }

    pub fn push(&mut self, action: Box<dyn UndoAction>) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Memory held in the undo buffer
    pub fn undo_size(&self) -> usize {
        struct_bytes::<Self>() + self.actions.iter().map(|a| a.undo_size()).sum::<usize>()
    }

    /// Memory the inverse transaction will need
    pub fn redo_size(&self) -> usize {
        struct_bytes::<Self>() + self.actions.iter().map(|a| a.redo_size()).sum::<usize>()
    }

    /// Undo all actions, newest first
    ///
    /// The produced actions are collected in execution order, so running the
    /// returned transaction the same way (newest first) inverts it again.
    pub fn execute(self, state: &mut SignalState, with_redo: bool) -> Option<UndoTransaction> {
        let mut inverse = UndoTransaction::new(&self.description);
        for action in self.actions.into_iter().rev() {
            if let Some(produced) = action.undo(state, with_redo) {
                inverse.push(produced);
            }
        }
        (with_redo && !inverse.is_empty()).then_some(inverse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::signal::Signal;
    use crate::undo::{DeleteAction, InsertAction};

    #[test]
    fn test_execution_order_inverts() {
        let mut state = SignalState::new();
        state.signal = Signal::with_tracks(1, 0);
        let ids = state.signal.track_ids();
        state.signal.track(0).unwrap().insert_samples(0, &(0..10).collect::<Vec<_>>());

        // Insert 5 samples at 2, then delete 3 samples at 0
        let mut tx = UndoTransaction::new("Edit");
        let mut insert = InsertAction::new("insert", ids.clone(), 2, 5, false);
        insert.store(&state);
        tx.push(Box::new(insert));
        state.insert_space(&ids, 2, 5, false);

        let mut delete = DeleteAction::new("delete", ids.clone(), 0, 3, false);
        delete.store(&state);
        tx.push(Box::new(delete));
        state.delete_range(&ids, 0, 3, false);
        let edited = state.read_samples(ids[0], 0, 100);
        assert_eq!(edited.len(), 12);

        let redo = tx.execute(&mut state, true).unwrap();
        assert_eq!(redo.len(), 2);
        assert_eq!(state.read_samples(ids[0], 0, 100), (0..10).collect::<Vec<_>>());

        let undo_again = redo.execute(&mut state, true).unwrap();
        assert_eq!(state.read_samples(ids[0], 0, 100), edited);
        assert_eq!(undo_again.description(), "Edit");
    }
}
