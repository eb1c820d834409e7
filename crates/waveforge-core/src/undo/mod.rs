//! Undo / redo engine
//!
//! Every change to a signal is described by an [`UndoAction`] that is
//! registered (and stored) before the change happens. Actions are grouped
//! into [`UndoTransaction`]s, which the [`UndoManager`] keeps in two FIFOs
//! under a common memory budget:
//!
//! ```text
//!   register ──► open transaction ──commit──► undo buffer
//!                                              │   ▲
//!                                         undo │   │ redo
//!                                              ▼   │
//!                                            redo buffer
//! ```
//!
//! Undoing a transaction runs its actions newest first and collects the
//! actions they produce into the inverse transaction.

mod action;
mod guard;
mod manager;
mod meta;
mod samples;
mod structure;
mod transaction;

pub use action::{sample_bytes, UndoAction};
pub use guard::UndoTransactionGuard;
pub use manager::{UndoManager, DEFAULT_UNDO_LIMIT};
pub use meta::{AddMetaDataAction, DeleteMetaDataAction, ModifyMetaDataAction};
pub use samples::{DeleteAction, InsertAction, InsertLength, ModifyAction};
pub use structure::{AddTrackAction, DeleteTrackAction, SelectionAction};
pub use transaction::UndoTransaction;
