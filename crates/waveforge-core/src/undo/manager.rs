//! Undo / redo buffers with a memory budget

use std::collections::VecDeque;

use super::action::UndoAction;
use super::transaction::UndoTransaction;

/// Default memory budget for undo + redo data (1 GiB)
pub const DEFAULT_UNDO_LIMIT: usize = 1024 * 1024 * 1024;

/// Undo and redo buffers plus the transaction currently being recorded
///
/// Both buffers keep the oldest transaction at the front. The memory used
/// by both buffers and the open transaction never exceeds the limit.
#[derive(Debug)]
pub struct UndoManager {
    undo_buffer: VecDeque<UndoTransaction>,
    redo_buffer: VecDeque<UndoTransaction>,
    current: Option<UndoTransaction>,
    nesting: usize,
    limit: usize,
    enabled: bool,
    /// Cleared when the user chose to go on without undo for this transaction
    recording: bool,
    /// Set once undo data has been discarded to make room
    history_lost: bool,
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_LIMIT)
    }
}

impl UndoManager {
    pub fn new(limit: usize) -> Self {
        Self {
            undo_buffer: VecDeque::new(),
            redo_buffer: VecDeque::new(),
            current: None,
            nesting: 0,
            limit,
            enabled: true,
            recording: true,
            history_lost: false,
        }
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Change the budget, evicting history that no longer fits
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
        self.free_memory(0);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable recording; disabling drops all history
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        if !enabled {
            self.flush_all();
        }
        log::info!("Undo recording {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Whether undo data was ever discarded to make room
    pub fn history_lost(&self) -> bool {
        self.history_lost
    }

    /// Forget everything, e.g. when a new signal is opened
    pub fn reset(&mut self) {
        self.undo_buffer.clear();
        self.redo_buffer.clear();
        self.current = None;
        self.nesting = 0;
        self.recording = true;
        self.history_lost = false;
    }

    // ------------------------------------------------------------------
    // Memory
    // ------------------------------------------------------------------

    pub fn undo_memory(&self) -> usize {
        self.undo_buffer.iter().map(UndoTransaction::undo_size).sum()
    }

    pub fn redo_memory(&self) -> usize {
        self.redo_buffer.iter().map(UndoTransaction::undo_size).sum()
    }

    /// Undo + redo + open transaction
    pub fn used_memory(&self) -> usize {
        self.undo_memory()
            + self.redo_memory()
            + self.current.as_ref().map_or(0, UndoTransaction::undo_size)
    }

    /// Make room for `needed` bytes
    ///
    /// Evicts the oldest undo transactions first, then the oldest redo
    /// transactions. Returns false if the space cannot be made available.
    pub fn free_memory(&mut self, needed: usize) -> bool {
        if needed > self.limit {
            return false;
        }
        loop {
            let used = self.used_memory();
            if used.saturating_add(needed) <= self.limit {
                return true;
            }
            if let Some(oldest) = self.undo_buffer.pop_front() {
                log::info!(
                    "Undo buffer full, discarding '{}' ({} bytes)",
                    oldest.description(),
                    oldest.undo_size()
                );
                self.history_lost = true;
            } else if let Some(oldest) = self.redo_buffer.pop_front() {
                log::info!(
                    "Undo buffer full, discarding redo '{}' ({} bytes)",
                    oldest.description(),
                    oldest.undo_size()
                );
            } else {
                return false;
            }
        }
    }

    /// Make room for an action about to be recorded
    ///
    /// Recording drops the redo buffer anyway, so it goes before any undo
    /// history is evicted.
    pub fn reserve_for_new_action(&mut self, needed: usize) -> bool {
        if needed > self.limit {
            return false;
        }
        if self.used_memory().saturating_add(needed) > self.limit && self.can_redo() {
            log::debug!("Dropping {} bytes of redo data to record a new action", self.redo_memory());
            self.flush_redo();
        }
        self.free_memory(needed)
    }

    /// Evict history until the buffers fit the limit again
    pub fn enforce_limit(&mut self) {
        self.free_memory(0);
    }

    pub fn flush_undo(&mut self) {
        if !self.undo_buffer.is_empty() {
            self.history_lost = true;
        }
        self.undo_buffer.clear();
    }

    pub fn flush_redo(&mut self) {
        self.redo_buffer.clear();
    }

    pub fn flush_all(&mut self) {
        self.flush_undo();
        self.flush_redo();
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Open a (possibly nested) transaction, true if it is the outermost
    pub fn start(&mut self, description: &str) -> bool {
        self.nesting += 1;
        if self.nesting == 1 {
            self.current = Some(UndoTransaction::new(description));
            self.recording = true;
            return true;
        }
        false
    }

    pub fn nesting(&self) -> usize {
        self.nesting
    }

    pub fn is_open(&self) -> bool {
        self.nesting > 0
    }

    /// Whether registered actions are currently being recorded
    pub fn is_recording(&self) -> bool {
        self.enabled && self.recording && self.current.is_some()
    }

    /// Drop all history and stop recording until the transaction closes
    pub fn suspend_recording(&mut self) {
        log::warn!("Continuing without undo");
        self.flush_all();
        self.current = None;
        self.recording = false;
        self.history_lost = true;
    }

    /// Append an already stored action to the open transaction
    pub fn push_action(&mut self, action: Box<dyn UndoAction>) {
        if let Some(current) = self.current.as_mut() {
            self.redo_buffer.clear();
            current.push(action);
        }
    }

    /// Close one nesting level, returns true if a transaction was committed
    pub fn close(&mut self) -> bool {
        if self.nesting == 0 {
            log::warn!("Closing undo transaction that was never started");
            return false;
        }
        self.nesting -= 1;
        if self.nesting > 0 {
            return false;
        }
        self.recording = true;
        match self.current.take() {
            Some(transaction) if !transaction.is_empty() => {
                log::debug!(
                    "Committing undo transaction '{}' ({} actions, {} bytes)",
                    transaction.description(),
                    transaction.len(),
                    transaction.undo_size()
                );
                self.undo_buffer.push_back(transaction);
                true
            }
            _ => false,
        }
    }

    /// Abort the open transaction and hand it back for rollback
    ///
    /// Outer nesting levels keep counting but record nothing further.
    pub fn abort(&mut self) -> Option<UndoTransaction> {
        if self.nesting == 0 {
            return None;
        }
        self.nesting -= 1;
        if self.nesting == 0 {
            self.recording = true;
        }
        self.current.take()
    }

    // ------------------------------------------------------------------
    // Buffers
    // ------------------------------------------------------------------

    pub fn can_undo(&self) -> bool {
        !self.undo_buffer.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_buffer.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_buffer.back().map(UndoTransaction::description)
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_buffer.back().map(UndoTransaction::description)
    }

    pub fn undo_descriptions(&self) -> Vec<String> {
        self.undo_buffer.iter().map(|t| t.description().to_string()).collect()
    }

    pub(crate) fn pop_undo(&mut self) -> Option<UndoTransaction> {
        self.undo_buffer.pop_back()
    }

    pub(crate) fn pop_redo(&mut self) -> Option<UndoTransaction> {
        self.redo_buffer.pop_back()
    }

    pub(crate) fn push_undo(&mut self, transaction: UndoTransaction) {
        self.undo_buffer.push_back(transaction);
    }

    pub(crate) fn push_redo(&mut self, transaction: UndoTransaction) {
        self.redo_buffer.push_back(transaction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::signal::SignalState;

    #[derive(Debug)]
    struct SizedAction {
        size: usize,
    }

    impl UndoAction for SizedAction {
        fn description(&self) -> &str {
            "sized"
        }

        fn undo_size(&self) -> usize {
            self.size
        }

        fn redo_size(&self) -> usize {
            self.size
        }

        fn store(&mut self, _state: &SignalState) -> bool {
            true
        }

        fn undo(self: Box<Self>, _state: &mut SignalState, with_redo: bool) -> Option<Box<dyn UndoAction>> {
            with_redo.then(|| self as Box<dyn UndoAction>)
        }
    }

    fn commit(manager: &mut UndoManager, name: &str, size: usize) {
        manager.start(name);
        assert!(manager.free_memory(size));
        manager.push_action(Box::new(SizedAction { size }));
        manager.close();
    }

    #[test]
    fn test_eviction_oldest_first() {
        let tx_overhead = std::mem::size_of::<UndoTransaction>();
        let mut manager = UndoManager::new(3 * (1000 + tx_overhead));

        commit(&mut manager, "first", 1000);
        commit(&mut manager, "second", 1000);
        commit(&mut manager, "third", 1000);
        assert_eq!(manager.undo_descriptions(), vec!["first", "second", "third"]);
        assert!(!manager.history_lost());

        commit(&mut manager, "fourth", 1000);
        assert_eq!(manager.undo_descriptions(), vec!["second", "third", "fourth"]);
        assert!(manager.history_lost());
        assert!(manager.used_memory() <= manager.limit());
    }

    #[test]
    fn test_redo_evicted_after_undo() {
        let mut manager = UndoManager::new(10_000);
        commit(&mut manager, "undo", 100);
        manager.push_redo(UndoTransaction::new("redo"));
        assert!(manager.can_redo());

        // Undo history goes first, redo only when nothing else is left
        let empty_tx = std::mem::size_of::<UndoTransaction>();
        assert!(manager.free_memory(10_000 - empty_tx));
        assert!(!manager.can_undo());
        assert!(manager.can_redo());
        assert!(manager.free_memory(10_000));
        assert!(!manager.can_redo());
        assert!(!manager.free_memory(10_001));
    }

    #[test]
    fn test_new_action_drops_redo_before_undo() {
        let tx_overhead = std::mem::size_of::<UndoTransaction>();
        let mut manager = UndoManager::new(2 * (1000 + tx_overhead));
        commit(&mut manager, "kept", 1000);
        let mut redo = UndoTransaction::new("redo");
        redo.push(Box::new(SizedAction { size: 1000 }));
        manager.push_redo(redo);

        manager.start("new");
        assert!(manager.reserve_for_new_action(1000));
        assert!(!manager.can_redo());
        assert_eq!(manager.undo_descriptions(), vec!["kept"]);
        assert!(!manager.history_lost());
        manager.push_action(Box::new(SizedAction { size: 1000 }));
        manager.close();
        assert_eq!(manager.undo_descriptions(), vec!["kept", "new"]);
        assert!(manager.used_memory() <= manager.limit());
    }

    #[test]
    fn test_reserve_keeps_redo_when_room_is_left() {
        let mut manager = UndoManager::new(1 << 20);
        manager.push_redo(UndoTransaction::new("redo"));
        manager.start("new");
        assert!(manager.reserve_for_new_action(10));
        assert!(manager.can_redo());
        assert!(!manager.reserve_for_new_action((1 << 20) + 1));
        manager.close();
    }

    #[test]
    fn test_nested_transactions_commit_once() {
        let mut manager = UndoManager::new(1 << 20);
        assert!(manager.start("outer"));
        assert!(!manager.start("inner"));
        manager.push_action(Box::new(SizedAction { size: 1 }));
        assert!(!manager.close());
        assert!(manager.is_open());
        assert!(manager.close());
        assert_eq!(manager.undo_description(), Some("outer"));
    }

    #[test]
    fn test_abort_discards() {
        let mut manager = UndoManager::new(1 << 20);
        manager.start("outer");
        manager.start("inner");
        manager.push_action(Box::new(SizedAction { size: 1 }));
        let aborted = manager.abort().unwrap();
        assert_eq!(aborted.len(), 1);
        assert!(!manager.is_recording());
        assert!(!manager.close());
        assert!(!manager.can_undo());
    }

    #[test]
    fn test_disable_flushes() {
        let mut manager = UndoManager::new(1 << 20);
        commit(&mut manager, "edit", 10);
        manager.set_enabled(false);
        assert!(!manager.can_undo());
        manager.start("ignored");
        assert!(!manager.is_recording());
        manager.close();
    }
}
