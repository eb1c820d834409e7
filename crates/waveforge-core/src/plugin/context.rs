//! What a running plugin gets to see

use std::sync::{Arc, MutexGuard};
use std::time::Duration;

use crossbeam::channel::Sender;

use crate::events::ProgressUpdate;
use crate::signal::{lock_manager, SharedSignalManager, SignalManager, UserInteraction};
use crate::task::TaskContext;
use crate::types::Selection;

/// Tracks and range a plugin works on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSelection {
    pub tracks: Vec<usize>,
    pub range: Selection,
}

impl PluginSelection {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty() || self.range.is_empty()
    }
}

/// Handles passed into [`Plugin::run`](super::Plugin::run)
#[derive(Clone)]
pub struct PluginContext {
    manager: SharedSignalManager,
    task: TaskContext,
    progress_tx: Option<Sender<ProgressUpdate>>,
    interaction: Arc<dyn UserInteraction>,
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("task", &self.task)
            .field("progress", &self.progress_tx.is_some())
            .finish()
    }
}

impl PluginContext {
    pub fn new(
        manager: SharedSignalManager,
        task: TaskContext,
        progress_tx: Option<Sender<ProgressUpdate>>,
        interaction: Arc<dyn UserInteraction>,
    ) -> Self {
        Self {
            manager,
            task,
            progress_tx,
            interaction,
        }
    }

    /// Context for running a plugin on the calling thread
    pub fn inline(manager: SharedSignalManager) -> Self {
        let interaction = lock_manager(&manager).interaction();
        Self::new(manager, TaskContext::detached(), None, interaction)
    }

    pub fn manager(&self) -> &SharedSignalManager {
        &self.manager
    }

    /// Lock the signal manager; keep the guard short lived
    pub fn lock(&self) -> MutexGuard<'_, SignalManager> {
        lock_manager(&self.manager)
    }

    pub fn task(&self) -> &TaskContext {
        &self.task
    }

    pub fn should_stop(&self) -> bool {
        self.task.should_stop()
    }

    /// Interruptible sleep, false if the run is stopping
    pub fn sleep(&self, duration: Duration) -> bool {
        self.task.sleep(duration)
    }

    pub fn interaction(&self) -> &Arc<dyn UserInteraction> {
        &self.interaction
    }

    pub fn progress_sender(&self) -> Option<&Sender<ProgressUpdate>> {
        self.progress_tx.as_ref()
    }

    pub fn report(&self, update: ProgressUpdate) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx.try_send(update);
        }
    }

    /// Selected tracks and range
    ///
    /// With `expand_if_empty` an empty selection is widened to the whole
    /// signal.
    pub fn selection(&self, expand_if_empty: bool) -> PluginSelection {
        let manager = self.lock();
        let mut range = manager.selection();
        if range.is_empty() && expand_if_empty {
            range = Selection::new(0, manager.length());
        }
        PluginSelection {
            tracks: manager.selected_tracks(),
            range,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::signal::NonInteractive;

    fn manager() -> SharedSignalManager {
        let mut manager = SignalManager::new(Arc::new(NonInteractive::default()));
        manager.new_signal(1000, 44100, 16, 2);
        manager.into_shared()
    }

    #[test]
    fn test_selection_expands_when_empty() {
        let ctx = PluginContext::inline(manager());
        let sel = ctx.selection(true);
        assert_eq!(sel.tracks, vec![0, 1]);
        assert_eq!(sel.range, Selection::new(0, 1000));

        let sel = ctx.selection(false);
        assert!(sel.is_empty());
    }

    #[test]
    fn test_selection_kept() {
        let shared = manager();
        lock_manager(&shared).select_range(100, 50);
        lock_manager(&shared).select_track(1, false);
        let ctx = PluginContext::inline(shared);
        let sel = ctx.selection(true);
        assert_eq!(sel.tracks, vec![0]);
        assert_eq!(sel.range, Selection::new(100, 50));
    }
}
