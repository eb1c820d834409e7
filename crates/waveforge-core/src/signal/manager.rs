//! Signal manager - the only place where a signal gets changed

use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam::channel::Receiver;

use super::error::{SignalError, SignalResult};
use super::interaction::UserInteraction;
use super::state::SignalState;
use crate::events::SignalEvent;
use crate::metadata::{FileInfo, Label, MetaDataList, FILE_INFO_ID, LABEL_TYPE};
use crate::multitrack::{MultiTrackReader, MultiTrackWriter};
use crate::storage::{InsertMode, ReaderMode, SampleReader, SampleWriter, Track};
use crate::types::{SampleIndex, Selection, TrackId};
use crate::undo::{
    AddMetaDataAction, AddTrackAction, DeleteAction, DeleteMetaDataAction, DeleteTrackAction,
    InsertAction, InsertLength, ModifyAction, ModifyMetaDataAction, SelectionAction, UndoAction,
    UndoManager,
};

/// Signal manager shared between the control thread and workers
pub type SharedSignalManager = Arc<Mutex<SignalManager>>;

/// Lock the shared manager, recovering from a poisoned lock
pub fn lock_manager(manager: &SharedSignalManager) -> MutexGuard<'_, SignalManager> {
    manager.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Selection and modified flag at the start of the outermost transaction
#[derive(Debug, Clone)]
struct TransactionStart {
    selection: Selection,
    selected_tracks: Vec<TrackId>,
    modified: bool,
}

/// Owns a signal and routes every change through the undo system
pub struct SignalManager {
    state: SignalState,
    undo: UndoManager,
    interaction: Arc<dyn UserInteraction>,
    modified: bool,
    transaction_start: Option<TransactionStart>,
}

impl std::fmt::Debug for SignalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalManager")
            .field("tracks", &self.state.signal.tracks())
            .field("length", &self.state.signal.length())
            .field("modified", &self.modified)
            .field("undo", &self.undo)
            .finish()
    }
}

impl SignalManager {
    pub fn new(interaction: Arc<dyn UserInteraction>) -> Self {
        Self {
            state: SignalState::new(),
            undo: UndoManager::default(),
            interaction,
            modified: false,
            transaction_start: None,
        }
    }

    /// Manager with a custom undo budget in bytes
    pub fn with_undo_limit(interaction: Arc<dyn UserInteraction>, limit: usize) -> Self {
        let mut manager = Self::new(interaction);
        manager.undo.set_limit(limit);
        manager
    }

    pub fn into_shared(self) -> SharedSignalManager {
        Arc::new(Mutex::new(self))
    }

    pub fn interaction(&self) -> Arc<dyn UserInteraction> {
        self.interaction.clone()
    }

    /// Read access to the raw state
    pub fn state(&self) -> &SignalState {
        &self.state
    }

    pub fn subscribe(&self) -> Receiver<SignalEvent> {
        self.state.events().subscribe()
    }

    // ------------------------------------------------------------------
    // Signal lifecycle
    // ------------------------------------------------------------------

    /// Replace the current signal by a silent one
    pub fn new_signal(&mut self, length: SampleIndex, rate: u64, bits: u32, tracks: usize) {
        self.close();
        for index in 0..tracks {
            self.state.insert_track(index, Track::new(length));
        }
        let mut info = FileInfo::new();
        info.set_rate(rate);
        info.set_bits(bits);
        info.set_tracks(tracks);
        info.set_length(length);
        self.state.meta_data.add(info.into_meta());
        log::info!("New signal: {tracks} tracks, {length} samples, {rate} Hz, {bits} bits");
        self.emit_undo_redo_info();
    }

    /// Drop the signal together with all history
    pub fn close(&mut self) {
        self.state.clear();
        self.undo.reset();
        self.transaction_start = None;
        self.set_modified(false);
        self.state.publish(SignalEvent::Closed);
    }

    pub fn is_empty(&self) -> bool {
        self.state.signal.is_empty()
    }

    pub fn tracks(&self) -> usize {
        self.state.signal.tracks()
    }

    pub fn length(&self) -> SampleIndex {
        self.state.signal.length()
    }

    pub fn rate(&self) -> u64 {
        self.file_info().rate()
    }

    pub fn bits(&self) -> u32 {
        self.file_info().bits()
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.state.signal.track_ids()
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.state.signal.track(index)
    }

    fn ids_of(&self, tracks: &[usize]) -> Vec<TrackId> {
        tracks
            .iter()
            .filter_map(|&i| self.state.signal.track(i).map(Track::id))
            .collect()
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Select a sample range (clamped to the signal)
    pub fn select_range(&mut self, offset: SampleIndex, length: SampleIndex) {
        let total = self.length();
        let offset = offset.min(total);
        let length = length.min(total - offset);
        self.state.set_selection(Selection::new(offset, length));
    }

    pub fn selection(&self) -> Selection {
        self.state.selection
    }

    pub fn select_track(&mut self, index: usize, select: bool) {
        self.state.set_track_selected(index, select);
    }

    pub fn selected_tracks(&self) -> Vec<usize> {
        self.state.signal.selected_tracks()
    }

    pub fn all_tracks(&self) -> Vec<usize> {
        (0..self.tracks()).collect()
    }

    // ------------------------------------------------------------------
    // Readers and writers
    // ------------------------------------------------------------------

    pub fn open_reader(
        &self,
        mode: ReaderMode,
        track: usize,
        first: SampleIndex,
        last: SampleIndex,
    ) -> SignalResult<SampleReader> {
        let track = self.state.signal.track(track).ok_or(SignalError::InvalidTrack(track))?;
        Ok(track.open_reader(mode, first, last))
    }

    /// Open a writer, registering the undo action for what it will change
    pub fn open_writer(
        &mut self,
        mode: InsertMode,
        track: usize,
        left: SampleIndex,
        right: SampleIndex,
    ) -> SignalResult<SampleWriter> {
        let handle = self
            .state
            .signal
            .track(track)
            .cloned()
            .ok_or(SignalError::InvalidTrack(track))?;
        let id = handle.id();

        let mut length_cell = None;
        let action: Box<dyn UndoAction> = match mode {
            InsertMode::Overwrite => {
                let end = right.min(handle.length().saturating_sub(1));
                let length = if handle.length() == 0 || end < left { 0 } else { end - left + 1 };
                Box::new(ModifyAction::new("Modify", id, left, length))
            }
            InsertMode::Insert | InsertMode::Append => {
                let offset = if mode == InsertMode::Append { handle.length() } else { left };
                let cell = Arc::new(AtomicU64::new(0));
                length_cell = Some(cell.clone());
                Box::new(InsertAction::with_length(
                    "Insert",
                    vec![id],
                    offset,
                    InsertLength::Tracked(cell),
                    false,
                ))
            }
        };
        if !self.register_undo_action(action) {
            return Err(SignalError::UndoDeclined);
        }

        let events = self.state.events().clone();
        let mut writer = SampleWriter::new(handle, mode, left, right).with_flush_callback(Box::new(
            move |mode, offset, length| {
                let event = match mode {
                    InsertMode::Overwrite => SignalEvent::SamplesModified { track, offset, length },
                    _ => SignalEvent::SamplesInserted { track, offset, length },
                };
                events.publish(event);
            },
        ));
        if let Some(cell) = length_cell {
            writer = writer.with_length_cell(cell);
        }
        self.set_modified(true);
        Ok(writer)
    }

    /// Open readers on several tracks; unknown indices are skipped
    pub fn open_multi_track_reader(
        &self,
        mode: ReaderMode,
        tracks: &[usize],
        first: SampleIndex,
        last: SampleIndex,
    ) -> MultiTrackReader {
        let mut multi = MultiTrackReader::new(first, last);
        for &index in tracks {
            match self.open_reader(mode, index, first, last) {
                Ok(reader) => multi.push(index, reader),
                Err(e) => log::warn!("Skipping track in multi-track reader: {e}"),
            }
        }
        multi
    }

    /// Open writers on several tracks; unknown indices are skipped
    pub fn open_multi_track_writer(
        &mut self,
        mode: InsertMode,
        tracks: &[usize],
        left: SampleIndex,
        right: SampleIndex,
    ) -> SignalResult<MultiTrackWriter> {
        let mut multi = MultiTrackWriter::new(mode);
        for &index in tracks {
            match self.open_writer(mode, index, left, right) {
                Ok(writer) => multi.push(index, writer),
                Err(SignalError::UndoDeclined) => return Err(SignalError::UndoDeclined),
                Err(e) => log::warn!("Skipping track in multi-track writer: {e}"),
            }
        }
        Ok(multi)
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Delete a range on the given tracks
    ///
    /// Returns false, without changing anything, if there is not enough
    /// undo memory and the user does not want to continue without undo.
    pub fn delete_range(&mut self, offset: SampleIndex, length: SampleIndex, tracks: &[usize]) -> bool {
        let total = self.length();
        if length == 0 || offset >= total {
            return true;
        }
        let length = length.min(total - offset);
        let ids = self.ids_of(tracks);
        if ids.is_empty() {
            return true;
        }

        self.start_undo_transaction("Delete");
        let action = DeleteAction::new("Delete", ids.clone(), offset, length, true);
        if !self.register_undo_action(Box::new(action)) {
            self.abort_undo_transaction();
            return false;
        }
        self.state.delete_range(&ids, offset, length, true);
        self.set_modified(true);
        self.close_undo_transaction();
        true
    }

    /// Insert silence on the given tracks
    ///
    /// An offset past the end appends.
    pub fn insert_space(&mut self, offset: SampleIndex, length: SampleIndex, tracks: &[usize]) -> bool {
        if length == 0 {
            return true;
        }
        let offset = offset.min(self.length());
        let ids = self.ids_of(tracks);
        if ids.is_empty() {
            return true;
        }

        self.start_undo_transaction("Insert Space");
        let action = InsertAction::new("Insert Space", ids.clone(), offset, length, true);
        if !self.register_undo_action(Box::new(action)) {
            self.abort_undo_transaction();
            return false;
        }
        self.state.insert_space(&ids, offset, length, true);
        self.set_modified(true);
        self.close_undo_transaction();
        true
    }

    /// Delete the selected range on the selected tracks
    pub fn delete_selection(&mut self) -> bool {
        let selection = self.selection();
        if selection.is_empty() {
            return true;
        }
        let tracks = self.selected_tracks();

        self.start_undo_transaction("Delete");
        if !self.delete_range(selection.offset(), selection.length(), &tracks) {
            self.abort_undo_transaction();
            return false;
        }
        self.select_range(selection.offset(), 0);
        self.close_undo_transaction();
        true
    }

    /// Insert a silent track at `index`
    pub fn insert_track(&mut self, index: usize) -> bool {
        let length = self.length();
        let index = index.min(self.tracks());
        let track = Track::new(length);

        self.start_undo_transaction("Insert Track");
        if !self.register_undo_action(Box::new(AddTrackAction::new(track.id(), length))) {
            self.abort_undo_transaction();
            return false;
        }
        self.state.insert_track(index, track);
        self.set_modified(true);
        self.close_undo_transaction();
        true
    }

    pub fn append_track(&mut self) -> bool {
        self.insert_track(self.tracks())
    }

    pub fn delete_track(&mut self, index: usize) -> bool {
        let Some(track) = self.state.signal.track(index) else {
            log::warn!("Cannot delete track {index}: no such track");
            return false;
        };
        let action = DeleteTrackAction::new(index, track.id()).with_length(track.length());

        self.start_undo_transaction("Delete Track");
        if !self.register_undo_action(Box::new(action)) {
            self.abort_undo_transaction();
            return false;
        }
        self.state.delete_track(index);
        self.set_modified(true);
        self.close_undo_transaction();
        true
    }

    // ------------------------------------------------------------------
    // Undo transactions
    // ------------------------------------------------------------------

    pub fn start_undo_transaction(&mut self, description: &str) {
        if self.undo.start(description) {
            self.transaction_start = Some(TransactionStart {
                selection: self.state.selection,
                selected_tracks: self.state.signal.selected_track_ids(),
                modified: self.modified,
            });
        }
    }

    pub fn close_undo_transaction(&mut self) {
        if self.undo.nesting() == 1 && self.undo.is_recording() {
            if let Some(start) = self.transaction_start.clone() {
                let selected_now = self.state.signal.selected_track_ids();
                if start.selection != self.state.selection || start.selected_tracks != selected_now {
                    let action = SelectionAction::new(start.selection, start.selected_tracks);
                    self.register_undo_action(Box::new(action));
                }
            }
        }
        let committed = self.undo.close();
        if !self.undo.is_open() {
            self.transaction_start = None;
            if committed {
                log::info!("Undo transaction committed: {:?}", self.undo.undo_description());
            }
            self.emit_undo_redo_info();
        }
    }

    /// Roll back and discard the open transaction
    pub fn abort_undo_transaction(&mut self) {
        if let Some(transaction) = self.undo.abort() {
            log::info!("Aborting undo transaction '{}'", transaction.description());
            transaction.execute(&mut self.state, false);
        }
        if let Some(start) = &self.transaction_start {
            let modified = start.modified;
            self.set_modified(modified);
        }
        if !self.undo.is_open() {
            self.transaction_start = None;
            self.emit_undo_redo_info();
        }
    }

    /// Register an undo action inside the open transaction
    ///
    /// Makes room for the action first. If that fails the user is asked
    /// whether to continue without undo; declining returns false and the
    /// caller must not perform the change.
    pub fn register_undo_action(&mut self, mut action: Box<dyn UndoAction>) -> bool {
        if !self.undo.is_recording() {
            return true;
        }
        let estimate = action.undo_size();
        if self.undo.reserve_for_new_action(estimate) {
            if !action.store(&self.state) {
                log::warn!("Storing undo data for '{}' failed", action.description());
                return false;
            }
            // Stored metadata can make the action bigger than estimated
            let size = action.undo_size();
            if size <= estimate || self.undo.reserve_for_new_action(size) {
                self.undo.push_action(action);
                return true;
            }
            log::info!(
                "Undo data for '{}' needs {} bytes, more than the limit allows",
                action.description(),
                size
            );
        }
        if !self.interaction.confirm_continue_without_undo() {
            return false;
        }
        self.undo.suspend_recording();
        self.emit_undo_redo_info();
        true
    }

    // ------------------------------------------------------------------
    // Undo / redo
    // ------------------------------------------------------------------

    pub fn undo(&mut self) -> bool {
        if self.undo.is_open() {
            log::warn!("Undo refused while a transaction is open");
            return false;
        }
        let Some(transaction) = self.undo.pop_undo() else {
            return false;
        };
        log::info!("Undo '{}'", transaction.description());

        let with_redo = self.undo.free_memory(transaction.redo_size());
        if !with_redo {
            self.undo.flush_redo();
        }
        if let Some(redo) = transaction.execute(&mut self.state, with_redo) {
            self.undo.push_redo(redo);
            self.undo.enforce_limit();
        }

        if !self.undo.can_undo() && !self.undo.history_lost() {
            self.set_modified(false);
        }
        self.emit_undo_redo_info();
        true
    }

    pub fn redo(&mut self) -> bool {
        if self.undo.is_open() {
            log::warn!("Redo refused while a transaction is open");
            return false;
        }
        let Some(transaction) = self.undo.pop_redo() else {
            return false;
        };
        log::info!("Redo '{}'", transaction.description());

        let with_undo = self.undo.free_memory(transaction.redo_size());
        if !with_undo {
            self.undo.flush_undo();
        }
        if let Some(undo) = transaction.execute(&mut self.state, with_undo) {
            self.undo.push_undo(undo);
            self.undo.enforce_limit();
        }

        self.set_modified(true);
        self.emit_undo_redo_info();
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_open() && self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        !self.undo.is_open() && self.undo.can_redo()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo.undo_description().map(str::to_string)
    }

    pub fn redo_description(&self) -> Option<String> {
        self.undo.redo_description().map(str::to_string)
    }

    pub fn free_undo_memory(&mut self, needed: usize) -> bool {
        self.undo.free_memory(needed)
    }

    pub fn set_undo_limit(&mut self, bytes: usize) {
        self.undo.set_limit(bytes);
        self.emit_undo_redo_info();
    }

    pub fn undo_limit(&self) -> usize {
        self.undo.limit()
    }

    pub fn enable_undo(&mut self, enable: bool) {
        self.undo.set_enabled(enable);
        self.emit_undo_redo_info();
    }

    pub fn flush_undo_buffers(&mut self) {
        self.undo.flush_all();
        self.emit_undo_redo_info();
    }

    /// Bytes currently used by undo and redo data
    pub fn undo_memory(&self) -> usize {
        self.undo.used_memory()
    }

    pub fn undo_manager(&self) -> &UndoManager {
        &self.undo
    }

    fn emit_undo_redo_info(&self) {
        self.state.publish(SignalEvent::UndoRedoInfo {
            undo: self.can_undo().then(|| self.undo_description()).flatten(),
            redo: self.can_redo().then(|| self.redo_description()).flatten(),
        });
    }

    // ------------------------------------------------------------------
    // Modified flag
    // ------------------------------------------------------------------

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn set_modified(&mut self, modified: bool) {
        if self.modified != modified {
            self.modified = modified;
            self.state.publish(SignalEvent::ModifiedChanged(modified));
        }
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    pub fn meta_data(&self) -> &MetaDataList {
        &self.state.meta_data
    }

    pub fn file_info(&self) -> FileInfo {
        self.state
            .meta_data
            .get(FILE_INFO_ID)
            .and_then(FileInfo::from_meta)
            .unwrap_or_default()
    }

    pub fn set_file_info(&mut self, info: FileInfo, with_undo: bool) -> bool {
        if with_undo {
            self.start_undo_transaction("Modify File Info");
            let existing: MetaDataList = self.state.meta_data.get(FILE_INFO_ID).into_iter().collect();
            let action: Box<dyn UndoAction> = if existing.is_empty() {
                let added: MetaDataList = [info.meta().clone()].into_iter().collect();
                Box::new(AddMetaDataAction::new("Modify File Info", added))
            } else {
                Box::new(ModifyMetaDataAction::new("Modify File Info", &existing))
            };
            if !self.register_undo_action(action) {
                self.abort_undo_transaction();
                return false;
            }
        }
        self.state.add_meta_data(info.into_meta());
        self.set_modified(true);
        if with_undo {
            self.close_undo_transaction();
        }
        true
    }

    /// All labels, sorted by position
    pub fn labels(&self) -> Vec<Label> {
        let mut labels: Vec<Label> = self
            .state
            .meta_data
            .select_by_type(LABEL_TYPE)
            .iter()
            .cloned()
            .filter_map(Label::from_meta)
            .collect();
        labels.sort_by_key(Label::pos);
        labels
    }

    pub fn find_label(&self, pos: SampleIndex) -> Option<Label> {
        self.labels().into_iter().find(|l| l.pos() == pos)
    }

    fn label_by_id(&self, id: &str) -> Option<Label> {
        self.state.meta_data.get(id).and_then(Label::from_meta)
    }

    /// Add a label, `None` if there already is one at `pos`
    pub fn add_label(&mut self, pos: SampleIndex, name: &str, with_undo: bool) -> Option<Label> {
        if self.find_label(pos).is_some() {
            return None;
        }
        let label = Label::new(pos, name);
        if with_undo {
            self.start_undo_transaction("Add Label");
            let list: MetaDataList = [label.meta().clone()].into_iter().collect();
            if !self.register_undo_action(Box::new(AddMetaDataAction::new("Add Label", list))) {
                self.abort_undo_transaction();
                return None;
            }
        }
        self.state.add_meta_data(label.meta().clone());
        self.set_modified(true);
        if with_undo {
            self.close_undo_transaction();
        }
        Some(label)
    }

    pub fn delete_label(&mut self, id: &str, with_undo: bool) -> bool {
        let Some(label) = self.label_by_id(id) else {
            return false;
        };
        if with_undo {
            self.start_undo_transaction("Delete Label");
            let list: MetaDataList = [label.meta().clone()].into_iter().collect();
            if !self.register_undo_action(Box::new(DeleteMetaDataAction::new("Delete Label", &list))) {
                self.abort_undo_transaction();
                return false;
            }
        }
        self.state.remove_meta_data(id);
        self.set_modified(true);
        if with_undo {
            self.close_undo_transaction();
        }
        true
    }

    /// Move and / or rename a label, false if another label sits at `pos`
    pub fn modify_label(&mut self, id: &str, pos: SampleIndex, name: &str, with_undo: bool) -> bool {
        let Some(mut label) = self.label_by_id(id) else {
            return false;
        };
        if self.find_label(pos).is_some_and(|other| other.id() != id) {
            return false;
        }
        if with_undo {
            self.start_undo_transaction("Modify Label");
            let list: MetaDataList = [label.meta().clone()].into_iter().collect();
            if !self.register_undo_action(Box::new(ModifyMetaDataAction::new("Modify Label", &list))) {
                self.abort_undo_transaction();
                return false;
            }
        }
        label.set_pos(pos);
        label.set_name(name);
        self.state.add_meta_data(label.into_meta());
        self.set_modified(true);
        if with_undo {
            self.close_undo_transaction();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::signal::NonInteractive;
    use crate::types::Sample;

    fn manager() -> SignalManager {
        SignalManager::new(Arc::new(NonInteractive::default()))
    }

    fn fill_ramp(manager: &mut SignalManager) {
        let length = manager.length();
        for index in manager.all_tracks() {
            let mut writer = manager
                .open_writer(InsertMode::Overwrite, index, 0, length - 1)
                .unwrap();
            let ramp: Vec<Sample> = (0..length as Sample).map(|v| v + index as Sample * 10_000).collect();
            writer.write(&ramp);
        }
        manager.flush_undo_buffers();
        manager.set_modified(false);
    }

    fn samples(manager: &SignalManager, track: usize) -> Vec<Sample> {
        let len = manager.length();
        manager.track(track).unwrap().read_range(0, len)
    }

    #[test]
    fn test_delete_selection_undo_redo() {
        let mut manager = manager();
        manager.new_signal(1000, 44100, 16, 2);
        fill_ramp(&mut manager);
        let original = [samples(&manager, 0), samples(&manager, 1)];

        manager.select_range(100, 100);
        assert_eq!(manager.selection().last(), 199);
        assert!(manager.delete_selection());
        assert_eq!(manager.length(), 900);
        assert_eq!(manager.track(0).unwrap().length(), 900);
        assert_eq!(manager.track(1).unwrap().length(), 900);
        assert_eq!(manager.selection(), Selection::new(100, 0));
        assert!(manager.is_modified());

        assert!(manager.undo());
        assert_eq!(manager.length(), 1000);
        assert_eq!(samples(&manager, 0), original[0]);
        assert_eq!(samples(&manager, 1), original[1]);
        assert_eq!(manager.selection(), Selection::new(100, 100));
        assert!(!manager.is_modified());

        assert!(manager.redo());
        assert_eq!(manager.length(), 900);
        assert_eq!(manager.selection(), Selection::new(100, 0));
        assert_eq!(manager.track(1).unwrap().read_range(100, 1), vec![10_200]);
    }

    #[test]
    fn test_transaction_is_one_undo_step() {
        let mut manager = manager();
        manager.new_signal(500, 44100, 16, 1);
        fill_ramp(&mut manager);

        manager.start_undo_transaction("Several Edits");
        assert!(manager.delete_range(0, 10, &[0]));
        assert!(manager.insert_space(200, 50, &[0]));
        assert!(manager.append_track());
        manager.select_range(5, 5);
        manager.close_undo_transaction();

        assert_eq!(manager.undo_description().as_deref(), Some("Several Edits"));
        assert!(manager.undo());
        assert_eq!(manager.tracks(), 1);
        assert_eq!(manager.length(), 500);
        assert_eq!(samples(&manager, 0), (0..500).collect::<Vec<Sample>>());
        assert_eq!(manager.selection(), Selection::default());
        assert!(!manager.can_undo());
        assert_eq!(manager.redo_description().as_deref(), Some("Several Edits"));
    }

    #[test]
    fn test_declined_undo_leaves_signal_alone() {
        let interaction = NonInteractive {
            continue_without_undo: false,
            confirm_cancel: true,
        };
        let mut manager = SignalManager::with_undo_limit(Arc::new(interaction), 1000);
        manager.new_signal(1000, 44100, 16, 2);

        assert!(!manager.delete_range(0, 500, &[0, 1]));
        assert_eq!(manager.length(), 1000);
        assert!(!manager.is_modified());
        assert!(!manager.can_undo());
    }

    #[test]
    fn test_continue_without_undo() {
        let mut manager = SignalManager::with_undo_limit(Arc::new(NonInteractive::default()), 1000);
        manager.new_signal(1000, 44100, 16, 2);

        assert!(manager.delete_range(0, 500, &[0, 1]));
        assert_eq!(manager.length(), 500);
        assert!(!manager.can_undo());
        assert!(manager.undo_manager().history_lost());
    }

    #[test]
    fn test_abort_rolls_back() {
        let mut manager = manager();
        manager.new_signal(100, 44100, 16, 1);
        fill_ramp(&mut manager);

        manager.start_undo_transaction("Failing Plugin");
        assert!(manager.delete_range(10, 10, &[0]));
        {
            let mut writer = manager.open_writer(InsertMode::Overwrite, 0, 0, 9).unwrap();
            writer.write(&[0; 10]);
        }
        assert!(manager.is_modified());
        manager.abort_undo_transaction();

        assert_eq!(samples(&manager, 0), (0..100).collect::<Vec<Sample>>());
        assert!(!manager.is_modified());
        assert!(!manager.can_undo());
        assert!(!manager.can_redo());
    }

    #[test]
    fn test_invalid_track_is_error() {
        let mut manager = manager();
        manager.new_signal(10, 44100, 16, 1);
        assert_eq!(
            manager.open_reader(ReaderMode::FullSnapshot, 3, 0, 9).unwrap_err(),
            SignalError::InvalidTrack(3)
        );
        assert!(manager.open_writer(InsertMode::Insert, 1, 0, 0).is_err());
        assert_eq!(manager.open_multi_track_reader(ReaderMode::FullSnapshot, &[5, 6], 0, 9).tracks(), 0);
    }

    #[test]
    fn test_insert_writer_undo() {
        let mut manager = manager();
        manager.new_signal(10, 44100, 16, 2);
        manager.start_undo_transaction("Paste");
        {
            let mut writer = manager.open_multi_track_writer(InsertMode::Insert, &[0, 1], 5, 5).unwrap();
            crate::pipeline::SampleSink::consume(&mut writer, &[vec![1; 7], vec![2; 7]]).unwrap();
        }
        manager.close_undo_transaction();
        assert_eq!(manager.length(), 17);

        assert!(manager.undo());
        assert_eq!(manager.length(), 10);
        assert!(manager.redo());
        assert_eq!(manager.track(1).unwrap().read_range(5, 7), vec![2; 7]);
    }

    #[test]
    fn test_labels() {
        let mut manager = manager();
        manager.new_signal(1000, 44100, 16, 1);

        let label = manager.add_label(100, "a", true).unwrap();
        assert!(manager.add_label(100, "dup", true).is_none());
        let other = manager.add_label(300, "b", true).unwrap();

        assert!(!manager.modify_label(label.id(), 300, "moved", true));
        assert!(manager.modify_label(label.id(), 200, "moved", true));
        assert_eq!(manager.find_label(200).unwrap().name(), "moved");

        // Labels follow deletions on all tracks
        assert!(manager.delete_range(0, 50, &[0]));
        let positions: Vec<u64> = manager.labels().iter().map(Label::pos).collect();
        assert_eq!(positions, vec![150, 250]);

        assert!(manager.undo());
        assert!(manager.undo());
        assert_eq!(manager.find_label(100).unwrap().name(), "a");

        assert!(manager.delete_label(other.id(), true));
        assert_eq!(manager.labels().len(), 1);
        assert!(manager.undo());
        assert_eq!(manager.labels().len(), 2);
    }

    #[test]
    fn test_file_info() {
        let mut manager = manager();
        manager.new_signal(10, 48000, 24, 1);
        assert_eq!(manager.rate(), 48000);
        assert_eq!(manager.bits(), 24);

        let mut info = manager.file_info();
        info.set_rate(96000);
        assert!(manager.set_file_info(info, true));
        assert_eq!(manager.rate(), 96000);
        assert!(manager.undo());
        assert_eq!(manager.rate(), 48000);
    }

    #[test]
    fn test_track_insert_delete_undo() {
        let mut manager = manager();
        manager.new_signal(100, 44100, 16, 2);
        let ids = manager.track_ids();

        assert!(manager.delete_track(0));
        assert_eq!(manager.track_ids(), vec![ids[1]]);
        assert_eq!(manager.file_info().tracks(), 1);
        assert!(!manager.delete_track(7));

        assert!(manager.undo());
        assert_eq!(manager.track_ids(), ids);
        assert_eq!(manager.file_info().tracks(), 2);
        assert!(manager.insert_track(1));
        assert_eq!(manager.tracks(), 3);
        assert_eq!(manager.file_info().tracks(), 3);
        assert_eq!(manager.track(1).unwrap().length(), 100);
        assert!(manager.undo());
        assert_eq!(manager.track_ids(), ids);
        assert_eq!(manager.file_info().tracks(), 2);
        assert!(manager.redo());
        assert_eq!(manager.file_info().tracks(), 3);
    }

    #[test]
    fn test_insert_space_past_end_undo() {
        let mut manager = manager();
        manager.new_signal(1000, 44100, 16, 1);
        fill_ramp(&mut manager);

        assert!(manager.insert_space(2000, 10, &[0]));
        assert_eq!(manager.length(), 1010);
        assert_eq!(manager.track(0).unwrap().read_range(995, 10), vec![995, 996, 997, 998, 999, 0, 0, 0, 0, 0]);

        assert!(manager.undo());
        assert_eq!(manager.length(), 1000);
        assert_eq!(samples(&manager, 0), (0..1000).collect::<Vec<Sample>>());
        assert!(manager.redo());
        assert_eq!(manager.length(), 1010);
    }

    #[test]
    fn test_overwrite_past_end_undo() {
        let mut manager = manager();
        manager.new_signal(10, 44100, 16, 1);

        manager.start_undo_transaction("Paste Over");
        {
            let mut writer = manager.open_writer(InsertMode::Overwrite, 0, 5, 19).unwrap();
            assert_eq!(writer.write(&[7; 15]), 5);
        }
        manager.close_undo_transaction();
        assert_eq!(manager.length(), 10);
        assert_eq!(samples(&manager, 0), vec![0, 0, 0, 0, 0, 7, 7, 7, 7, 7]);

        assert!(manager.undo());
        assert_eq!(manager.length(), 10);
        assert_eq!(samples(&manager, 0), vec![0; 10]);
    }

    #[test]
    fn test_delete_range_past_end_undo() {
        let mut manager = manager();
        manager.new_signal(1000, 44100, 16, 1);
        fill_ramp(&mut manager);

        assert!(manager.delete_range(900, 500, &[0]));
        assert_eq!(manager.length(), 900);
        assert!(manager.delete_range(2000, 10, &[0]));
        assert_eq!(manager.length(), 900);
        assert_eq!(manager.undo_manager().undo_descriptions(), vec!["Delete"]);

        assert!(manager.undo());
        assert_eq!(manager.length(), 1000);
        assert_eq!(samples(&manager, 0), (0..1000).collect::<Vec<Sample>>());
    }

    #[test]
    fn test_label_undo_data_respects_limit() {
        use std::mem::size_of;

        use crate::metadata::MetaData;
        use crate::undo::{sample_bytes, UndoTransaction};

        // Room for the samples and a few labels, not for all of them
        let limit = size_of::<UndoTransaction>()
            + size_of::<DeleteAction>()
            + sample_bytes(1, 100)
            + 10 * size_of::<MetaData>();
        let mut manager = SignalManager::with_undo_limit(Arc::new(NonInteractive::default()), limit);
        manager.new_signal(1000, 44100, 16, 1);
        for i in 0..50 {
            manager.add_label(200 + i * 10, "", false).unwrap();
        }

        assert!(manager.delete_range(0, 100, &[0]));
        assert_eq!(manager.length(), 900);
        assert_eq!(manager.labels()[0].pos(), 100);
        assert!(manager.undo_memory() <= manager.undo_limit());
        assert!(!manager.can_undo());
        assert!(manager.undo_manager().history_lost());
    }

    #[test]
    fn test_label_edit_after_undo_clears_redo() {
        let mut manager = manager();
        manager.new_signal(1000, 44100, 16, 1);
        for pos in [150, 400, 800] {
            manager.add_label(pos, "", true).unwrap();
        }
        let positions = |manager: &SignalManager| manager.labels().iter().map(Label::pos).collect::<Vec<_>>();

        assert!(manager.delete_range(0, 100, &[0]));
        assert_eq!(positions(&manager), vec![50, 300, 700]);
        assert!(manager.undo());
        assert_eq!(positions(&manager), vec![150, 400, 800]);
        assert!(manager.can_redo());

        manager.add_label(500, "new", true).unwrap();
        assert!(!manager.can_redo());
        assert_eq!(positions(&manager), vec![150, 400, 500, 800]);
        assert!(manager.undo_memory() <= manager.undo_limit());

        assert!(manager.undo());
        assert_eq!(positions(&manager), vec![150, 400, 800]);
        assert_eq!(manager.redo_description().as_deref(), Some("Add Label"));
        assert_eq!(manager.length(), 1000);
    }

    #[test]
    fn test_events() {
        let mut manager = manager();
        manager.new_signal(100, 44100, 16, 1);
        let rx = manager.subscribe();
        assert!(manager.delete_range(0, 10, &[0]));

        let events: Vec<SignalEvent> = rx.try_iter().collect();
        assert!(events.contains(&SignalEvent::SamplesDeleted { track: 0, offset: 0, length: 10 }));
        assert!(events.contains(&SignalEvent::ModifiedChanged(true)));
        assert!(events.contains(&SignalEvent::UndoRedoInfo {
            undo: Some("Delete".to_string()),
            redo: None
        }));
    }
}
