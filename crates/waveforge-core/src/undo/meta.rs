//! Undo actions for metadata objects

use std::mem::size_of;

use super::action::{struct_bytes, UndoAction};
use crate::metadata::{MetaData, MetaDataList};
use crate::signal::SignalState;

fn list_bytes(list: &MetaDataList) -> usize {
    list.len() * size_of::<MetaData>()
        + list
            .iter()
            .map(|m| m.properties().keys().map(String::len).sum::<usize>())
            .sum::<usize>()
}

/// Only the ids are kept for objects that still have to be removed
fn id_bytes(list: &MetaDataList) -> usize {
    list.iter().map(|m| size_of::<String>() + m.id().len()).sum()
}

/// Recorded when objects are added; undo removes them
#[derive(Debug)]
pub struct AddMetaDataAction {
    description: String,
    list: MetaDataList,
}

impl AddMetaDataAction {
    pub fn new(description: &str, list: MetaDataList) -> Self {
        Self {
            description: description.to_string(),
            list,
        }
    }
}

impl UndoAction for AddMetaDataAction {
    fn description(&self) -> &str {
        &self.description
    }

    fn undo_size(&self) -> usize {
        struct_bytes::<Self>() + id_bytes(&self.list)
    }

    fn redo_size(&self) -> usize {
        struct_bytes::<DeleteMetaDataAction>() + list_bytes(&self.list)
    }

    fn store(&mut self, _state: &SignalState) -> bool {
        true
    }

    fn undo(self: Box<Self>, state: &mut SignalState, with_redo: bool) -> Option<Box<dyn UndoAction>> {
        let redo = with_redo.then(|| {
            let mut redo = DeleteMetaDataAction::new(&self.description, &self.list);
            redo.store(state);
            Box::new(redo) as Box<dyn UndoAction>
        });
        for id in self.list.ids() {
            state.remove_meta_data(&id);
        }
        redo
    }
}

/// Recorded before objects are deleted; undo puts them back
#[derive(Debug)]
pub struct DeleteMetaDataAction {
    description: String,
    list: MetaDataList,
}

impl DeleteMetaDataAction {
    /// `list` names the objects about to be deleted
    pub fn new(description: &str, list: &MetaDataList) -> Self {
        Self {
            description: description.to_string(),
            list: list.clone(),
        }
    }
}

impl UndoAction for DeleteMetaDataAction {
    fn description(&self) -> &str {
        &self.description
    }

    fn undo_size(&self) -> usize {
        struct_bytes::<Self>() + list_bytes(&self.list)
    }

    fn redo_size(&self) -> usize {
        struct_bytes::<AddMetaDataAction>() + id_bytes(&self.list)
    }

    fn store(&mut self, state: &SignalState) -> bool {
        self.list = self.list.ids().iter().filter_map(|id| state.meta_data.get(id)).collect();
        true
    }

    fn undo(self: Box<Self>, state: &mut SignalState, with_redo: bool) -> Option<Box<dyn UndoAction>> {
        let redo = with_redo.then(|| {
            Box::new(AddMetaDataAction::new(&self.description, self.list.clone())) as Box<dyn UndoAction>
        });
        for meta in self.list.iter() {
            state.add_meta_data(meta.clone());
        }
        redo
    }
}

/// Recorded before objects are changed; undo swaps the old versions back
#[derive(Debug)]
pub struct ModifyMetaDataAction {
    description: String,
    list: MetaDataList,
}

impl ModifyMetaDataAction {
    pub fn new(description: &str, list: &MetaDataList) -> Self {
        Self {
            description: description.to_string(),
            list: list.clone(),
        }
    }
}

impl UndoAction for ModifyMetaDataAction {
    fn description(&self) -> &str {
        &self.description
    }

    fn undo_size(&self) -> usize {
        struct_bytes::<Self>() + list_bytes(&self.list)
    }

    fn redo_size(&self) -> usize {
        self.undo_size()
    }

    fn store(&mut self, state: &SignalState) -> bool {
        self.list = self.list.ids().iter().filter_map(|id| state.meta_data.get(id)).collect();
        true
    }

    fn undo(mut self: Box<Self>, state: &mut SignalState, with_redo: bool) -> Option<Box<dyn UndoAction>> {
        let current: MetaDataList = self.list.ids().iter().filter_map(|id| state.meta_data.get(id)).collect();
        let old = std::mem::take(&mut self.list);
        state.restore_meta_data(&old, old.clone());
        if !with_redo {
            return None;
        }
        self.list = current;
        Some(self)
    }
}
