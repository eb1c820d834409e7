//! Signal metadata
//!
//! Labels, file information and plugin annotations are all stored as
//! [`MetaData`] objects: a scope, a unique id and a property bag. The
//! [`MetaDataList`] keeps positional objects in sync with sample edits.

mod file_info;
mod label;
mod list;
mod meta_data;

pub use file_info::{FileInfo, FileProperty, FILE_INFO_ID, FILE_INFO_TYPE};
pub use label::{Label, LABEL_TYPE};
pub use list::{EditTracks, MetaDataList};
pub use meta_data::{
    MetaData, PropertyValue, Scope, STDPROP_DESCRIPTION, STDPROP_END, STDPROP_POS, STDPROP_START,
    STDPROP_TRACKS, STDPROP_TYPE,
};
