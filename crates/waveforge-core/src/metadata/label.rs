//! Labels: named positions in a signal

use super::meta_data::{MetaData, Scope, STDPROP_DESCRIPTION, STDPROP_POS, STDPROP_TYPE};
use crate::types::SampleIndex;

/// Metadata type of a label
pub const LABEL_TYPE: &str = "Label";

/// A position-scoped metadata object with a name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    meta: MetaData,
}

impl Label {
    pub fn new(pos: SampleIndex, name: &str) -> Self {
        let mut meta = MetaData::new(Scope::POSITION);
        meta.set(STDPROP_TYPE, LABEL_TYPE);
        meta.set(STDPROP_POS, pos);
        if !name.is_empty() {
            meta.set(STDPROP_DESCRIPTION, name);
        }
        Self { meta }
    }

    /// Wrap a metadata object if it is a label
    pub fn from_meta(meta: MetaData) -> Option<Self> {
        (meta.meta_type() == Some(LABEL_TYPE) && meta.has(STDPROP_POS)).then_some(Self { meta })
    }

    pub fn id(&self) -> &str {
        self.meta.id()
    }

    pub fn pos(&self) -> SampleIndex {
        self.meta.uint(STDPROP_POS).unwrap_or(0)
    }

    pub fn set_pos(&mut self, pos: SampleIndex) {
        self.meta.set(STDPROP_POS, pos);
    }

    pub fn name(&self) -> &str {
        self.meta.text(STDPROP_DESCRIPTION).unwrap_or("")
    }

    pub fn set_name(&mut self, name: &str) {
        if name.is_empty() {
            self.meta.remove(STDPROP_DESCRIPTION);
        } else {
            self.meta.set(STDPROP_DESCRIPTION, name);
        }
    }

    pub fn meta(&self) -> &MetaData {
        &self.meta
    }

    pub fn into_meta(self) -> MetaData {
        self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_properties() {
        let mut label = Label::new(42, "intro");
        assert_eq!(label.pos(), 42);
        assert_eq!(label.name(), "intro");
        assert!(label.meta().is_valid());

        label.set_name("");
        assert_eq!(label.name(), "");
        let meta = label.clone().into_meta();
        assert_eq!(Label::from_meta(meta), Some(label));
        assert!(Label::from_meta(MetaData::new(Scope::POSITION)).is_none());
    }
}
