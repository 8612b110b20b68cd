use std::fmt;

use serde::{Deserialize, Serialize};

/// The five kinds of form control the filler knows how to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    Checkbox,
    Select,
    MultiSelect,
    RadioGroup,
}

impl FieldKind {
    pub fn code_prefix(self) -> &'static str {
        match self {
            FieldKind::Text => "TEXT",
            FieldKind::Checkbox => "CHECKBOX",
            FieldKind::Select => "SELECT",
            FieldKind::MultiSelect => "MULTI_SELECT",
            FieldKind::RadioGroup => "RADIO_GROUP",
        }
    }

    /// Kinds whose answer must be one of an enumerated option set.
    pub fn has_options(self) -> bool {
        matches!(
            self,
            FieldKind::Select | FieldKind::MultiSelect | FieldKind::RadioGroup
        )
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Text => "text",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Select => "select",
            FieldKind::MultiSelect => "multi-select",
            FieldKind::RadioGroup => "radio group",
        };
        f.write_str(name)
    }
}

/// A selectable choice. Serialized exactly as it is shown to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    #[serde(rename = "optionText")]
    pub option_text: String,
    pub id: String,
}

impl FieldOption {
    pub fn new(option_text: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            option_text: option_text.into(),
            id: id.into(),
        }
    }
}

/// Opaque reference to the DOM node backing a field. Only the surface that
/// produced it knows how to turn it back into an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldHandle(pub String);

impl fmt::Display for FieldHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw attributes of a labeled control as read from the page, before
/// classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScannedField {
    pub handle: String,
    pub label: String,
    pub tag: String,
    pub input_type: String,
    pub role: String,
    pub aria_haspopup: String,
    pub widget_type: String,
    pub value: String,
    pub checked: Option<bool>,
    pub invalid: bool,
    /// Options that are present in the DOM without opening a popup.
    pub options: Vec<FieldOption>,
    /// `label: value` lines of fields filled above this one.
    pub context: String,
}

/// A classified field, ready for the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub label: String,
    pub handle: FieldHandle,
    pub kind: FieldKind,
    pub options: Vec<FieldOption>,
    pub value: String,
    pub checked: Option<bool>,
    pub invalid: bool,
    pub context: String,
}

impl FormField {
    pub fn is_filled(&self) -> bool {
        !self.value.trim().is_empty()
    }
}

/// A clickable control considered when looking for the "next/save" button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonInfo {
    pub text: String,
    pub id: String,
}
